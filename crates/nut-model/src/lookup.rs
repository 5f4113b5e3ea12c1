//! Helpers over lists of nuts: name lookup and materialization to bytes

use crate::error::{NutError, NutResult};
use crate::nut::{ConvertibleNut, NutRef};
use crate::path::simplify_path;
use crate::piped::{BytesContent, PipedNut};
use crate::version::VersionNumber;
use crate::wrapper::freeze;
use nut_pipe::on_ready;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::Arc;

fn normalized(name: &str) -> String {
    let relative = name.strip_prefix('/').unwrap_or(name);
    simplify_path(relative).unwrap_or_else(|| relative.to_string())
}

/// Find the nut named `name` in `nuts` or, depth first, in their referenced nuts
///
/// A leading `/` is ignored and `.`/`..` segments are resolved on both sides.
#[must_use]
pub fn find_by_name(nuts: &[NutRef], name: &str) -> Option<NutRef> {
    let wanted = normalized(name);
    let mut visited = HashSet::new();
    let mut stack: Vec<NutRef> = nuts.iter().rev().cloned().collect();

    while let Some(nut) = stack.pop() {
        if !visited.insert(Arc::as_ptr(&nut).cast::<()>()) {
            continue;
        }
        if normalized(&nut.name()) == wanted {
            return Some(nut);
        }
        stack.extend(nut.referenced_nuts().into_iter().rev());
    }
    None
}

/// Transform `nut` and capture the resulting content
///
/// # Errors
/// Any transformation failure, or [`NutError::IllegalState`] when no content
/// was produced.
pub fn transform_to_bytes(nut: &dyn ConvertibleNut) -> NutResult<Vec<u8>> {
    let captured = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);
    nut.transform(&[on_ready(move |execution| {
        *sink.lock() = Some(execution.as_bytes().to_vec());
        Ok(())
    })])?;

    let content = captured.lock().take();
    content.ok_or_else(|| {
        NutError::illegal_state(format!("nut '{}' produced no content", nut.name()))
    })
}

/// Transform `nut` and its references into frozen in-memory nuts
///
/// The copy keeps the name, type, resolved version, provenance, compression
/// flag and proxy URI of `nut`.
///
/// # Errors
/// Any transformation failure of `nut` or of a referenced nut.
pub fn to_byte_array_nut(nut: &NutRef) -> NutResult<NutRef> {
    let bytes = transform_to_bytes(nut.as_ref())?;

    let mut builder = PipedNut::builder(nut.name(), nut.nut_type())
        .version(VersionNumber::fixed(nut.resolved_version_number()))
        .dynamic(nut.is_dynamic());
    if let Some(uri) = nut.proxy_uri() {
        builder = builder.proxy_uri(uri);
    }
    if let Some(parent) = nut.parent_file() {
        builder = builder.parent_file(parent);
    }

    let source = nut.source();
    if source.is_empty() {
        builder = builder.original(Arc::clone(nut));
    } else {
        for original in source.original_nuts() {
            builder = builder.original(Arc::clone(original));
        }
    }

    let copy = builder.build(BytesContent::new(&bytes))?;
    copy.set_is_compressed(nut.is_compressed());
    copy.set_is_sub_resource(nut.is_sub_resource());
    for referenced in nut.referenced_nuts() {
        copy.add_referenced_nut(to_byte_array_nut(&referenced)?)?;
    }

    Ok(freeze(Arc::new(copy)))
}
