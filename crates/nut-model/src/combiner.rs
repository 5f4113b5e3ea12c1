//! Grouping of consecutive nuts sharing a name

use crate::composite::CompositeNut;
use crate::error::NutResult;
use crate::nut::NutRef;
use std::collections::HashSet;
use std::sync::Arc;

/// Merges runs of consecutive same-named nuts into composites
///
/// Only adjacent nuts are grouped: `a, b, a` stays three entries. A group
/// whose name was already produced gets the group index inserted before its
/// file name so every output name is unique.
#[derive(Debug, Default)]
pub struct Combiner {
    prefix_count: usize,
    names: HashSet<String>,
}

impl Combiner {
    /// Create a combiner with no name recorded
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Group `nuts`, keeping their order
    ///
    /// # Errors
    /// Propagates composite construction failures.
    pub fn merge_nuts(&mut self, nuts: &[NutRef]) -> NutResult<Vec<NutRef>> {
        let mut merged = Vec::with_capacity(nuts.len());
        let mut start = 0;

        while start < nuts.len() {
            let name = nuts[start].name();
            let end = nuts[start..]
                .iter()
                .position(|nut| nut.name() != name)
                .map_or(nuts.len(), |offset| start + offset);

            let group = &nuts[start..end];
            let fresh = self.names.insert(name.clone());
            let group_name = if fresh {
                name
            } else {
                let at = name.rfind('/').map_or(0, |slash| slash + 1);
                format!("{}{}{}", &name[..at], self.prefix_count, &name[at..])
            };

            match group {
                [single] if fresh => merged.push(Arc::clone(single)),
                _ => {
                    let composite: NutRef = CompositeNut::new(group_name, None, group)?;
                    merged.push(composite);
                }
            }

            if end < nuts.len() {
                self.prefix_count += 1;
            }
            start = end;
        }

        Ok(merged)
    }
}

/// Group `nuts` with a fresh [`Combiner`]
///
/// # Errors
/// Propagates composite construction failures.
pub fn merge_nuts(nuts: &[NutRef]) -> NutResult<Vec<NutRef>> {
    Combiner::new().merge_nuts(nuts)
}
