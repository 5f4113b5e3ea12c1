//! Source maps for aggregated nuts
//!
//! [`SourceMap::for_composite`] reads a [`CompositeInput`] to the end and maps
//! every generated line back to the constituent owning it. Mappings use the
//! v3 Base64 VLQ encoding with one segment per generated line.

use crate::composite::{CompositeInput, CompositeNut};
use crate::error::NutResult;
use crate::nut::{same_nut, ConvertibleNut};
use crate::path::source_root_for;
use serde::{Deserialize, Serialize};
use std::io::Read;

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const VLQ_SHIFT: u32 = 5;
const VLQ_MASK: u64 = 0b1_1111;
const VLQ_CONTINUATION: u64 = 0b10_0000;

/// Source map v3 document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMap {
    /// Format version, always 3
    pub version: u8,
    /// Generated file name
    pub file: String,
    /// Prefix prepended to every source
    #[serde(default)]
    pub source_root: String,
    /// Original file names
    pub sources: Vec<String>,
    /// Symbol names
    #[serde(default)]
    pub names: Vec<String>,
    /// Encoded mappings
    pub mappings: String,
}

/// Decoded mapping of one generated line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineMapping {
    /// Index into [`SourceMap::sources`]
    pub source: usize,
    /// Line in the original source
    pub line: usize,
}

impl SourceMap {
    /// Read `input`, a stream opened on `composite`, and map its lines
    ///
    /// Returns the map together with the content read. Lines whose first byte
    /// belongs to no constituent get no segment.
    ///
    /// # Errors
    /// Failure to read a constituent.
    pub fn for_composite(composite: &CompositeNut, mut input: CompositeInput) -> NutResult<(Self, Vec<u8>)> {
        let mut content = Vec::new();
        input.read_to_end(&mut content)?;

        let constituents = composite.composition_list();
        let mut sources: Vec<String> = Vec::new();
        let mut source_of = Vec::with_capacity(constituents.len());
        for nut in constituents {
            let name = nut.name();
            let index = match sources.iter().position(|s| *s == name) {
                Some(index) => index,
                None => {
                    sources.push(name);
                    sources.len() - 1
                }
            };
            source_of.push(index);
        }

        let mut lines = Vec::new();
        let mut start = 0u64;
        for (generated, line) in content.split(|b| *b == b'\n').enumerate() {
            let mapping = input.nut_at(start).and_then(|owner| {
                let slot = constituents.iter().position(|n| same_nut(n, &owner))?;
                let first_line = input.start_position(&owner)?.line();
                Some(LineMapping {
                    source: source_of[slot],
                    line: generated.saturating_sub(first_line),
                })
            });
            lines.push(mapping);
            start += line.len() as u64 + 1;
        }

        let name = composite.name();
        let map = Self {
            version: 3,
            source_root: source_root_for(&name),
            file: name,
            sources,
            names: Vec::new(),
            mappings: encode_mappings(&lines),
        };
        Ok((map, content))
    }

    /// Decode the mappings, one entry per generated line
    #[must_use]
    pub fn lines(&self) -> Vec<Option<LineMapping>> {
        let mut source = 0i64;
        let mut line = 0i64;
        self.mappings
            .split(';')
            .map(|group| {
                let segment = group.split(',').next().filter(|s| !s.is_empty())?;
                let fields = decode_vlq(segment)?;
                if fields.len() < 4 {
                    return None;
                }
                source += fields[1];
                line += fields[2];
                Some(LineMapping {
                    source: usize::try_from(source).ok()?,
                    line: usize::try_from(line).ok()?,
                })
            })
            .collect()
    }

    /// Serialize to JSON
    ///
    /// # Errors
    /// [`crate::NutError::Json`] on serialization failure.
    pub fn to_json(&self) -> NutResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse a JSON source map
    ///
    /// # Errors
    /// [`crate::NutError::Json`] for malformed documents.
    pub fn from_json(json: &str) -> NutResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn encode_mappings(lines: &[Option<LineMapping>]) -> String {
    let mut mappings = String::new();
    let mut previous_source = 0i64;
    let mut previous_line = 0i64;

    for (i, mapping) in lines.iter().enumerate() {
        if i > 0 {
            mappings.push(';');
        }
        if let Some(mapping) = mapping {
            let source = i64::try_from(mapping.source).unwrap_or(i64::MAX);
            let line = i64::try_from(mapping.line).unwrap_or(i64::MAX);
            encode_vlq(0, &mut mappings);
            encode_vlq(source - previous_source, &mut mappings);
            encode_vlq(line - previous_line, &mut mappings);
            encode_vlq(0, &mut mappings);
            previous_source = source;
            previous_line = line;
        }
    }
    mappings
}

/// Append the Base64 VLQ encoding of `value`
pub fn encode_vlq(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        (value.unsigned_abs() << 1) | 1
    } else {
        value.unsigned_abs() << 1
    };

    loop {
        let mut digit = vlq & VLQ_MASK;
        vlq >>= VLQ_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION;
        }
        out.push(char::from(BASE64[digit as usize]));
        if vlq == 0 {
            break;
        }
    }
}

/// Decode a Base64 VLQ segment into its fields
///
/// Returns `None` for characters outside the Base64 alphabet or a truncated value.
#[must_use]
pub fn decode_vlq(segment: &str) -> Option<Vec<i64>> {
    let mut values = Vec::new();
    let mut value = 0u64;
    let mut shift = 0u32;

    for byte in segment.bytes() {
        let digit = BASE64.iter().position(|b| *b == byte)? as u64;
        value |= (digit & VLQ_MASK).checked_shl(shift)?;
        if digit & VLQ_CONTINUATION == 0 {
            let magnitude = i64::try_from(value >> 1).ok()?;
            values.push(if value & 1 == 1 { -magnitude } else { magnitude });
            value = 0;
            shift = 0;
        } else {
            shift += VLQ_SHIFT;
        }
    }

    (shift == 0).then_some(values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nut::NutRef;
    use crate::nut_type::NutType;
    use crate::piped::PipedNut;
    use crate::version::VersionNumber;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn js(name: &str, content: &str) -> NutRef {
        Arc::new(PipedNut::from_bytes(content.as_bytes(), name, NutType::Javascript, VersionNumber::fixed(1)).unwrap())
    }

    #[test]
    fn vlq_known_values() {
        let mut out = String::new();
        for value in [0, 1, -1, 16, 123] {
            encode_vlq(value, &mut out);
        }
        assert_eq!(out, "ACDgB2H");
        assert_eq!(decode_vlq("ACDgB2H"), Some(vec![0, 1, -1, 16, 123]));
        assert_eq!(decode_vlq("g"), None);
        assert_eq!(decode_vlq("!"), None);
    }

    #[test]
    fn composite_lines_map_to_constituents() {
        let composite = CompositeNut::new(
            "js/all.js",
            Some(b"\n"),
            &[js("a.js", "a1\na2"), js("b.js", "b1")],
        )
        .unwrap();
        let (map, content) = SourceMap::for_composite(&composite, composite.open_composite()).unwrap();
        assert_eq!(content, b"a1\na2\nb1\n");

        assert_eq!(map.file, "js/all.js");
        assert_eq!(map.source_root, "../");
        assert_eq!(map.sources, vec!["a.js", "b.js"]);
        assert_eq!(map.mappings, "AAAA;AACA;ACDA;");
        assert_eq!(
            map.lines(),
            vec![
                Some(LineMapping { source: 0, line: 0 }),
                Some(LineMapping { source: 0, line: 1 }),
                Some(LineMapping { source: 1, line: 0 }),
                None,
            ]
        );
    }

    #[test]
    fn maps_stay_correct_while_another_stream_is_read() {
        let composite = CompositeNut::new("js/all.js", Some(b"\n"), &[js("a.js", "a"), js("b.js", "b")]).unwrap();
        let pending = composite.open_composite();

        let mut other = composite.open_composite();
        let mut sink = Vec::new();
        other.read_to_end(&mut sink).unwrap();

        let (map, _) = SourceMap::for_composite(&composite, pending).unwrap();
        assert_eq!(
            map.lines(),
            vec![
                Some(LineMapping { source: 0, line: 0 }),
                Some(LineMapping { source: 1, line: 0 }),
                None,
            ]
        );
    }

    #[test]
    fn json_uses_v3_field_names() {
        let composite = CompositeNut::new("all.js", None, &[js("a.js", "a")]).unwrap();
        let (map, _) = SourceMap::for_composite(&composite, composite.open_composite()).unwrap();

        let json = map.to_json().unwrap();
        assert!(json.contains("\"sourceRoot\":\"\""));
        assert!(json.contains("\"version\":3"));
        assert_eq!(SourceMap::from_json(&json).unwrap(), map);
        assert!(SourceMap::from_json("{").is_err());
        assert_eq!(composite.name(), map.file);
    }
}
