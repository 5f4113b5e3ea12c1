//! Served URL scheme
//!
//! Nuts are served at `{workflowId}/{versionNumber}/{nutName}` where the
//! version number is optional. A purely numeric workflow id or first segment
//! of the nut name would be ambiguous with the version slot, so such URLs do
//! not match.

use nut_model::path::is_number;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use std::borrow::Cow;
use tracing::debug;

/// Expected shape of a served URL
pub const URL_PATTERN_MESSAGE: &str =
    "expected URL pattern: {workflowId}/{versionNumber}/{nutName}, version number being optional";

/// Characters escaped in one path segment
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/');

/// Parts of a served URL
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlMatcher {
    matches: bool,
    workflow_id: Option<String>,
    version_number: Option<String>,
    name: Option<String>,
}

impl UrlMatcher {
    /// Split `uri`, relative to the serving root
    #[must_use]
    pub fn parse(uri: &str) -> Self {
        let uri = uri.trim_start_matches('/').trim_end_matches('/');
        let Some((workflow_id, rest)) = uri.split_once('/') else {
            return Self::default();
        };
        if is_number(workflow_id) {
            return Self::default();
        }

        let (version_number, name) = match rest.split_once('/') {
            Some((version, name)) if is_number(version) => (Some(version), name),
            _ => (None, rest),
        };
        if name.is_empty() || is_number(name) {
            return Self::default();
        }
        if let Some((first, _)) = name.split_once('/') {
            if is_number(first) {
                return Self::default();
            }
        }

        match (decode(workflow_id), version_number.map(|v| decode(v).ok_or(())).transpose().ok(), decode(name)) {
            (Some(workflow_id), Some(version_number), Some(name)) => Self {
                matches: true,
                workflow_id: Some(workflow_id.into_owned()),
                version_number: version_number.map(Cow::into_owned),
                name: Some(name.into_owned()),
            },
            _ => {
                debug!(uri = %uri, "URL is not valid UTF-8 once decoded");
                Self::default()
            }
        }
    }

    /// Whether the URL follows the served scheme
    #[inline]
    #[must_use]
    pub fn matches(&self) -> bool {
        self.matches
    }

    /// Decoded workflow id
    #[must_use]
    pub fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    /// Decoded version number, `None` when the URL omits it
    #[must_use]
    pub fn version_number(&self) -> Option<&str> {
        self.version_number.as_deref()
    }

    /// Decoded nut name
    #[must_use]
    pub fn nut_name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

fn decode(value: &str) -> Option<Cow<'_, str>> {
    percent_decode_str(value).decode_utf8().ok()
}

/// URL serving `name` at `version` in `workflow_id`
#[must_use]
pub fn url_for(workflow_id: &str, version: i64, name: &str) -> String {
    let name: Vec<String> = name
        .trim_start_matches('/')
        .split('/')
        .map(|segment| utf8_percent_encode(segment, SEGMENT).to_string())
        .collect();
    format!(
        "/{}/{version}/{}",
        utf8_percent_encode(workflow_id, SEGMENT),
        name.join("/")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn versioned_url() {
        let matcher = UrlMatcher::parse("myworkflow/12345/dir/file.js");
        assert!(matcher.matches());
        assert_eq!(matcher.workflow_id(), Some("myworkflow"));
        assert_eq!(matcher.version_number(), Some("12345"));
        assert_eq!(matcher.nut_name(), Some("dir/file.js"));
    }

    #[test]
    fn url_without_version() {
        let matcher = UrlMatcher::parse("myworkflow/dir/file.js");
        assert!(matcher.matches());
        assert_eq!(matcher.version_number(), None);
        assert_eq!(matcher.nut_name(), Some("dir/file.js"));
    }

    #[test]
    fn numeric_workflow_does_not_match() {
        assert!(!UrlMatcher::parse("123/file.js").matches());
    }

    #[test]
    fn ambiguous_or_incomplete_urls_do_not_match() {
        assert!(!UrlMatcher::parse("workflow").matches());
        assert!(!UrlMatcher::parse("workflow/").matches());
        assert!(!UrlMatcher::parse("workflow/123").matches());
        assert!(!UrlMatcher::parse("workflow/123/").matches());
        assert!(!UrlMatcher::parse("workflow/123/456/file.js").matches());
        assert!(UrlMatcher::parse("/workflow/123/file.js/").matches());
    }

    #[test]
    fn parts_are_percent_decoded() {
        let matcher = UrlMatcher::parse("my%20workflow/1/css/a%20b.css");
        assert_eq!(matcher.workflow_id(), Some("my workflow"));
        assert_eq!(matcher.nut_name(), Some("css/a b.css"));
        assert!(!UrlMatcher::parse("wf/1/%FF.js").matches());
    }

    #[test]
    fn rendered_urls_match() {
        let url = url_for("my workflow", 42, "css/a b.css");
        assert_eq!(url, "/my%20workflow/42/css/a%20b.css");
        let matcher = UrlMatcher::parse(&url);
        assert_eq!(matcher.workflow_id(), Some("my workflow"));
        assert_eq!(matcher.version_number(), Some("42"));
        assert_eq!(matcher.nut_name(), Some("css/a b.css"));
    }

    proptest! {
        #[test]
        fn numeric_workflow_ids_never_match(id in any::<u32>(), name in "[a-z]{1,8}\\.js") {
            let uri = format!("{id}/{name}");
            prop_assert!(!UrlMatcher::parse(&uri).matches());
        }

        #[test]
        fn version_is_extracted(version in any::<u32>(), name in "[a-z]{1,8}/[a-z]{1,8}\\.css") {
            let matcher = UrlMatcher::parse(&format!("wf/{version}/{name}"));
            prop_assert!(matcher.matches());
            let expected = version.to_string();
            prop_assert_eq!(matcher.version_number(), Some(expected.as_str()));
            prop_assert_eq!(matcher.nut_name(), Some(name.as_str()));
        }
    }
}
