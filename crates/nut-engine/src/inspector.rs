//! CSS reference inspection
//!
//! [`CssInspectorEngine`] reads every stylesheet of a request, resolves the
//! files named by `url(...)` and `@import` through the heap, and references
//! them from the stylesheet so they are served along with it. The content is
//! rewritten to point at the served URLs. Comments are left untouched;
//! absolute, root-relative and `data:` references are kept as written.

use crate::engine::{Chain, Engine, EngineRequest, EngineType};
use crate::error::{EngineError, EngineResult};
use crate::url::url_for;
use nut_heap::PathFormat;
use nut_model::path::{merge_path, simplify_path, source_root_for};
use nut_model::{ConvertibleNut, Nut, NutRef, NutType};
use nut_pipe::{Input, Output, PipeResult, Transformer};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::collections::{HashMap, HashSet};
use std::io::Write;
use std::sync::Arc;
use tracing::{debug, warn};

static CSS_REFERENCE: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(
        r#"(?s)(/\*.*?\*/)|url\(\s*("[^"]*"|'[^']*'|[^)\s]*)\s*\)|@import\s+("[^"]*"|'[^']*')"#,
    )
});

/// Path named by a raw reference: quotes removed, query or fragment cut
#[must_use]
pub fn reference_path(raw: &str) -> &str {
    let unquoted = raw
        .strip_prefix('"')
        .and_then(|r| r.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|r| r.strip_suffix('\'')))
        .unwrap_or(raw)
        .trim();
    match unquoted.rfind('?').or_else(|| unquoted.rfind('#')) {
        Some(cut) => &unquoted[..cut],
        None => unquoted,
    }
}

/// Whether `path` names a file the heap may resolve
fn is_processable(path: &str) -> bool {
    !(path.is_empty()
        || path.starts_with('/')
        || path.starts_with("data:")
        || path.contains("://"))
}

/// Finds and rewrites the references of a stylesheet
#[derive(Debug, Clone, Copy)]
pub struct CssUrlLineInspector {
    pattern: &'static Regex,
}

impl CssUrlLineInspector {
    /// Create the inspector
    ///
    /// # Errors
    /// [`EngineError::Config`] when the reference pattern does not compile.
    pub fn new() -> EngineResult<Self> {
        let pattern = CSS_REFERENCE
            .as_ref()
            .map_err(|e| EngineError::Config(format!("css reference pattern: {e}")))?;
        Ok(Self { pattern })
    }

    /// Paths referenced by `content` the heap may resolve, in order, without duplicates
    #[must_use]
    pub fn references(&self, content: &str) -> Vec<String> {
        let mut paths: Vec<String> = Vec::new();
        for captures in self.pattern.captures_iter(content) {
            let Some(raw) = captures.get(2).or_else(|| captures.get(3)) else {
                continue;
            };
            let path = reference_path(raw.as_str());
            if is_processable(path) && !paths.iter().any(|p| p == path) {
                paths.push(path.to_string());
            }
        }
        paths
    }

    /// `content` where each reference for which `replacement` gives a URL is
    /// replaced by that URL, quoted
    #[must_use]
    pub fn rewrite(&self, content: &str, replacement: impl Fn(&str) -> Option<String>) -> String {
        self.pattern
            .replace_all(content, |captures: &Captures<'_>| {
                let whole = &captures[0];
                let Some(raw) = captures.get(2).or_else(|| captures.get(3)) else {
                    return whole.to_string();
                };
                let Some(url) = replacement(reference_path(raw.as_str())) else {
                    return whole.to_string();
                };
                let start = captures.get(0).map_or(0, |m| m.start());
                format!(
                    "{}\"{url}\"{}",
                    &whole[..raw.start() - start],
                    &whole[raw.end() - start..]
                )
            })
            .into_owned()
    }
}

/// Rewrites the references of one stylesheet to their served URLs
#[derive(Debug)]
struct CssUrlRewriter {
    inspector: CssUrlLineInspector,
    urls: HashMap<String, String>,
}

impl Transformer<dyn ConvertibleNut> for CssUrlRewriter {
    fn transform(
        &self,
        input: &mut Input,
        output: &mut Output,
        _nut: &dyn ConvertibleNut,
    ) -> PipeResult<bool> {
        let content = input.read_to_string()?;
        let rewritten = self.inspector.rewrite(&content, |path| self.urls.get(path).cloned());
        output.write_all(rewritten.as_bytes())?;
        Ok(true)
    }

    fn order(&self) -> i32 {
        EngineType::Inspector.order()
    }

    fn name(&self) -> &str {
        "css-url-rewriter"
    }
}

/// Inspector referencing the files used by stylesheets
#[derive(Debug, Clone, Copy)]
pub struct CssInspectorEngine {
    inspect: bool,
}

impl CssInspectorEngine {
    /// Create the engine, inactive when `inspect` is false
    #[inline]
    #[must_use]
    pub fn new(inspect: bool) -> Self {
        Self { inspect }
    }

    /// Whether stylesheets are inspected
    #[inline]
    #[must_use]
    pub fn inspects(&self) -> bool {
        self.inspect
    }

    /// Reference the files used by `nut`, recursing into stylesheets
    ///
    /// Paths are resolved from `nut`, then expressed relative to `anchor`,
    /// the request nut the heap knows.
    fn inspect(
        &self,
        inspector: CssUrlLineInspector,
        request: &EngineRequest,
        anchor: &NutRef,
        nut: &NutRef,
        visited: &mut HashSet<String>,
    ) -> EngineResult<()> {
        let content = nut.open_stream()?.read_to_string()?;
        let name = nut.initial_name();
        let directory = name.rfind('/').map_or("", |i| &name[..i]);
        let mut urls = HashMap::new();

        for path in inspector.references(&content) {
            let Some(resolved) = simplify_path(&merge_path(&[directory, &path])) else {
                warn!(nut = %name, reference = %path, "reference climbs above the root, kept as is");
                continue;
            };
            let relative = format!("{}{resolved}", source_root_for(anchor.initial_name()));
            let Some(referenced) = request
                .heap()
                .create(anchor, &relative, PathFormat::RelativeFile)?
                .into_iter()
                .next()
            else {
                debug!(nut = %name, reference = %path, "referenced file not found, kept as is");
                continue;
            };

            referenced.set_is_sub_resource(true);
            if referenced.nut_type() == NutType::Css && visited.insert(referenced.name()) {
                self.inspect(inspector, request, anchor, &referenced, visited)?;
            }
            let url = referenced.proxy_uri().unwrap_or_else(|| {
                url_for(
                    request.workflow_id(),
                    referenced.version_number().get(),
                    &referenced.name(),
                )
            });
            urls.insert(path, url);
            nut.add_referenced_nut(referenced)?;
        }

        if !urls.is_empty() {
            debug!(nut = %name, references = urls.len(), "css references resolved");
            nut.add_transformer(Arc::new(CssUrlRewriter { inspector, urls }))?;
        }
        Ok(())
    }
}

impl Default for CssInspectorEngine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine for CssInspectorEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Inspector
    }

    fn works(&self) -> bool {
        self.inspect
    }

    fn handles(&self, nut_type: NutType) -> bool {
        nut_type == NutType::Css
    }

    fn parse(&self, request: &EngineRequest, next: Chain<'_>) -> EngineResult<Vec<NutRef>> {
        let inspector = CssUrlLineInspector::new()?;
        for nut in request.nuts() {
            let mut visited = HashSet::from([nut.name()]);
            self.inspect(inspector, request, nut, nut, &mut visited)?;
        }
        next.run(request)
    }
}
