//! Pre-resolved workflows
//!
//! A build step can list the nuts a workflow produces in a text resource named
//! after [`STATIC_WORKFLOW_FILE`]. Each line holds `version/name "extension"`
//! (quotes optional); a line indented with one more tab than the previous
//! entry is a nut referenced by that entry. Absolute `http(s)://` names keep
//! a version of `0`.
//!
//! [`StaticEngine`] serves such workflows as [`NotReachableNut`]s: names,
//! types and versions are known, content is not.

use crate::engine::{Chain, Engine, EngineRequest, EngineType};
use crate::error::{EngineError, EngineResult};
use dashmap::DashMap;
use nut_model::{ConvertibleNut, NotReachableNut, NutRef, NutType};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::fmt::Debug;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Resource name of a static workflow, `{}` being the workflow id
pub const STATIC_WORKFLOW_FILE: &str = "wuic-static/{}";

static KEY_VALUE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r#"^(\t*)(.+?)\s+"?([^"\s]+)"?\s*$"#));

/// Resource name holding the static workflow `workflow_id`
#[must_use]
pub fn static_workflow_resource(workflow_id: &str) -> String {
    STATIC_WORKFLOW_FILE.replace("{}", workflow_id)
}

/// Source of static workflow files
pub trait StaticResources: Send + Sync + Debug {
    /// Content of the resource `name`, `None` when it does not exist
    ///
    /// # Errors
    /// Read failures other than absence.
    fn read(&self, name: &str) -> EngineResult<Option<String>>;
}

/// Static workflow files stored under a directory
#[derive(Debug, Clone)]
pub struct DirectoryResources {
    root: PathBuf,
}

impl DirectoryResources {
    /// Read resources below `root`
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl StaticResources for DirectoryResources {
    fn read(&self, name: &str) -> EngineResult<Option<String>> {
        match fs::read_to_string(self.root.join(name)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl StaticResources for HashMap<String, String> {
    fn read(&self, name: &str) -> EngineResult<Option<String>> {
        Ok(self.get(name).cloned())
    }
}

/// Parse the static workflow file `content` of `workflow_id`
///
/// # Errors
/// [`EngineError::StaticWorkflow`] for a malformed line, an unknown
/// extension, a non-numeric version or an indentation without parent.
pub fn parse_static_workflow(workflow_id: &str, content: &str) -> EngineResult<Vec<NutRef>> {
    let key_value = KEY_VALUE
        .as_ref()
        .map_err(|e| EngineError::Config(format!("static workflow pattern: {e}")))?;
    let mut roots = Vec::new();
    let mut per_depth: Vec<NutRef> = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let number = index + 1;
        if line.trim().is_empty() {
            continue;
        }
        let error = |message: String| EngineError::static_workflow(workflow_id, number, message);

        let captures = key_value
            .captures(line)
            .ok_or_else(|| error(format!("expected 'key \"value\"', got '{line}'")))?;
        let depth = captures[1].len();
        let path = &captures[2];
        let extension = &captures[3];

        let nut_type = NutType::from_extension(extension)
            .ok_or_else(|| error(format!("unknown extension '{extension}'")))?;
        let (name, version) = if path.starts_with("http://") || path.starts_with("https://") {
            (path, 0)
        } else {
            let (version, name) = path
                .split_once('/')
                .ok_or_else(|| error(format!("expected 'version/name', got '{path}'")))?;
            let version = version
                .parse::<i64>()
                .map_err(|_| error(format!("version '{version}' is not a number")))?;
            (name, version)
        };

        let nut: NutRef = Arc::new(NotReachableNut::new(name, nut_type, workflow_id, version));
        if depth == 0 {
            roots.push(Arc::clone(&nut));
        } else {
            let parent = per_depth
                .get(depth - 1)
                .ok_or_else(|| error(format!("no parent at depth {}", depth - 1)))?;
            parent.add_referenced_nut(Arc::clone(&nut))?;
        }
        per_depth.truncate(depth);
        per_depth.push(nut);
    }

    debug!(workflow = %workflow_id, nuts = roots.len(), "static workflow parsed");
    Ok(roots)
}

/// Head engine serving workflows from static workflow files
#[derive(Debug)]
pub struct StaticEngine {
    resources: Arc<dyn StaticResources>,
    workflows: DashMap<String, Vec<NutRef>>,
}

impl StaticEngine {
    /// Engine reading workflow files from `resources`
    #[must_use]
    pub fn new(resources: Arc<dyn StaticResources>) -> Self {
        Self {
            resources,
            workflows: DashMap::new(),
        }
    }

    /// Nuts of `workflow_id`, parsed once then kept
    ///
    /// # Errors
    /// [`EngineError::NotFound`] when no file exists for the workflow, or any
    /// parse failure.
    pub fn nuts(&self, workflow_id: &str) -> EngineResult<Vec<NutRef>> {
        if let Some(nuts) = self.workflows.get(workflow_id) {
            return Ok(nuts.clone());
        }

        let resource = static_workflow_resource(workflow_id);
        let content = self
            .resources
            .read(&resource)?
            .ok_or_else(|| EngineError::not_found("static workflow", workflow_id))?;
        let nuts = parse_static_workflow(workflow_id, &content)?;
        info!(workflow = %workflow_id, resource = %resource, "static workflow loaded");
        self.workflows.insert(workflow_id.to_string(), nuts.clone());
        Ok(nuts)
    }
}

impl Engine for StaticEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Cache
    }

    fn parse(&self, request: &EngineRequest, _next: Chain<'_>) -> EngineResult<Vec<NutRef>> {
        self.nuts(request.workflow_id())
    }
}
