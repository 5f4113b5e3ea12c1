//! Nuts resolved ahead of time whose content cannot be read
//!
//! Static workflows list nut names and versions computed at build time. The
//! resulting [`NotReachableNut`]s can be named, versioned and linked, but any
//! attempt to access their content fails with [`NutError::NotFound`].

use crate::error::{NutError, NutResult};
use crate::nut::{ConvertibleNut, Nut, NutAttributes};
use crate::nut_type::NutType;
use crate::version::VersionNumber;
use nut_pipe::{Input, OnReady, TransformationStat};

/// Placeholder for content only known by name
#[derive(Debug)]
pub struct NotReachableNut {
    name: String,
    nut_type: NutType,
    workflow_id: String,
    version: VersionNumber,
    attributes: NutAttributes,
}

impl NotReachableNut {
    /// Create a placeholder for `name` in `workflow_id`
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        nut_type: NutType,
        workflow_id: impl Into<String>,
        version: i64,
    ) -> Self {
        let name = name.into();
        Self {
            attributes: NutAttributes::new(name.clone(), nut_type),
            name,
            nut_type,
            workflow_id: workflow_id.into(),
            version: VersionNumber::fixed(version),
        }
    }

    /// Workflow the nut was listed in
    #[inline]
    #[must_use]
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    fn unreachable(&self) -> NutError {
        NutError::not_found_in(self.name.clone(), self.workflow_id.clone())
    }
}

impl Nut for NotReachableNut {
    fn initial_name(&self) -> &str {
        &self.name
    }

    fn initial_nut_type(&self) -> NutType {
        self.nut_type
    }

    fn version_number(&self) -> &VersionNumber {
        &self.version
    }

    fn open_stream(&self) -> NutResult<Input> {
        Err(self.unreachable())
    }
}

impl ConvertibleNut for NotReachableNut {
    fn attributes(&self) -> &NutAttributes {
        &self.attributes
    }

    fn transform(&self, _on_ready: &[OnReady]) -> NutResult<Vec<TransformationStat>> {
        Err(self.unreachable())
    }

    fn is_transformed(&self) -> bool {
        false
    }
}
