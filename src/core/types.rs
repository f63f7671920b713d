//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`ProjectId`] - Validated project identifier (one mirror per project)
//! - [`DatasetId`] - Validated dataset identifier (one directory per dataset)
//!
//! # Validation
//!
//! Both identifiers end up as single path components: the mirror root is
//! `<workspace_root>/<project_id>` and a dataset lives at
//! `datasets/<dataset_id>`. Validation rejects anything that could escape
//! that component.
//!
//! # Examples
//!
//! ```
//! use datagest::core::types::{DatasetId, ProjectId};
//!
//! let project = ProjectId::new("vision").unwrap();
//! let dataset = DatasetId::new("camera_1").unwrap();
//! assert_eq!(project.as_str(), "vision");
//! assert_eq!(dataset.to_string(), "camera_1");
//!
//! assert!(DatasetId::new("../escape").is_err());
//! assert!(ProjectId::new("").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid project id: {0}")]
    InvalidProjectId(String),

    #[error("invalid dataset id: {0}")]
    InvalidDatasetId(String),
}

/// Check that `value` can be used as exactly one path component.
fn validate_component(value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err("cannot be empty".into());
    }
    if value != value.trim() {
        return Err("cannot start or end with whitespace".into());
    }
    if value == "." || value == ".." {
        return Err(format!("'{value}' is reserved"));
    }

    const INVALID_CHARS: [char; 9] = ['/', '\\', ':', '*', '?', '"', '<', '>', '|'];
    for c in INVALID_CHARS {
        if value.contains(c) {
            return Err(format!("cannot contain '{c}'"));
        }
    }
    if value.chars().any(|c| c.is_control()) {
        return Err("cannot contain control characters".into());
    }

    Ok(())
}

/// A validated project identifier.
///
/// The identifier names the project's mirror directory, so a workspace is
/// never shared between two projects.
///
/// # Example
///
/// ```
/// use datagest::core::types::ProjectId;
///
/// assert!(ProjectId::new("vision-2024").is_ok());
/// assert!(ProjectId::new("a/b").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProjectId(String);

impl ProjectId {
    /// Create a new validated project id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidProjectId` if the id is not a single path component.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_component(&id).map_err(TypeError::InvalidProjectId)?;
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ProjectId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<ProjectId> for String {
    fn from(id: ProjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for ProjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated dataset identifier.
///
/// # Example
///
/// ```
/// use datagest::core::types::DatasetId;
///
/// let id = DatasetId::new("camera_1").unwrap();
/// assert_eq!(id.as_str(), "camera_1");
/// assert!(DatasetId::new("..").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DatasetId(String);

impl DatasetId {
    /// Create a new validated dataset id.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidDatasetId` if the id is not a single path component.
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        validate_component(&id).map_err(TypeError::InvalidDatasetId)?;
        Ok(Self(id))
    }

    /// Get the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DatasetId {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<DatasetId> for String {
    fn from(id: DatasetId) -> Self {
        id.0
    }
}

impl AsRef<str> for DatasetId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
