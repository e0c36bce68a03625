use std::path::PathBuf;
use thiserror::Error;

use crate::model::CategoryId;
use crate::validation::ValidationReport;

/// The main error type for bbox-editor operations.
///
/// Save and load only return these for failures that stop a batch before
/// it starts (configuration failures). Problems with a single image are
/// collected as [`ItemIssue`](crate::io::ItemIssue)s in the batch result.
#[derive(Debug, Error)]
pub enum EditorError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid destination {path}: {message}")]
    DestinationInvalid { path: PathBuf, message: String },

    #[error("Invalid source {path}: {message}")]
    SourceInvalid { path: PathBuf, message: String },

    #[error("Failed to parse VOC XML {path}: {message}")]
    VocXmlParse { path: PathBuf, message: String },

    #[error("Failed to write VOC XML {path}: {message}")]
    VocWrite { path: PathBuf, message: String },

    #[error("Failed to parse project file {path}: {source}")]
    SimpleParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to write project file {path}: {source}")]
    SimpleWrite {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid project file {path}: {message}")]
    SimpleFormat { path: PathBuf, message: String },

    #[error("Project file {path} has version {found}; this build reads up to version {supported}")]
    SimpleVersion {
        path: PathBuf,
        found: u32,
        supported: u32,
    },

    #[error("Failed to parse category registry {path}: {source}")]
    CategoryRegistryParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Unknown category {id}")]
    UnknownCategory { id: CategoryId },

    #[error("Category name '{name}' is already in use")]
    DuplicateCategory { name: String },

    #[error("Category id {id} is already in use")]
    DuplicateCategoryId { id: CategoryId },

    #[error("No category id is left to assign")]
    CategoryIdExhausted,

    #[error("Category name must not be empty")]
    EmptyCategoryName,

    #[error("Category '{name}' is still used by {count} shape(s)")]
    CategoryInUse { name: String, count: usize },

    #[error("Unknown image '{file_name}'")]
    UnknownImage { file_name: String },

    #[error("Shape index {index} out of range for image '{file_name}' with {len} shape(s)")]
    ShapeIndexOutOfRange {
        file_name: String,
        index: usize,
        len: usize,
    },

    #[error("Validation failed with {error_count} error(s) and {warning_count} warning(s)")]
    ValidationFailed {
        error_count: usize,
        warning_count: usize,
        report: ValidationReport,
    },

    #[error("{failed} of {total} item(s) failed")]
    BatchFailed { failed: usize, total: usize },
}
