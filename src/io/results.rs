//! Batch results returned by save and load.
//!
//! Both results record how many images went through, how long it took,
//! and one [`ItemIssue`] per image that could not be processed. A failing
//! image never aborts the batch, so callers inspect these to build the
//! report shown to the user.

use serde::Serialize;
use std::fmt;
use std::time::Duration;

use crate::model::ImageAnnotationData;

/// What went wrong with a single item.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// The file could not be read or written.
    Io,
    /// The content was malformed or not representable in the format.
    Format,
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::Io => write!(f, "I/O"),
            IssueKind::Format => write!(f, "format"),
        }
    }
}

/// A failed or degraded item in a batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ItemIssue {
    /// Image file name or artifact path identifying the item.
    pub item: String,
    pub kind: IssueKind,
    pub message: String,
}

impl ItemIssue {
    pub fn io(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            kind: IssueKind::Io,
            message: message.into(),
        }
    }

    pub fn format(item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            item: item.into(),
            kind: IssueKind::Format,
            message: message.into(),
        }
    }
}

impl fmt::Display for ItemIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} error): {}", self.item, self.kind, self.message)
    }
}

/// Outcome of a save.
#[derive(Clone, Debug, Default, Serialize)]
pub struct ExportResult {
    /// Images written successfully.
    pub processed_items: usize,
    /// Images the batch attempted, successful or not.
    pub total_items: usize,
    #[serde(serialize_with = "serialize_duration_ms")]
    pub elapsed: Duration,
    pub errors: Vec<ItemIssue>,
    /// Oddities in the destination that did not stop the save.
    pub warnings: Vec<ItemIssue>,
    /// The batch stopped early at an image boundary.
    pub cancelled: bool,
}

impl ExportResult {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.errors.is_empty()
    }
}

impl fmt::Display for ExportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  saved {} of {} image(s) in {:.2?}",
            self.processed_items, self.total_items, self.elapsed
        )?;
        write_tail(f, self.cancelled, &self.errors, &self.warnings)
    }
}

/// Outcome of a load, carrying the reconstructed project.
#[derive(Clone, Debug, Default)]
pub struct ImportResult {
    /// Images read successfully.
    pub processed_items: usize,
    pub total_items: usize,
    pub elapsed: Duration,
    pub errors: Vec<ItemIssue>,
    /// Recoverable oddities in items that were still loaded.
    pub warnings: Vec<ItemIssue>,
    pub cancelled: bool,
    pub data: ImageAnnotationData,
}

impl ImportResult {
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.errors.is_empty()
    }
}

impl fmt::Display for ImportResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "  loaded {} of {} image(s) in {:.2?}: {} categories, {} shapes",
            self.processed_items,
            self.total_items,
            self.elapsed,
            self.data.categories().len(),
            self.data.shape_count()
        )?;
        write_tail(f, self.cancelled, &self.errors, &self.warnings)
    }
}

fn write_tail(
    f: &mut fmt::Formatter<'_>,
    cancelled: bool,
    errors: &[ItemIssue],
    warnings: &[ItemIssue],
) -> fmt::Result {
    if cancelled {
        writeln!(f, "  cancelled before all images were processed")?;
    }
    if !errors.is_empty() {
        writeln!(f)?;
        writeln!(f, "Errors ({}):", errors.len())?;
        for issue in errors {
            writeln!(f, "  - {issue}")?;
        }
    }
    if !warnings.is_empty() {
        writeln!(f)?;
        writeln!(f, "Warnings ({}):", warnings.len())?;
        for issue in warnings {
            writeln!(f, "  - {issue}")?;
        }
    }
    Ok(())
}

fn serialize_duration_ms<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u128(duration.as_millis())
}
