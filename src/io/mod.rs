//! Save/load strategies.
//!
//! A [`StrategyFormat`] tag picks an [`AnnotationStrategy`] through
//! [`strategy_for`]. Strategies process images one at a time: a failing image
//! is recorded in the result and the batch moves on, while problems with the
//! destination or source as a whole are returned as [`EditorError`]s before
//! any image is touched.
//!
//! ```no_run
//! use std::path::Path;
//! use bbox_editor::io::{self, StrategyFormat, TaskControl};
//!
//! let loaded = io::load(StrategyFormat::Simple, Path::new("project.json"), &TaskControl::none())?;
//! let exported = io::save(StrategyFormat::PascalVoc, &loaded.data, Path::new("voc/"), &TaskControl::none())?;
//! println!("{exported}");
//! # Ok::<(), bbox_editor::error::EditorError>(())
//! ```

mod atomic;
mod categories;
pub mod pascal_voc;
mod progress;
mod results;
pub mod simple;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::EditorError;
use crate::model::ImageAnnotationData;

pub use categories::{read_category_registry, write_category_registry, CATEGORY_REGISTRY_FILE};
pub use pascal_voc::PascalVocStrategy;
pub use progress::{CancellationToken, TaskControl};
pub use results::{ExportResult, ImportResult, IssueKind, ItemIssue};
pub use simple::SimpleStrategy;

/// Persistence formats a project can be saved to and loaded from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StrategyFormat {
    /// One PASCAL VOC XML file per image.
    PascalVoc,
    /// Lossless single-file JSON project.
    Simple,
}

impl StrategyFormat {
    pub const ALL: [StrategyFormat; 2] = [StrategyFormat::PascalVoc, StrategyFormat::Simple];

    /// Canonical tag, as accepted by [`FromStr`].
    pub fn tag(&self) -> &'static str {
        match self {
            StrategyFormat::PascalVoc => "PASCAL_VOC",
            StrategyFormat::Simple => "SIMPLE",
        }
    }
}

impl fmt::Display for StrategyFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for StrategyFormat {
    type Err = EditorError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pascal-voc" | "voc" => Ok(StrategyFormat::PascalVoc),
            "simple" => Ok(StrategyFormat::Simple),
            _ => Err(EditorError::UnsupportedFormat(raw.to_string())),
        }
    }
}

/// A persistence format for whole projects.
///
/// Implementations return `Err` only when the batch cannot start; per-image
/// failures go into the returned result.
pub trait AnnotationStrategy: Send + Sync {
    fn format(&self) -> StrategyFormat;

    /// Writes every image of `data` to `destination`.
    fn save(
        &self,
        data: &ImageAnnotationData,
        destination: &Path,
        control: &TaskControl<'_>,
    ) -> Result<ExportResult, EditorError>;

    /// Reads a project back from `source`.
    fn load(&self, source: &Path, control: &TaskControl<'_>) -> Result<ImportResult, EditorError>;
}

/// Returns the strategy implementing `format`.
pub fn strategy_for(format: StrategyFormat) -> Box<dyn AnnotationStrategy> {
    match format {
        StrategyFormat::PascalVoc => Box::new(PascalVocStrategy),
        StrategyFormat::Simple => Box::new(SimpleStrategy),
    }
}

/// Resolves a format tag such as `PASCAL_VOC` or `simple`.
pub fn strategy_for_tag(tag: &str) -> Result<Box<dyn AnnotationStrategy>, EditorError> {
    Ok(strategy_for(tag.parse()?))
}

/// Saves `data` to `destination` in the given format.
pub fn save(
    format: StrategyFormat,
    data: &ImageAnnotationData,
    destination: &Path,
    control: &TaskControl<'_>,
) -> Result<ExportResult, EditorError> {
    strategy_for(format).save(data, destination, control)
}

/// Loads a project from `source` in the given format.
pub fn load(format: StrategyFormat, source: &Path, control: &TaskControl<'_>) -> Result<ImportResult, EditorError> {
    strategy_for(format).load(source, control)
}
