//! SIMPLE project format: one lossless JSON document per project.
//!
//! ```json
//! {
//!   "format": "bbox-editor-simple",
//!   "version": 1,
//!   "categories": [{ "id": 1, "name": "car", "color": "#1f77b4ff" }],
//!   "images": [
//!     {
//!       "metadata": { "file_name": "a.jpg", "folder_name": "imgs", "width": 640, "height": 480, "depth": 3 },
//!       "shapes": [{ "category": 1, "shape": { "type": "box", "xmin": 1.5, ... }, "parts": [] }]
//!     }
//!   ]
//! }
//! ```
//!
//! Coordinates are written in shortest round-trip form, so loading a saved
//! project reproduces every `f64` exactly. Non-finite coordinates have no
//! JSON representation; images containing them are rejected on save.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::atomic::write_atomic;
use super::progress::{ProgressTracker, TaskControl};
use super::results::{ExportResult, ImportResult, ItemIssue};
use super::{AnnotationStrategy, StrategyFormat};
use crate::error::EditorError;
use crate::model::{CategoryRegistry, ImageAnnotation, ImageAnnotationData};

/// Value of the `format` field.
pub const SIMPLE_FORMAT_MARKER: &str = "bbox-editor-simple";

/// Newest document version this build writes and reads.
pub const SIMPLE_FORMAT_VERSION: u32 = 1;

const MEMORY_PATH: &str = "<memory>";

#[derive(Serialize)]
struct DocumentOut<'a> {
    format: &'static str,
    version: u32,
    categories: &'a CategoryRegistry,
    images: Vec<&'a ImageAnnotation>,
}

#[derive(Deserialize)]
struct DocumentIn {
    format: String,
    version: u32,
    #[serde(default)]
    categories: CategoryRegistry,
    #[serde(default)]
    images: Vec<serde_json::Value>,
}

/// Saves and loads whole projects as a single SIMPLE JSON file.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimpleStrategy;

impl AnnotationStrategy for SimpleStrategy {
    fn format(&self) -> StrategyFormat {
        StrategyFormat::Simple
    }

    fn save(
        &self,
        data: &ImageAnnotationData,
        destination: &Path,
        control: &TaskControl<'_>,
    ) -> Result<ExportResult, EditorError> {
        check_destination(destination)?;
        info!(
            "saving {} image(s) as SIMPLE to {}",
            data.len(),
            destination.display()
        );

        let started = Instant::now();
        let mut result = ExportResult {
            total_items: data.len(),
            ..Default::default()
        };
        let mut tracker = ProgressTracker::new(control, data.len());
        let mut included = Vec::with_capacity(data.len());

        for annotation in data.annotations() {
            if tracker.is_cancelled() {
                info!("SIMPLE save cancelled; nothing written");
                result.cancelled = true;
                result.elapsed = started.elapsed();
                return Ok(result);
            }
            if annotation.shapes.iter().all(|shape| shape.is_finite()) {
                included.push(annotation);
            } else {
                let issue = ItemIssue::format(
                    annotation.file_name(),
                    "shape coordinates must be finite numbers",
                );
                warn!("{issue}");
                result.errors.push(issue);
            }
            tracker.advance();
        }

        let document = DocumentOut {
            format: SIMPLE_FORMAT_MARKER,
            version: SIMPLE_FORMAT_VERSION,
            categories: data.categories(),
            images: included,
        };
        let written = document.images.len();
        match serde_json::to_string_pretty(&document) {
            Ok(json) => match write_atomic(destination, json.as_bytes()) {
                Ok(()) => result.processed_items = written,
                Err(err) => {
                    let issue = ItemIssue::io(destination.display().to_string(), err.to_string());
                    warn!("{issue}");
                    result.errors.push(issue);
                }
            },
            Err(err) => {
                let issue = ItemIssue::format(destination.display().to_string(), err.to_string());
                warn!("{issue}");
                result.errors.push(issue);
            }
        }

        tracker.finish();
        result.elapsed = started.elapsed();
        info!(
            "SIMPLE save finished: {} saved, {} failed",
            result.processed_items,
            result.errors.len()
        );
        Ok(result)
    }

    fn load(&self, source: &Path, control: &TaskControl<'_>) -> Result<ImportResult, EditorError> {
        if !source.is_file() {
            return Err(EditorError::SourceInvalid {
                path: source.to_path_buf(),
                message: "SIMPLE source must be an existing file".to_string(),
            });
        }
        info!("loading SIMPLE project {}", source.display());

        let started = Instant::now();
        let mut result = ImportResult::default();

        let document = match fs::read_to_string(source) {
            Ok(json) => parse_document(&json, source),
            Err(err) => Err(EditorError::Io(err)),
        };
        let document = match document {
            Ok(document) => document,
            Err(err) => {
                let issue = match err {
                    EditorError::Io(_) => ItemIssue::io(source.display().to_string(), err.to_string()),
                    _ => ItemIssue::format(source.display().to_string(), err.to_string()),
                };
                warn!("{issue}");
                result.errors.push(issue);
                ProgressTracker::new(control, 0).finish();
                result.elapsed = started.elapsed();
                return Ok(result);
            }
        };

        result.total_items = document.images.len();
        result.data = ImageAnnotationData::with_categories(document.categories);
        let mut tracker = ProgressTracker::new(control, document.images.len());

        for (index, value) in document.images.into_iter().enumerate() {
            if tracker.is_cancelled() {
                info!("SIMPLE load cancelled after {} image(s)", result.processed_items);
                result.cancelled = true;
                break;
            }
            match decode_image(value, &mut result.data) {
                Ok(()) => result.processed_items += 1,
                Err(message) => {
                    let issue = ItemIssue::format(format!("{}#images[{index}]", source.display()), message);
                    warn!("{issue}");
                    result.errors.push(issue);
                }
            }
            tracker.advance();
        }

        if !result.cancelled {
            tracker.finish();
        }
        result.elapsed = started.elapsed();
        info!(
            "SIMPLE load finished: {} loaded, {} failed",
            result.processed_items,
            result.errors.len()
        );
        Ok(result)
    }
}

/// Serializes a project to a SIMPLE JSON string.
///
/// Fails if any shape has a non-finite coordinate.
pub fn to_simple_string(data: &ImageAnnotationData) -> Result<String, EditorError> {
    if let Some(bad) = data
        .annotations()
        .find(|annotation| !annotation.shapes.iter().all(|shape| shape.is_finite()))
    {
        return Err(EditorError::SimpleFormat {
            path: PathBuf::from(MEMORY_PATH),
            message: format!("image '{}' has non-finite coordinates", bad.file_name()),
        });
    }
    let document = DocumentOut {
        format: SIMPLE_FORMAT_MARKER,
        version: SIMPLE_FORMAT_VERSION,
        categories: data.categories(),
        images: data.annotations().collect(),
    };
    serde_json::to_string_pretty(&document).map_err(|source| EditorError::SimpleWrite {
        path: PathBuf::from(MEMORY_PATH),
        source,
    })
}

/// Parses a SIMPLE JSON string; any malformed image fails the whole parse.
///
/// Useful for testing and fuzzing without file I/O.
pub fn from_simple_str(json: &str) -> Result<ImageAnnotationData, EditorError> {
    let path = Path::new(MEMORY_PATH);
    let document = parse_document(json, path)?;
    let mut data = ImageAnnotationData::with_categories(document.categories);
    for (index, value) in document.images.into_iter().enumerate() {
        decode_image(value, &mut data).map_err(|message| EditorError::SimpleFormat {
            path: path.to_path_buf(),
            message: format!("images[{index}]: {message}"),
        })?;
    }
    Ok(data)
}

/// Parses SIMPLE JSON from bytes. The input must be valid UTF-8.
pub fn from_simple_slice(bytes: &[u8]) -> Result<ImageAnnotationData, EditorError> {
    let json = std::str::from_utf8(bytes).map_err(|source| EditorError::SimpleFormat {
        path: PathBuf::from(MEMORY_PATH),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_simple_str(json)
}

fn check_destination(destination: &Path) -> Result<(), EditorError> {
    if destination.is_dir() {
        return Err(EditorError::DestinationInvalid {
            path: destination.to_path_buf(),
            message: "SIMPLE destination must be a file path, not a directory".to_string(),
        });
    }
    let parent = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    if !parent.is_dir() {
        return Err(EditorError::DestinationInvalid {
            path: destination.to_path_buf(),
            message: format!("parent directory {} does not exist", parent.display()),
        });
    }
    Ok(())
}

fn parse_document(json: &str, path: &Path) -> Result<DocumentIn, EditorError> {
    let document: DocumentIn =
        serde_json::from_str(json).map_err(|source| EditorError::SimpleParse {
            path: path.to_path_buf(),
            source,
        })?;
    if document.format != SIMPLE_FORMAT_MARKER {
        return Err(EditorError::SimpleFormat {
            path: path.to_path_buf(),
            message: format!(
                "unexpected format marker '{}', expected '{SIMPLE_FORMAT_MARKER}'",
                document.format
            ),
        });
    }
    if document.version > SIMPLE_FORMAT_VERSION {
        return Err(EditorError::SimpleVersion {
            path: path.to_path_buf(),
            found: document.version,
            supported: SIMPLE_FORMAT_VERSION,
        });
    }
    Ok(document)
}

fn decode_image(value: serde_json::Value, data: &mut ImageAnnotationData) -> Result<(), String> {
    let annotation: ImageAnnotation = serde_json::from_value(value).map_err(|err| err.to_string())?;
    if data.annotation(annotation.file_name()).is_some() {
        return Err(format!("duplicate image '{}'", annotation.file_name()));
    }
    let name = annotation.file_name().to_string();
    data.insert_annotation(annotation)
        .map(|_| ())
        .map_err(|err| format!("image '{name}': {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BoundingBox, BoundingShapeData, CategoryId, Color, ImageMetaData, Point};

    fn sample_project() -> ImageAnnotationData {
        let mut data = ImageAnnotationData::new();
        let car = data.add_category("car", Color::rgb(200, 10, 10)).unwrap();
        let wheel = data.add_category("wheel", Color::rgb(10, 10, 200)).unwrap();
        data.add_image(ImageMetaData::new("a.jpg", "imgs", 640, 480, 3));
        data.add_image(ImageMetaData::new("b.jpg", "imgs", 0, 0, 0));
        data.add_shape(
            "a.jpg",
            BoundingShapeData::new_box(car, BoundingBox::from_xyxy(0.1, 0.2, 100.123456789, 50.5))
                .with_part(BoundingShapeData::new_polygon(
                    wheel,
                    vec![Point::new(1.0 / 3.0, 2.0), Point::new(5.0, 2.0), Point::new(4.0, 7.0)],
                )),
        )
        .unwrap();
        data
    }

    #[test]
    fn string_roundtrip_is_exact() {
        let original = sample_project();
        let json = to_simple_string(&original).expect("serialize");
        let restored = from_simple_str(&json).expect("parse");
        assert_eq!(restored, original);
        assert_eq!(restored.statistics(), original.statistics());
    }

    #[test]
    fn document_carries_marker_and_version() {
        let json = to_simple_string(&sample_project()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["format"], SIMPLE_FORMAT_MARKER);
        assert_eq!(value["version"], SIMPLE_FORMAT_VERSION);
        assert_eq!(value["categories"][0]["name"], "car");
        assert_eq!(value["images"][0]["shapes"][0]["shape"]["type"], "box");
    }

    #[test]
    fn newer_version_is_rejected() {
        let json = r#"{"format": "bbox-editor-simple", "version": 2, "categories": [], "images": []}"#;
        assert!(matches!(
            from_simple_str(json),
            Err(EditorError::SimpleVersion { found: 2, supported: 1, .. })
        ));
    }

    #[test]
    fn foreign_marker_is_rejected() {
        let json = r#"{"format": "something-else", "version": 1}"#;
        assert!(matches!(from_simple_str(json), Err(EditorError::SimpleFormat { .. })));
    }

    #[test]
    fn shape_with_unregistered_category_is_rejected() {
        let json = r#"{
            "format": "bbox-editor-simple",
            "version": 1,
            "categories": [],
            "images": [{
                "metadata": {"file_name": "a.jpg"},
                "shapes": [{"category": 7, "shape": {"type": "box", "xmin": 0, "ymin": 0, "xmax": 1, "ymax": 1}}]
            }]
        }"#;
        let err = from_simple_str(json).unwrap_err();
        assert!(err.to_string().contains("images[0]"));
    }

    #[test]
    fn non_finite_coordinates_cannot_be_serialized() {
        let mut data = sample_project();
        let car = data.categories().id_of("car").unwrap();
        data.add_shape(
            "b.jpg",
            BoundingShapeData::new_box(car, BoundingBox::from_xyxy(f64::NAN, 0.0, 1.0, 1.0)),
        )
        .unwrap();
        assert!(matches!(to_simple_string(&data), Err(EditorError::SimpleFormat { .. })));
    }

    #[test]
    fn invalid_utf8_is_an_error_not_a_panic() {
        assert!(from_simple_slice(&[0xff, 0xfe, 0x00]).is_err());
    }

    #[test]
    fn registry_holding_the_largest_id_loads() {
        let json = format!(
            r##"{{"format":"{SIMPLE_FORMAT_MARKER}","version":{SIMPLE_FORMAT_VERSION},"categories":[{{"id":18446744073709551615,"name":"car","color":"#c80a0aff"}}],"images":[]}}"##
        );
        let mut data = from_simple_str(&json).expect("parse");
        assert_eq!(data.categories().len(), 1);
        assert!(matches!(
            data.get_or_create_category("truck"),
            Err(EditorError::CategoryIdExhausted)
        ));
        assert_eq!(data.get_or_create_category("car").unwrap(), CategoryId(u64::MAX));
    }
}
