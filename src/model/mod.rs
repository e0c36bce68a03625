//! Annotation data model.
//!
//! This module defines the in-memory representation of an annotation
//! project: categories, bounding shapes with nested parts, per-image
//! annotations and the project-wide collection that ties them together.
//!
//! # Design Principles
//!
//! 1. **Referenced categories**: shapes refer to categories by [`CategoryId`];
//!    the [`CategoryRegistry`] owned by [`ImageAnnotationData`] is the single
//!    source of names and colors.
//!
//! 2. **Double precision**: coordinates are stored as `f64` pixels. Rounding
//!    happens only in formats that require integers.
//!
//! 3. **Permissive construction**: unordered boxes or degenerate polygons can
//!    be represented, so that validation can report them rather than panic.
//!
//! # Example
//!
//! ```
//! use bbox_editor::model::{
//!     BoundingBox, BoundingShapeData, Color, ImageAnnotationData, ImageMetaData,
//! };
//!
//! let mut data = ImageAnnotationData::new();
//! let car = data.add_category("car", Color::rgb(255, 0, 0)).unwrap();
//! let wheel = data.add_category("wheel", Color::rgb(0, 0, 255)).unwrap();
//! data.add_image(ImageMetaData::new("street.jpg", "images", 640, 480, 3));
//!
//! let shape = BoundingShapeData::new_box(car, BoundingBox::from_xyxy(10.0, 20.0, 300.0, 200.0))
//!     .with_part(BoundingShapeData::new_box(
//!         wheel,
//!         BoundingBox::from_xyxy(20.0, 150.0, 80.0, 200.0),
//!     ));
//! data.add_shape("street.jpg", shape).unwrap();
//!
//! assert_eq!(data.statistics().count(wheel), 1);
//! ```

mod annotation;
mod bbox;
mod category;
mod coord;
mod ids;
pub mod metadata;
mod shape;
mod stats;

// Re-export core types for convenient access
pub use annotation::{ImageAnnotation, ImageAnnotationData};
pub use bbox::BoundingBox;
pub use category::{CategoryRegistry, Color, ObjectCategory};
pub use coord::{round_half_up, Point};
pub use ids::CategoryId;
pub use metadata::{read_image_metadata, scan_image_folder, ImageMetaData, MetadataWarning};
pub use shape::{BoundingShapeData, Shape};
pub use stats::CategoryStatistics;
