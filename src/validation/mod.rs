//! Project validation.
//!
//! This module checks a project for:
//! - Referential integrity (every shape's category is registered)
//! - Bookkeeping (category statistics agree with a recount)
//! - Data quality (known image dimensions, tidy category names)
//! - Geometric validity (finite, ordered, non-degenerate, within image bounds)

mod report;

pub use report::{IssueCode, IssueContext, Severity, ValidationIssue, ValidationReport};

use crate::model::{
    BoundingShapeData, CategoryRegistry, CategoryStatistics, ImageAnnotation, ImageAnnotationData, Shape,
};

/// Shapes may overhang the image by this much before being reported.
const BOUNDS_TOLERANCE: f64 = 0.5;

/// How a finished report is judged; see [`ValidationReport::passes`].
///
/// The checks themselves do not depend on these options.
#[derive(Clone, Debug, Default)]
pub struct ValidateOptions {
    /// If true, treat warnings as errors.
    pub strict: bool,
}

/// Validates a project and returns a report of all issues found.
pub fn validate(data: &ImageAnnotationData) -> ValidationReport {
    let mut report = validate_annotations(data.categories(), data.annotations());
    validate_statistics(data.statistics(), &data.recount(), &mut report);
    report
}

/// Validates annotations against a registry without requiring an
/// [`ImageAnnotationData`], e.g. for data assembled outside the model.
pub fn validate_annotations<'a>(
    categories: &CategoryRegistry,
    annotations: impl IntoIterator<Item = &'a ImageAnnotation>,
) -> ValidationReport {
    let mut report = ValidationReport::new();
    validate_categories(categories, &mut report);
    for annotation in annotations {
        validate_image(annotation, categories, &mut report);
    }
    report
}

fn validate_categories(categories: &CategoryRegistry, report: &mut ValidationReport) {
    for category in categories.iter() {
        if category.name.trim() != category.name {
            report.add(ValidationIssue::warning(
                IssueCode::UntrimmedCategoryName,
                format!("Category name '{}' has surrounding whitespace", category.name),
                IssueContext::Category { id: category.id },
            ));
        }
    }
}

fn validate_statistics(
    tracked: &CategoryStatistics,
    recounted: &CategoryStatistics,
    report: &mut ValidationReport,
) {
    if tracked == recounted {
        return;
    }
    let mut categories: Vec<_> = tracked.iter().chain(recounted.iter()).map(|(id, _)| id).collect();
    categories.sort();
    categories.dedup();
    for id in categories {
        let (have, want) = (tracked.count(id), recounted.count(id));
        if have != want {
            report.add(ValidationIssue::error(
                IssueCode::StatisticsMismatch,
                format!("Tracked count {} differs from recount {}", have, want),
                IssueContext::Category { id },
            ));
        }
    }
}

fn validate_image(annotation: &ImageAnnotation, categories: &CategoryRegistry, report: &mut ValidationReport) {
    let metadata = &annotation.metadata;
    let bounds = metadata.has_known_dimensions().then(|| {
        (metadata.width as f64, metadata.height as f64)
    });
    if bounds.is_none() {
        report.add(ValidationIssue::warning(
            IssueCode::UnknownImageDimensions,
            format!(
                "Dimensions {}x{} unknown; bounds checks skipped",
                metadata.width, metadata.height
            ),
            IssueContext::Image {
                file_name: metadata.file_name.clone(),
            },
        ));
    }

    for (idx, shape) in annotation.shapes.iter().enumerate() {
        validate_shape(shape, &idx.to_string(), annotation.file_name(), bounds, categories, report);
    }
}

fn validate_shape(
    shape: &BoundingShapeData,
    path: &str,
    file_name: &str,
    bounds: Option<(f64, f64)>,
    categories: &CategoryRegistry,
    report: &mut ValidationReport,
) {
    let context = || IssueContext::Shape {
        file_name: file_name.to_string(),
        path: path.to_string(),
    };

    if !categories.contains(shape.category) {
        report.add(ValidationIssue::error(
            IssueCode::MissingCategoryRef,
            format!("References non-existent category {}", shape.category),
            context(),
        ));
    }

    if !shape.shape.is_finite() {
        report.add(ValidationIssue::error(
            IssueCode::ShapeNotFinite,
            format!("Non-finite coordinates in {}", shape.shape.kind_name()),
            context(),
        ));
    } else {
        match &shape.shape {
            Shape::Box(bbox) if !bbox.is_ordered() => {
                report.add(ValidationIssue::warning(
                    IssueCode::InvalidBoxOrdering,
                    format!(
                        "Invalid ordering: min ({}, {}) should be <= max ({}, {})",
                        bbox.xmin, bbox.ymin, bbox.xmax, bbox.ymax
                    ),
                    context(),
                ));
            }
            Shape::Polygon { points } if points.len() < 3 => {
                report.add(ValidationIssue::warning(
                    IssueCode::DegeneratePolygon,
                    format!("Polygon has {} vertices; at least 3 are needed", points.len()),
                    context(),
                ));
            }
            _ => {}
        }

        if let (Some((width, height)), Some(extent)) = (bounds, shape.shape.bounds()) {
            if extent.xmin.min(extent.xmax) < -BOUNDS_TOLERANCE
                || extent.ymin.min(extent.ymax) < -BOUNDS_TOLERANCE
                || extent.xmin.max(extent.xmax) > width + BOUNDS_TOLERANCE
                || extent.ymin.max(extent.ymax) > height + BOUNDS_TOLERANCE
            {
                report.add(ValidationIssue::warning(
                    IssueCode::ShapeOutOfBounds,
                    format!(
                        "Shape ({:.1}, {:.1}, {:.1}, {:.1}) extends outside image bounds (0, 0, {}, {})",
                        extent.xmin, extent.ymin, extent.xmax, extent.ymax, width, height
                    ),
                    context(),
                ));
            }
        }
    }

    for (idx, part) in shape.parts.iter().enumerate() {
        validate_shape(part, &format!("{path}.{idx}"), file_name, bounds, categories, report);
    }
}
