//! Per-image annotations and the project-wide annotation collection.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::category::{CategoryRegistry, Color, ObjectCategory};
use super::ids::CategoryId;
use super::metadata::ImageMetaData;
use super::shape::BoundingShapeData;
use super::stats::CategoryStatistics;
use crate::error::EditorError;

/// All shapes drawn on one image, in top-level drawing order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ImageAnnotation {
    pub metadata: ImageMetaData,

    #[serde(default)]
    pub shapes: Vec<BoundingShapeData>,
}

impl ImageAnnotation {
    /// Creates an annotation without shapes.
    pub fn new(metadata: ImageMetaData) -> Self {
        Self {
            metadata,
            shapes: Vec::new(),
        }
    }

    /// Sets the top-level shapes.
    pub fn with_shapes(mut self, shapes: Vec<BoundingShapeData>) -> Self {
        self.shapes = shapes;
        self
    }

    /// The image identity used as key in [`ImageAnnotationData`].
    pub fn file_name(&self) -> &str {
        &self.metadata.file_name
    }

    /// Number of shapes including nested parts.
    pub fn shape_count(&self) -> usize {
        self.shapes.iter().map(BoundingShapeData::subtree_len).sum()
    }
}

/// Annotations of a whole project, keyed by image file name.
///
/// Owns the category registry and keeps [`CategoryStatistics`] current on
/// every mutation. All mutation goes through methods so that two invariants
/// hold at all times: every shape refers to a registered category, and the
/// statistics equal a fresh recount.
#[derive(Clone, Debug, Default)]
pub struct ImageAnnotationData {
    categories: CategoryRegistry,
    annotations: BTreeMap<String, ImageAnnotation>,
    statistics: CategoryStatistics,
}

impl ImageAnnotationData {
    /// Creates an empty project.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty project with a pre-populated registry.
    pub fn with_categories(categories: CategoryRegistry) -> Self {
        Self {
            categories,
            ..Default::default()
        }
    }

    pub fn categories(&self) -> &CategoryRegistry {
        &self.categories
    }

    pub fn statistics(&self) -> &CategoryStatistics {
        &self.statistics
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.annotations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.annotations.is_empty()
    }

    /// Iterates annotations ordered by file name.
    pub fn annotations(&self) -> impl Iterator<Item = &ImageAnnotation> {
        self.annotations.values()
    }

    /// Iterates image file names in order.
    pub fn image_names(&self) -> impl Iterator<Item = &str> {
        self.annotations.keys().map(String::as_str)
    }

    pub fn annotation(&self, file_name: &str) -> Option<&ImageAnnotation> {
        self.annotations.get(file_name)
    }

    /// Total number of shapes, nested parts included.
    pub fn shape_count(&self) -> usize {
        self.statistics.total()
    }

    /// Registers a new category.
    pub fn add_category(&mut self, name: impl Into<String>, color: Color) -> Result<CategoryId, EditorError> {
        self.categories.add(name, color)
    }

    /// Registers a category keeping its ID.
    pub fn insert_category(&mut self, category: ObjectCategory) -> Result<(), EditorError> {
        self.categories.insert(category)
    }

    pub fn get_or_create_category(&mut self, name: &str) -> Result<CategoryId, EditorError> {
        self.categories.get_or_create(name)
    }

    pub fn rename_category(&mut self, id: CategoryId, name: impl Into<String>) -> Result<(), EditorError> {
        self.categories.rename(id, name)
    }

    pub fn set_category_color(&mut self, id: CategoryId, color: Color) -> Result<(), EditorError> {
        self.categories.set_color(id, color)
    }

    /// Removes a category that no shape uses any more.
    pub fn remove_category(&mut self, id: CategoryId) -> Result<ObjectCategory, EditorError> {
        let count = self.statistics.count(id);
        if count > 0 {
            return Err(EditorError::CategoryInUse {
                name: self.categories.name_of(id)?.to_string(),
                count,
            });
        }
        self.categories.remove(id)
    }

    /// Adds an image without shapes unless it is already present.
    ///
    /// Returns true if the image was new.
    pub fn add_image(&mut self, metadata: ImageMetaData) -> bool {
        if self.annotations.contains_key(&metadata.file_name) {
            return false;
        }
        self.annotations
            .insert(metadata.file_name.clone(), ImageAnnotation::new(metadata));
        true
    }

    /// Inserts or replaces the annotation for an image.
    ///
    /// Fails without modifying anything if a shape refers to an unknown category.
    pub fn insert_annotation(
        &mut self,
        annotation: ImageAnnotation,
    ) -> Result<Option<ImageAnnotation>, EditorError> {
        for shape in &annotation.shapes {
            self.check_categories(shape)?;
        }
        for shape in &annotation.shapes {
            self.statistics.record_added(shape);
        }

        let previous = self
            .annotations
            .insert(annotation.file_name().to_string(), annotation);
        if let Some(previous) = &previous {
            for shape in &previous.shapes {
                self.statistics.record_removed(shape);
            }
        }
        Ok(previous)
    }

    /// Removes an image and its shapes from the project.
    pub fn remove_image(&mut self, file_name: &str) -> Option<ImageAnnotation> {
        let removed = self.annotations.remove(file_name)?;
        for shape in &removed.shapes {
            self.statistics.record_removed(shape);
        }
        Some(removed)
    }

    /// Replaces an image's top-level shapes with the editor's current list.
    pub fn set_shapes(
        &mut self,
        file_name: &str,
        shapes: Vec<BoundingShapeData>,
    ) -> Result<(), EditorError> {
        for shape in &shapes {
            self.check_categories(shape)?;
        }
        let annotation = self
            .annotations
            .get_mut(file_name)
            .ok_or_else(|| EditorError::UnknownImage {
                file_name: file_name.to_string(),
            })?;

        for shape in &annotation.shapes {
            self.statistics.record_removed(shape);
        }
        for shape in &shapes {
            self.statistics.record_added(shape);
        }
        annotation.shapes = shapes;
        Ok(())
    }

    /// Appends a top-level shape to an image.
    pub fn add_shape(&mut self, file_name: &str, shape: BoundingShapeData) -> Result<(), EditorError> {
        self.check_categories(&shape)?;
        let annotation = self
            .annotations
            .get_mut(file_name)
            .ok_or_else(|| EditorError::UnknownImage {
                file_name: file_name.to_string(),
            })?;
        self.statistics.record_added(&shape);
        annotation.shapes.push(shape);
        Ok(())
    }

    /// Removes the top-level shape at `index` (with its parts) from an image.
    pub fn remove_shape(&mut self, file_name: &str, index: usize) -> Result<BoundingShapeData, EditorError> {
        let annotation = self
            .annotations
            .get_mut(file_name)
            .ok_or_else(|| EditorError::UnknownImage {
                file_name: file_name.to_string(),
            })?;
        if index >= annotation.shapes.len() {
            return Err(EditorError::ShapeIndexOutOfRange {
                file_name: file_name.to_string(),
                index,
                len: annotation.shapes.len(),
            });
        }
        let removed = annotation.shapes.remove(index);
        self.statistics.record_removed(&removed);
        Ok(removed)
    }

    /// Statistics computed from scratch, for verifying the incremental ones.
    pub fn recount(&self) -> CategoryStatistics {
        CategoryStatistics::recount(self.annotations.values())
    }

    fn check_categories(&self, shape: &BoundingShapeData) -> Result<(), EditorError> {
        let mut missing = None;
        shape.visit(&mut |s, _| {
            if missing.is_none() && !self.categories.contains(s.category) {
                missing = Some(s.category);
            }
        });
        match missing {
            Some(id) => Err(EditorError::UnknownCategory { id }),
            None => Ok(()),
        }
    }
}

// Statistics are derived, so equality only looks at content.
impl PartialEq for ImageAnnotationData {
    fn eq(&self, other: &Self) -> bool {
        self.categories == other.categories && self.annotations == other.annotations
    }
}
