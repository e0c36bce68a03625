//! Incremental per-category shape counts.

use std::collections::BTreeMap;

use super::annotation::ImageAnnotation;
use super::ids::CategoryId;
use super::shape::BoundingShapeData;

/// Number of shapes per category across a whole project.
///
/// Counts are updated as shapes come and go and never rescanned during
/// normal operation. Nested parts count towards their own category.
/// Categories with a zero count are absent from the map.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CategoryStatistics {
    counts: BTreeMap<CategoryId, usize>,
}

impl CategoryStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recount from scratch over a set of annotations.
    pub fn recount<'a>(annotations: impl IntoIterator<Item = &'a ImageAnnotation>) -> Self {
        let mut stats = Self::new();
        for annotation in annotations {
            for shape in &annotation.shapes {
                stats.record_added(shape);
            }
        }
        stats
    }

    /// Number of shapes of `category`.
    pub fn count(&self, category: CategoryId) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Total number of shapes, nested parts included.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    /// Iterates `(category, count)` pairs in category-ID order.
    pub fn iter(&self) -> impl Iterator<Item = (CategoryId, usize)> + '_ {
        self.counts.iter().map(|(id, count)| (*id, *count))
    }

    /// Accounts for a shape and all of its parts.
    pub fn record_added(&mut self, shape: &BoundingShapeData) {
        shape.visit(&mut |s, _| self.increment(s.category));
    }

    /// Reverses [`record_added`](Self::record_added) for a shape and its parts.
    pub fn record_removed(&mut self, shape: &BoundingShapeData) {
        shape.visit(&mut |s, _| self.decrement(s.category));
    }

    pub fn increment(&mut self, category: CategoryId) {
        *self.counts.entry(category).or_insert(0) += 1;
    }

    pub fn decrement(&mut self, category: CategoryId) {
        if let Some(count) = self.counts.get_mut(&category) {
            *count -= 1;
            if *count == 0 {
                self.counts.remove(&category);
            }
        }
    }
}
