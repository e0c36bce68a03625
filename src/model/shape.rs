//! Bounding shapes with recursively nested parts.

use serde::{Deserialize, Serialize};

use super::bbox::BoundingBox;
use super::coord::Point;
use super::ids::CategoryId;

/// The geometry of a bounding shape.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Shape {
    /// Axis-aligned rectangle in pixel coordinates.
    Box(BoundingBox),
    /// Closed polygon given by its vertices in drawing order.
    Polygon { points: Vec<Point> },
}

impl Shape {
    /// Short lowercase name of the variant ("box" or "polygon").
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Box(_) => "box",
            Shape::Polygon { .. } => "polygon",
        }
    }

    /// Axis-aligned bounds of the geometry; `None` for a polygon without vertices.
    pub fn bounds(&self) -> Option<BoundingBox> {
        match self {
            Shape::Box(bbox) => Some(*bbox),
            Shape::Polygon { points } => BoundingBox::enclosing(points),
        }
    }

    /// Returns true if every coordinate is finite.
    pub fn is_finite(&self) -> bool {
        match self {
            Shape::Box(bbox) => bbox.is_finite(),
            Shape::Polygon { points } => points.iter().all(Point::is_finite),
        }
    }
}

/// A labeled region attached to an image, possibly containing nested parts.
///
/// Parts encode part-of relations ("wheel" inside "car"). They are regular
/// shapes with their own category and can themselves have parts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingShapeData {
    /// Category in the project's [`CategoryRegistry`](super::CategoryRegistry).
    pub category: CategoryId,

    pub shape: Shape,

    /// Nested shapes, in the order they were attached.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parts: Vec<BoundingShapeData>,
}

impl BoundingShapeData {
    /// Creates a shape without parts.
    pub fn new(category: impl Into<CategoryId>, shape: Shape) -> Self {
        Self {
            category: category.into(),
            shape,
            parts: Vec::new(),
        }
    }

    /// Creates a bounding-box shape without parts.
    pub fn new_box(category: impl Into<CategoryId>, bbox: BoundingBox) -> Self {
        Self::new(category, Shape::Box(bbox))
    }

    /// Creates a polygon shape without parts.
    pub fn new_polygon(category: impl Into<CategoryId>, points: Vec<Point>) -> Self {
        Self::new(category, Shape::Polygon { points })
    }

    /// Replaces the parts of this shape.
    pub fn with_parts(mut self, parts: Vec<BoundingShapeData>) -> Self {
        self.parts = parts;
        self
    }

    /// Appends a single part.
    pub fn with_part(mut self, part: BoundingShapeData) -> Self {
        self.parts.push(part);
        self
    }

    /// Number of shapes in this subtree, including `self`.
    pub fn subtree_len(&self) -> usize {
        1 + self.parts.iter().map(Self::subtree_len).sum::<usize>()
    }

    /// Returns true if this shape and all of its parts have finite coordinates.
    pub fn is_finite(&self) -> bool {
        self.shape.is_finite() && self.parts.iter().all(Self::is_finite)
    }

    /// Visits this shape and every nested part depth-first, parents before parts.
    ///
    /// The callback receives the nesting depth (0 for `self`).
    pub fn visit<'a, F>(&'a self, f: &mut F)
    where
        F: FnMut(&'a BoundingShapeData, usize),
    {
        self.visit_at(0, f);
    }

    fn visit_at<'a, F>(&'a self, depth: usize, f: &mut F)
    where
        F: FnMut(&'a BoundingShapeData, usize),
    {
        f(self, depth);
        for part in &self.parts {
            part.visit_at(depth + 1, f);
        }
    }

    /// Returns a copy of this shape without its parts.
    pub fn without_parts(&self) -> Self {
        Self::new(self.category, self.shape.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car_with_wheels() -> BoundingShapeData {
        BoundingShapeData::new_box(1u64, BoundingBox::from_xyxy(0.0, 0.0, 100.0, 50.0))
            .with_part(
                BoundingShapeData::new_box(2u64, BoundingBox::from_xyxy(5.0, 30.0, 25.0, 50.0))
                    .with_part(BoundingShapeData::new_polygon(
                        3u64,
                        vec![Point::new(10.0, 40.0), Point::new(15.0, 35.0), Point::new(20.0, 40.0)],
                    )),
            )
            .with_part(BoundingShapeData::new_box(
                2u64,
                BoundingBox::from_xyxy(75.0, 30.0, 95.0, 50.0),
            ))
    }

    #[test]
    fn test_subtree_len_counts_nested_parts() {
        assert_eq!(car_with_wheels().subtree_len(), 4);
    }

    #[test]
    fn test_visit_is_preorder_with_depth() {
        let shape = car_with_wheels();
        let mut seen = Vec::new();
        shape.visit(&mut |s, depth| seen.push((s.category.as_u64(), depth)));
        assert_eq!(seen, vec![(1, 0), (2, 1), (3, 2), (2, 1)]);
    }

    #[test]
    fn test_polygon_bounds() {
        let polygon = BoundingShapeData::new_polygon(
            1u64,
            vec![Point::new(3.0, 4.0), Point::new(-1.0, 8.0), Point::new(6.0, 2.0)],
        );
        assert_eq!(
            polygon.shape.bounds(),
            Some(BoundingBox::from_xyxy(-1.0, 2.0, 6.0, 8.0))
        );
        assert_eq!(polygon.shape.kind_name(), "polygon");
    }

    #[test]
    fn test_non_finite_part_taints_parent() {
        let shape = BoundingShapeData::new_box(1u64, BoundingBox::from_xyxy(0.0, 0.0, 1.0, 1.0))
            .with_part(BoundingShapeData::new_box(
                1u64,
                BoundingBox::from_xyxy(f64::NAN, 0.0, 1.0, 1.0),
            ));
        assert!(!shape.is_finite());
    }

    #[test]
    fn test_shape_json_is_tagged() {
        let shape = BoundingShapeData::new_box(4u64, BoundingBox::from_xyxy(1.0, 2.0, 3.0, 4.0));
        let json = serde_json::to_string(&shape).expect("serialize shape");
        assert!(json.contains("\"type\":\"box\""));
        assert!(!json.contains("parts"));
        let back: BoundingShapeData = serde_json::from_str(&json).expect("parse shape");
        assert_eq!(back, shape);
    }
}
