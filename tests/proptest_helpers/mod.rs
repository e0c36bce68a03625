#![allow(dead_code)]

use std::collections::HashSet;

use bbox_editor::model::{
    BoundingBox, BoundingShapeData, CategoryId, Color, ImageAnnotation, ImageAnnotationData,
    ImageMetaData, ObjectCategory, Point, Shape,
};
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

/// PASCAL VOC stores integers; rounding half-up moves a coordinate by at most 0.5.
pub const EPS_VOC: f64 = 0.5;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Any finite double, including values with no short decimal form.
pub fn arb_exact_coordinate() -> BoxedStrategy<f64> {
    prop_oneof![
        -1.0e6..1.0e6f64,
        any::<f64>().prop_filter("finite", |v| v.is_finite()),
        (1u32..1000, 1u32..1000).prop_map(|(n, d)| n as f64 / d as f64),
    ]
    .boxed()
}

/// Pixel-range coordinates with fractional parts.
pub fn arb_pixel_coordinate() -> BoxedStrategy<f64> {
    (0.0..4096.0f64).boxed()
}

pub fn arb_geometry(coord: BoxedStrategy<f64>) -> BoxedStrategy<Shape> {
    prop_oneof![
        (coord.clone(), coord.clone(), coord.clone(), coord.clone())
            .prop_map(|(x1, y1, x2, y2)| Shape::Box(BoundingBox::from_xyxy(x1, y1, x2, y2))),
        proptest::collection::vec((coord.clone(), coord).prop_map(|(x, y)| Point::new(x, y)), 3..8)
            .prop_map(|points| Shape::Polygon { points }),
    ]
    .boxed()
}

/// A shape with up to two levels of nested parts, drawn from `categories`.
pub fn arb_shape(categories: Vec<CategoryId>, coord: BoxedStrategy<f64>) -> BoxedStrategy<BoundingShapeData> {
    assert!(!categories.is_empty(), "categories must not be empty");
    let leaf = (proptest::sample::select(categories), arb_geometry(coord))
        .prop_map(|(category, shape)| BoundingShapeData::new(category, shape));

    leaf.clone()
        .prop_recursive(2, 12, 3, move |inner| {
            (leaf.clone(), proptest::collection::vec(inner, 0..3))
                .prop_map(|(shape, parts)| shape.with_parts(parts))
        })
        .boxed()
}

/// Projects whose coordinates are arbitrary finite doubles.
pub fn arb_project(max_images: usize, max_cats: usize, max_shapes: usize) -> BoxedStrategy<ImageAnnotationData> {
    arb_project_with(max_images, max_cats, max_shapes, arb_exact_coordinate)
}

/// Projects whose coordinates stay within typical image sizes.
pub fn arb_pixel_project(max_images: usize, max_cats: usize, max_shapes: usize) -> BoxedStrategy<ImageAnnotationData> {
    arb_project_with(max_images, max_cats, max_shapes, arb_pixel_coordinate)
}

fn arb_project_with(
    max_images: usize,
    max_cats: usize,
    max_shapes: usize,
    coord: fn() -> BoxedStrategy<f64>,
) -> BoxedStrategy<ImageAnnotationData> {
    assert!(max_images > 0, "max_images must be > 0");
    assert!(max_cats > 0, "max_cats must be > 0");

    (0usize..=max_images, 1usize..=max_cats)
        .prop_flat_map(move |(image_count, category_count)| {
            let ids: Vec<CategoryId> = (1..=category_count as u64).map(CategoryId).collect();
            (
                proptest::collection::hash_set(category_name_strategy(), category_count..=category_count),
                proptest::collection::vec(any::<(u8, u8, u8, u8)>(), category_count..=category_count),
                proptest::collection::hash_set(image_file_name_strategy(), image_count..=image_count),
                proptest::collection::vec(
                    (
                        image_meta_strategy(),
                        proptest::collection::vec(arb_shape(ids, coord()), 0..=max_shapes),
                    ),
                    image_count..=image_count,
                ),
            )
                .prop_map(|(names, colors, files, images)| build_project(names, colors, files, images))
        })
        .boxed()
}

type ImageMeta = (String, u32, u32, u32);

fn image_meta_strategy() -> impl Strategy<Value = ImageMeta> {
    (
        proptest::string::string_regex("[a-z]{0,8}").expect("valid folder regex"),
        prop_oneof![Just(0u32), 1u32..=4096],
        1u32..=4096,
        prop_oneof![Just(1u32), Just(3u32), Just(4u32)],
    )
}

fn image_file_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z0-9_]{1,12}\\.jpg")
        .expect("valid filename regex")
        .boxed()
}

fn category_name_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z][a-z&<>'\"]{0,15}")
        .expect("valid category name regex")
        .boxed()
}

fn build_project(
    names: HashSet<String>,
    colors: Vec<(u8, u8, u8, u8)>,
    files: HashSet<String>,
    images: Vec<(ImageMeta, Vec<BoundingShapeData>)>,
) -> ImageAnnotationData {
    let mut names: Vec<String> = names.into_iter().collect();
    names.sort();
    let mut files: Vec<String> = files.into_iter().collect();
    files.sort();

    let mut data = ImageAnnotationData::new();
    for (idx, (name, (r, g, b, a))) in names.into_iter().zip(colors).enumerate() {
        data.insert_category(ObjectCategory::new(idx as u64 + 1, name, Color::rgba(r, g, b, a)))
            .expect("unique generated category");
    }
    for (file_name, ((folder, width, height, depth), shapes)) in files.into_iter().zip(images) {
        let metadata = ImageMetaData::new(file_name, folder, width, height, depth);
        data.insert_annotation(ImageAnnotation::new(metadata).with_shapes(shapes))
            .expect("generated shapes use registered categories");
    }
    data
}

/// Compares two projects image by image, allowing `eps` per coordinate.
pub fn assert_projects_close(
    expected: &ImageAnnotationData,
    actual: &ImageAnnotationData,
    eps: f64,
) -> Result<(), String> {
    if expected.categories() != actual.categories() {
        return Err(format!(
            "categories differ: {:?} vs {:?}",
            expected.categories(),
            actual.categories()
        ));
    }
    let expected_names: Vec<&str> = expected.image_names().collect();
    let actual_names: Vec<&str> = actual.image_names().collect();
    if expected_names != actual_names {
        return Err(format!("images differ: {expected_names:?} vs {actual_names:?}"));
    }
    for (left, right) in expected.annotations().zip(actual.annotations()) {
        if left.metadata != right.metadata {
            return Err(format!("metadata differs: {:?} vs {:?}", left.metadata, right.metadata));
        }
        shapes_close(&left.shapes, &right.shapes, eps)
            .map_err(|message| format!("{}: {message}", left.file_name()))?;
    }
    if actual.statistics() != &actual.recount() {
        return Err("statistics of the loaded project do not match a recount".to_string());
    }
    Ok(())
}

pub fn shapes_close(expected: &[BoundingShapeData], actual: &[BoundingShapeData], eps: f64) -> Result<(), String> {
    if expected.len() != actual.len() {
        return Err(format!("{} shapes vs {}", expected.len(), actual.len()));
    }
    for (idx, (left, right)) in expected.iter().zip(actual).enumerate() {
        if left.category != right.category {
            return Err(format!("shape {idx}: category {} vs {}", left.category, right.category));
        }
        let close = match (&left.shape, &right.shape) {
            (Shape::Box(a), Shape::Box(b)) => {
                near(a.xmin, b.xmin, eps) && near(a.ymin, b.ymin, eps) && near(a.xmax, b.xmax, eps) && near(a.ymax, b.ymax, eps)
            }
            (Shape::Polygon { points: a }, Shape::Polygon { points: b }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(p, q)| near(p.x, q.x, eps) && near(p.y, q.y, eps))
            }
            _ => false,
        };
        if !close {
            return Err(format!("shape {idx}: {:?} vs {:?}", left.shape, right.shape));
        }
        shapes_close(&left.parts, &right.parts, eps).map_err(|message| format!("shape {idx} part: {message}"))?;
    }
    Ok(())
}

fn near(a: f64, b: f64, eps: f64) -> bool {
    (a - b).abs() <= eps + 1e-9
}

/// One step of a random edit session on an [`AnnotationTree`](bbox_editor::tree::AnnotationTree).
#[derive(Clone, Debug)]
pub enum TreeOp {
    /// Insert a box of `category` under the root or the picked shape node.
    Insert { parent: Option<usize>, category: u64 },
    /// Remove the picked shape node.
    Remove { pick: usize },
    /// Move the picked shape node to another category.
    Reassign { pick: usize, category: u64 },
}

pub fn arb_tree_ops(max_ops: usize) -> BoxedStrategy<Vec<TreeOp>> {
    let op = prop_oneof![
        3 => (proptest::option::of(any::<usize>()), 1u64..=4)
            .prop_map(|(parent, category)| TreeOp::Insert { parent, category }),
        2 => any::<usize>().prop_map(|pick| TreeOp::Remove { pick }),
        1 => (any::<usize>(), 1u64..=4).prop_map(|(pick, category)| TreeOp::Reassign { pick, category }),
    ];
    proptest::collection::vec(op, 0..=max_ops).boxed()
}
