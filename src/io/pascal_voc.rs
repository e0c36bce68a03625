//! PASCAL VOC XML strategy.
//!
//! A project is saved as a directory with one `<stem>.xml` per image plus a
//! `categories.json` registry. Each document follows the VOC layout:
//!
//! ```xml
//! <annotation>
//!   <folder>images</folder>
//!   <filename>street.jpg</filename>
//!   <size><width>640</width><height>480</height><depth>3</depth></size>
//!   <object>
//!     <name>car</name>
//!     <bndbox><xmin>10</xmin><ymin>20</ymin><xmax>200</xmax><ymax>120</ymax></bndbox>
//!     <object>
//!       <name>wheel</name>
//!       <polygon><x1>20</x1><y1>100</y1><x2>40</x2><y2>100</y2><x3>30</x3><y3>118</y3></polygon>
//!     </object>
//!   </object>
//! </annotation>
//! ```
//!
//! Coordinates are rounded half-up to integers on save. On load, `<part>` is
//! read like a nested `<object>`, objects without a name or geometry are
//! skipped, and unexpected elements only produce warnings. Objects nested
//! deeper than [`MAX_OBJECT_DEPTH`] levels are skipped the same way.
//!
//! Saving never deletes files. An `<stem>.xml` left in the destination by an
//! earlier save, with no image of that stem in the project, is reported as a
//! warning since a later load would bring it back.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, info, warn};
use roxmltree::Node;

use super::atomic::write_atomic;
use super::categories::{read_category_registry, write_category_registry, CATEGORY_REGISTRY_FILE};
use super::progress::{ProgressTracker, TaskControl};
use super::results::{ExportResult, ImportResult, ItemIssue};
use super::{AnnotationStrategy, StrategyFormat};
use crate::error::EditorError;
use crate::model::{
    round_half_up, BoundingBox, BoundingShapeData, CategoryRegistry, ImageAnnotation,
    ImageAnnotationData, ImageMetaData, Point, Shape,
};

const VOC_XML_EXTENSION: &str = "xml";
const MEMORY_PATH: &str = "<memory>";

/// Deepest `<object>`/`<part>` nesting read from a document; the top-level
/// `<object>` is level 1.
pub const MAX_OBJECT_DEPTH: usize = 32;

/// Standard VOC elements that carry nothing this model stores.
const IGNORED_ELEMENTS: &[&str] = &[
    "pose",
    "truncated",
    "difficult",
    "occluded",
    "segmented",
    "source",
    "owner",
    "path",
];

/// Saves one XML file per image and loads them back.
#[derive(Clone, Copy, Debug, Default)]
pub struct PascalVocStrategy;

impl AnnotationStrategy for PascalVocStrategy {
    fn format(&self) -> StrategyFormat {
        StrategyFormat::PascalVoc
    }

    fn save(
        &self,
        data: &ImageAnnotationData,
        destination: &Path,
        control: &TaskControl<'_>,
    ) -> Result<ExportResult, EditorError> {
        prepare_destination(destination)?;
        write_category_registry(&destination.join(CATEGORY_REGISTRY_FILE), data.categories()).map_err(
            |err| EditorError::DestinationInvalid {
                path: destination.to_path_buf(),
                message: format!("cannot write {CATEGORY_REGISTRY_FILE}: {err}"),
            },
        )?;
        info!(
            "saving {} image(s) as PASCAL VOC to {}",
            data.len(),
            destination.display()
        );

        let started = Instant::now();
        let mut result = ExportResult {
            total_items: data.len(),
            ..Default::default()
        };
        let mut tracker = ProgressTracker::new(control, data.len());
        let mut stems = BTreeSet::new();

        for annotation in data.annotations() {
            if tracker.is_cancelled() {
                info!("PASCAL VOC save cancelled after {} image(s)", result.processed_items);
                result.cancelled = true;
                break;
            }
            match save_one(annotation, data.categories(), destination, &mut stems) {
                Ok(path) => {
                    debug!("wrote {}", path.display());
                    result.processed_items += 1;
                }
                Err(issue) => {
                    warn!("{issue}");
                    result.errors.push(issue);
                }
            }
            tracker.advance();
        }

        for issue in stale_xml_files(data, destination) {
            warn!("{issue}");
            result.warnings.push(issue);
        }

        if !result.cancelled {
            tracker.finish();
        }
        result.elapsed = started.elapsed();
        info!(
            "PASCAL VOC save finished: {} saved, {} failed, {} warning(s)",
            result.processed_items,
            result.errors.len(),
            result.warnings.len()
        );
        Ok(result)
    }

    fn load(&self, source: &Path, control: &TaskControl<'_>) -> Result<ImportResult, EditorError> {
        if !source.is_dir() {
            return Err(EditorError::SourceInvalid {
                path: source.to_path_buf(),
                message: "PASCAL VOC source must be a directory".to_string(),
            });
        }
        info!("loading PASCAL VOC annotations from {}", source.display());

        let started = Instant::now();
        let mut result = ImportResult::default();

        let registry_path = source.join(CATEGORY_REGISTRY_FILE);
        if registry_path.is_file() {
            match read_category_registry(&registry_path) {
                Ok(registry) => result.data = ImageAnnotationData::with_categories(registry),
                Err(err) => {
                    let issue = ItemIssue::format(registry_path.display().to_string(), err.to_string());
                    warn!("{issue}; category colors will be regenerated");
                    result.warnings.push(issue);
                }
            }
        }

        let xml_files = collect_xml_files(source)?;
        result.total_items = xml_files.len();
        let mut tracker = ProgressTracker::new(control, xml_files.len());

        for xml_path in xml_files {
            if tracker.is_cancelled() {
                info!("PASCAL VOC load cancelled after {} image(s)", result.processed_items);
                result.cancelled = true;
                break;
            }
            let item = xml_path.display().to_string();
            match load_one(&xml_path, &mut result.data) {
                Ok(warnings) => {
                    result.processed_items += 1;
                    for message in warnings {
                        let issue = ItemIssue::format(item.clone(), message);
                        warn!("{issue}");
                        result.warnings.push(issue);
                    }
                }
                Err(issue) => {
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
            "PASCAL VOC load finished: {} loaded, {} failed, {} warning(s)",
            result.processed_items,
            result.errors.len(),
            result.warnings.len()
        );
        Ok(result)
    }
}

/// Renders one image's annotation as a VOC XML document.
pub fn to_voc_xml_string(
    annotation: &ImageAnnotation,
    categories: &CategoryRegistry,
) -> Result<String, EditorError> {
    render_document(annotation, categories).map_err(|message| EditorError::VocWrite {
        path: PathBuf::from(MEMORY_PATH),
        message,
    })
}

/// Parses a VOC XML document into `data`, creating categories by name.
///
/// Returns the warnings for skipped or unrecognized content. Useful for
/// testing and fuzzing without file I/O.
pub fn from_voc_xml_str(xml: &str, data: &mut ImageAnnotationData) -> Result<Vec<String>, EditorError> {
    import_document(xml, Path::new(MEMORY_PATH), data)
}

/// Parses VOC XML from bytes. The input must be valid UTF-8.
pub fn from_voc_xml_slice(bytes: &[u8], data: &mut ImageAnnotationData) -> Result<Vec<String>, EditorError> {
    let xml = std::str::from_utf8(bytes).map_err(|source| EditorError::VocXmlParse {
        path: PathBuf::from(MEMORY_PATH),
        message: format!("input is not valid UTF-8: {source}"),
    })?;
    from_voc_xml_str(xml, data)
}

fn prepare_destination(destination: &Path) -> Result<(), EditorError> {
    if destination.exists() && !destination.is_dir() {
        return Err(EditorError::DestinationInvalid {
            path: destination.to_path_buf(),
            message: "PASCAL VOC destination must be a directory".to_string(),
        });
    }
    fs::create_dir_all(destination).map_err(|err| EditorError::DestinationInvalid {
        path: destination.to_path_buf(),
        message: err.to_string(),
    })
}

fn save_one(
    annotation: &ImageAnnotation,
    categories: &CategoryRegistry,
    destination: &Path,
    stems: &mut BTreeSet<String>,
) -> Result<PathBuf, ItemIssue> {
    let file_name = annotation.file_name();
    let stem = Path::new(file_name)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
        .ok_or_else(|| ItemIssue::format(file_name, "image file name has no usable stem"))?;
    if !stems.insert(stem.clone()) {
        return Err(ItemIssue::format(
            file_name,
            format!("another image already saved as {stem}.{VOC_XML_EXTENSION}"),
        ));
    }

    let xml = render_document(annotation, categories).map_err(|message| ItemIssue::format(file_name, message))?;
    let xml_path = destination.join(format!("{stem}.{VOC_XML_EXTENSION}"));
    write_atomic(&xml_path, xml.as_bytes())
        .map_err(|err| ItemIssue::io(file_name, format!("{}: {err}", xml_path.display())))?;
    Ok(xml_path)
}

/// XML files in `destination` that no image of the project maps to.
fn stale_xml_files(data: &ImageAnnotationData, destination: &Path) -> Vec<ItemIssue> {
    let project_stems: BTreeSet<_> = data
        .annotations()
        .filter_map(|annotation| Path::new(annotation.file_name()).file_stem().map(ToOwned::to_owned))
        .collect();
    let files = match collect_xml_files(destination) {
        Ok(files) => files,
        Err(err) => {
            warn!("cannot list {} for leftover XML files: {err}", destination.display());
            return Vec::new();
        }
    };
    files
        .into_iter()
        .filter(|path| {
            path.file_stem()
                .map(|stem| !project_stems.contains(stem))
                .unwrap_or(false)
        })
        .map(|path| {
            ItemIssue::format(
                path.display().to_string(),
                "left over from an earlier save; no image in the project maps to it and a load would restore it",
            )
        })
        .collect()
}

fn load_one(xml_path: &Path, data: &mut ImageAnnotationData) -> Result<Vec<String>, ItemIssue> {
    let item = xml_path.display().to_string();
    let xml = fs::read_to_string(xml_path).map_err(|err| ItemIssue::io(item.clone(), err.to_string()))?;
    import_document(&xml, xml_path, data).map_err(|err| ItemIssue::format(item, err.to_string()))
}

fn collect_xml_files(dir: &Path) -> Result<Vec<PathBuf>, EditorError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file() && has_xml_extension(&path) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn has_xml_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case(VOC_XML_EXTENSION))
        .unwrap_or(false)
}

// Writing

fn render_document(annotation: &ImageAnnotation, categories: &CategoryRegistry) -> Result<String, String> {
    let metadata = &annotation.metadata;
    let mut xml = String::new();

    writeln!(xml, "<?xml version=\"1.0\" encoding=\"utf-8\"?>").expect("write to string");
    writeln!(xml, "<annotation>").expect("write to string");
    writeln!(xml, "  <folder>{}</folder>", xml_escape(&metadata.folder_name)).expect("write to string");
    writeln!(xml, "  <filename>{}</filename>", xml_escape(&metadata.file_name)).expect("write to string");
    writeln!(xml, "  <size>").expect("write to string");
    writeln!(xml, "    <width>{}</width>", metadata.width).expect("write to string");
    writeln!(xml, "    <height>{}</height>", metadata.height).expect("write to string");
    writeln!(xml, "    <depth>{}</depth>", metadata.depth).expect("write to string");
    writeln!(xml, "  </size>").expect("write to string");

    for shape in &annotation.shapes {
        render_object(&mut xml, shape, categories, 1)?;
    }

    writeln!(xml, "</annotation>").expect("write to string");
    Ok(xml)
}

fn render_object(
    xml: &mut String,
    shape: &BoundingShapeData,
    categories: &CategoryRegistry,
    level: usize,
) -> Result<(), String> {
    let name = categories.name_of(shape.category).map_err(|err| err.to_string())?;
    if !shape.shape.is_finite() {
        return Err(format!("'{name}' shape has non-finite coordinates"));
    }
    let pad = "  ".repeat(level);

    writeln!(xml, "{pad}<object>").expect("write to string");
    writeln!(xml, "{pad}  <name>{}</name>", xml_escape(name)).expect("write to string");
    match &shape.shape {
        Shape::Box(bbox) => {
            writeln!(xml, "{pad}  <bndbox>").expect("write to string");
            writeln!(xml, "{pad}    <xmin>{}</xmin>", to_pixel(bbox.xmin)).expect("write to string");
            writeln!(xml, "{pad}    <ymin>{}</ymin>", to_pixel(bbox.ymin)).expect("write to string");
            writeln!(xml, "{pad}    <xmax>{}</xmax>", to_pixel(bbox.xmax)).expect("write to string");
            writeln!(xml, "{pad}    <ymax>{}</ymax>", to_pixel(bbox.ymax)).expect("write to string");
            writeln!(xml, "{pad}  </bndbox>").expect("write to string");
        }
        Shape::Polygon { points } => {
            writeln!(xml, "{pad}  <polygon>").expect("write to string");
            for (idx, point) in points.iter().enumerate() {
                let n = idx + 1;
                writeln!(xml, "{pad}    <x{n}>{}</x{n}>", to_pixel(point.x)).expect("write to string");
                writeln!(xml, "{pad}    <y{n}>{}</y{n}>", to_pixel(point.y)).expect("write to string");
            }
            writeln!(xml, "{pad}  </polygon>").expect("write to string");
        }
    }
    for part in &shape.parts {
        render_object(xml, part, categories, level + 1)?;
    }
    writeln!(xml, "{pad}</object>").expect("write to string");
    Ok(())
}

fn to_pixel(value: f64) -> i64 {
    round_half_up(value) as i64
}

fn xml_escape(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

// Reading

#[derive(Debug)]
struct ParsedVocAnnotation {
    metadata: ImageMetaData,
    objects: Vec<ParsedVocObject>,
    warnings: Vec<String>,
}

#[derive(Debug)]
struct ParsedVocObject {
    name: String,
    shape: Shape,
    parts: Vec<ParsedVocObject>,
}

fn import_document(xml: &str, path: &Path, data: &mut ImageAnnotationData) -> Result<Vec<String>, EditorError> {
    let parsed = parse_voc_xml_str(xml, path)?;
    if data.annotation(&parsed.metadata.file_name).is_some() {
        return Err(EditorError::VocXmlParse {
            path: path.to_path_buf(),
            message: format!(
                "duplicate <filename> '{}' found in multiple XML files",
                parsed.metadata.file_name
            ),
        });
    }

    let mut shapes = Vec::with_capacity(parsed.objects.len());
    for object in parsed.objects {
        shapes.push(resolve_object(object, data)?);
    }
    data.insert_annotation(ImageAnnotation::new(parsed.metadata).with_shapes(shapes))?;
    Ok(parsed.warnings)
}

fn resolve_object(object: ParsedVocObject, data: &mut ImageAnnotationData) -> Result<BoundingShapeData, EditorError> {
    let category = data.get_or_create_category(&object.name)?;
    let mut parts = Vec::with_capacity(object.parts.len());
    for part in object.parts {
        parts.push(resolve_object(part, data)?);
    }
    Ok(BoundingShapeData::new(category, object.shape).with_parts(parts))
}

fn parse_voc_xml_str(xml: &str, path: &Path) -> Result<ParsedVocAnnotation, EditorError> {
    let document = roxmltree::Document::parse(xml).map_err(|source| EditorError::VocXmlParse {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;

    let annotation = document.root_element();
    if annotation.tag_name().name() != "annotation" {
        return Err(EditorError::VocXmlParse {
            path: path.to_path_buf(),
            message: "missing <annotation> root element".to_string(),
        });
    }

    let file_name = optional_child_text(annotation, "filename").ok_or_else(|| EditorError::VocXmlParse {
        path: path.to_path_buf(),
        message: "missing <filename> in <annotation>".to_string(),
    })?;
    let folder_name = optional_child_text(annotation, "folder").unwrap_or_default();

    let mut warnings = Vec::new();
    let mut metadata = ImageMetaData::unknown(file_name, folder_name);
    match child_element(annotation, "size") {
        Some(size) => {
            metadata.width = parse_dimension(size, "width", &mut warnings);
            metadata.height = parse_dimension(size, "height", &mut warnings);
            metadata.depth = parse_dimension(size, "depth", &mut warnings);
        }
        None => warnings.push("missing <size>; image dimensions unknown".to_string()),
    }

    let mut objects = Vec::new();
    for child in annotation.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "object" => {
                if let Some(object) = parse_object(child, "<annotation>", 1, &mut warnings) {
                    objects.push(object);
                }
            }
            "folder" | "filename" | "size" => {}
            tag if IGNORED_ELEMENTS.contains(&tag) => {}
            tag => warnings.push(format!("ignoring unknown element <{tag}> in <annotation>")),
        }
    }

    Ok(ParsedVocAnnotation {
        metadata,
        objects,
        warnings,
    })
}

fn parse_object(
    node: Node<'_, '_>,
    context: &str,
    depth: usize,
    warnings: &mut Vec<String>,
) -> Option<ParsedVocObject> {
    let line = node.document().text_pos_at(node.range().start).row;
    let Some(name) = optional_child_text(node, "name") else {
        warnings.push(format!("skipping <{}> without <name> in {context} (line {line})", node.tag_name().name()));
        return None;
    };
    let object_context = format!("<object> '{name}'");

    let mut shape = None;
    let mut parts = Vec::new();
    for child in node.children().filter(Node::is_element) {
        match child.tag_name().name() {
            "name" => {}
            "bndbox" if shape.is_none() => match parse_bndbox(child) {
                Ok(bbox) => shape = Some(Shape::Box(bbox)),
                Err(message) => warnings.push(format!("{object_context} (line {line}): {message}")),
            },
            "polygon" if shape.is_none() => match parse_polygon(child) {
                Ok(points) => shape = Some(Shape::Polygon { points }),
                Err(message) => warnings.push(format!("{object_context} (line {line}): {message}")),
            },
            "bndbox" | "polygon" => warnings.push(format!(
                "{object_context} (line {line}): ignoring extra <{}>",
                child.tag_name().name()
            )),
            "object" | "part" if depth >= MAX_OBJECT_DEPTH => warnings.push(format!(
                "{object_context} (line {line}): skipping <{}> nested deeper than {MAX_OBJECT_DEPTH} levels",
                child.tag_name().name()
            )),
            "object" | "part" => {
                if let Some(part) = parse_object(child, &object_context, depth + 1, warnings) {
                    parts.push(part);
                }
            }
            tag if IGNORED_ELEMENTS.contains(&tag) => {}
            tag => warnings.push(format!("ignoring unknown element <{tag}> in {object_context}")),
        }
    }

    let Some(shape) = shape else {
        warnings.push(format!(
            "skipping {object_context} in {context} (line {line}): no usable <bndbox> or <polygon>"
        ));
        return None;
    };
    Some(ParsedVocObject { name, shape, parts })
}

fn parse_bndbox(node: Node<'_, '_>) -> Result<BoundingBox, String> {
    let coord = |tag: &str| -> Result<f64, String> {
        let raw = optional_child_text(node, tag).ok_or_else(|| format!("missing <{tag}> in <bndbox>"))?;
        parse_coordinate(&raw, tag)
    };
    Ok(BoundingBox::from_xyxy(coord("xmin")?, coord("ymin")?, coord("xmax")?, coord("ymax")?))
}

fn parse_polygon(node: Node<'_, '_>) -> Result<Vec<Point>, String> {
    let mut pairs: BTreeMap<usize, (Option<f64>, Option<f64>)> = BTreeMap::new();
    for child in node.children().filter(Node::is_element) {
        let tag = child.tag_name().name();
        let (is_x, index) = if let Some(index) = tag.strip_prefix('x') {
            (true, index)
        } else if let Some(index) = tag.strip_prefix('y') {
            (false, index)
        } else {
            return Err(format!("unexpected <{tag}> in <polygon>"));
        };
        let Ok(index) = index.parse::<usize>() else {
            return Err(format!("unexpected <{tag}> in <polygon>"));
        };
        let raw = child.text().map(str::trim).unwrap_or_default();
        let value = parse_coordinate(raw, tag)?;
        let entry = pairs.entry(index).or_default();
        if is_x {
            entry.0 = Some(value);
        } else {
            entry.1 = Some(value);
        }
    }
    if pairs.is_empty() {
        return Err("empty <polygon>".to_string());
    }
    pairs
        .into_iter()
        .map(|(index, pair)| match pair {
            (Some(x), Some(y)) => Ok(Point::new(x, y)),
            _ => Err(format!("polygon vertex {index} is missing a coordinate")),
        })
        .collect()
}

fn parse_coordinate(raw: &str, tag: &str) -> Result<f64, String> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("invalid <{tag}> value '{raw}'; expected a number"))
}

fn parse_dimension(size: Node<'_, '_>, tag: &str, warnings: &mut Vec<String>) -> u32 {
    match optional_child_text(size, tag) {
        Some(raw) => raw.parse::<u32>().unwrap_or_else(|_| {
            warnings.push(format!("invalid <{tag}> value '{raw}' in <size>; treating as unknown"));
            0
        }),
        None => {
            warnings.push(format!("missing <{tag}> in <size>; treating as unknown"));
            0
        }
    }
}

fn child_element<'a, 'input>(node: Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children()
        .find(|child| child.is_element() && child.tag_name().name() == tag)
}

fn optional_child_text(node: Node<'_, '_>, tag: &str) -> Option<String> {
    child_element(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(ToOwned::to_owned)
}
