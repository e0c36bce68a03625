//! Image header metadata.
//!
//! Only the header of an image file is read: width and height through
//! `imagesize`, channel depth through the `image` decoder, which parses the
//! header on construction and leaves pixel data untouched.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use image::ImageDecoder;
use walkdir::WalkDir;

use super::annotation::{ImageAnnotation, ImageAnnotationData};
use crate::error::EditorError;

/// File extensions picked up by [`scan_image_folder`].
pub const IMAGE_EXTENSIONS: &[&str] = &["bmp", "gif", "jpeg", "jpg", "png", "tif", "tiff", "webp"];

/// Metadata describing one image file.
///
/// `width`, `height` and `depth` are `0` when they could not be determined;
/// check [`has_known_dimensions`](Self::has_known_dimensions) before using them.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageMetaData {
    /// File name of the image, without directories.
    pub file_name: String,

    /// Name of the directory containing the image.
    #[serde(default)]
    pub folder_name: String,

    #[serde(default)]
    pub width: u32,

    #[serde(default)]
    pub height: u32,

    /// Number of color channels (1 = gray, 3 = RGB, 4 = RGBA).
    #[serde(default)]
    pub depth: u32,
}

impl ImageMetaData {
    /// Creates metadata with known dimensions.
    pub fn new(
        file_name: impl Into<String>,
        folder_name: impl Into<String>,
        width: u32,
        height: u32,
        depth: u32,
    ) -> Self {
        Self {
            file_name: file_name.into(),
            folder_name: folder_name.into(),
            width,
            height,
            depth,
        }
    }

    /// Creates metadata for an image whose dimensions are unknown.
    pub fn unknown(file_name: impl Into<String>, folder_name: impl Into<String>) -> Self {
        Self::new(file_name, folder_name, 0, 0, 0)
    }

    /// Returns false when width or height hold the zero sentinel.
    pub fn has_known_dimensions(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Reads metadata from an image file, logging instead of failing.
    ///
    /// See [`read_image_metadata`] to receive the warning.
    pub fn from_file(path: &Path) -> Self {
        let (metadata, warning) = read_image_metadata(path);
        if let Some(warning) = warning {
            log::warn!("{warning}");
        }
        metadata
    }
}

/// A metadata field that could not be read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataWarning {
    pub path: PathBuf,
    pub message: String,
}

impl fmt::Display for MetadataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path.display(), self.message)
    }
}

/// Reads image metadata without decoding pixels.
///
/// Never fails: unreadable or unsupported files yield zero dimensions plus
/// a warning. If the size can be read but the channel layout cannot, the
/// size is kept and only `depth` falls back to `0`.
pub fn read_image_metadata(path: &Path) -> (ImageMetaData, Option<MetadataWarning>) {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let folder_name = path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    let warning = |message: String| {
        Some(MetadataWarning {
            path: path.to_path_buf(),
            message,
        })
    };

    let (width, height) = match read_dimensions(path) {
        Ok(dims) => dims,
        Err(message) => {
            return (ImageMetaData::unknown(file_name, folder_name), warning(message));
        }
    };

    match read_channel_depth(path) {
        Ok(depth) => (
            ImageMetaData::new(file_name, folder_name, width, height, depth),
            None,
        ),
        Err(message) => (
            ImageMetaData::new(file_name, folder_name, width, height, 0),
            warning(message),
        ),
    }
}

fn read_dimensions(path: &Path) -> Result<(u32, u32), String> {
    let size = imagesize::size(path).map_err(|source| format!("could not read image size: {source}"))?;

    let width: u32 = size
        .width
        .try_into()
        .map_err(|_| format!("image width {} does not fit in u32", size.width))?;
    let height: u32 = size
        .height
        .try_into()
        .map_err(|_| format!("image height {} does not fit in u32", size.height))?;

    Ok((width, height))
}

fn read_channel_depth(path: &Path) -> Result<u32, String> {
    let decoder = image::ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|source| format!("could not open image: {source}"))?
        .into_decoder()
        .map_err(|source| format!("could not read channel layout: {source}"))?;

    Ok(u32::from(decoder.color_type().channel_count()))
}

/// Builds a project with one empty annotation per image found in `dir`.
///
/// The scan is flat (subdirectories are ignored) and ordered by file name.
/// Images whose metadata cannot be read are still included, with zero
/// dimensions, and their warnings are returned alongside.
pub fn scan_image_folder(
    dir: &Path,
) -> Result<(ImageAnnotationData, Vec<MetadataWarning>), EditorError> {
    if !dir.is_dir() {
        return Err(EditorError::SourceInvalid {
            path: dir.to_path_buf(),
            message: "image folder must be a directory".to_string(),
        });
    }

    let mut data = ImageAnnotationData::new();
    let mut warnings = Vec::new();

    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|source| EditorError::SourceInvalid {
            path: dir.to_path_buf(),
            message: format!("failed while listing image folder: {source}"),
        })?;

        if !entry.file_type().is_file() || !is_image_file(entry.path()) {
            continue;
        }

        let (metadata, warning) = read_image_metadata(entry.path());
        if let Some(warning) = warning {
            log::warn!("{warning}");
            warnings.push(warning);
        }
        data.insert_annotation(ImageAnnotation::new(metadata))?;
    }

    log::info!(
        "Scanned {} image(s) in {:?} ({} metadata warning(s))",
        data.len(),
        dir,
        warnings.len()
    );

    Ok((data, warnings))
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    // Minimal 24-bit BMP header for a `width` x `height` image.
    fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
        let row_stride = (width * 3).div_ceil(4) * 4;
        let pixel_array_size = row_stride * height;
        let file_size = 54 + pixel_array_size;

        let mut bytes = Vec::with_capacity(file_size as usize);
        bytes.extend_from_slice(b"BM");
        bytes.extend_from_slice(&file_size.to_le_bytes());
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(&54u32.to_le_bytes());
        bytes.extend_from_slice(&40u32.to_le_bytes());
        bytes.extend_from_slice(&(width as i32).to_le_bytes());
        bytes.extend_from_slice(&(height as i32).to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&24u16.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&pixel_array_size.to_le_bytes());
        bytes.extend_from_slice(&2835u32.to_le_bytes());
        bytes.extend_from_slice(&2835u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.resize(file_size as usize, 0);
        bytes
    }

    #[test]
    fn reads_bmp_header() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let dir = temp.path().join("frames");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join("one.bmp");
        fs::write(&path, bmp_bytes(7, 5)).unwrap();

        let (metadata, warning) = read_image_metadata(&path);
        assert!(warning.is_none(), "unexpected warning: {warning:?}");
        assert_eq!(metadata, ImageMetaData::new("one.bmp", "frames", 7, 5, 3));
        assert!(metadata.has_known_dimensions());
    }

    #[test]
    fn unsupported_file_yields_zero_sentinel() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let path = temp.path().join("notes.png");
        fs::write(&path, b"definitely not an image").unwrap();

        let (metadata, warning) = read_image_metadata(&path);
        assert_eq!((metadata.width, metadata.height, metadata.depth), (0, 0, 0));
        assert_eq!(metadata.file_name, "notes.png");
        assert!(!metadata.has_known_dimensions());
        assert_eq!(warning.expect("warning recorded").path, path);
    }

    #[test]
    fn missing_file_yields_zero_sentinel() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let metadata = ImageMetaData::from_file(&temp.path().join("gone.jpg"));
        assert!(!metadata.has_known_dimensions());
    }

    #[test]
    fn scan_skips_non_images_and_subdirectories() {
        let temp = tempfile::tempdir().expect("create temp dir");
        fs::write(temp.path().join("b.bmp"), bmp_bytes(4, 4)).unwrap();
        fs::write(temp.path().join("a.BMP"), bmp_bytes(2, 3)).unwrap();
        fs::write(temp.path().join("readme.txt"), "hi").unwrap();
        fs::write(temp.path().join("broken.jpg"), "nope").unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/c.bmp"), bmp_bytes(1, 1)).unwrap();

        let (data, warnings) = scan_image_folder(temp.path()).expect("scan folder");
        let names: Vec<_> = data.image_names().collect();
        assert_eq!(names, vec!["a.BMP", "b.bmp", "broken.jpg"]);
        assert_eq!(warnings.len(), 1);
        assert_eq!(data.annotation("a.BMP").unwrap().metadata.width, 2);
    }

    #[test]
    fn scan_rejects_missing_directory() {
        let temp = tempfile::tempdir().expect("create temp dir");
        let result = scan_image_folder(&temp.path().join("missing"));
        assert!(matches!(result, Err(EditorError::SourceInvalid { .. })));
    }
}
