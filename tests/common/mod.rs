#![allow(dead_code)]

use std::fs;
use std::path::Path;

use bbox_editor::model::{BoundingBox, BoundingShapeData, Color, ImageAnnotationData, ImageMetaData, Point};

pub fn bmp_bytes(width: u32, height: u32) -> Vec<u8> {
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

pub fn write_bmp(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent dir");
    }
    fs::write(path, bmp_bytes(width, height)).expect("write bmp file");
}

pub fn image_name(idx: usize) -> String {
    format!("img{idx:02}.jpg")
}

/// A project with `images` images named `img01.jpg`.., each holding a car
/// with a wheel polygon as nested part and a loose person box.
pub fn sample_project(images: usize) -> ImageAnnotationData {
    let mut data = ImageAnnotationData::new();
    let car = data.add_category("car", Color::rgb(230, 25, 75)).expect("add car");
    let wheel = data.add_category("wheel", Color::rgba(60, 180, 75, 128)).expect("add wheel");
    let person = data.add_category("person", Color::rgb(0, 130, 200)).expect("add person");

    for idx in 1..=images {
        let name = image_name(idx);
        let offset = idx as f64 * 10.25;
        data.add_image(ImageMetaData::new(name.clone(), "images", 640, 480, 3));
        data.add_shape(
            &name,
            BoundingShapeData::new_box(car, BoundingBox::from_xyxy(offset, 20.5, offset + 200.0, 180.75)).with_part(
                BoundingShapeData::new_polygon(
                    wheel,
                    vec![
                        Point::new(offset + 10.0, 150.0),
                        Point::new(offset + 40.0, 150.0),
                        Point::new(offset + 25.0, 178.3),
                    ],
                ),
            ),
        )
        .expect("add car");
        data.add_shape(
            &name,
            BoundingShapeData::new_box(person, BoundingBox::from_xyxy(300.0, 40.0, 350.0 + offset, 300.0)),
        )
        .expect("add person");
    }
    data
}
