//! Fuzz target for VOC XML parsing.
//!
//! This fuzzer feeds arbitrary byte sequences to the VOC XML parser,
//! checking for panics, crashes, or hangs.

#![no_main]

use bbox_editor::io::pascal_voc::from_voc_xml_slice;
use bbox_editor::model::ImageAnnotationData;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Cap input size to avoid excessive memory usage.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let mut project = ImageAnnotationData::new();
    if from_voc_xml_slice(data, &mut project).is_ok() {
        assert_eq!(project.statistics(), &project.recount());
    }
});
