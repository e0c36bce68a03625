//! Fuzz target for SIMPLE project parsing.

#![no_main]

use bbox_editor::io::simple::{from_simple_slice, from_simple_str, to_simple_string};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    // Anything that loads must save and load back to the same project.
    if let Ok(project) = from_simple_slice(data) {
        if let Ok(json) = to_simple_string(&project) {
            let reloaded = from_simple_str(&json).expect("saved project reloads");
            assert_eq!(reloaded, project);
        }
    }
});
