//! Fuzz target for annotation tree edits.
//!
//! Random insert/remove/reassign sequences must keep the tree consistent.

#![no_main]

use bbox_editor::tree::fuzz_edit_session;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 64 * 1024 {
        return;
    }

    if let Err(message) = fuzz_edit_session(data) {
        panic!("{message}");
    }
});
