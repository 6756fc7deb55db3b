#![no_main]

//! Parsing arbitrary text never panics, and serialization is lossless.

use libfuzzer_sys::fuzz_target;
use pwaify_inject::{parse_document, to_html};

fuzz_target!(|data: &[u8]| {
    let Ok(s) = std::str::from_utf8(data) else { return };
    if let Ok(doc) = parse_document(s) {
        assert_eq!(to_html(&doc), s);
    }
});
