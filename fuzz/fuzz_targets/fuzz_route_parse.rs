//! Fuzz target: HTTP route parser
//!
//! Arbitrary request URIs must map to some route without panicking; the
//! beeper count only ever comes from a `count=` argument, and a file path
//! never climbs out of the data partition.
//!
//! cargo fuzz run fuzz_route_parse

#![no_main]

use libfuzzer_sys::fuzz_target;
use powermeter::api::{Method, Route};

fuzz_target!(|data: &[u8]| {
    let Ok(uri) = core::str::from_utf8(data) else {
        return;
    };
    for method in [Method::Get, Method::Post, Method::Other] {
        match Route::parse(method, uri) {
            Route::Beeper { count: Some(_) } => {
                assert_eq!(method, Method::Post);
                assert!(uri.contains("count="));
            }
            Route::File { path } => {
                assert_eq!(method, Method::Get);
                assert!(!path.starts_with('/'));
                assert!(path.split('/').all(|seg| seg != ".."));
            }
            _ => {}
        }
    }
});
