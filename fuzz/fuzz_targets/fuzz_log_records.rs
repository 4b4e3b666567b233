//! Fuzz target: log file reader
//!
//! The log file can be truncated by a power cut mid-append or edited by
//! hand.  Verifies:
//! - `logbook::records` never panics on arbitrary text
//! - every record it yields formats back to a line that parses to itself
//!
//! cargo fuzz run fuzz_log_records

#![no_main]

use libfuzzer_sys::fuzz_target;
use powermeter::logbook::{self, LogRecord};

fuzz_target!(|data: &[u8]| {
    let Ok(text) = core::str::from_utf8(data) else {
        return;
    };
    for record in logbook::records(text) {
        assert_eq!(LogRecord::parse(&record.to_string()), Ok(record));
    }
});
