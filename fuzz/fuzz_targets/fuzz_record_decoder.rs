//! Fuzz testing for the partition line decoder.
//!
//! Feeds arbitrary text through `DistanceRecord::decode` and the streaming
//! `RecordReader`. Malformed lines must surface as errors, never panics, and
//! every line that does decode must survive an encode/decode cycle unchanged.

#![no_main]

use std::io::Cursor;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use cityblock::record::{DistanceRecord, RecordReader};

#[derive(Debug, Arbitrary)]
struct DecoderInput {
    line: String,
    stream: Vec<u8>,
}

fuzz_target!(|input: DecoderInput| {
    if let Ok(record) = DistanceRecord::decode(&input.line, 1) {
        assert!(record.distance.is_finite() && record.distance >= 0.0);

        let mut encoded = String::new();
        record.encode_into(&mut encoded);
        let again = DistanceRecord::decode(&encoded, 1).expect("re-decode failed");
        assert_eq!(again, record);
    }

    let mut reader = RecordReader::new(Cursor::new(input.stream));
    while let Ok(Some(entry)) = reader.next_entry() {
        let _ = entry.vector();
    }
});
