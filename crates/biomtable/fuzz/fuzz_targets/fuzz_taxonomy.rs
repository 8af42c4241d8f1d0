//! Fuzz target for the taxonomy decoder.
//!
//! Input bytes are split on `;` into levels. The decoder must never panic,
//! must always produce all seven clades plus the composite, and the composite
//! must always have seven `;`-separated slots.

#![no_main]

use libfuzzer_sys::fuzz_target;
use biomtable::taxonomy::{decode_levels, Clade, TAXONOMY_KEY};

fuzz_target!(|data: &[u8]| {
    let lossy = String::from_utf8_lossy(data);
    let levels: Vec<&str> = lossy.split(';').collect();

    let decoded = decode_levels(&levels);
    assert_eq!(decoded.len(), Clade::ALL.len() + 1);

    // Levels containing ';' can't occur after splitting, so slots stay aligned.
    let composite = &decoded[TAXONOMY_KEY];
    assert_eq!(composite.split(';').count(), Clade::ALL.len());
});
