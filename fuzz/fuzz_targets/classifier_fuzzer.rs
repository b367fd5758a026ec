//! Fuzz target for failure classification
//!
//! # Strategy
//!
//! - Arbitrary descriptions, optionally wrapped in remote hops
//!
//! # Invariants
//!
//! - Classification never panics
//! - Remote hops never change the class of a description
//! - Do-not-log wins over tunneled

#![no_main]

use arbitrary::Arbitrary;
use hibernation_core::{DescriptionClassifier, ErrorClassifier, FailureClass};
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input {
    hops: u8,
    description: String,
}

fuzz_target!(|input: Input| {
    let classifier = DescriptionClassifier::new();
    let class = classifier.classify(&input.description);

    let wrapped = format!("{}{}", "remote.".repeat(usize::from(input.hops % 8)), input.description);
    assert_eq!(classifier.classify(&wrapped), class);

    if classifier.is_do_not_log(&input.description) {
        assert_eq!(class, FailureClass::DoNotLog);
    } else if classifier.is_tunneled(&input.description) {
        assert_eq!(class, FailureClass::Tunneled);
    } else {
        assert_eq!(class, FailureClass::Uncategorized);
    }
});
