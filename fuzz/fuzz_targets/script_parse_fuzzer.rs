//! Fuzz target for the replay script parser
//!
//! # Strategy
//!
//! - Arbitrary UTF-8 scripts, including partial commands and odd whitespace
//!
//! # Invariants
//!
//! - Parsing never panics
//! - Parsed line numbers are strictly increasing and within the script
//! - Each parsed line parses to the same command on its own

#![no_main]

use hibernation_runtime::script::{parse_line, parse_script};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|script: &str| {
    let Ok(lines) = parse_script(script) else {
        return;
    };

    let source: Vec<&str> = script.lines().collect();
    let mut previous = 0;
    for parsed in &lines {
        assert!(parsed.line > previous, "line numbers must increase");
        assert!(parsed.line <= source.len(), "line number past end of script");
        previous = parsed.line;

        let again = parse_line(parsed.line, source[parsed.line - 1]);
        assert_eq!(again, Ok(Some(parsed.command.clone())));
    }
});
