//! Common test infrastructure
//!
//! An in-process mock of the Test Series service, bound to a random local port.
//! Tests should only import from this module.

mod mock_service;

pub use mock_service::{MockBehavior, MockService};

use lumi_api_tester::parser::{parse_suite_content, Suite};
use std::path::Path;

/// Parse an inline suite, panicking on bad YAML
pub fn suite(yaml: &str) -> Suite {
    parse_suite_content(yaml, Path::new("inline.yaml")).expect("inline suite parses")
}
