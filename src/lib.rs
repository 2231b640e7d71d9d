pub mod client;
pub mod parser;
pub mod report;
pub mod runner;
pub mod utils;

// Re-export common items
pub use client::{ApiTransport, HttpClient};
pub use report::generate_report;
pub use runner::{run_suite, RunOptions, ScenarioFilter};
pub use utils::config::Config;
