pub mod json;
pub mod junit;
pub mod reporter;
pub mod types;

pub use reporter::Reporter;
pub use types::{CategoryResults, CheckResult, RunReport, RunSummary};

use anyhow::{Context, Result};
use std::path::Path;

/// Re-render a saved `results.json`
pub fn generate_report(results_path: &Path, format: &str, output: Option<&Path>) -> Result<()> {
    let report = json::load(results_path)?;

    match format {
        "json" => json::generate(&report, output),
        "junit" => {
            let xml = junit::generate_junit_xml(&report)?;
            match output {
                Some(path) => {
                    std::fs::write(path, xml)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("JUnit report saved to: {}", path.display());
                }
                None => println!("{}", xml),
            }
            Ok(())
        }
        "summary" => {
            reporter::print_summary(&report.categories, &report.summary);
            Ok(())
        }
        _ => anyhow::bail!("Unknown format: {}", format),
    }
}

/// Write the requested report formats (`json`, `junit`) into `output_dir`
pub fn write_reports(report: &RunReport, output_dir: &Path, formats: &[String]) -> Result<()> {
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    for format in formats {
        match format.as_str() {
            "json" => json::generate(report, Some(&output_dir.join("results.json")))?,
            "junit" => junit::write_report(report, output_dir)?,
            other => log::warn!("Skipping unknown report format: {}", other),
        }
    }
    Ok(())
}
