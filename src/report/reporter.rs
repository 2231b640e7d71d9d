use super::types::{CategoryResults, CheckResult, RunReport, RunSummary};
use colored::Colorize;
use std::time::Instant;

/// Result aggregate for one run.
///
/// Only `record`/`record_check` mutate it; each call prints one progress line
/// right away so long runs show live output.
pub struct Reporter {
    session_id: String,
    categories: Vec<CategoryResults>,
    started_at: Instant,
    finished_at: Option<Instant>,
}

impl Reporter {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            categories: Vec::new(),
            started_at: Instant::now(),
            finished_at: None,
        }
    }

    pub fn record(&mut self, category: &str, test_name: &str, success: bool, message: &str) {
        let result = if success {
            CheckResult::passed(test_name, message)
        } else {
            CheckResult::failed(test_name, message)
        };
        self.record_check(category, result);
    }

    pub fn record_check(&mut self, category: &str, mut result: CheckResult) {
        if result.success {
            result.response = None;
        }
        print_line(&result);

        let bucket = match self.categories.iter().position(|c| c.name == category) {
            Some(idx) => &mut self.categories[idx],
            None => {
                self.categories.push(CategoryResults::new(category));
                let last = self.categories.len() - 1;
                &mut self.categories[last]
            }
        };
        if result.success {
            bucket.passed += 1;
        } else {
            bucket.failed += 1;
        }
        bucket.results.push(result);
    }

    pub fn categories(&self) -> &[CategoryResults] {
        &self.categories
    }

    pub fn summary(&self) -> RunSummary {
        let (passed, failed) = self
            .categories
            .iter()
            .fold((0, 0), |(p, f), c| (p + c.passed, f + c.failed));

        let end = self.finished_at.unwrap_or_else(Instant::now);
        RunSummary {
            session_id: self.session_id.clone(),
            total_categories: self.categories.len() as u32,
            total_checks: passed + failed,
            passed,
            failed,
            total_duration_ms: Some(end.duration_since(self.started_at).as_millis() as u64),
        }
    }

    /// Freeze the clock, print the breakdown and return whether the run passed
    pub fn summarize(&mut self) -> bool {
        self.finished_at = Some(Instant::now());
        let summary = self.summary();
        print_summary(&self.categories, &summary);
        summary.success()
    }

    pub fn to_report(&self, base_url: &str) -> RunReport {
        RunReport {
            session_id: self.session_id.clone(),
            base_url: base_url.to_string(),
            categories: self.categories.clone(),
            summary: self.summary(),
            generated_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

fn print_line(result: &CheckResult) {
    let duration = result
        .duration_ms
        .map(|d| format!(" ({}ms)", d).dimmed().to_string())
        .unwrap_or_default();

    if result.success {
        println!(
            "  {} {} - {}{}",
            "✓".green(),
            result.test_name,
            result.message,
            duration
        );
    } else {
        println!(
            "  {} {} - {}{}",
            "✗".red(),
            result.test_name.red(),
            result.message,
            duration
        );
        if let Some(snapshot) = &result.response {
            println!("      {}", snapshot.dimmed());
        }
    }
}

/// Category breakdown with every failed check spelled out
pub fn print_summary(categories: &[CategoryResults], summary: &RunSummary) {
    let rule = "=".repeat(72);
    println!("\n{}", rule);
    println!("{} Test run finished: {}", "■".blue().bold(), summary.session_id.cyan());
    println!("{}", rule);

    for category in categories {
        let icon = if category.failed == 0 {
            "✓".green()
        } else {
            "✗".red()
        };
        println!(
            "{} {}: {} passed, {} failed",
            icon,
            category.display_name().bold(),
            category.passed.to_string().green(),
            category.failed.to_string().red()
        );
        for failure in category.failures() {
            println!("   - {}: {}", failure.test_name, failure.message);
        }
    }

    println!("{}", "-".repeat(72));
    println!(
        "  Overall: {} passed, {} failed ({:.1}% success)",
        summary.passed.to_string().green(),
        summary.failed.to_string().red(),
        summary.success_rate()
    );
    if let Some(duration) = summary.total_duration_ms {
        println!("  Duration: {:.2}s", duration as f64 / 1000.0);
    }

    if summary.total_checks == 0 {
        println!("{} No checks were recorded.", "⚠".yellow());
    } else if summary.success() {
        println!("{} All checks passed.", "✅".green().bold());
    } else {
        println!(
            "{} {} check(s) failed. Review the failures above.",
            "❌".red().bold(),
            summary.failed
        );
    }
}
