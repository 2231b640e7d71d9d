pub mod assertions;
pub mod context;
pub mod executor;
pub mod session;

use crate::client::{ApiTransport, HttpClient};
use crate::parser::{validate_suite, Scenario, Suite};
use crate::report::{self, Reporter};
use crate::utils::config::Config;
use anyhow::{Context, Result};
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

pub use context::RunContext;
pub use executor::ScenarioExecutor;
pub use session::{AuthError, SessionStore};

/// Category every actor setup result is recorded under
pub const SETUP_CATEGORY: &str = "setup";

/// Which scenarios of a suite to run
#[derive(Debug, Clone, Default)]
pub struct ScenarioFilter {
    /// Exact category names; empty selects all
    pub categories: Vec<String>,

    /// Case-insensitive substring of the scenario name
    pub name: Option<String>,

    /// Scenario must carry at least one of these tags; empty selects all
    pub tags: Vec<String>,
}

impl ScenarioFilter {
    pub fn matches(&self, scenario: &Scenario) -> bool {
        let category_ok =
            self.categories.is_empty() || self.categories.iter().any(|c| *c == scenario.category);
        let name_ok = self.name.as_ref().map_or(true, |needle| {
            scenario.name.to_lowercase().contains(&needle.to_lowercase())
        });
        let tags_ok = self.tags.is_empty() || self.tags.iter().any(|t| scenario.tags.contains(t));
        category_ok && name_ok && tags_ok
    }

    /// Matching scenarios, in declared order
    pub fn select(&self, suite: &Suite) -> Suite {
        Suite {
            name: suite.name.clone(),
            scenarios: suite
                .scenarios
                .iter()
                .filter(|s| self.matches(s))
                .cloned()
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub filter: ScenarioFilter,

    /// Directory for report files; nothing is written when `None`
    pub output: Option<PathBuf>,

    /// Report formats to write (`json`, `junit`)
    pub reports: Vec<String>,
}

fn new_run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Run the selected scenarios against the configured service.
///
/// Returns `Ok(true)` only when every recorded check passed. Errors are
/// reserved for problems found before anything is sent (bad suite, empty
/// selection) and for report files that cannot be written.
pub async fn run_suite(config: &Config, suite: &Suite, options: &RunOptions) -> Result<bool> {
    validate_suite(suite, &config.actor_names()).context("Suite failed validation")?;

    let selected = options.filter.select(suite);
    if selected.scenarios.is_empty() {
        anyhow::bail!("No scenarios match the given filters");
    }

    let client = HttpClient::new(&config.base_url, Duration::from_secs(config.timeout_secs))?;
    let run_id = new_run_id();

    println!(
        "{} Running {} scenario(s) from '{}' against {}",
        "▶".green().bold(),
        selected.scenarios.len(),
        selected.name,
        config.base_url.cyan()
    );
    println!("  Run: {}", run_id.cyan());

    let mut reporter = Reporter::new(&run_id);
    let mut ctx = RunContext::new(&run_id, &config.vars);
    execute(&client, config, &selected, &mut ctx, &mut reporter).await;

    let success = reporter.summarize();

    if let Some(output) = &options.output {
        if !options.reports.is_empty() {
            let report = reporter.to_report(&config.base_url);
            report::write_reports(&report, output, &options.reports)?;
        }
    }

    Ok(success)
}

/// Authenticate the actors `suite` needs, then run every scenario in order.
///
/// When actors were needed and none could be authenticated no scenario runs;
/// the setup failures already recorded fail the run.
pub async fn execute(
    transport: &dyn ApiTransport,
    config: &Config,
    suite: &Suite,
    ctx: &mut RunContext,
    reporter: &mut Reporter,
) {
    let referenced = suite.referenced_actors();
    let required: Vec<&String> = config
        .actors
        .keys()
        .filter(|name| referenced.contains(name))
        .collect();

    let mut sessions = SessionStore::new();
    if !required.is_empty() {
        println!("\n{} Setting up {} actor(s)", "■".blue().bold(), required.len());
    }
    for name in &required {
        let Some(profile) = config.actors.get(name.as_str()) else {
            continue;
        };
        let test_name = format!("{} token setup", name);
        match sessions
            .login_or_register(transport, name, profile, ctx)
            .await
        {
            Ok(_) => {
                let session = sessions.session(name);
                let how = if session.map_or(false, |s| s.registered) {
                    "registered and logged in"
                } else {
                    "logged in"
                };
                let username = session.map(|s| s.username.as_str()).unwrap_or_default();
                reporter.record(
                    SETUP_CATEGORY,
                    &test_name,
                    true,
                    &format!("{} as {} ({})", how, username, profile.role.as_str()),
                );
            }
            Err(err) => reporter.record(SETUP_CATEGORY, &test_name, false, &err.to_string()),
        }
    }

    if !required.is_empty() && sessions.authenticated_count() == 0 {
        log::error!("No actor could be authenticated, skipping all scenarios");
        println!(
            "{} No actor could be authenticated; scenarios were not run",
            "✗".red().bold()
        );
        return;
    }

    let executor = ScenarioExecutor::new(transport, &sessions);
    for scenario in &suite.scenarios {
        println!("\n{} {}", "▸".cyan(), scenario.name.bold());
        executor.run_scenario(scenario, ctx, reporter).await;
    }
}

/// Print scenarios grouped by category, in declared order
pub fn list_scenarios(suite: &Suite, filter: &ScenarioFilter) {
    let selected = filter.select(suite);
    let mut categories: Vec<&str> = Vec::new();
    for scenario in &selected.scenarios {
        if !categories.contains(&scenario.category.as_str()) {
            categories.push(&scenario.category);
        }
    }

    for category in categories {
        println!("{}", category.bold());
        for scenario in selected.scenarios.iter().filter(|s| s.category == category) {
            println!("{}", scenario_line(scenario));
            if let Some(description) = &scenario.description {
                println!("      {}", description.dimmed());
            }
        }
    }
    println!(
        "\n{} scenario(s), {} step(s)",
        selected.scenarios.len(),
        selected.scenarios.iter().map(|s| s.steps.len()).sum::<usize>()
    );
}

fn scenario_line(scenario: &Scenario) -> String {
    let mut line = format!("  {} ({} steps)", scenario.name, scenario.steps.len());
    if !scenario.tags.is_empty() {
        line.push_str(&format!(" [{}]", scenario.tags.join(", ")));
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::ScriptedTransport;
    use crate::client::ApiResponse;
    use crate::parser::parse_suite_content;
    use serde_json::json;
    use std::path::Path;

    const SUITE: &str = r#"
name: mini
scenarios:
  - name: Public Categories
    category: categories
    tags: [smoke]
    steps:
      - name: list
        method: GET
        path: categories
        expect: { status: 200, fields: [{ path: "", isArray: true }] }
  - name: Student Analytics Forbidden
    category: admin
    description: Analytics are for admins and teachers
    steps:
      - name: analytics
        actor: student
        method: GET
        path: analytics
        expect: { status: 403 }
"#;

    fn suite() -> Suite {
        parse_suite_content(SUITE, Path::new("mini.yaml")).unwrap()
    }

    #[test]
    fn test_filter_by_category_name_and_tag() {
        let suite = suite();

        let by_category = ScenarioFilter {
            categories: vec!["admin".into()],
            ..Default::default()
        };
        assert_eq!(by_category.select(&suite).scenarios[0].name, "Student Analytics Forbidden");

        let by_name = ScenarioFilter {
            name: Some("public".into()),
            ..Default::default()
        };
        assert_eq!(by_name.select(&suite).scenarios.len(), 1);

        let by_tag = ScenarioFilter {
            tags: vec!["smoke".into(), "slow".into()],
            ..Default::default()
        };
        assert_eq!(by_tag.select(&suite).scenarios[0].category, "categories");

        assert_eq!(ScenarioFilter::default().select(&suite).scenarios.len(), 2);
    }

    #[test]
    fn test_scenario_line_shows_steps_and_tags() {
        let suite = suite();
        assert_eq!(
            scenario_line(&suite.scenarios[0]),
            "  Public Categories (1 steps) [smoke]"
        );
        assert_eq!(
            scenario_line(&suite.scenarios[1]),
            "  Student Analytics Forbidden (1 steps)"
        );
        assert_eq!(
            suite.scenarios[1].description.as_deref(),
            Some("Analytics are for admins and teachers")
        );
    }

    #[test]
    fn test_run_id_is_short_hex() {
        let id = new_run_id();
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_only_referenced_actors_are_set_up() {
        let transport = ScriptedTransport::new(vec![
            Ok(ApiResponse::with_json(
                200,
                json!({ "token": "s-tok", "user": { "userId": "u-s", "role": "student" } }),
            )),
            Ok(ApiResponse::with_json(200, json!([{ "categoryId": "c1" }]))),
            Ok(ApiResponse::with_json(403, json!({ "error": "Access denied" }))),
        ]);
        let config = Config::default();
        let mut ctx = RunContext::new("r1", &config.vars);
        let mut reporter = Reporter::new("r1");

        execute(&transport, &config, &suite(), &mut ctx, &mut reporter).await;

        let calls = transport.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].path, "auth/login");
        assert_eq!(calls[0].body.as_ref().unwrap()["username"], "lumi_student_r1");
        assert_eq!(calls[2].token.as_deref(), Some("s-tok"));

        let names: Vec<&str> = reporter.categories().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["setup", "categories", "admin"]);
        assert!(reporter.summarize());
    }

    #[tokio::test]
    async fn test_no_authenticated_actor_skips_scenarios() {
        let transport = ScriptedTransport::new(vec![Ok(ApiResponse::with_json(
            500,
            json!({ "error": "Login failed" }),
        ))]);
        let config = Config::default();
        let mut ctx = RunContext::new("r1", &config.vars);
        let mut reporter = Reporter::new("r1");

        execute(&transport, &config, &suite(), &mut ctx, &mut reporter).await;

        assert_eq!(transport.calls().len(), 1);
        assert_eq!(reporter.categories().len(), 1);
        let setup = &reporter.categories()[0];
        assert_eq!(setup.name, SETUP_CATEGORY);
        assert_eq!(setup.failed, 1);
        assert!(setup.results[0].message.contains("Login failed"));
        assert!(!reporter.summarize());
    }
}
