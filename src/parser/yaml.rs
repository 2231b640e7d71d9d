use super::types::Suite;
use super::SuiteError;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

/// Scenario table compiled into the binary
const DEFAULT_SUITE: &str = include_str!("../../suites/default.yaml");

/// Built-in suite covering the whole Test Series API
pub fn default_suite() -> Result<Suite> {
    parse_suite_content(DEFAULT_SUITE, Path::new("<built-in>"))
}

/// Parse a YAML suite file
pub fn parse_suite_file(path: &Path) -> Result<Suite> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    parse_suite_content(&content, path)
}

/// Parse YAML content into a Suite
pub fn parse_suite_content(content: &str, source_path: &Path) -> Result<Suite> {
    let mut suite: Suite = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid suite YAML: {}", source_path.display()))?;

    if suite.name.is_empty() {
        suite.name = source_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("suite")
            .to_string();
    }
    Ok(suite)
}

/// Load a suite from a file, or every `*.yaml`/`*.yml` under a directory merged
/// in path order. `None` loads the built-in suite.
pub fn load_suite(path: Option<&Path>) -> Result<Suite> {
    let path = match path {
        Some(p) => p,
        None => return default_suite(),
    };

    if !path.is_dir() {
        return parse_suite_file(path);
    }

    let mut files: Vec<PathBuf> = walkdir::WalkDir::new(path)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| {
            e.path()
                .extension()
                .map_or(false, |ext| ext == "yaml" || ext == "yml")
        })
        .map(|e| e.path().to_path_buf())
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No suite files found in {}", path.display());
    }

    let mut merged = Suite {
        name: path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("suite")
            .to_string(),
        scenarios: Vec::new(),
    };
    for file in &files {
        let suite = parse_suite_file(file)?;
        log::debug!(
            "Loaded {} scenarios from {}",
            suite.scenarios.len(),
            file.display()
        );
        merged.scenarios.extend(suite.scenarios);
    }
    Ok(merged)
}

/// Structural checks that do not need the service: every scenario has steps,
/// every step has a status expectation, every field check has a rule and every
/// actor is configured.
pub fn validate_suite(suite: &Suite, known_actors: &[String]) -> Result<(), SuiteError> {
    if suite.scenarios.is_empty() {
        return Err(SuiteError::Empty(suite.name.clone()));
    }

    for scenario in &suite.scenarios {
        if scenario.name.trim().is_empty() {
            return Err(SuiteError::UnnamedScenario);
        }
        if scenario.category.trim().is_empty() {
            return Err(SuiteError::MissingCategory(scenario.name.clone()));
        }
        if scenario.steps.is_empty() {
            return Err(SuiteError::NoSteps(scenario.name.clone()));
        }

        for step in &scenario.steps {
            if step.expect.status.is_empty() {
                return Err(SuiteError::NoStatus {
                    scenario: scenario.name.clone(),
                    step: step.name.clone(),
                });
            }
            if step.body.is_some() && step.multipart.is_some() {
                return Err(SuiteError::BodyAndMultipart {
                    scenario: scenario.name.clone(),
                    step: step.name.clone(),
                });
            }
            if let Some(check) = step.expect.fields.iter().find(|c| !c.has_rule()) {
                return Err(SuiteError::EmptyFieldCheck {
                    scenario: scenario.name.clone(),
                    step: step.name.clone(),
                    path: check.path.clone(),
                });
            }
            if let Some(actor) = &step.actor {
                if !known_actors.contains(actor) {
                    return Err(SuiteError::UnknownActor {
                        scenario: scenario.name.clone(),
                        step: step.name.clone(),
                        actor: actor.clone(),
                    });
                }
            }
        }
    }
    Ok(())
}
