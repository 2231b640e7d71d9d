use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Role of a logical test identity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Teacher,
    Student,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "teacher",
            Role::Student => "student",
        }
    }
}

/// Credentials and registration details of one actor.
///
/// String fields are templates, so `lumi_teacher_${run}` yields a fresh account per run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorProfile {
    pub role: Role,
    pub username: String,
    pub password: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    /// Fall back to registration when login reports an unknown user
    #[serde(default = "default_register")]
    pub register: bool,
}

fn default_register() -> bool {
    true
}

impl ActorProfile {
    fn generated(role: Role, key: &str, password: &str, display: &str) -> Self {
        Self {
            role,
            username: format!("lumi_{}_${{run}}", key),
            password: password.to_string(),
            name: Some(display.to_string()),
            email: Some(format!("lumi.{}.${{run}}@gmail.com", key)),
            phone: Some("1234567890".to_string()),
            register: true,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Base URL of the API under test, e.g. `http://localhost:3000/api`
    pub base_url: String,

    /// Per-request timeout
    pub timeout_secs: u64,

    /// Actors by name
    pub actors: BTreeMap<String, ActorProfile>,

    /// Extra template variables visible to every scenario
    pub vars: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut actors = BTreeMap::new();
        actors.insert(
            "admin".to_string(),
            ActorProfile {
                role: Role::Admin,
                username: "admin".to_string(),
                password: "admin123".to_string(),
                name: None,
                email: None,
                phone: None,
                register: false,
            },
        );
        actors.insert(
            "teacher".to_string(),
            ActorProfile::generated(Role::Teacher, "teacher", "teacher123", "Lumi Test Teacher"),
        );
        actors.insert(
            "teacher2".to_string(),
            ActorProfile::generated(Role::Teacher, "teacher2", "teacher123", "Lumi Second Teacher"),
        );
        actors.insert(
            "student".to_string(),
            ActorProfile::generated(Role::Student, "student", "student123", "Lumi Test Student"),
        );

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            actors,
            vars: BTreeMap::new(),
        }
    }
}

/// On-disk config: every key optional, merged over the defaults
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    #[serde(default)]
    actors: BTreeMap<String, ActorProfile>,
    #[serde(default)]
    vars: BTreeMap<String, String>,
}

impl Config {
    /// Defaults, then the optional YAML file, then `LUMI_API_*` environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with(path, |key| std::env::var(key).ok())
    }

    /// `load` with the environment lookup supplied by the caller
    pub fn load_with<F>(path: Option<&Path>, get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(path) = path {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            config.merge_yaml(&content)?;
        }
        config.apply_env_with(get)?;
        Ok(config)
    }

    pub fn merge_yaml(&mut self, content: &str) -> Result<()> {
        let file: ConfigFile = serde_yaml::from_str(content).context("Invalid config YAML")?;
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(secs) = file.timeout_secs {
            self.timeout_secs = secs;
        }
        self.actors.extend(file.actors);
        self.vars.extend(file.vars);
        Ok(())
    }

    pub fn apply_env_with<F>(&mut self, get: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = get("LUMI_API_BASE_URL") {
            self.base_url = url;
        }
        if let Some(secs) = get("LUMI_API_TIMEOUT_SECS") {
            self.timeout_secs = secs
                .parse()
                .with_context(|| format!("LUMI_API_TIMEOUT_SECS is not a number: {}", secs))?;
        }
        if let Some(admin) = self.actors.get_mut("admin") {
            if let Some(username) = get("LUMI_API_ADMIN_USERNAME") {
                admin.username = username;
            }
            if let Some(password) = get("LUMI_API_ADMIN_PASSWORD") {
                admin.password = password;
            }
        }
        Ok(())
    }

    pub fn actor_names(&self) -> Vec<String> {
        self.actors.keys().cloned().collect()
    }
}
