use regex::Regex;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::OnceLock;
use thiserror::Error;

/// Placeholders left unresolved after templating
#[derive(Debug, Clone, PartialEq, Error)]
#[error("missing fixture: {}", .0.join(", "))]
pub struct Unresolved(pub Vec<String>);

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([a-zA-Z0-9_.]+)\}").expect("valid placeholder regex"))
}

fn whole_placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\$\{([a-zA-Z0-9_.]+)\}$").expect("valid placeholder regex"))
}

/// Environment variables visible to templates carry this prefix
pub const ENV_VAR_PREFIX: &str = "LUMI_API_VAR_";

/// Run-scoped state handed to every scenario.
///
/// Lookup order for `${name}`: scenario vars, exported fixtures, config vars,
/// actor records, built-ins, then `LUMI_API_VAR_<name>` from the process environment.
pub struct RunContext {
    /// Short id unique to this run, used to make usernames and titles unique
    pub run_id: String,

    /// Variables of the scenario currently running
    pub vars: HashMap<String, Value>,

    /// Values explicitly exported by earlier scenarios
    pub fixtures: HashMap<String, Value>,

    /// Config-level variables
    pub env: HashMap<String, Value>,

    /// Actor records (`username`, `userId`, `role`, ...) keyed by actor name
    actors: HashMap<String, Value>,
}

impl RunContext {
    pub fn new(run_id: &str, config_vars: &BTreeMap<String, String>) -> Self {
        Self {
            run_id: run_id.to_string(),
            vars: HashMap::new(),
            fixtures: HashMap::new(),
            env: config_vars
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
            actors: HashMap::new(),
        }
    }

    /// Drop the previous scenario's variables
    pub fn begin_scenario(&mut self) {
        self.vars.clear();
    }

    /// Hand the named scenario variables to later scenarios.
    /// Returns the names that were never saved.
    pub fn export(&mut self, names: &[String]) -> Vec<String> {
        let mut missing = Vec::new();
        for name in names {
            match self.vars.get(name) {
                Some(value) => {
                    self.fixtures.insert(name.clone(), value.clone());
                }
                None => missing.push(name.clone()),
            }
        }
        missing
    }

    pub fn set_actor(&mut self, name: &str, record: Value) {
        self.actors.insert(name.to_string(), record);
    }

    pub fn set_var(&mut self, name: &str, value: Value) {
        self.vars.insert(name.to_string(), value);
    }

    /// Get a variable from the scopes in lookup order
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.vars
            .get(name)
            .or_else(|| self.fixtures.get(name))
            .or_else(|| self.env.get(name))
            .or_else(|| self.actors.get(name))
            .cloned()
            .or_else(|| self.builtin(name))
            .or_else(|| {
                std::env::var(format!("{}{}", ENV_VAR_PREFIX, name))
                    .ok()
                    .map(Value::String)
            })
    }

    fn builtin(&self, name: &str) -> Option<Value> {
        let value = match name {
            "run" => self.run_id.clone(),
            "uuid" => uuid::Uuid::new_v4().to_string(),
            "timestamp" => chrono::Utc::now().timestamp().to_string(),
            "date" => chrono::Local::now().format("%Y-%m-%d").to_string(),
            "time" => chrono::Local::now().format("%H:%M:%S").to_string(),
            _ => return None,
        };
        Some(Value::String(value))
    }

    /// Resolve `name` or `name.json.path` into a JSON value
    pub fn resolve(&self, key: &str) -> Option<Value> {
        if let Some(value) = self.get_var(key) {
            return Some(value);
        }

        let (var_name, json_path) = key.split_once('.')?;
        let root = self.get_var(var_name)?;
        let root = match root {
            Value::String(s) => serde_json::from_str::<Value>(&s).ok()?,
            other => other,
        };
        let pointer = format!("/{}", json_path.replace('.', "/"));
        root.pointer(&pointer).cloned()
    }

    /// Substitute every `${key}` in a string
    pub fn substitute_vars(&self, text: &str) -> Result<String, Unresolved> {
        let mut missing = Vec::new();
        let rendered = placeholder_re()
            .replace_all(text, |caps: &regex::Captures| {
                let key = &caps[1];
                match self.resolve(key) {
                    Some(Value::String(s)) => s,
                    Some(other) => other.to_string(),
                    None => {
                        missing.push(key.to_string());
                        format!("${{{}}}", key)
                    }
                }
            })
            .to_string();

        if missing.is_empty() {
            Ok(rendered)
        } else {
            Err(Unresolved(missing))
        }
    }

    /// Template every string inside a JSON value. A string that is exactly one
    /// placeholder takes the resolved value's own JSON type.
    pub fn render_value(&self, value: &Value) -> Result<Value, Unresolved> {
        let mut missing = Vec::new();
        let rendered = self.render_inner(value, &mut missing);
        if missing.is_empty() {
            Ok(rendered)
        } else {
            Err(Unresolved(missing))
        }
    }

    fn render_inner(&self, value: &Value, missing: &mut Vec<String>) -> Value {
        match value {
            Value::String(s) => {
                if let Some(caps) = whole_placeholder_re().captures(s) {
                    if let Some(resolved) = self.resolve(&caps[1]) {
                        return resolved;
                    }
                }
                match self.substitute_vars(s) {
                    Ok(rendered) => Value::String(rendered),
                    Err(Unresolved(names)) => {
                        missing.extend(names);
                        value.clone()
                    }
                }
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.render_inner(v, missing)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_inner(v, missing)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> RunContext {
        let mut vars = BTreeMap::new();
        vars.insert("category".to_string(), "NEET".to_string());
        RunContext::new("ab12cd34", &vars)
    }

    #[test]
    fn test_substitute_builtin_and_config_vars() {
        let ctx = context();
        assert_eq!(
            ctx.substitute_vars("lumi_teacher_${run} in ${category}").unwrap(),
            "lumi_teacher_ab12cd34 in NEET"
        );
    }

    #[test]
    fn test_missing_variable_is_reported() {
        let ctx = context();
        let err = ctx
            .substitute_vars("test-series/${seriesId}/attempts/${attemptId}")
            .unwrap_err();
        assert_eq!(err.0, vec!["seriesId", "attemptId"]);
        assert_eq!(err.to_string(), "missing fixture: seriesId, attemptId");
    }

    #[test]
    fn test_actor_record_dotted_access() {
        let mut ctx = context();
        ctx.set_actor(
            "student",
            json!({ "username": "lumi_student_ab12cd34", "userId": "u-9", "role": "student" }),
        );
        assert_eq!(
            ctx.substitute_vars("${student.username}/${student.userId}").unwrap(),
            "lumi_student_ab12cd34/u-9"
        );
    }

    #[test]
    fn test_whole_placeholder_keeps_json_type() {
        let mut ctx = context();
        ctx.set_var("answer", json!(1));
        ctx.set_var("questionId", json!("q1"));

        let body = json!({
            "questionId": "${questionId}",
            "answer": "${answer}",
            "note": "answer ${answer} for ${questionId}",
            "action": "submit_answer"
        });
        let rendered = ctx.render_value(&body).unwrap();

        assert_eq!(rendered["answer"], json!(1));
        assert_eq!(rendered["questionId"], json!("q1"));
        assert_eq!(rendered["note"], json!("answer 1 for q1"));
        assert_eq!(rendered["action"], json!("submit_answer"));
    }

    #[test]
    fn test_render_value_collects_all_missing() {
        let ctx = context();
        let err = ctx
            .render_value(&json!({ "a": "${x}", "b": ["${y}", "ok"] }))
            .unwrap_err();
        assert_eq!(err.0, vec!["x", "y"]);
    }

    #[test]
    fn test_export_moves_vars_to_fixtures() {
        let mut ctx = context();
        ctx.set_var("seriesId", json!("ts-1"));

        let missing = ctx.export(&["seriesId".to_string(), "attemptId".to_string()]);
        assert_eq!(missing, vec!["attemptId"]);

        ctx.begin_scenario();
        assert!(ctx.vars.is_empty());
        assert_eq!(ctx.get_var("seriesId"), Some(json!("ts-1")));
    }

    #[test]
    fn test_scenario_vars_shadow_fixtures() {
        let mut ctx = context();
        ctx.fixtures.insert("title".to_string(), json!("old"));
        ctx.set_var("title", json!("new"));
        assert_eq!(ctx.substitute_vars("${title}").unwrap(), "new");
    }

    #[test]
    fn test_only_prefixed_environment_variables_resolve() {
        std::env::set_var("lumiCtxFixture", "from-env");
        std::env::set_var("LUMI_API_VAR_lumiCtxVar", "from-prefixed-env");
        let ctx = context();

        let err = ctx.substitute_vars("test-series/${lumiCtxFixture}").unwrap_err();
        assert_eq!(err.0, vec!["lumiCtxFixture"]);
        assert_eq!(
            ctx.substitute_vars("${lumiCtxVar}").unwrap(),
            "from-prefixed-env"
        );
    }
}
