use super::assertions;
use super::context::{RunContext, Unresolved};
use super::session::SessionStore;
use crate::client::{lookup, ApiRequest, ApiResponse, ApiTransport, FileUpload, MultipartPayload};
use crate::parser::{Expectation, FieldCheck, ItemMatch, MultipartSpec, Scenario, Step};
use crate::report::{CheckResult, Reporter};
use base64::Engine;
use serde_json::Value;
use std::time::Instant;

/// Runs scenarios step by step, one request in flight at a time.
///
/// Every step yields exactly one recorded result; a failed step never stops
/// the scenario.
pub struct ScenarioExecutor<'a> {
    transport: &'a dyn ApiTransport,
    sessions: &'a SessionStore,
}

/// Reason a step was recorded without sending anything
struct NotSent(String);

impl From<Unresolved> for NotSent {
    fn from(err: Unresolved) -> Self {
        NotSent(err.to_string())
    }
}

impl<'a> ScenarioExecutor<'a> {
    pub fn new(transport: &'a dyn ApiTransport, sessions: &'a SessionStore) -> Self {
        Self {
            transport,
            sessions,
        }
    }

    pub async fn run_scenario(
        &self,
        scenario: &Scenario,
        ctx: &mut RunContext,
        reporter: &mut Reporter,
    ) {
        log::debug!("Scenario '{}' ({} steps)", scenario.name, scenario.steps.len());
        ctx.begin_scenario();

        // Vars may reference each other in any order; a var still unresolved
        // after a few passes is left unset so the steps using it fail.
        let mut pending: Vec<(&String, &String)> = scenario.vars.iter().collect();
        for _ in 0..=scenario.vars.len() {
            let before = pending.len();
            pending.retain(|(name, template)| match ctx.substitute_vars(template) {
                Ok(value) => {
                    ctx.set_var(name, Value::String(value));
                    false
                }
                Err(_) => true,
            });
            if pending.is_empty() || pending.len() == before {
                break;
            }
        }
        for (name, _) in &pending {
            log::warn!("Scenario '{}': variable '{}' left unresolved", scenario.name, name);
        }

        for step in &scenario.steps {
            let result = self.run_step(scenario, step, ctx).await;
            reporter.record_check(&scenario.category, result);
        }

        let missing = ctx.export(&scenario.exports);
        if !missing.is_empty() {
            log::warn!(
                "Scenario '{}' did not produce exported fixture(s): {}",
                scenario.name,
                missing.join(", ")
            );
        }
    }

    /// Run one step and turn whatever happened into a single result
    pub async fn run_step(
        &self,
        scenario: &Scenario,
        step: &Step,
        ctx: &mut RunContext,
    ) -> CheckResult {
        let test_name = format!("{} / {}", scenario.name, step.name);
        let started = Instant::now();
        let elapsed = |started: Instant| started.elapsed().as_millis() as u64;

        let prepared = self
            .prepare(step, ctx)
            .and_then(|request| Ok((request, render_expectation(step, ctx)?)));
        let (request, expect) = match prepared {
            Ok(prepared) => prepared,
            Err(NotSent(message)) => {
                return CheckResult::failed(&test_name, message).with_duration(elapsed(started));
            }
        };

        let label = format!("{} {}", request.method, request.path);
        let response = match self.transport.request(request).await {
            Ok(response) => response,
            Err(err) => {
                return CheckResult::failed(&test_name, format!("transport failure: {}", err))
                    .with_duration(elapsed(started));
            }
        };

        let mut failures = assertions::evaluate(&expect, &response);
        if failures.is_empty() {
            failures = apply_saves(step, &response, ctx);
        }

        let result = if failures.is_empty() {
            CheckResult::passed(&test_name, format!("{} -> {}", label, response.status))
        } else {
            CheckResult::failed(&test_name, format!("{}: {}", label, failures.join("; ")))
                .with_response(Some(response.snapshot()))
        };
        result.with_duration(elapsed(started))
    }

    fn prepare(&self, step: &Step, ctx: &RunContext) -> Result<ApiRequest, NotSent> {
        let token = match &step.actor {
            Some(actor) => match self.sessions.token(actor) {
                Some(token) => Some(token.to_string()),
                None => {
                    let reason = self
                        .sessions
                        .failure(actor)
                        .unwrap_or("actor was not set up");
                    return Err(NotSent(format!(
                        "skipped: no token for actor '{}' ({})",
                        actor, reason
                    )));
                }
            },
            None => None,
        };

        let path = ctx.substitute_vars(&step.path)?;
        let mut request = ApiRequest::new(step.method, path);
        if let Some(token) = token {
            request = request.bearer(token);
        }
        if let Some(body) = &step.body {
            request = request.json(ctx.render_value(body)?);
        }
        if let Some(spec) = &step.multipart {
            request = request.multipart(build_multipart(spec, ctx)?);
        }
        Ok(request)
    }
}

fn build_multipart(spec: &MultipartSpec, ctx: &RunContext) -> Result<MultipartPayload, NotSent> {
    let mut payload = MultipartPayload::default();
    for (name, value) in &spec.fields {
        payload.fields.push((name.clone(), ctx.substitute_vars(value)?));
    }
    for file in &spec.files {
        let bytes = match (&file.text, &file.base64) {
            (Some(text), _) => ctx.substitute_vars(text)?.into_bytes(),
            (None, Some(encoded)) => base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| {
                    NotSent(format!("file '{}' has invalid base64: {}", file.filename, e))
                })?,
            (None, None) => Vec::new(),
        };
        payload.files.push(FileUpload {
            field: file.field.clone(),
            filename: ctx.substitute_vars(&file.filename)?,
            content_type: file.content_type.clone(),
            bytes,
        });
    }
    Ok(payload)
}

/// Expected values may name fixtures (`containsItem: { value: "${seriesId}" }`)
fn render_expectation(step: &Step, ctx: &RunContext) -> Result<Expectation, Unresolved> {
    let render_opt =
        |value: &Option<Value>| value.as_ref().map(|v| ctx.render_value(v)).transpose();
    let render_text = |value: &Option<String>| {
        value.as_deref().map(|v| ctx.substitute_vars(v)).transpose()
    };
    let render_item = |item: &Option<ItemMatch>| -> Result<Option<ItemMatch>, Unresolved> {
        item.as_ref()
            .map(|i| -> Result<ItemMatch, Unresolved> {
                Ok(ItemMatch {
                    key: i.key.clone(),
                    value: ctx.render_value(&i.value)?,
                })
            })
            .transpose()
    };

    let mut fields = Vec::with_capacity(step.expect.fields.len());
    for check in &step.expect.fields {
        fields.push(FieldCheck {
            path: check.path.clone(),
            exists: check.exists,
            equals: render_opt(&check.equals)?,
            not_equals: render_opt(&check.not_equals)?,
            contains_text: render_text(&check.contains_text)?,
            matches: check.matches.clone(),
            is_array: check.is_array,
            len: check.len,
            min_len: check.min_len,
            contains_item: render_item(&check.contains_item)?,
            lacks_item: render_item(&check.lacks_item)?,
        });
    }

    Ok(Expectation {
        status: step.expect.status.clone(),
        fields,
    })
}

/// Store response fields as scenario variables. A missing field fails the step.
fn apply_saves(step: &Step, response: &ApiResponse, ctx: &mut RunContext) -> Vec<String> {
    let mut failures = Vec::new();
    let mut saved = Vec::new();
    for (var, path) in &step.save {
        match lookup(&response.body, path).filter(|v| !v.is_null()) {
            Some(value) => saved.push((var, value.clone())),
            None => failures.push(format!("cannot save '{}': field '{}' is missing", var, path)),
        }
    }
    if failures.is_empty() {
        for (var, value) in saved {
            ctx.set_var(var, value);
        }
    }
    failures
}
