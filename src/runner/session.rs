//! Per-actor bearer tokens for the lifetime of one run

use crate::client::{ApiRequest, ApiResponse, ApiTransport, ClientError, HttpMethod};
use crate::runner::context::{RunContext, Unresolved};
use crate::utils::config::{ActorProfile, Role};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use thiserror::Error;

/// Why an actor could not be authenticated
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("credentials for '{actor}' reference a {source}")]
    Template { actor: String, source: Unresolved },

    #[error("login call failed: {0}")]
    Transport(#[from] ClientError),

    #[error("login rejected with {status}: {message}")]
    LoginRejected { status: u16, message: String },

    #[error("registration rejected with {status}: {message}")]
    RegisterRejected { status: u16, message: String },

    #[error("login returned {status} without a token")]
    MissingToken { status: u16 },

    #[error("actor is not allowed to register and login reported an unknown user ({status})")]
    RegistrationDisabled { status: u16 },
}

/// Authentication state of one actor
#[derive(Debug, Clone)]
pub struct ActorSession {
    pub name: String,
    pub role: Role,
    pub username: String,
    pub user_id: Option<String>,
    pub token: Option<String>,
    pub failure: Option<String>,

    /// Whether the account had to be registered during this run
    pub registered: bool,
}

/// Rendered credentials of an actor
struct Credentials {
    username: String,
    password: String,
    name: Option<String>,
    email: Option<String>,
    phone: Option<String>,
}

impl Credentials {
    fn render(profile: &ActorProfile, ctx: &RunContext) -> Result<Self, Unresolved> {
        let render_opt = |value: &Option<String>| -> Result<Option<String>, Unresolved> {
            value.as_deref().map(|v| ctx.substitute_vars(v)).transpose()
        };
        Ok(Self {
            username: ctx.substitute_vars(&profile.username)?,
            password: ctx.substitute_vars(&profile.password)?,
            name: render_opt(&profile.name)?,
            email: render_opt(&profile.email)?,
            phone: render_opt(&profile.phone)?,
        })
    }

    fn login_body(&self) -> Value {
        json!({ "username": self.username, "password": self.password })
    }

    fn register_body(&self, role: Role) -> Value {
        let mut body = Map::new();
        body.insert("username".into(), json!(self.username));
        body.insert("password".into(), json!(self.password));
        body.insert(
            "name".into(),
            json!(self.name.clone().unwrap_or_else(|| self.username.clone())),
        );
        body.insert("role".into(), json!(role.as_str()));
        if let Some(email) = &self.email {
            body.insert("email".into(), json!(email));
        }
        if let Some(phone) = &self.phone {
            body.insert("phone".into(), json!(phone));
        }
        Value::Object(body)
    }
}

/// Statuses a login answers with when the account does not exist yet
fn is_unknown_user(status: u16) -> bool {
    status == 401 || status == 404
}

fn rejection_message(response: &ApiResponse) -> String {
    response
        .error_message()
        .map(str::to_string)
        .unwrap_or_else(|| response.snapshot())
}

#[derive(Default)]
pub struct SessionStore {
    sessions: HashMap<String, ActorSession>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token for an actor, if one was obtained
    pub fn token(&self, actor: &str) -> Option<&str> {
        self.sessions.get(actor).and_then(|s| s.token.as_deref())
    }

    pub fn session(&self, actor: &str) -> Option<&ActorSession> {
        self.sessions.get(actor)
    }

    /// Why an actor has no token; `None` if it was never set up
    pub fn failure(&self, actor: &str) -> Option<&str> {
        self.sessions.get(actor).and_then(|s| s.failure.as_deref())
    }

    pub fn authenticated_count(&self) -> usize {
        self.sessions.values().filter(|s| s.token.is_some()).count()
    }

    /// Log in as `name`, registering first when the service does not know the
    /// account yet. A token already held for `name` is returned as is.
    ///
    /// On success the actor record (`username`, `userId`, `role`, ...) is published
    /// to `ctx` so scenarios can refer to `${student.userId}`.
    pub async fn login_or_register(
        &mut self,
        transport: &dyn ApiTransport,
        name: &str,
        profile: &ActorProfile,
        ctx: &mut RunContext,
    ) -> Result<String, AuthError> {
        if let Some(token) = self.token(name) {
            return Ok(token.to_string());
        }

        let result = self.authenticate(transport, name, profile, ctx).await;
        let session = self
            .sessions
            .entry(name.to_string())
            .or_insert_with(|| ActorSession {
                name: name.to_string(),
                role: profile.role,
                username: profile.username.clone(),
                user_id: None,
                token: None,
                failure: None,
                registered: false,
            });

        match result {
            Ok(auth) => {
                session.username = auth.username;
                session.user_id = auth.user_id;
                session.token = Some(auth.token.clone());
                session.registered = auth.registered;
                session.failure = None;
                ctx.set_actor(name, auth.record);
                Ok(auth.token)
            }
            Err(err) => {
                log::warn!("Could not authenticate actor '{}': {}", name, err);
                session.failure = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn authenticate(
        &self,
        transport: &dyn ApiTransport,
        name: &str,
        profile: &ActorProfile,
        ctx: &RunContext,
    ) -> Result<Authenticated, AuthError> {
        let creds = Credentials::render(profile, ctx).map_err(|source| AuthError::Template {
            actor: name.to_string(),
            source,
        })?;

        let first = login(transport, &creds).await?;
        if first.is_success() {
            return Authenticated::from_login(&first, &creds, profile, false);
        }
        if !is_unknown_user(first.status) {
            return Err(AuthError::LoginRejected {
                status: first.status,
                message: rejection_message(&first),
            });
        }
        if !profile.register {
            return Err(AuthError::RegistrationDisabled {
                status: first.status,
            });
        }

        log::debug!("Registering '{}' as {}", creds.username, profile.role.as_str());
        let registered = transport
            .request(
                ApiRequest::new(HttpMethod::Post, "auth/register")
                    .json(creds.register_body(profile.role)),
            )
            .await?;
        if !matches!(registered.status, 200 | 201) {
            return Err(AuthError::RegisterRejected {
                status: registered.status,
                message: rejection_message(&registered),
            });
        }

        let second = login(transport, &creds).await?;
        if !second.is_success() {
            return Err(AuthError::LoginRejected {
                status: second.status,
                message: rejection_message(&second),
            });
        }
        Authenticated::from_login(&second, &creds, profile, true)
    }
}

async fn login(transport: &dyn ApiTransport, creds: &Credentials) -> Result<ApiResponse, AuthError> {
    Ok(transport
        .request(ApiRequest::new(HttpMethod::Post, "auth/login").json(creds.login_body()))
        .await?)
}

struct Authenticated {
    token: String,
    username: String,
    user_id: Option<String>,
    registered: bool,
    record: Value,
}

impl Authenticated {
    fn from_login(
        response: &ApiResponse,
        creds: &Credentials,
        profile: &ActorProfile,
        registered: bool,
    ) -> Result<Self, AuthError> {
        let token = response
            .field("token")
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::MissingToken {
                status: response.status,
            })?
            .to_string();

        let user_id = response
            .field("user.userId")
            .and_then(|v| match v {
                Value::String(s) => Some(s.clone()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            });

        let role = response
            .field("user.role")
            .and_then(Value::as_str)
            .unwrap_or(profile.role.as_str());

        let record = json!({
            "username": creds.username,
            "password": creds.password,
            "userId": user_id,
            "role": role,
            "name": creds.name,
            "email": creds.email,
        });

        Ok(Self {
            token,
            username: creds.username.clone(),
            user_id,
            registered,
            record,
        })
    }
}
