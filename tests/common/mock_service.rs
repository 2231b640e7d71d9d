//! Mock service lifecycle and handlers
//!
//! Implements just enough of the API for the runner to be driven end to end:
//! login/register/me, test-series CRUD with ownership and test-attempts with the
//! one-attempt-per-student rule.

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;

type Reply = (StatusCode, Json<Value>);

/// Faults the mock can be told to exhibit
#[derive(Debug, Clone, Copy, Default)]
pub struct MockBehavior {
    /// Listings never include any series (a query-filter bug)
    pub hide_series_in_listing: bool,

    /// Non-owners get 403 instead of 404 on edit/delete
    pub forbid_instead_of_not_found: bool,

    /// Allow a second attempt on the same series
    pub allow_duplicate_attempts: bool,
}

#[derive(Clone)]
struct User {
    user_id: String,
    username: String,
    password: String,
    role: String,
    name: String,
}

#[derive(Default)]
struct Db {
    users: Vec<User>,
    tokens: Vec<(String, String)>,
    series: Vec<Value>,
    attempts: Vec<Value>,
    requests: u32,
}

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Db>>,
    behavior: MockBehavior,
}

/// Running mock instance; the server shuts down when dropped
pub struct MockService {
    /// Base URL including the `/api` prefix
    pub base_url: String,

    db: Arc<Mutex<Db>>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl MockService {
    pub async fn spawn() -> Self {
        Self::spawn_with(MockBehavior::default()).await
    }

    pub async fn spawn_with(behavior: MockBehavior) -> Self {
        let mut db = Db::default();
        db.users.push(User {
            user_id: "admin-1".to_string(),
            username: "admin".to_string(),
            password: "admin123".to_string(),
            role: "admin".to_string(),
            name: "Administrator".to_string(),
        });
        let db = Arc::new(Mutex::new(db));

        let state = AppState {
            db: db.clone(),
            behavior,
        };

        let app = Router::new()
            .route("/api/auth/login", post(login))
            .route("/api/auth/register", post(register))
            .route("/api/auth/me", get(me))
            .route("/api/test-series", get(list_series).post(create_series))
            .route(
                "/api/test-series/:id",
                get(get_series).put(update_series).delete(delete_series),
            )
            .route("/api/test-attempts", get(list_attempts).post(start_attempt))
            .route("/api/categories", get(list_categories))
            .with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app.into_make_service())
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Mock server failed");
        });

        Self {
            base_url: format!("http://127.0.0.1:{}/api", port),
            db,
            _shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Number of requests the mock has answered
    pub fn request_count(&self) -> u32 {
        self.db.lock().unwrap().requests
    }

    pub fn has_user(&self, username: &str) -> bool {
        self.db
            .lock()
            .unwrap()
            .users
            .iter()
            .any(|u| u.username == username)
    }

    pub fn attempt_count(&self) -> usize {
        self.db.lock().unwrap().attempts.len()
    }
}

fn error(status: StatusCode, message: &str) -> Reply {
    (status, Json(json!({ "error": message })))
}

fn ok(body: Value) -> Reply {
    (StatusCode::OK, Json(body))
}

fn caller(db: &Db, headers: &HeaderMap) -> Option<User> {
    let token = headers
        .get("authorization")?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")?;
    let user_id = db
        .tokens
        .iter()
        .find(|(t, _)| t == token)
        .map(|(_, id)| id.clone())?;
    db.users.iter().find(|u| u.user_id == user_id).cloned()
}

async fn login(State(state): State<AppState>, Json(body): Json<Value>) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    let username = body["username"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    let user = match db
        .users
        .iter()
        .find(|u| u.username == username && u.password == password)
    {
        Some(u) => u.clone(),
        None => return error(StatusCode::UNAUTHORIZED, "Invalid credentials"),
    };

    let token = format!("tok-{}", uuid::Uuid::new_v4().simple());
    db.tokens.push((token.clone(), user.user_id.clone()));
    ok(json!({
        "token": token,
        "user": {
            "userId": user.user_id,
            "username": user.username,
            "role": user.role,
            "name": user.name
        }
    }))
}

async fn register(State(state): State<AppState>, Json(body): Json<Value>) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    let role = body["role"].as_str().unwrap_or_default().to_string();
    if role != "student" && role != "teacher" {
        return error(StatusCode::BAD_REQUEST, "Invalid role");
    }
    let username = body["username"].as_str().unwrap_or_default().to_string();
    if db.users.iter().any(|u| u.username == username) {
        return error(StatusCode::BAD_REQUEST, "Username already exists");
    }
    db.users.push(User {
        user_id: uuid::Uuid::new_v4().to_string(),
        username,
        password: body["password"].as_str().unwrap_or_default().to_string(),
        role,
        name: body["name"].as_str().unwrap_or_default().to_string(),
    });
    ok(json!({ "message": "User created successfully" }))
}

async fn me(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    match caller(&db, &headers) {
        Some(u) => ok(json!({
            "userId": u.user_id,
            "username": u.username,
            "role": u.role,
            "name": u.name
        })),
        None => error(StatusCode::UNAUTHORIZED, "Unauthorized"),
    }
}

async fn list_series(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    let Some(user) = caller(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    if state.behavior.hide_series_in_listing {
        return ok(json!([]));
    }

    let visible: Vec<Value> = db
        .series
        .iter()
        .filter(|s| match user.role.as_str() {
            "teacher" => s["createdBy"] == user.user_id.as_str(),
            "student" => s["status"] == "published",
            _ => true,
        })
        .cloned()
        .collect();
    ok(Value::Array(visible))
}

async fn create_series(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    let Some(user) = caller(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    if user.role == "student" {
        return error(StatusCode::FORBIDDEN, "Access denied");
    }

    let id = uuid::Uuid::new_v4().to_string();
    if let Some(questions) = body["questions"].as_array_mut() {
        for q in questions {
            q["questionId"] = json!(uuid::Uuid::new_v4().to_string());
        }
    }
    if body.get("status").is_none() {
        body["status"] = json!("published");
    }
    body["testSeriesId"] = json!(id);
    body["createdBy"] = json!(user.user_id);
    db.series.push(body);

    ok(json!({ "message": "Test series created successfully", "testSeriesId": id }))
}

async fn get_series(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    if caller(&db, &headers).is_none() {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    }
    match db.series.iter().find(|s| s["testSeriesId"] == id.as_str()) {
        Some(s) => ok(s.clone()),
        None => error(StatusCode::NOT_FOUND, "Test series not found"),
    }
}

/// Index of a series the caller may modify, or the reply refusing it
fn owned_series(db: &Db, behavior: MockBehavior, user: &User, id: &str) -> Result<usize, Reply> {
    if user.role == "student" {
        return Err(error(StatusCode::FORBIDDEN, "Access denied"));
    }
    let idx = db
        .series
        .iter()
        .position(|s| s["testSeriesId"] == id)
        .ok_or_else(|| error(StatusCode::NOT_FOUND, "Test series not found"))?;
    if user.role == "teacher" && db.series[idx]["createdBy"] != user.user_id.as_str() {
        return Err(if behavior.forbid_instead_of_not_found {
            error(StatusCode::FORBIDDEN, "Access denied")
        } else {
            error(StatusCode::NOT_FOUND, "Test series not found")
        });
    }
    Ok(idx)
}

async fn update_series(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    let Some(user) = caller(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let idx = match owned_series(&db, state.behavior, &user, &id) {
        Ok(idx) => idx,
        Err(reply) => return reply,
    };

    if let (Some(target), Some(changes)) = (db.series[idx].as_object_mut(), body.as_object()) {
        for (key, value) in changes {
            if key != "testSeriesId" && key != "createdBy" {
                target.insert(key.clone(), value.clone());
            }
        }
    }
    ok(json!({ "message": "Test series updated successfully" }))
}

async fn delete_series(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    let Some(user) = caller(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    match owned_series(&db, state.behavior, &user, &id) {
        Ok(idx) => {
            db.series.remove(idx);
            ok(json!({ "message": "Test series deleted successfully" }))
        }
        Err(reply) => reply,
    }
}

async fn start_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    let Some(user) = caller(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    if user.role != "student" {
        return error(StatusCode::FORBIDDEN, "Access denied");
    }

    let series_id = body["testSeriesId"].as_str().unwrap_or_default().to_string();
    let total = match db.series.iter().find(|s| s["testSeriesId"] == series_id.as_str()) {
        Some(s) => s["questions"].as_array().map_or(0, |q| q.len()),
        None => return error(StatusCode::NOT_FOUND, "Test series not found"),
    };
    let duplicate = db.attempts.iter().any(|a| {
        a["testSeriesId"] == series_id.as_str() && a["studentId"] == user.user_id.as_str()
    });
    if duplicate && !state.behavior.allow_duplicate_attempts {
        return error(StatusCode::BAD_REQUEST, "Test already completed");
    }

    let attempt_id = uuid::Uuid::new_v4().to_string();
    db.attempts.push(json!({
        "attemptId": attempt_id,
        "testSeriesId": series_id,
        "studentId": user.user_id,
        "status": "in_progress"
    }));
    ok(json!({ "attemptId": attempt_id, "totalQuestions": total }))
}

async fn list_attempts(State(state): State<AppState>, headers: HeaderMap) -> Reply {
    let mut db = state.db.lock().unwrap();
    db.requests += 1;
    let Some(user) = caller(&db, &headers) else {
        return error(StatusCode::UNAUTHORIZED, "Unauthorized");
    };
    let attempts: Vec<Value> = db
        .attempts
        .iter()
        .filter(|a| user.role != "student" || a["studentId"] == user.user_id.as_str())
        .cloned()
        .collect();
    ok(Value::Array(attempts))
}

async fn list_categories(State(state): State<AppState>) -> Reply {
    state.db.lock().unwrap().requests += 1;
    ok(json!([
        { "categoryId": "cat-neet", "name": "NEET" },
        { "categoryId": "cat-gate", "name": "GATE" }
    ]))
}
