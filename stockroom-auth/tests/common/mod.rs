//! Test backend speaking the warehouse auth API
//!
//! Spawns a small axum app on an ephemeral port with `/auth/login`,
//! `/auth/me` and one protected resource, and counts permission fetches.

#![allow(dead_code)]

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex};
use stockroom_auth::{ApiClientConfig, HttpAuthApi};
use tokio::net::TcpListener;

static TRACING: LazyLock<()> = LazyLock::new(|| {
    let subscriber = if std::env::var("TEST_LOG").is_ok() {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .finish()
    } else {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_test_writer()
            .finish()
    };
    tracing::subscriber::set_global_default(subscriber).ok();
});

#[derive(Clone)]
struct Account {
    password: String,
    active: bool,
    user: Value,
    permissions: Vec<String>,
}

#[derive(Clone, Default)]
struct Backend {
    accounts: Arc<HashMap<String, Account>>,
    me_calls: Arc<AtomicUsize>,
    revoked: Arc<Mutex<HashSet<String>>>,
}

impl Backend {
    fn account_for(&self, headers: &HeaderMap) -> Option<&Account> {
        let token = headers
            .get("authorization")?
            .to_str()
            .ok()?
            .strip_prefix("Bearer ")?;

        if self.revoked.lock().unwrap().contains(token) {
            return None;
        }

        let email = token.strip_prefix("tok-")?;
        self.accounts.get(email)
    }
}

pub struct TestBackend {
    pub address: String,
    backend: Backend,
}

impl TestBackend {
    pub fn api(&self) -> HttpAuthApi {
        HttpAuthApi::new(ApiClientConfig {
            base_url: format!("{}/api", self.address),
            timeout_seconds: 5,
            user_agent: "stockroom-tests".to_string(),
        })
        .expect("Failed to build API client")
    }

    pub fn me_calls(&self) -> usize {
        self.backend.me_calls.load(Ordering::SeqCst)
    }

    /// Make the server reject `email`'s token from now on
    pub fn revoke(&self, email: &str) {
        self.backend
            .revoked
            .lock()
            .unwrap()
            .insert(format!("tok-{}", email));
    }
}

fn account(role: &str, role_id: i64, permissions: &[&str]) -> Account {
    Account {
        password: "secret".to_string(),
        active: true,
        user: json!({ "role": role, "roleId": role_id, "warehouseId": 3 }),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
    }
}

/// Backend with an admin, a warehouse manager, two operators and an inactive clerk
///
/// `garbled@depo.test` signs in with a 200 whose body is not JSON, and
/// `/api/broken` does the same for any valid token.
pub async fn spawn_backend() -> TestBackend {
    LazyLock::force(&TRACING);

    let mut accounts = HashMap::new();
    accounts.insert("admin@depo.test".to_string(), account("admin", 1, &[]));
    accounts.insert(
        "manager@depo.test".to_string(),
        account("warehouse_manager", 2, &[]),
    );
    accounts.insert(
        "operator@depo.test".to_string(),
        account("operator", 4, &["inventory.read"]),
    );
    // older accounts carry the role id as text and the role as a number
    let mut legacy = account("operator", 4, &["inventory.read"]);
    legacy.user["role"] = json!(4);
    legacy.user["roleId"] = json!("4");
    accounts.insert("legacy@depo.test".to_string(), legacy);
    let mut clerk = account("clerk", 5, &["inventory.read"]);
    clerk.active = false;
    accounts.insert("clerk@depo.test".to_string(), clerk);

    for (email, account) in accounts.iter_mut() {
        account.user["id"] = json!(email.len());
        account.user["email"] = json!(email);
    }

    let backend = Backend {
        accounts: Arc::new(accounts),
        ..Backend::default()
    };

    let app = Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/inventory", get(inventory))
        .route("/api/broken", get(broken))
        .with_state(backend.clone());

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("test backend crashed");
    });

    TestBackend {
        address: format!("http://127.0.0.1:{}", port),
        backend,
    }
}

async fn login(State(backend): State<Backend>, Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default();
    let password = body["password"].as_str().unwrap_or_default();

    if email == "garbled@depo.test" {
        return (StatusCode::OK, "<html>maintenance</html>").into_response();
    }

    match backend.accounts.get(email) {
        Some(account) if account.password == password && account.active => Json(json!({
            "token": format!("tok-{}", email),
            "user": account.user,
        }))
        .into_response(),
        Some(account) if account.password == password => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "USER_INACTIVE" })),
        )
            .into_response(),
        _ => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "INVALID_CREDENTIALS" })),
        )
            .into_response(),
    }
}

async fn me(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    backend.me_calls.fetch_add(1, Ordering::SeqCst);

    match backend.account_for(&headers) {
        Some(account) => {
            let mut body = account.user.clone();
            body["permissions"] = json!(account.permissions);
            Json(body).into_response()
        }
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}

async fn inventory(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    match backend.account_for(&headers) {
        Some(_) => Json(json!({ "items": [{ "sku": "CMP-001", "quantity": 12 }] })).into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "TOKEN_EXPIRED" })),
        )
            .into_response(),
    }
}

async fn broken(State(backend): State<Backend>, headers: HeaderMap) -> Response {
    match backend.account_for(&headers) {
        Some(_) => (StatusCode::OK, "{\"items\": [").into_response(),
        None => StatusCode::UNAUTHORIZED.into_response(),
    }
}
