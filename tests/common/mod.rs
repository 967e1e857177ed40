#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use estate_portal_api::auth::LocalIdentityProvider;
use estate_portal_api::config::{AppConfig, Environment, DEVELOPMENT_TOKEN_SECRET};
use estate_portal_api::database::models::{Role, UserUpdate};
use estate_portal_api::database::{MemoryStore, UserStore};
use estate_portal_api::{router, AppState};

/// Router over in-memory stores and the local identity provider.
pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub identity: Arc<LocalIdentityProvider>,
    pub store: Arc<MemoryStore>,
}

/// A registered account and the token from its registration.
#[derive(Debug, Clone)]
pub struct TestUser {
    pub id: String,
    pub email: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_config(AppConfig::for_environment(Environment::Development))
    }

    pub fn with_config(config: AppConfig) -> Self {
        let identity = Arc::new(LocalIdentityProvider::new(DEVELOPMENT_TOKEN_SECRET, 3600));
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(config, store.clone(), store.clone(), identity.clone())
            .expect("test config is valid");
        Self { router: router(state.clone()), state, identity, store }
    }

    pub async fn request(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, body)
    }

    pub async fn get(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, path, Some(token), None).await
    }

    pub async fn post(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, path, Some(token), Some(body)).await
    }

    pub async fn put(&self, path: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, path, Some(token), Some(body)).await
    }

    pub async fn delete(&self, path: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, path, Some(token), None).await
    }

    /// Register through the API, as a new resident.
    pub async fn register(&self, email: &str) -> TestUser {
        let (status, body) = self
            .request(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({ "email": email, "password": "secret123", "displayName": email })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {}", body);
        TestUser {
            id: body["data"]["user"]["id"].as_str().unwrap().to_string(),
            email: email.to_string(),
            token: body["data"]["token"].as_str().unwrap().to_string(),
        }
    }

    /// Change a stored role directly, without touching the user's token.
    pub async fn set_role(&self, user: &TestUser, role: Role) {
        let update = UserUpdate { role: Some(role), ..UserUpdate::default() };
        self.store.update(&user.id, update).await.unwrap().expect("user record exists");
    }

    pub async fn admin(&self, email: &str) -> TestUser {
        let user = self.register(email).await;
        self.set_role(&user, Role::Admin).await;
        user
    }

    pub async fn create_event(&self, admin: &TestUser, body: Value) -> Value {
        let (status, body) = self.post("/api/events", &admin.token, body).await;
        assert_eq!(status, StatusCode::CREATED, "create event failed: {}", body);
        body["data"].clone()
    }

    /// Serve the router on a loopback port and return its base URL.
    pub async fn serve_loopback(&self) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }
}

pub fn bbq(max_attendees: Option<u32>) -> Value {
    let mut body = json!({
        "title": "Summer BBQ",
        "description": "Bring a side dish",
        "date": "2030-07-04T17:00",
        "location": "Clubhouse lawn",
        "category": "social",
    });
    if let Some(max) = max_attendees {
        body["maxAttendees"] = json!(max);
    }
    body
}

/// Every error response carries the same envelope.
pub fn assert_error_envelope(body: &Value, code: &str) {
    assert_eq!(body["success"], false, "not an error envelope: {}", body);
    assert_eq!(body["error"]["code"], code, "unexpected code: {}", body);
    assert!(body["message"].is_string());
    assert!(body["timestamp"].is_string());
}

static SERVER: OnceLock<TestServer> = OnceLock::new();

/// The real server binary on a free port, memory backend.
pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_estate-portal-api"));
        cmd.env("APP_ENV", "development")
            .env("STORE_BACKEND", "memory")
            .env("IDENTITY_PROVIDER", "local")
            .env("AUTH_DEV_BYPASS", "false")
            .env("HOST", "127.0.0.1")
            .env("PORT", port.to_string())
            .env_remove("PORTAL_API_PORT")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == reqwest::StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}
