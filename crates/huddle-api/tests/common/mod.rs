#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use huddle_api::auth::{AppState, AppStateInner, create_token};
use huddle_api::router::router;
use huddle_api::storage::Storage;
use huddle_db::Database;
use huddle_gateway::dispatcher::Dispatcher;

pub const JWT_SECRET: &str = "test-secret";
pub const PUBLIC_URL: &str = "http://huddle.test";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    storage_dir: PathBuf,
}

impl Drop for TestApp {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.storage_dir);
    }
}

pub async fn test_app() -> TestApp {
    let storage_dir = std::env::temp_dir().join(format!("huddle-api-test-{}", Uuid::new_v4()));
    let state: AppState = Arc::new(AppStateInner {
        db: Arc::new(Database::open_in_memory().unwrap()),
        jwt_secret: JWT_SECRET.into(),
        dispatcher: Dispatcher::new(),
        storage: Arc::new(Storage::new(storage_dir.clone()).await.unwrap()),
        public_url: PUBLIC_URL.into(),
    });

    TestApp {
        router: router(state.clone()),
        state,
        storage_dir,
    }
}

impl TestApp {
    /// Insert a user straight into the DB and mint a session token,
    /// skipping the (slow) password hash of the register endpoint.
    pub fn user(&self, name: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.state
            .db
            .create_user(
                id,
                name,
                &format!("{}@example.com", name.to_lowercase()),
                "not-a-hash",
                huddle_db::now(),
            )
            .unwrap();
        (id, create_token(JWT_SECRET, id, name).unwrap())
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), 16 * 1024 * 1024)
            .await
            .unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().uri(uri).method(method);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(serde_json::to_string(&json).unwrap())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.call(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.call(Method::DELETE, uri, Some(token), None).await
    }

    /// Creates a workspace owned by `token`'s user. Returns its id.
    pub async fn workspace(&self, token: &str, name: &str) -> String {
        let (status, json) = self
            .post("/workspaces", token, serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }

    /// Joins `workspace_id` with its current join code.
    pub async fn join(&self, workspace_id: &str, owner_token: &str, token: &str) {
        let (_, ws) = self.get(&format!("/workspaces/{workspace_id}"), owner_token).await;
        let code = ws["join_code"].as_str().unwrap().to_string();
        let (status, _) = self
            .post(
                &format!("/workspaces/{workspace_id}/join"),
                token,
                serde_json::json!({ "join_code": code }),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }

    pub async fn general_channel(&self, workspace_id: &str, token: &str) -> String {
        let (_, channels) = self
            .get(&format!("/workspaces/{workspace_id}/channels"), token)
            .await;
        channels[0]["id"].as_str().unwrap().to_string()
    }

    pub async fn post_message(&self, workspace_id: &str, token: &str, body: Value) -> String {
        let (status, json) = self
            .post(&format!("/workspaces/{workspace_id}/messages"), token, body)
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_str().unwrap().to_string()
    }
}
