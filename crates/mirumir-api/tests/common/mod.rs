#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use mirumir_api::{AppState, AppStateInner};
use mirumir_db::Database;
use mirumir_gateway::Registry;

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
}

pub struct User {
    pub id: i64,
    pub login: String,
    pub token: String,
}

impl TestApp {
    pub fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().expect("in-memory database"),
            jwt_secret: SECRET.into(),
            token_ttl: chrono::Duration::hours(1),
            registry: Registry::new(),
        });
        Self {
            router: mirumir_api::router(state.clone()),
            state,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map(|json| serde_json::to_vec(&json).unwrap());
        self.send(method, uri, token, body).await
    }

    /// Sends `body` verbatim as `application/json`, well-formed or not.
    pub async fn send_raw(&self, method: Method, uri: &str, token: &str, body: &str) -> (StatusCode, Value) {
        self.send(method, uri, Some(token), Some(body.as_bytes().to_vec())).await
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Vec<u8>>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(bytes) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(bytes)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PUT, uri, Some(token), Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, Some(token), None).await
    }

    pub async fn user(&self, login: &str) -> User {
        let credentials = json!({ "login": login, "password": "correct horse" });
        let (status, _) = self
            .request(Method::POST, "/api/v1/auth/register", None, Some(credentials.clone()))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {login}");

        let (status, body) = self
            .request(Method::POST, "/api/v1/auth/login", None, Some(credentials))
            .await;
        assert_eq!(status, StatusCode::OK, "login {login}");

        User {
            id: body["userId"].as_i64().unwrap(),
            login: login.to_string(),
            token: body["token"].as_str().unwrap().to_string(),
        }
    }

    pub async fn board(&self, owner: &User, title: &str) -> i64 {
        let (status, body) = self
            .post("/api/v1/boards", &owner.token, json!({ "title": title }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["boardId"].as_i64().unwrap()
    }

    pub async fn share(&self, owner: &User, board_id: i64, target: &User, permission: &str) {
        let (status, body) = self
            .post(
                &format!("/api/v1/boards/{board_id}/share"),
                &owner.token,
                json!({ "userId": target.id, "permission": permission }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "share failed: {body}");
    }
}
