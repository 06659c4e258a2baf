//! Shared harness: in-memory database, app router and a mailer that records instead of sending.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use sea_orm::{ActiveModelTrait, Set};
use serde_json::Value;
use tower::ServiceExt;
use yamdb::{
    AppState,
    config::Config,
    db,
    entities::user::{self, Role},
    mail::{MailError, MailService, OutgoingMail},
};

pub const SECRET: &str = "test-secret-key";

#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutgoingMail>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }

    /// The code from the most recent message to `email`.
    pub fn last_code_for(&self, email: &str) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|m| m.recipients.iter().any(|r| r == email))
            .and_then(|m| m.body.rsplit(' ').next().map(str::to_string))
    }
}

#[async_trait]
impl MailService for RecordingMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(mail);
        Ok(())
    }
}

pub fn test_config() -> Config {
    Config {
        addr: "127.0.0.1:0".parse().unwrap(),
        database_url: "sqlite::memory:".to_string(),
        secret_key: SECRET.to_string(),
        access_token_lifetime_minutes: 60,
        confirmation_code_timeout_secs: 3600,
        default_from_email: "noreply@yamdb.test".to_string(),
        smtp: None,
        mail_rps: 10,
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub mailer: Arc<RecordingMailer>,
}

pub async fn spawn_app() -> TestApp {
    let config = Arc::new(test_config());
    let db = db::connect_and_migrate(&config.database_url).await.expect("database");
    let mailer = Arc::new(RecordingMailer::default());
    let state = Arc::new(AppState::new(config, db, mailer.clone()));
    TestApp { router: yamdb::app(state.clone()), state, mailer }
}

impl TestApp {
    pub async fn create_user(&self, username: &str, role: Role, is_staff: bool) -> user::Model {
        user::ActiveModel {
            username: Set(username.to_string()),
            email: Set(format!("{username}@example.com")),
            first_name: Set(String::new()),
            last_name: Set(String::new()),
            bio: Set(None),
            role: Set(role),
            is_staff: Set(is_staff),
            last_login: Set(None),
            date_joined: Set(0),
            ..Default::default()
        }
        .insert(&self.state.db)
        .await
        .expect("insert user")
    }

    /// A user with a bearer token.
    pub async fn login(&self, username: &str, role: Role) -> (user::Model, String) {
        let user = self.create_user(username, role, false).await;
        let token = self.state.tokens.issue_access_token(&user).expect("token");
        (user, token)
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self.router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> (StatusCode, Value) {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Creates a title through the API as `admin_token`, returning its id.
    pub async fn create_title(&self, admin_token: &str, body: Value) -> i64 {
        let (status, json) = self.post("/api/v1/titles", Some(admin_token), body).await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_i64().unwrap()
    }

    pub async fn create_review(&self, token: &str, title_id: i64, score: i64) -> i64 {
        let (status, json) = self
            .post(
                &format!("/api/v1/titles/{title_id}/reviews"),
                Some(token),
                serde_json::json!({ "text": "worth a look", "score": score }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{json}");
        json["id"].as_i64().unwrap()
    }
}
