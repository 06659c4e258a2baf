pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod error;
pub mod filters;
pub mod mail;
pub mod models;
pub mod permissions;
pub mod routes;
pub mod validators;

use std::sync::Arc;

use axum::Router;
use sea_orm::DatabaseConnection;

use crate::{auth::TokenService, config::Config, mail::MailService};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: DatabaseConnection,
    pub tokens: TokenService,
    pub mailer: Arc<dyn MailService>,
}

impl AppState {
    pub fn new(config: Arc<Config>, db: DatabaseConnection, mailer: Arc<dyn MailService>) -> Self {
        let tokens = TokenService::from_config(&config);
        Self { config, db, tokens, mailer }
    }
}

pub fn app(state: Arc<AppState>) -> Router {
    routes::router(state)
}
