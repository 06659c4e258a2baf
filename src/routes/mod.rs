pub mod auth;
pub mod categories;
pub mod comments;
pub mod genres;
pub mod reviews;
pub mod titles;
pub mod users;

use std::{collections::HashMap, sync::Arc};

use axum::{
    Json, Router,
    extract::{FromRequest, Request},
    routing::{delete, get, post},
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QuerySelect};
use serde::de::DeserializeOwned;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use validator::Validate;

use crate::{
    AppState,
    entities::user,
    error::{AppError, AppResult, FieldErrors, NON_FIELD_ERRORS},
};

pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/categories", get(categories::list).post(categories::create))
        .route("/categories/{slug}", delete(categories::destroy))
        .route("/genres", get(genres::list).post(genres::create))
        .route("/genres/{slug}", delete(genres::destroy))
        .route("/titles", get(titles::list).post(titles::create))
        .route(
            "/titles/{title_id}",
            get(titles::retrieve).put(titles::update).patch(titles::update).delete(titles::destroy),
        )
        .route("/titles/{title_id}/reviews", get(reviews::list).post(reviews::create))
        .route(
            "/titles/{title_id}/reviews/{review_id}",
            get(reviews::retrieve)
                .put(reviews::update)
                .patch(reviews::update)
                .delete(reviews::destroy),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments",
            get(comments::list).post(comments::create),
        )
        .route(
            "/titles/{title_id}/reviews/{review_id}/comments/{comment_id}",
            get(comments::retrieve)
                .put(comments::update)
                .patch(comments::update)
                .delete(comments::destroy),
        )
        .route("/users", get(users::list).post(users::create))
        .route("/users/me", get(users::me).patch(users::update_me))
        .route(
            "/users/{username}",
            get(users::retrieve).put(users::update).patch(users::update).delete(users::destroy),
        )
        .route("/auth/email", post(auth::request_code))
        .route("/auth/token", post(auth::exchange_token));

    Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api)
        .with_state(state)
        .layer(CorsLayer::new().allow_origin(Any).allow_headers(Any).allow_methods(Any))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// JSON body that has been deserialized and passed its `validator` rules.
/// Both failures render as field-keyed validation errors.
pub struct ValidJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await.map_err(|rejection| {
            AppError::Validation(FieldErrors::single(NON_FIELD_ERRORS, rejection.body_text()))
        })?;
        value.validate()?;
        Ok(Self(value))
    }
}

/// Usernames for a set of author ids.
pub(crate) async fn author_names<C: ConnectionTrait>(
    db: &C,
    ids: impl IntoIterator<Item = i32>,
) -> AppResult<HashMap<i32, String>> {
    let mut ids: Vec<i32> = ids.into_iter().collect();
    ids.sort_unstable();
    ids.dedup();

    let rows: Vec<(i32, String)> = user::Entity::find()
        .select_only()
        .column(user::Column::Id)
        .column(user::Column::Username)
        .filter(user::Column::Id.is_in(ids))
        .into_tuple()
        .all(db)
        .await?;

    Ok(rows.into_iter().collect())
}
