pub mod token;

use std::sync::Arc;

use axum::{RequestPartsExt, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use sea_orm::EntityTrait;

pub use token::{Claims, TokenService};

use crate::{
    AppState,
    entities::user,
    error::{AppError, AppResult},
};

/// The caller of a request, resolved from an optional `Authorization: Bearer` header.
#[derive(Clone, Debug)]
pub enum Actor {
    Anonymous,
    User(user::Model),
}

impl Actor {
    pub fn user(&self) -> Option<&user::Model> {
        match self {
            Actor::Anonymous => None,
            Actor::User(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Actor::User(_))
    }

    /// The authenticated user, or `AuthenticationRequired`.
    pub fn require_user(&self) -> AppResult<&user::Model> {
        self.user().ok_or(AppError::AuthenticationRequired)
    }
}

impl FromRequestParts<Arc<AppState>> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let bearer: Option<TypedHeader<Authorization<Bearer>>> =
            parts.extract().await.map_err(|rejection| {
                tracing::debug!(%rejection, "malformed authorization header");
                AppError::AuthenticationRequired
            })?;
        let Some(TypedHeader(Authorization(bearer))) = bearer else {
            return Ok(Actor::Anonymous);
        };

        let claims = state.tokens.decode_access_token(bearer.token())?;
        let user = user::Entity::find_by_id(claims.user_id)
            .one(&state.db)
            .await?
            .ok_or(AppError::AuthenticationRequired)?;

        Ok(Actor::User(user))
    }
}
