use std::sync::Arc;

use axum::{Json, extract::State};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Set, SqlErr,
    sea_query::Expr,
};

use super::ValidJson;
use crate::{
    AppState,
    db::{now_micros, now_sec},
    entities::user,
    error::{AppError, AppResult, FieldErrors},
    mail::OutgoingMail,
    models::{EmailRequest, MessageOut, TokenOut, TokenRequest},
    validators::validate_username,
};

const CODE_MISMATCH: &str = "Confirmation code is invalid or has expired.";

/// Sends a confirmation code to the address, registering it on first use.
pub async fn request_code(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<EmailRequest>,
) -> AppResult<Json<MessageOut>> {
    let user = find_or_register(&state.db, &req.email).await?;
    let code = state.tokens.make_confirmation_code(&user);

    state
        .mailer
        .send(OutgoingMail {
            subject: "YaMDb confirmation code".to_string(),
            body: format!("Your confirmation code: {code}"),
            sender: state.config.default_from_email.clone(),
            recipients: vec![req.email.clone()],
        })
        .await?;

    tracing::info!(user_id = user.id, "confirmation code sent");
    Ok(Json(MessageOut { message: format!("Confirmation code sent to {}.", req.email) }))
}

/// Trades a confirmation code for a bearer token. A code works once.
pub async fn exchange_token(
    State(state): State<Arc<AppState>>,
    ValidJson(req): ValidJson<TokenRequest>,
) -> AppResult<Json<TokenOut>> {
    let user = find_by_email(&state.db, &req.email).await?.ok_or(AppError::NotFound)?;
    if !state.tokens.check_confirmation_code(&user, &req.confirmation_code) {
        tracing::debug!(user_id = user.id, "confirmation code rejected");
        return Err(code_mismatch());
    }

    // Bumping last_login changes the fingerprint, so the compare-and-set makes
    // the code single-use even under concurrent exchanges.
    let next_login = now_micros().max(user.last_login.map_or(i64::MIN, |prev| prev + 1));
    let same_login = match user.last_login {
        Some(prev) => user::Column::LastLogin.eq(prev),
        None => user::Column::LastLogin.is_null(),
    };
    let res = user::Entity::update_many()
        .col_expr(user::Column::LastLogin, Expr::value(next_login))
        .filter(user::Column::Id.eq(user.id))
        .filter(same_login)
        .exec(&state.db)
        .await?;
    if res.rows_affected != 1 {
        tracing::debug!(user_id = user.id, "confirmation code already consumed");
        return Err(code_mismatch());
    }

    let token = state.tokens.issue_access_token(&user)?;
    tracing::info!(user_id = user.id, "access token issued");
    Ok(Json(TokenOut { token }))
}

fn code_mismatch() -> AppError {
    AppError::Validation(FieldErrors::single("confirmation_code", CODE_MISMATCH))
}

async fn find_by_email<C: ConnectionTrait>(db: &C, email: &str) -> AppResult<Option<user::Model>> {
    Ok(user::Entity::find().filter(user::Column::Email.eq(email)).one(db).await?)
}

/// New users get the address as their username.
async fn find_or_register<C: ConnectionTrait>(db: &C, email: &str) -> AppResult<user::Model> {
    if let Some(user) = find_by_email(db, email).await? {
        return Ok(user);
    }
    if let Err(msg) = validate_username(email) {
        return Err(AppError::Validation(FieldErrors::single("email", msg)));
    }

    let inserted = user::ActiveModel {
        username: Set(email.to_string()),
        email: Set(email.to_string()),
        first_name: Set(String::new()),
        last_name: Set(String::new()),
        bio: Set(None),
        role: Set(user::Role::User),
        is_staff: Set(false),
        last_login: Set(None),
        date_joined: Set(now_sec()),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        Ok(user) => {
            tracing::info!(user_id = user.id, "user registered");
            Ok(user)
        }
        // Lost a race with a concurrent request for the same address, or the
        // address is already somebody's username.
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            find_by_email(db, email).await?.ok_or_else(|| {
                AppError::Validation(FieldErrors::single(
                    "email",
                    "A user with that username already exists.",
                ))
            })
        }
        Err(err) => Err(err.into()),
    }
}
