use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use super::ValidJson;
use crate::{
    AppState,
    auth::Actor,
    db::now_sec,
    entities::user,
    error::{AppError, AppResult, FieldErrors},
    filters::{SearchQuery, name_contains},
    models::{UserOut, UserRequest, require},
    permissions::Policy,
    validators::validate_username,
};

pub async fn list(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<UserOut>>> {
    Policy::AdminOnly.check(&method, &actor)?;

    let mut select = user::Entity::find();
    if let Some(term) = q.term() {
        select = select.filter(name_contains(user::Column::UsernameFolded, &term));
    }
    let users = select.order_by_asc(user::Column::Username).all(&state.db).await?;
    Ok(Json(users.into_iter().map(UserOut::from).collect()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    ValidJson(req): ValidJson<UserRequest>,
) -> AppResult<(StatusCode, Json<UserOut>)> {
    Policy::AdminOnly.check(&method, &actor)?;

    let txn = state.db.begin().await?;
    check_user_fields(&txn, &req, false, None).await?;

    let created = user::ActiveModel {
        username: Set(req.username.unwrap_or_default()),
        email: Set(req.email.unwrap_or_default()),
        first_name: Set(req.first_name.unwrap_or_default()),
        last_name: Set(req.last_name.unwrap_or_default()),
        bio: Set(req.bio),
        role: Set(req.role.unwrap_or_default()),
        is_staff: Set(false),
        last_login: Set(None),
        date_joined: Set(now_sec()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(username = %created.username, role = ?created.role, "user created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path(username): Path<String>,
) -> AppResult<Json<UserOut>> {
    Policy::AdminOnly.check(&method, &actor)?;
    Ok(Json(find_by_username(&state.db, &username).await?.into()))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path(username): Path<String>,
    ValidJson(req): ValidJson<UserRequest>,
) -> AppResult<Json<UserOut>> {
    Policy::AdminOnly.check(&method, &actor)?;
    let partial = method == Method::PATCH;

    let txn = state.db.begin().await?;
    let existing = find_by_username(&txn, &username).await?;
    let updated = apply_update(&txn, existing, req, partial, true).await?;
    txn.commit().await?;

    tracing::info!(%username, partial, "user updated");
    Ok(Json(updated.into()))
}

/// Reviews and comments by the user are removed with them.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path(username): Path<String>,
) -> AppResult<StatusCode> {
    Policy::AdminOnly.check(&method, &actor)?;

    let res = user::Entity::delete_many()
        .filter(user::Column::Username.eq(&username))
        .exec(&state.db)
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!(%username, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn me(actor: Actor, method: Method) -> AppResult<Json<UserOut>> {
    Policy::Authenticated.check(&method, &actor)?;
    Ok(Json(actor.require_user()?.clone().into()))
}

/// Always partial. A non-admin may not change their own role; a supplied role is ignored.
pub async fn update_me(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    ValidJson(req): ValidJson<UserRequest>,
) -> AppResult<Json<UserOut>> {
    Policy::Authenticated.check(&method, &actor)?;
    let current = actor.require_user()?.clone();
    let may_change_role = current.is_admin();

    let txn = state.db.begin().await?;
    let updated = apply_update(&txn, current, req, true, may_change_role).await?;
    txn.commit().await?;

    tracing::info!(username = %updated.username, "profile updated");
    Ok(Json(updated.into()))
}

async fn find_by_username<C: ConnectionTrait>(db: &C, username: &str) -> AppResult<user::Model> {
    user::Entity::find()
        .filter(user::Column::Username.eq(username))
        .one(db)
        .await?
        .ok_or(AppError::NotFound)
}

async fn apply_update<C: ConnectionTrait>(
    db: &C,
    existing: user::Model,
    req: UserRequest,
    partial: bool,
    may_change_role: bool,
) -> AppResult<user::Model> {
    check_user_fields(db, &req, partial, Some(existing.id)).await?;

    let mut active: user::ActiveModel = existing.clone().into();
    if let Some(username) = req.username {
        active.username = Set(username);
    }
    if let Some(email) = req.email {
        active.email = Set(email);
    }
    if let Some(first_name) = req.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = req.last_name {
        active.last_name = Set(last_name);
    }
    if req.bio.is_some() || !partial {
        active.bio = Set(req.bio);
    }
    if may_change_role && let Some(role) = req.role {
        active.role = Set(role);
    }

    if active.is_changed() { Ok(active.update(db).await?) } else { Ok(existing) }
}

/// Required fields, username rules and uniqueness of username and email.
/// `exclude` is the id of the user being updated, if any.
async fn check_user_fields<C: ConnectionTrait>(
    db: &C,
    req: &UserRequest,
    partial: bool,
    exclude: Option<i32>,
) -> AppResult<()> {
    let mut errors = FieldErrors::new();
    require(&req.username, "username", partial, &mut errors);
    require(&req.email, "email", partial, &mut errors);

    if let Some(username) = &req.username {
        if let Err(msg) = validate_username(username) {
            errors.add("username", msg);
        } else if taken(db, user::Column::Username, username, exclude).await? {
            errors.add("username", "A user with that username already exists.");
        }
    }
    if let Some(email) = &req.email
        && taken(db, user::Column::Email, email, exclude).await?
    {
        errors.add("email", "user with this email already exists.");
    }

    errors.into_result()
}

async fn taken<C: ConnectionTrait>(
    db: &C,
    column: user::Column,
    value: &str,
    exclude: Option<i32>,
) -> AppResult<bool> {
    let mut select = user::Entity::find().filter(column.eq(value));
    if let Some(id) = exclude {
        select = select.filter(user::Column::Id.ne(id));
    }
    Ok(select.count(db).await? > 0)
}
