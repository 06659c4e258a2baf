use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use super::ValidJson;
use crate::{
    AppState,
    auth::Actor,
    entities::genre,
    error::{AppError, AppResult, FieldErrors},
    filters::{SearchQuery, name_contains},
    models::{SlugItem, SlugItemRequest},
    permissions::Policy,
    validators::validate_slug,
};

const POLICY: Policy = Policy::AdminOrReadOnly;

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(q): Query<SearchQuery>,
) -> AppResult<Json<Vec<SlugItem>>> {
    let mut select = genre::Entity::find();
    if let Some(term) = q.term() {
        select = select.filter(name_contains(genre::Column::NameFolded, &term));
    }
    let rows = select.order_by_asc(genre::Column::Name).all(&state.db).await?;
    Ok(Json(rows.into_iter().map(SlugItem::from).collect()))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    ValidJson(req): ValidJson<SlugItemRequest>,
) -> AppResult<(StatusCode, Json<SlugItem>)> {
    POLICY.check(&method, &actor)?;

    let mut errors = FieldErrors::new();
    if let Err(msg) = validate_slug(&req.slug) {
        errors.add("slug", msg);
    }
    errors.into_result()?;

    let txn = state.db.begin().await?;
    let mut errors = FieldErrors::new();
    if genre::Entity::find().filter(genre::Column::Name.eq(&req.name)).count(&txn).await? > 0 {
        errors.add("name", "genre with this name already exists.");
    }
    if genre::Entity::find().filter(genre::Column::Slug.eq(&req.slug)).count(&txn).await? > 0 {
        errors.add("slug", "genre with this slug already exists.");
    }
    errors.into_result()?;

    let created = genre::ActiveModel {
        name: Set(req.name),
        slug: Set(req.slug),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(slug = %created.slug, "genre created");
    Ok((StatusCode::CREATED, Json(created.into())))
}

/// Removing a genre detaches it from every title.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path(slug): Path<String>,
) -> AppResult<StatusCode> {
    POLICY.check(&method, &actor)?;

    let res = genre::Entity::delete_many()
        .filter(genre::Column::Slug.eq(&slug))
        .exec(&state.db)
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!(%slug, "genre deleted");
    Ok(StatusCode::NO_CONTENT)
}
