use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};

use super::{ValidJson, author_names, reviews::find_review};
use crate::{
    AppState,
    auth::Actor,
    db::now_sec,
    entities::comment,
    error::{AppError, AppResult, FieldErrors},
    models::{CommentOut, CommentRequest, REQUIRED, require},
    permissions::Policy,
};

const POLICY: Policy = Policy::AuthorOrStaffOrReadOnly;

/// Newest first.
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> AppResult<Json<Vec<CommentOut>>> {
    let review = find_review(&state.db, title_id, review_id).await?;

    let comments = comment::Entity::find()
        .filter(comment::Column::ReviewId.eq(review.id))
        .order_by_desc(comment::Column::PubDate)
        .order_by_desc(comment::Column::Id)
        .all(&state.db)
        .await?;
    let mut names = author_names(&state.db, comments.iter().map(|c| c.author_id)).await?;

    Ok(Json(
        comments
            .into_iter()
            .map(|c| {
                let author = names.remove(&c.author_id).unwrap_or_default();
                CommentOut::new(c, author)
            })
            .collect(),
    ))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id)): Path<(i32, i32)>,
    ValidJson(req): ValidJson<CommentRequest>,
) -> AppResult<(StatusCode, Json<CommentOut>)> {
    POLICY.check(&method, &actor)?;
    let author = actor.require_user()?;

    let Some(text) = req.text else {
        return Err(AppError::Validation(FieldErrors::single("text", REQUIRED)));
    };

    let txn = state.db.begin().await?;
    let review = find_review(&txn, title_id, review_id).await?;
    let created = comment::ActiveModel {
        text: Set(text),
        review_id: Set(review.id),
        author_id: Set(author.id),
        pub_date: Set(now_sec()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(comment_id = created.id, review_id, author_id = author.id, "comment created");
    Ok((StatusCode::CREATED, Json(CommentOut::new(created, author.username.clone()))))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
) -> AppResult<Json<CommentOut>> {
    let comment = find_comment(&state.db, title_id, review_id, comment_id).await?;
    let author = author_of(&state.db, &comment).await?;
    Ok(Json(CommentOut::new(comment, author)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
    ValidJson(req): ValidJson<CommentRequest>,
) -> AppResult<Json<CommentOut>> {
    POLICY.check(&method, &actor)?;
    let partial = method == Method::PATCH;

    let txn = state.db.begin().await?;
    let comment = find_comment(&txn, title_id, review_id, comment_id).await?;
    POLICY.check_object(&method, &actor, comment.author_id)?;

    let mut errors = FieldErrors::new();
    require(&req.text, "text", partial, &mut errors);
    errors.into_result()?;

    let mut active: comment::ActiveModel = comment.clone().into();
    if let Some(text) = req.text {
        active.text = Set(text);
    }
    let updated = if active.is_changed() { active.update(&txn).await? } else { comment };
    let author = author_of(&txn, &updated).await?;
    txn.commit().await?;

    tracing::info!(comment_id, partial, "comment updated");
    Ok(Json(CommentOut::new(updated, author)))
}

pub async fn destroy(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id, comment_id)): Path<(i32, i32, i32)>,
) -> AppResult<StatusCode> {
    POLICY.check(&method, &actor)?;

    let txn = state.db.begin().await?;
    let comment = find_comment(&txn, title_id, review_id, comment_id).await?;
    POLICY.check_object(&method, &actor, comment.author_id)?;
    comment::Entity::delete_by_id(comment.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(comment_id, "comment deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Scoped by both path ids: the review must belong to the title and the comment to the review.
async fn find_comment<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    review_id: i32,
    comment_id: i32,
) -> AppResult<comment::Model> {
    let review = find_review(db, title_id, review_id).await?;
    comment::Entity::find_by_id(comment_id)
        .filter(comment::Column::ReviewId.eq(review.id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound)
}

async fn author_of<C: ConnectionTrait>(db: &C, comment: &comment::Model) -> AppResult<String> {
    Ok(author_names(db, [comment.author_id]).await?.remove(&comment.author_id).unwrap_or_default())
}
