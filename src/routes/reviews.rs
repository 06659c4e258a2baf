use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::{Method, StatusCode},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};

use super::{ValidJson, author_names};
use crate::{
    AppState,
    auth::Actor,
    db::now_sec,
    entities::{review, title},
    error::{AppError, AppResult, FieldErrors, NON_FIELD_ERRORS},
    models::{ReviewOut, ReviewRequest, require},
    permissions::Policy,
};

const POLICY: Policy = Policy::AuthorOrStaffOrReadOnly;

pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(title_id): Path<i32>,
) -> AppResult<Json<Vec<ReviewOut>>> {
    find_title(&state.db, title_id).await?;

    let reviews = review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .order_by_asc(review::Column::Id)
        .all(&state.db)
        .await?;
    let mut names = author_names(&state.db, reviews.iter().map(|r| r.author_id)).await?;

    Ok(Json(
        reviews
            .into_iter()
            .map(|r| {
                let author = names.remove(&r.author_id).unwrap_or_default();
                ReviewOut::new(r, author)
            })
            .collect(),
    ))
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path(title_id): Path<i32>,
    ValidJson(req): ValidJson<ReviewRequest>,
) -> AppResult<(StatusCode, Json<ReviewOut>)> {
    POLICY.check(&method, &actor)?;
    let author = actor.require_user()?;

    let (text, score) = match (req.text, req.score) {
        (Some(text), Some(score)) => (text, score),
        (text, score) => {
            let mut errors = FieldErrors::new();
            require(&text, "text", false, &mut errors);
            require(&score, "score", false, &mut errors);
            return Err(AppError::Validation(errors));
        }
    };

    let txn = state.db.begin().await?;
    find_title(&txn, title_id).await?;

    let already_reviewed = review::Entity::find()
        .filter(review::Column::TitleId.eq(title_id))
        .filter(review::Column::AuthorId.eq(author.id))
        .count(&txn)
        .await?
        > 0;
    if already_reviewed {
        return Err(AppError::Validation(FieldErrors::single(
            NON_FIELD_ERRORS,
            "You have already reviewed this title.",
        )));
    }

    // Concurrent duplicates still trip the unique (title_id, author_id) index.
    let created = review::ActiveModel {
        text: Set(text),
        score: Set(score),
        title_id: Set(title_id),
        author_id: Set(author.id),
        pub_date: Set(now_sec()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!(review_id = created.id, title_id, author_id = author.id, "review created");
    Ok((StatusCode::CREATED, Json(ReviewOut::new(created, author.username.clone()))))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> AppResult<Json<ReviewOut>> {
    let review = find_review(&state.db, title_id, review_id).await?;
    let author = author_of(&state.db, &review).await?;
    Ok(Json(ReviewOut::new(review, author)))
}

pub async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id)): Path<(i32, i32)>,
    ValidJson(req): ValidJson<ReviewRequest>,
) -> AppResult<Json<ReviewOut>> {
    POLICY.check(&method, &actor)?;
    let partial = method == Method::PATCH;

    let txn = state.db.begin().await?;
    let review = find_review(&txn, title_id, review_id).await?;
    POLICY.check_object(&method, &actor, review.author_id)?;

    let mut errors = FieldErrors::new();
    require(&req.text, "text", partial, &mut errors);
    require(&req.score, "score", partial, &mut errors);
    errors.into_result()?;

    let mut active: review::ActiveModel = review.clone().into();
    if let Some(text) = req.text {
        active.text = Set(text);
    }
    if let Some(score) = req.score {
        active.score = Set(score);
    }
    let updated = if active.is_changed() { active.update(&txn).await? } else { review };
    let author = author_of(&txn, &updated).await?;
    txn.commit().await?;

    tracing::info!(review_id, partial, "review updated");
    Ok(Json(ReviewOut::new(updated, author)))
}

/// Comments on the review go with it.
pub async fn destroy(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path((title_id, review_id)): Path<(i32, i32)>,
) -> AppResult<StatusCode> {
    POLICY.check(&method, &actor)?;

    let txn = state.db.begin().await?;
    let review = find_review(&txn, title_id, review_id).await?;
    POLICY.check_object(&method, &actor, review.author_id)?;
    review::Entity::delete_by_id(review.id).exec(&txn).await?;
    txn.commit().await?;

    tracing::info!(review_id, "review deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn find_title<C: ConnectionTrait>(db: &C, title_id: i32) -> AppResult<title::Model> {
    title::Entity::find_by_id(title_id).one(db).await?.ok_or(AppError::NotFound)
}

/// A review addressed through a title it does not belong to is not found.
pub(crate) async fn find_review<C: ConnectionTrait>(
    db: &C,
    title_id: i32,
    review_id: i32,
) -> AppResult<review::Model> {
    review::Entity::find_by_id(review_id)
        .filter(review::Column::TitleId.eq(title_id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound)
}

async fn author_of<C: ConnectionTrait>(db: &C, review: &review::Model) -> AppResult<String> {
    Ok(author_names(db, [review.author_id]).await?.remove(&review.author_id).unwrap_or_default())
}
