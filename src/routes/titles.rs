use std::{collections::HashMap, sync::Arc};

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{Method, StatusCode},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
    sea_query::{Expr, Func, SimpleExpr},
};

use super::ValidJson;
use crate::{
    AppState,
    auth::Actor,
    entities::{category, genre, review, title, title_genre},
    error::{AppError, AppResult, FieldErrors},
    filters::TitleFilter,
    models::{SlugItem, TitleOut, TitleRequest, TitleWriteOut, require},
    permissions::Policy,
    validators::validate_year,
};

const POLICY: Policy = Policy::AdminOrReadOnly;

pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<TitleFilter>,
) -> AppResult<Json<Vec<TitleOut>>> {
    let titles = filter
        .apply(title::Entity::find())?
        .order_by_desc(title::Column::Year)
        .order_by_asc(title::Column::Id)
        .all(&state.db)
        .await?;
    Ok(Json(read_views(&state.db, titles).await?))
}

pub async fn retrieve(
    State(state): State<Arc<AppState>>,
    Path(title_id): Path<i32>,
) -> AppResult<Json<TitleOut>> {
    let title = title::Entity::find_by_id(title_id).one(&state.db).await?.ok_or(AppError::NotFound)?;
    read_views(&state.db, vec![title]).await?.pop().map(Json).ok_or(AppError::NotFound)
}

pub async fn create(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    ValidJson(req): ValidJson<TitleRequest>,
) -> AppResult<(StatusCode, Json<TitleWriteOut>)> {
    POLICY.check(&method, &actor)?;

    let txn = state.db.begin().await?;
    let write = TitleWrite::resolve(&txn, req, false).await?;
    let mut active = title::ActiveModel { ..Default::default() };
    write.apply(&mut active);
    let created = active.insert(&txn).await?;
    if let Some(genre_ids) = &write.genre_ids {
        replace_genres(&txn, created.id, genre_ids).await?;
    }
    txn.commit().await?;

    tracing::info!(title_id = created.id, name = %created.name, "title created");
    Ok((StatusCode::CREATED, Json(write_view(&state.db, created).await?)))
}

/// PUT replaces every writable field, PATCH only those supplied.
pub async fn update(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path(title_id): Path<i32>,
    ValidJson(req): ValidJson<TitleRequest>,
) -> AppResult<Json<TitleWriteOut>> {
    POLICY.check(&method, &actor)?;
    let partial = method == Method::PATCH;

    let txn = state.db.begin().await?;
    let existing = title::Entity::find_by_id(title_id).one(&txn).await?.ok_or(AppError::NotFound)?;
    let write = TitleWrite::resolve(&txn, req, partial).await?;

    let mut active: title::ActiveModel = existing.clone().into();
    write.apply(&mut active);
    let updated = if active.is_changed() { active.update(&txn).await? } else { existing };
    if let Some(genre_ids) = &write.genre_ids {
        replace_genres(&txn, updated.id, genre_ids).await?;
    }
    txn.commit().await?;

    tracing::info!(title_id, partial, "title updated");
    Ok(Json(write_view(&state.db, updated).await?))
}

pub async fn destroy(
    State(state): State<Arc<AppState>>,
    actor: Actor,
    method: Method,
    Path(title_id): Path<i32>,
) -> AppResult<StatusCode> {
    POLICY.check(&method, &actor)?;

    let res = title::Entity::delete_by_id(title_id).exec(&state.db).await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!(title_id, "title deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// A validated title payload with category and genre slugs resolved to ids.
/// `None` means "leave unchanged".
#[derive(Debug, Default)]
struct TitleWrite {
    name: Option<String>,
    year: Option<i32>,
    description: Option<Option<String>>,
    category_id: Option<Option<i32>>,
    genre_ids: Option<Vec<i32>>,
}

impl TitleWrite {
    async fn resolve<C: ConnectionTrait>(db: &C, req: TitleRequest, partial: bool) -> AppResult<Self> {
        let mut errors = FieldErrors::new();
        require(&req.name, "name", partial, &mut errors);
        require(&req.year, "year", partial, &mut errors);

        if let Some(Err(msg)) = req.year.map(validate_year) {
            errors.add("year", msg);
        }

        let category_id = match req.category.as_ref().map(Option::as_deref) {
            Some(Some(slug)) => {
                let found = category::Entity::find()
                    .filter(category::Column::Slug.eq(slug))
                    .one(db)
                    .await?;
                match found {
                    Some(category) => Some(Some(category.id)),
                    None => {
                        errors.add("category", missing_slug(slug));
                        None
                    }
                }
            }
            Some(None) => Some(None),
            None if partial => None,
            None => Some(None),
        };

        let genre_ids = match req.genre {
            Some(slugs) => {
                let found = genre::Entity::find()
                    .filter(genre::Column::Slug.is_in(slugs.iter().cloned()))
                    .all(db)
                    .await?;
                let by_slug: HashMap<&str, i32> =
                    found.iter().map(|g| (g.slug.as_str(), g.id)).collect();
                let mut ids = Vec::with_capacity(slugs.len());
                for slug in &slugs {
                    match by_slug.get(slug.as_str()) {
                        Some(id) if !ids.contains(id) => ids.push(*id),
                        Some(_) => {}
                        None => errors.add("genre", missing_slug(slug)),
                    }
                }
                Some(ids)
            }
            None if partial => None,
            None => Some(Vec::new()),
        };

        errors.into_result()?;

        let description = match req.description {
            Some(text) => Some(text),
            None if partial => None,
            None => Some(None),
        };

        Ok(Self { name: req.name, year: req.year, description, category_id, genre_ids })
    }

    fn apply(&self, active: &mut title::ActiveModel) {
        if let Some(name) = &self.name {
            active.name = Set(name.clone());
        }
        if let Some(year) = self.year {
            active.year = Set(year);
        }
        if let Some(description) = &self.description {
            active.description = Set(description.clone());
        }
        if let Some(category_id) = self.category_id {
            active.category_id = Set(category_id);
        }
    }
}

fn missing_slug(slug: &str) -> String {
    format!("Object with slug={slug} does not exist.")
}

async fn replace_genres<C: ConnectionTrait>(db: &C, title_id: i32, genre_ids: &[i32]) -> AppResult<()> {
    title_genre::Entity::delete_many()
        .filter(title_genre::Column::TitleId.eq(title_id))
        .exec(db)
        .await?;
    if genre_ids.is_empty() {
        return Ok(());
    }
    let rows = genre_ids.iter().map(|&genre_id| title_genre::ActiveModel {
        title_id: Set(title_id),
        genre_id: Set(genre_id),
    });
    title_genre::Entity::insert_many(rows).exec_without_returning(db).await?;
    Ok(())
}

/// Mean review score per title; titles without reviews are absent from the map.
async fn ratings<C: ConnectionTrait>(db: &C, title_ids: &[i32]) -> AppResult<HashMap<i32, f64>> {
    let rows: Vec<(i32, Option<f64>)> = review::Entity::find()
        .select_only()
        .column(review::Column::TitleId)
        .column_as(
            SimpleExpr::FunctionCall(Func::avg(Expr::col((review::Entity, review::Column::Score)))),
            "rating",
        )
        .filter(review::Column::TitleId.is_in(title_ids.iter().copied()))
        .group_by(review::Column::TitleId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().filter_map(|(id, avg)| avg.map(|avg| (id, avg))).collect())
}

async fn read_views<C: ConnectionTrait>(db: &C, titles: Vec<title::Model>) -> AppResult<Vec<TitleOut>> {
    let ids: Vec<i32> = titles.iter().map(|t| t.id).collect();

    let category_ids: Vec<i32> = titles.iter().filter_map(|t| t.category_id).collect();
    let categories: HashMap<i32, category::Model> = category::Entity::find()
        .filter(category::Column::Id.is_in(category_ids))
        .all(db)
        .await?
        .into_iter()
        .map(|c| (c.id, c))
        .collect();

    let mut genres = genres_by_title(db, &ids).await?;
    let ratings = ratings(db, &ids).await?;

    Ok(titles
        .into_iter()
        .map(|t| TitleOut {
            id: t.id,
            genre: genres.remove(&t.id).unwrap_or_default().into_iter().map(SlugItem::from).collect(),
            category: t.category_id.and_then(|id| categories.get(&id).cloned()).map(SlugItem::from),
            rating: ratings.get(&t.id).copied(),
            name: t.name,
            year: t.year,
            description: t.description,
        })
        .collect())
}

async fn write_view<C: ConnectionTrait>(db: &C, title: title::Model) -> AppResult<TitleWriteOut> {
    let category = match title.category_id {
        Some(id) => category::Entity::find_by_id(id).one(db).await?.map(|c| c.slug),
        None => None,
    };
    let genre = genres_by_title(db, &[title.id])
        .await?
        .remove(&title.id)
        .unwrap_or_default()
        .into_iter()
        .map(|g| g.slug)
        .collect();

    Ok(TitleWriteOut {
        id: title.id,
        name: title.name,
        year: title.year,
        description: title.description,
        genre,
        category,
    })
}

async fn genres_by_title<C: ConnectionTrait>(
    db: &C,
    title_ids: &[i32],
) -> AppResult<HashMap<i32, Vec<genre::Model>>> {
    let links = title_genre::Entity::find()
        .filter(title_genre::Column::TitleId.is_in(title_ids.iter().copied()))
        .all(db)
        .await?;
    let genres: HashMap<i32, genre::Model> = genre::Entity::find()
        .filter(genre::Column::Id.is_in(links.iter().map(|l| l.genre_id)))
        .all(db)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();

    let mut out: HashMap<i32, Vec<genre::Model>> = HashMap::new();
    for link in links {
        if let Some(genre) = genres.get(&link.genre_id) {
            out.entry(link.title_id).or_default().push(genre.clone());
        }
    }
    for list in out.values_mut() {
        list.sort_by(|a, b| a.name.cmp(&b.name));
    }
    Ok(out)
}
