use sea_orm::{
    ColumnTrait, QueryFilter, Select,
    sea_query::{Expr, Func, LikeExpr, Query, SimpleExpr},
};
use serde::Deserialize;

use crate::{
    entities::{category, fold_case, genre, title, title_genre},
    error::{AppError, AppResult, FieldErrors},
};

/// `?search=` on name-searchable listings.
#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub search: Option<String>,
}

impl SearchQuery {
    pub fn term(&self) -> Option<String> {
        non_empty(&self.search).map(str::to_owned)
    }
}

/// Title listing filters. Each supplied filter narrows the result (AND).
#[derive(Debug, Default, Deserialize)]
pub struct TitleFilter {
    pub category: Option<String>,
    pub genre: Option<String>,
    pub name: Option<String>,
    pub year: Option<String>,
}

impl TitleFilter {
    pub fn apply(&self, mut select: Select<title::Entity>) -> AppResult<Select<title::Entity>> {
        if let Some(slug) = non_empty(&self.category) {
            select = select.filter(
                title::Column::CategoryId.in_subquery(
                    Query::select()
                        .column((category::Entity, category::Column::Id))
                        .from(category::Entity)
                        .and_where(
                            Expr::expr(Func::lower(Expr::col((category::Entity, category::Column::Slug))))
                                .eq(slug.to_ascii_lowercase()),
                        )
                        .to_owned(),
                ),
            );
        }

        if let Some(slug) = non_empty(&self.genre) {
            select = select.filter(
                title::Column::Id.in_subquery(
                    Query::select()
                        .column((title_genre::Entity, title_genre::Column::TitleId))
                        .from(title_genre::Entity)
                        .inner_join(
                            genre::Entity,
                            Expr::col((genre::Entity, genre::Column::Id))
                                .equals((title_genre::Entity, title_genre::Column::GenreId)),
                        )
                        .and_where(
                            Expr::expr(Func::lower(Expr::col((genre::Entity, genre::Column::Slug))))
                                .eq(slug.to_ascii_lowercase()),
                        )
                        .to_owned(),
                ),
            );
        }

        if let Some(name) = non_empty(&self.name) {
            select = select.filter(name_contains(title::Column::NameFolded, name));
        }

        if let Some(year) = non_empty(&self.year) {
            let Ok(year) = year.parse::<i32>() else {
                return Err(AppError::Validation(FieldErrors::single("year", "Enter a whole number.")));
            };
            select = select.filter(title::Column::Year.eq(year));
        }

        tracing::debug!(filter = ?self, "title filter applied");
        Ok(select)
    }
}

/// Case-insensitive substring match against a case-folded column.
/// `%`, `_` and `\` in the needle match themselves.
pub fn name_contains<C: ColumnTrait>(folded: C, needle: &str) -> SimpleExpr {
    let pattern = format!("%{}%", escape_like(&fold_case(needle)));
    Expr::col(folded.as_column_ref()).like(LikeExpr::new(pattern).escape('\\'))
}

fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use sea_orm::{DbBackend, EntityTrait, QueryTrait};

    use super::*;

    fn sql(filter: TitleFilter) -> String {
        filter.apply(title::Entity::find()).unwrap().build(DbBackend::Sqlite).to_string()
    }

    #[test]
    fn no_filters_leave_the_query_alone() {
        let plain = title::Entity::find().build(DbBackend::Sqlite).to_string();
        assert_eq!(sql(TitleFilter::default()), plain);
    }

    #[test]
    fn name_matches_the_folded_column() {
        let sql = sql(TitleFilter { name: Some("FoO".into()), ..Default::default() });
        assert!(sql.contains("\"name_folded\" LIKE '%foo%' ESCAPE '\\'"), "{sql}");
        assert!(!sql.to_uppercase().contains("LOWER"), "{sql}");
    }

    #[test]
    fn name_folds_beyond_ascii() {
        let sql = sql(TitleFilter { name: Some("ВЛАСТЕЛИН".into()), ..Default::default() });
        assert!(sql.contains("'%властелин%'"), "{sql}");
    }

    #[test]
    fn like_wildcards_in_the_needle_are_literal() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("c:\\"), "c:\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn filters_combine_with_and() {
        let sql = sql(TitleFilter {
            name: Some("foo".into()),
            year: Some("1999".into()),
            genre: Some("Drama".into()),
            category: Some("Film".into()),
        });
        assert!(sql.contains("1999"), "{sql}");
        assert!(sql.contains("'drama'"), "{sql}");
        assert!(sql.contains("'film'"), "{sql}");
        assert!(sql.matches(" AND ").count() >= 3, "{sql}");
    }

    #[test]
    fn non_numeric_year_is_a_field_error() {
        let err = TitleFilter { year: Some("soon".into()), ..Default::default() }
            .apply(title::Entity::find())
            .unwrap_err();
        match err {
            AppError::Validation(errors) => assert!(errors.get("year").is_some()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn search_term_is_trimmed() {
        assert_eq!(SearchQuery { search: Some("  Rock ".into()) }.term().as_deref(), Some("Rock"));
        assert_eq!(SearchQuery { search: Some("   ".into()) }.term(), None);
    }
}
