pub mod category;
pub mod comment;
pub mod genre;
pub mod review;
pub mod title;
pub mod title_genre;
pub mod user;

/// Case folding for the stored search columns and for search input.
/// SQLite's `LOWER()` is ASCII-only, so folding happens here instead.
pub fn fold_case(text: &str) -> String {
    text.to_lowercase()
}
