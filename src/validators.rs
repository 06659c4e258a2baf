use std::sync::LazyLock;

use regex::Regex;

static SLUG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug regex"));
static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username regex"));

pub const SLUG_MAX_LEN: usize = 50;
pub const USERNAME_MAX_LEN: usize = 150;

/// A release year may not lie in the future. There is no lower bound.
pub fn validate_year(year: i32) -> Result<(), String> {
    validate_year_against(year, i32::from(jiff::Zoned::now().date().year()))
}

pub fn validate_year_against(year: i32, current_year: i32) -> Result<(), String> {
    if year > current_year {
        return Err(format!("Year {year} is later than the current year {current_year}."));
    }
    Ok(())
}

pub fn validate_slug(slug: &str) -> Result<(), String> {
    if slug.is_empty() || slug.chars().count() > SLUG_MAX_LEN {
        return Err(format!("Slug must be between 1 and {SLUG_MAX_LEN} characters."));
    }
    if !SLUG_RE.is_match(slug) {
        return Err("Slug may contain only letters, numbers, underscores or hyphens.".to_string());
    }
    Ok(())
}

pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() || username.chars().count() > USERNAME_MAX_LEN {
        return Err(format!("Username must be between 1 and {USERNAME_MAX_LEN} characters."));
    }
    if username == "me" {
        return Err("The username \"me\" is reserved.".to_string());
    }
    if !USERNAME_RE.is_match(username) {
        return Err("Username may contain only letters, digits and @/./+/-/_.".to_string());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn year_up_to_current_is_accepted() {
        assert!(validate_year_against(2024, 2024).is_ok());
        assert!(validate_year_against(1895, 2024).is_ok());
        assert!(validate_year_against(-300, 2024).is_ok());
    }

    #[test]
    fn future_year_is_rejected() {
        assert!(validate_year_against(2025, 2024).is_err());
    }

    #[test]
    fn validate_year_uses_the_clock() {
        let year = i32::from(jiff::Zoned::now().date().year());
        assert!(validate_year(year).is_ok());
        assert!(validate_year(year + 1).is_err());
    }

    #[test]
    fn slugs() {
        assert!(validate_slug("sci-fi_2").is_ok());
        assert!(validate_slug("").is_err());
        assert!(validate_slug("with space").is_err());
        assert!(validate_slug(&"a".repeat(SLUG_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn usernames() {
        assert!(validate_username("reader@example.com").is_ok());
        assert!(validate_username("me").is_err());
        assert!(validate_username("bad name").is_err());
    }
}
