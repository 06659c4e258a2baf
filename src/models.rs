use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    entities::{category, comment, genre, review, user, user::Role},
    error::FieldErrors,
};

pub const REQUIRED: &str = "This field is required.";

/// Records a "required" error when a full (non-partial) write omits a field.
pub fn require<T>(value: &Option<T>, field: &str, partial: bool, errors: &mut FieldErrors) {
    if !partial && value.is_none() {
        errors.add(field, REQUIRED);
    }
}

fn timestamp(secs: i64) -> Option<jiff::Timestamp> {
    jiff::Timestamp::from_second(secs).ok()
}

// Categories and genres share a shape.

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SlugItem {
    pub name: String,
    pub slug: String,
}

impl From<category::Model> for SlugItem {
    fn from(m: category::Model) -> Self {
        Self { name: m.name, slug: m.slug }
    }
}

impl From<genre::Model> for SlugItem {
    fn from(m: genre::Model) -> Self {
        Self { name: m.name, slug: m.slug }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct SlugItemRequest {
    #[validate(length(min = 1, max = 256))]
    pub name: String,
    pub slug: String,
}

// Titles

#[derive(Debug, Default, Deserialize, Validate)]
pub struct TitleRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub year: Option<i32>,
    /// Absent leaves the field alone on PATCH; `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub description: Option<Option<String>>,
    pub genre: Option<Vec<String>>,
    #[serde(default, deserialize_with = "present")]
    pub category: Option<Option<String>>,
}

/// Distinguishes an explicit `null` from an absent key.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Read shape: category and genres expanded, rating computed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TitleOut {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub genre: Vec<SlugItem>,
    pub category: Option<SlugItem>,
    pub rating: Option<f64>,
}

/// Write shape: relations as slugs, echoing what was accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TitleWriteOut {
    pub id: i32,
    pub name: String,
    pub year: i32,
    pub description: Option<String>,
    pub genre: Vec<String>,
    pub category: Option<String>,
}

// Reviews and comments

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ReviewRequest {
    #[validate(length(min = 1))]
    pub text: Option<String>,
    #[validate(range(min = 1, max = 10))]
    pub score: Option<i32>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReviewOut {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub score: i32,
    pub pub_date: Option<jiff::Timestamp>,
    pub title: i32,
}

impl ReviewOut {
    pub fn new(m: review::Model, author: String) -> Self {
        Self {
            id: m.id,
            text: m.text,
            author,
            score: m.score,
            pub_date: timestamp(m.pub_date),
            title: m.title_id,
        }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CommentRequest {
    #[validate(length(min = 1))]
    pub text: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CommentOut {
    pub id: i32,
    pub text: String,
    pub author: String,
    pub pub_date: Option<jiff::Timestamp>,
    pub review: i32,
}

impl CommentOut {
    pub fn new(m: comment::Model, author: String) -> Self {
        Self { id: m.id, text: m.text, author, pub_date: timestamp(m.pub_date), review: m.review_id }
    }
}

// Users

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserRequest {
    pub username: Option<String>,
    #[validate(email, length(max = 254))]
    pub email: Option<String>,
    #[validate(length(max = 150))]
    pub first_name: Option<String>,
    #[validate(length(max = 150))]
    pub last_name: Option<String>,
    pub bio: Option<String>,
    pub role: Option<Role>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UserOut {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    pub role: Role,
}

impl From<user::Model> for UserOut {
    fn from(m: user::Model) -> Self {
        Self {
            username: m.username,
            email: m.email,
            first_name: m.first_name,
            last_name: m.last_name,
            bio: m.bio,
            role: m.role,
        }
    }
}

// Auth

#[derive(Debug, Deserialize, Validate)]
pub struct EmailRequest {
    #[validate(email, length(max = 254))]
    pub email: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct TokenRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 50))]
    pub confirmation_code: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageOut {
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenOut {
    pub token: String,
}
