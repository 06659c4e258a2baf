mod common;

use axum::http::{Method, StatusCode};
use common::spawn_app;
use serde_json::json;
use yamdb::entities::user::Role;

#[tokio::test]
async fn user_administration_is_admin_only() {
    let app = spawn_app().await;
    let (_, user) = app.login("reader", Role::User).await;
    let (_, moderator) = app.login("mod", Role::Moderator).await;

    let (status, _) = app.get("/api/v1/users", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.get("/api/v1/users", Some(&user)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/users", Some(&moderator)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.get("/api/v1/users/reader", Some(&moderator)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_creates_lists_and_searches_users() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;

    let (status, body) = app
        .post(
            "/api/v1/users",
            Some(&admin),
            json!({ "username": "critic", "email": "critic@example.com", "bio": "Opinions." }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["role"], json!("user"));
    assert_eq!(body["bio"], json!("Opinions."));
    assert_eq!(body["first_name"], json!(""));

    let (_, list) = app.get("/api/v1/users", Some(&admin)).await;
    let names: Vec<&str> =
        list.as_array().unwrap().iter().map(|u| u["username"].as_str().unwrap()).collect();
    assert_eq!(names, ["boss", "critic"]);

    let (_, found) = app.get("/api/v1/users?search=crit", Some(&admin)).await;
    assert_eq!(found.as_array().unwrap().len(), 1);
    let (_, found) = app.get("/api/v1/users?search=CRIT", Some(&admin)).await;
    assert_eq!(found[0]["username"], json!("critic"));

    let (status, body) = app.get("/api/v1/users/critic", Some(&admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], json!("critic@example.com"));
}

#[tokio::test]
async fn usernames_and_emails_are_unique() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;

    let (status, body) = app
        .post("/api/v1/users", Some(&admin), json!({ "username": "boss", "email": "other@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array(), "{body}");

    let (status, body) = app
        .post("/api/v1/users", Some(&admin), json!({ "username": "other", "email": "boss@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array(), "{body}");
}

#[tokio::test]
async fn reserved_and_missing_fields_are_rejected() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;

    let (status, body) = app
        .post("/api/v1/users", Some(&admin), json!({ "username": "me", "email": "me@example.com" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["username"].is_array(), "{body}");

    let (status, body) = app.post("/api/v1/users", Some(&admin), json!({ "username": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["email"].is_array(), "{body}");

    let (status, body) = app
        .post("/api/v1/users", Some(&admin), json!({ "username": "x", "email": "x@example.com", "role": "god" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
}

#[tokio::test]
async fn admin_updates_and_deletes_users() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;
    app.create_user("critic", Role::User, false).await;

    let (status, body) =
        app.patch("/api/v1/users/critic", Some(&admin), json!({ "role": "moderator" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], json!("moderator"));

    let (status, _) = app
        .request(Method::PUT, "/api/v1/users/critic", Some(&admin), Some(json!({ "first_name": "C" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app.delete("/api/v1/users/critic", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.get("/api/v1/users/critic", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn me_requires_authentication() {
    let app = spawn_app().await;
    let (status, _) = app.get("/api/v1/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.patch("/api/v1/users/me", None, json!({ "bio": "hi" })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn self_edit_cannot_change_role() {
    let app = spawn_app().await;
    let (_, token) = app.login("reader", Role::User).await;

    let (status, body) = app
        .patch("/api/v1/users/me", Some(&token), json!({ "bio": "I read.", "role": "admin" }))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bio"], json!("I read."));
    assert_eq!(body["role"], json!("user"));

    let (_, me) = app.get("/api/v1/users/me", Some(&token)).await;
    assert_eq!(me["role"], json!("user"));
    assert_eq!(me["username"], json!("reader"));
}

#[tokio::test]
async fn admin_self_edit_may_change_role() {
    let app = spawn_app().await;
    let (_, token) = app.login("boss", Role::Admin).await;

    let (status, body) =
        app.patch("/api/v1/users/me", Some(&token), json!({ "role": "moderator" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["role"], json!("moderator"));
}

#[tokio::test]
async fn deleting_a_user_removes_their_reviews() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;
    let (_, alice) = app.login("alice", Role::User).await;
    let title = app.create_title(&admin, json!({ "name": "Mirror", "year": 1975 })).await;
    app.create_review(&alice, title, 8).await;

    let (status, _) = app.delete("/api/v1/users/alice", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, reviews) = app.get(&format!("/api/v1/titles/{title}/reviews"), None).await;
    assert_eq!(reviews, json!([]));
}
