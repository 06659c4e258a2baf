mod common;

use axum::http::StatusCode;
use common::spawn_app;
use serde_json::json;
use yamdb::entities::user::Role;

#[tokio::test]
async fn anyone_can_list_categories() {
    let app = spawn_app().await;
    let (status, body) = app.get("/api/v1/categories", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn only_admins_create_categories() {
    let app = spawn_app().await;
    let (_, user_token) = app.login("reader", Role::User).await;
    let (_, moderator_token) = app.login("mod", Role::Moderator).await;
    let (_, admin_token) = app.login("boss", Role::Admin).await;
    let payload = json!({ "name": "Films", "slug": "films" });

    let (status, _) = app.post("/api/v1/categories", None, payload.clone()).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.post("/api/v1/categories", Some(&user_token), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.post("/api/v1/categories", Some(&moderator_token), payload.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.post("/api/v1/categories", Some(&admin_token), payload).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body, json!({ "name": "Films", "slug": "films" }));
}

#[tokio::test]
async fn staff_flag_counts_as_admin() {
    let app = spawn_app().await;
    let staff = app.create_user("staffer", Role::User, true).await;
    let token = app.state.tokens.issue_access_token(&staff).unwrap();

    let (status, _) =
        app.post("/api/v1/genres", Some(&token), json!({ "name": "Drama", "slug": "drama" })).await;
    assert_eq!(status, StatusCode::CREATED);
}

#[tokio::test]
async fn duplicate_and_malformed_slugs_are_rejected() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;

    let (status, _) =
        app.post("/api/v1/genres", Some(&admin), json!({ "name": "Drama", "slug": "drama" })).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) =
        app.post("/api/v1/genres", Some(&admin), json!({ "name": "Other", "slug": "drama" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["slug"].is_array(), "{body}");

    let (status, body) =
        app.post("/api/v1/genres", Some(&admin), json!({ "name": "Bad", "slug": "no spaces" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["slug"].is_array(), "{body}");
}

#[tokio::test]
async fn search_and_ordering() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;
    for (name, slug) in [("Music", "music"), ("Books", "books"), ("Films", "films")] {
        app.post("/api/v1/categories", Some(&admin), json!({ "name": name, "slug": slug })).await;
    }

    let (_, body) = app.get("/api/v1/categories", None).await;
    let names: Vec<&str> = body.as_array().unwrap().iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Books", "Films", "Music"]);

    let (_, body) = app.get("/api/v1/categories?search=FIL", None).await;
    assert_eq!(body, json!([{ "name": "Films", "slug": "films" }]));
}

#[tokio::test]
async fn search_folds_case_beyond_ascii_and_matches_wildcards_literally() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;
    for (name, slug) in [("Песни", "songs"), ("Films", "films"), ("50% Off", "sale")] {
        let (status, _) =
            app.post("/api/v1/categories", Some(&admin), json!({ "name": name, "slug": slug })).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // ?search=ПЕСНИ
    let (_, body) = app.get("/api/v1/categories?search=%D0%9F%D0%95%D0%A1%D0%9D%D0%98", None).await;
    assert_eq!(body, json!([{ "name": "Песни", "slug": "songs" }]));

    let (_, body) = app.get("/api/v1/categories?search=%25", None).await;
    assert_eq!(body, json!([{ "name": "50% Off", "slug": "sale" }]));

    let (_, body) = app.get("/api/v1/categories?search=_", None).await;
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn deleting_a_category_keeps_its_titles() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;
    app.post("/api/v1/categories", Some(&admin), json!({ "name": "Films", "slug": "films" })).await;
    let title_id = app
        .create_title(&admin, json!({ "name": "Stalker", "year": 1979, "category": "films" }))
        .await;

    let (status, _) = app.delete("/api/v1/categories/films", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = app.get(&format!("/api/v1/titles/{title_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["category"], json!(null));

    let (status, _) = app.delete("/api/v1/categories/films", Some(&admin)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_a_genre_unlinks_it_from_titles() {
    let app = spawn_app().await;
    let (_, admin) = app.login("boss", Role::Admin).await;
    app.post("/api/v1/genres", Some(&admin), json!({ "name": "Drama", "slug": "drama" })).await;
    app.post("/api/v1/genres", Some(&admin), json!({ "name": "Sci-Fi", "slug": "sci-fi" })).await;
    let title_id = app
        .create_title(&admin, json!({ "name": "Solaris", "year": 1972, "genre": ["drama", "sci-fi"] }))
        .await;

    let (status, _) = app.delete("/api/v1/genres/drama", Some(&admin)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, body) = app.get(&format!("/api/v1/titles/{title_id}"), None).await;
    assert_eq!(body["genre"], json!([{ "name": "Sci-Fi", "slug": "sci-fi" }]));
}

#[tokio::test]
async fn health_is_public() {
    let app = spawn_app().await;
    let (status, _) = app.request(axum::http::Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
}
