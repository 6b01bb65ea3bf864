//! End-to-end tests of the HTTP API against an in-memory database

use axum::http::{header, HeaderValue, StatusCode};
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use super::{build_router, create_state};
use crate::config::Config;
use crate::db::{create_test_pool, migrations::run_migrations};
use crate::models::{CreateIngredientInput, CreateTagInput};
use crate::services::image::tests::PIXEL_PNG;

struct TestApp {
    server: TestServer,
    _media: TempDir,
    breakfast: i64,
    lunch: i64,
    eggs: i64,
    milk: i64,
    flour: i64,
}

async fn app() -> TestApp {
    let media = TempDir::new().unwrap();
    let mut config = Config::default();
    config.upload.path = media.path().to_path_buf();

    let pool = create_test_pool().await.unwrap();
    run_migrations(&pool).await.unwrap();
    let state = create_state(pool, &config);

    let breakfast = state
        .tag_service
        .create(CreateTagInput::new("Breakfast", "breakfast", "#E26C2D"))
        .await
        .unwrap()
        .id;
    let lunch = state
        .tag_service
        .create(CreateTagInput::new("Lunch", "lunch", "#49B64E"))
        .await
        .unwrap()
        .id;
    let mut ingredient_ids = Vec::new();
    for (name, unit) in [("eggs", "pcs"), ("milk", "ml"), ("flour", "g")] {
        let ingredient = state
            .ingredient_service
            .create(CreateIngredientInput::new(name, unit))
            .await
            .unwrap();
        ingredient_ids.push(ingredient.id);
    }
    let (eggs, milk, flour) = (ingredient_ids[0], ingredient_ids[1], ingredient_ids[2]);

    let server = TestServer::new(build_router(state, "http://localhost:3000")).unwrap();

    TestApp {
        server,
        _media: media,
        breakfast,
        lunch,
        eggs,
        milk,
        flour,
    }
}

fn auth(token: &str) -> HeaderValue {
    HeaderValue::from_str(&format!("Token {}", token)).unwrap()
}

impl TestApp {
    /// Register a user and log in, returning (user id, token)
    async fn user(&self, username: &str) -> (i64, String) {
        let created = self
            .server
            .post("/api/users")
            .json(&json!({
                "email": format!("{}@example.com", username),
                "username": username,
                "first_name": "Test",
                "last_name": "Cook",
                "password": "s3cret-pass",
            }))
            .await;
        created.assert_status(StatusCode::CREATED);
        let id = created.json::<Value>()["id"].as_i64().unwrap();

        let login = self
            .server
            .post("/api/auth/token/login")
            .json(&json!({
                "email": format!("{}@example.com", username),
                "password": "s3cret-pass",
            }))
            .await;
        login.assert_status_ok();
        let token = login.json::<Value>()["auth_token"].as_str().unwrap().to_string();

        (id, token)
    }

    async fn recipe(&self, token: &str, body: Value) -> Value {
        let response = self
            .server
            .post("/api/recipes")
            .add_header(header::AUTHORIZATION, auth(token))
            .json(&body)
            .await;
        response.assert_status(StatusCode::CREATED);
        response.json::<Value>()
    }

    fn omelette(&self) -> Value {
        json!({
            "ingredients": [
                {"id": self.eggs, "amount": 2},
                {"id": self.milk, "amount": 50},
            ],
            "tags": [self.breakfast],
            "image": PIXEL_PNG,
            "name": "Omelette",
            "text": "Whisk and fry.",
            "cooking_time": 10,
        })
    }

    fn pancakes(&self) -> Value {
        json!({
            "ingredients": [
                {"id": self.milk, "amount": 100},
                {"id": self.flour, "amount": 200},
            ],
            "tags": [self.breakfast, self.lunch],
            "image": PIXEL_PNG,
            "name": "Pancakes",
            "text": "Mix and bake.",
            "cooking_time": 25,
        })
    }
}

#[tokio::test]
async fn test_register_login_and_me() {
    let app = app().await;
    let (id, token) = app.user("julia").await;

    let me = app
        .server
        .get("/api/users/me")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await;
    me.assert_status_ok();
    let body = me.json::<Value>();
    assert_eq!(body["id"], id);
    assert_eq!(body["username"], "julia");
    assert_eq!(body["is_subscribed"], false);
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn test_me_requires_token() {
    let app = app().await;

    let response = app.server.get("/api/users/me").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_duplicate_registration_and_bad_login() {
    let app = app().await;
    app.user("julia").await;

    let duplicate = app
        .server
        .post("/api/users")
        .json(&json!({
            "email": "julia@example.com",
            "username": "other",
            "first_name": "J",
            "last_name": "C",
            "password": "pw",
        }))
        .await;
    duplicate.assert_status(StatusCode::BAD_REQUEST);

    let login = app
        .server
        .post("/api/auth/token/login")
        .json(&json!({"email": "julia@example.com", "password": "wrong"}))
        .await;
    login.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_logout_invalidates_token() {
    let app = app().await;
    let (_, token) = app.user("julia").await;

    app.server
        .post("/api/auth/token/logout")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get("/api/users/me")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_set_password() {
    let app = app().await;
    let (_, token) = app.user("julia").await;

    app.server
        .post("/api/users/set_password")
        .add_header(header::AUTHORIZATION, auth(&token))
        .json(&json!({"new_password": "n3w", "current_password": "wrong"}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    app.server
        .post("/api/users/set_password")
        .add_header(header::AUTHORIZATION, auth(&token))
        .json(&json!({"new_password": "n3w", "current_password": "s3cret-pass"}))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .post("/api/auth/token/login")
        .json(&json!({"email": "julia@example.com", "password": "n3w"}))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_reference_data() {
    let app = app().await;

    let tags = app.server.get("/api/tags").await.json::<Value>();
    assert_eq!(tags.as_array().unwrap().len(), 2);
    assert_eq!(tags[0]["slug"], "breakfast");

    let found = app.server.get("/api/ingredients?name=MI").await.json::<Value>();
    assert_eq!(found.as_array().unwrap().len(), 1);
    assert_eq!(found[0]["name"], "milk");
    assert_eq!(found[0]["measurement_unit"], "ml");

    app.server
        .get(&format!("/api/ingredients/{}", app.flour))
        .await
        .assert_status_ok();
    app.server
        .get("/api/tags/999")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_create_and_get_recipe() {
    let app = app().await;
    let (author_id, token) = app.user("julia").await;

    let created = app.recipe(&token, app.omelette()).await;

    assert_eq!(created["name"], "Omelette");
    assert_eq!(created["author"]["id"], author_id);
    assert_eq!(created["tags"][0]["slug"], "breakfast");
    assert_eq!(created["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(created["is_favorited"], false);
    let image = created["image"].as_str().unwrap();
    assert!(image.starts_with("/media/recipes/"));
    assert!(image.ends_with(".png"));

    let fetched = app
        .server
        .get(&format!("/api/recipes/{}", created["id"]))
        .await;
    fetched.assert_status_ok();
    assert_eq!(fetched.json::<Value>()["text"], "Whisk and fry.");

    // Stored image is served back
    app.server.get(image).await.assert_status_ok();
}

#[tokio::test]
async fn test_create_recipe_validation() {
    let app = app().await;
    let (_, token) = app.user("julia").await;

    let mut zero_time = app.omelette();
    zero_time["cooking_time"] = json!(0);
    let mut duplicate = app.omelette();
    duplicate["ingredients"] = json!([
        {"id": app.eggs, "amount": 1},
        {"id": app.eggs, "amount": 2},
    ]);
    let mut unknown_tag = app.omelette();
    unknown_tag["tags"] = json!([999]);

    for body in [zero_time, duplicate, unknown_tag] {
        app.server
            .post("/api/recipes")
            .add_header(header::AUTHORIZATION, auth(&token))
            .json(&body)
            .await
            .assert_status(StatusCode::BAD_REQUEST);
    }

    app.server
        .post("/api/recipes")
        .json(&app.omelette())
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_only_author_changes_recipe() {
    let app = app().await;
    let (_, author) = app.user("julia").await;
    let (_, other) = app.user("james").await;
    let recipe = app.recipe(&author, app.omelette()).await;
    let path = format!("/api/recipes/{}", recipe["id"]);

    app.server
        .patch(&path)
        .add_header(header::AUTHORIZATION, auth(&other))
        .json(&json!({"name": "Stolen"}))
        .await
        .assert_status(StatusCode::FORBIDDEN);
    app.server
        .delete(&path)
        .add_header(header::AUTHORIZATION, auth(&other))
        .await
        .assert_status(StatusCode::FORBIDDEN);

    let updated = app
        .server
        .patch(&path)
        .add_header(header::AUTHORIZATION, auth(&author))
        .json(&json!({"name": "Cheese omelette", "cooking_time": 12}))
        .await;
    updated.assert_status_ok();
    let body = updated.json::<Value>();
    assert_eq!(body["name"], "Cheese omelette");
    assert_eq!(body["cooking_time"], 12);
    assert_eq!(body["ingredients"].as_array().unwrap().len(), 2);

    app.server
        .delete(&path)
        .add_header(header::AUTHORIZATION, auth(&author))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_put_is_not_routed() {
    let app = app().await;
    let (_, token) = app.user("julia").await;
    let recipe = app.recipe(&token, app.omelette()).await;

    app.server
        .put(&format!("/api/recipes/{}", recipe["id"]))
        .add_header(header::AUTHORIZATION, auth(&token))
        .json(&app.omelette())
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_list_filters_and_pagination() {
    let app = app().await;
    let (author_id, token) = app.user("julia").await;
    let (_, other) = app.user("james").await;
    let omelette = app.recipe(&token, app.omelette()).await;
    app.recipe(&other, app.pancakes()).await;

    let all = app.server.get("/api/recipes").await.json::<Value>();
    assert_eq!(all["count"], 2);
    assert!(all["next"].is_null());

    let by_author = app
        .server
        .get(&format!("/api/recipes?author={}", author_id))
        .await
        .json::<Value>();
    assert_eq!(by_author["count"], 1);
    assert_eq!(by_author["results"][0]["id"], omelette["id"]);

    let lunch = app.server.get("/api/recipes?tags=LUNCH").await.json::<Value>();
    assert_eq!(lunch["count"], 1);
    assert_eq!(lunch["results"][0]["name"], "Pancakes");

    let either = app
        .server
        .get("/api/recipes?tags=lunch&tags=breakfast")
        .await
        .json::<Value>();
    assert_eq!(either["count"], 2);

    let paged = app.server.get("/api/recipes?limit=1").await.json::<Value>();
    assert_eq!(paged["results"].as_array().unwrap().len(), 1);
    assert_eq!(paged["next"], "/api/recipes?limit=1&offset=1");

    let far = app
        .server
        .get("/api/recipes?offset=9223372036854775807")
        .await;
    far.assert_status_ok();
    let far = far.json::<Value>();
    assert_eq!(far["count"], 2);
    assert!(far["results"].as_array().unwrap().is_empty());
    assert!(far["next"].is_null());

    app.server
        .get("/api/recipes?is_favorited=maybe")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .get("/api/recipes?author=julia")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_favorites_flags_and_filter() {
    let app = app().await;
    let (_, token) = app.user("julia").await;
    let omelette = app.recipe(&token, app.omelette()).await;
    app.recipe(&token, app.pancakes()).await;
    let favorite = format!("/api/recipes/{}/favorite", omelette["id"]);

    let added = app
        .server
        .post(&favorite)
        .add_header(header::AUTHORIZATION, auth(&token))
        .await;
    added.assert_status(StatusCode::CREATED);
    let short = added.json::<Value>();
    assert_eq!(short["name"], "Omelette");
    assert!(short.get("text").is_none());

    app.server
        .post(&favorite)
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let mine = app
        .server
        .get("/api/recipes?is_favorited=1")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .json::<Value>();
    assert_eq!(mine["count"], 1);
    assert_eq!(mine["results"][0]["is_favorited"], true);
    assert_eq!(mine["results"][0]["is_in_shopping_cart"], false);

    // Anonymous viewers: mark filters ignored, flags false
    let anonymous = app
        .server
        .get("/api/recipes?is_favorited=1")
        .await
        .json::<Value>();
    assert_eq!(anonymous["count"], 2);
    assert!(anonymous["results"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["is_favorited"] == false));

    app.server
        .delete(&favorite)
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .delete(&favorite)
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .post("/api/recipes/999/favorite")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unset_mark_filters_keep_all_recipes() {
    let app = app().await;
    let (_, token) = app.user("julia").await;
    let omelette = app.recipe(&token, app.omelette()).await;
    app.recipe(&token, app.pancakes()).await;
    app.server
        .post(&format!("/api/recipes/{}/favorite", omelette["id"]))
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .assert_status(StatusCode::CREATED);

    for query in ["is_favorited=0", "is_favorited=false", "is_in_shopping_cart=0"] {
        let page = app
            .server
            .get(&format!("/api/recipes?{}", query))
            .add_header(header::AUTHORIZATION, auth(&token))
            .await
            .json::<Value>();
        assert_eq!(page["count"], 2, "{}", query);
    }
}

#[tokio::test]
async fn test_download_shopping_cart() {
    let app = app().await;
    let (_, token) = app.user("julia").await;
    let omelette = app.recipe(&token, app.omelette()).await;
    let pancakes = app.recipe(&token, app.pancakes()).await;

    for recipe in [&omelette, &pancakes] {
        app.server
            .post(&format!("/api/recipes/{}/shopping_cart", recipe["id"]))
            .add_header(header::AUTHORIZATION, auth(&token))
            .await
            .assert_status(StatusCode::CREATED);
    }

    let carted = app
        .server
        .get("/api/recipes?is_in_shopping_cart=true")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .json::<Value>();
    assert_eq!(carted["count"], 2);

    let download = app
        .server
        .get("/api/recipes/download_shopping_cart")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await;
    download.assert_status_ok();
    assert_eq!(download.header(header::CONTENT_TYPE), "text/plain; charset=utf-8");
    assert_eq!(
        download.header(header::CONTENT_DISPOSITION),
        "attachment; filename=\"shopping_list.txt\""
    );
    let text = download.text();
    assert!(text.starts_with("Shopping list for: Omelette, Pancakes."));
    assert!(text.contains("eggs: 2 pcs\n"));
    assert!(text.contains("milk: 150 ml\n"));
    assert!(text.contains("flour: 200 g\n"));

    // Cart is emptied by a successful download
    let after = app
        .server
        .get("/api/recipes?is_in_shopping_cart=1")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .json::<Value>();
    assert_eq!(after["count"], 0);

    app.server
        .get("/api/recipes/download_shopping_cart")
        .add_header(header::AUTHORIZATION, auth(&token))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_subscriptions() {
    let app = app().await;
    let (julia_id, julia) = app.user("julia").await;
    let (james_id, james) = app.user("james").await;
    app.recipe(&julia, app.omelette()).await;
    app.recipe(&julia, app.pancakes()).await;
    let subscribe = format!("/api/users/{}/subscribe", julia_id);

    let card = app
        .server
        .post(&format!("{}?recipes_limit=1", subscribe))
        .add_header(header::AUTHORIZATION, auth(&james))
        .await;
    card.assert_status(StatusCode::CREATED);
    let card = card.json::<Value>();
    assert_eq!(card["username"], "julia");
    assert_eq!(card["is_subscribed"], true);
    assert_eq!(card["recipes_count"], 2);
    assert_eq!(card["recipes"].as_array().unwrap().len(), 1);

    app.server
        .post(&subscribe)
        .add_header(header::AUTHORIZATION, auth(&james))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    app.server
        .post(&format!("/api/users/{}/subscribe", james_id))
        .add_header(header::AUTHORIZATION, auth(&james))
        .await
        .assert_status(StatusCode::BAD_REQUEST);

    let list = app
        .server
        .get("/api/users/subscriptions")
        .add_header(header::AUTHORIZATION, auth(&james))
        .await
        .json::<Value>();
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["recipes"].as_array().unwrap().len(), 2);

    let profile = app
        .server
        .get(&format!("/api/users/{}", julia_id))
        .add_header(header::AUTHORIZATION, auth(&james))
        .await
        .json::<Value>();
    assert_eq!(profile["is_subscribed"], true);

    let users = app
        .server
        .get("/api/users")
        .add_header(header::AUTHORIZATION, auth(&james))
        .await
        .json::<Value>();
    assert_eq!(users["count"], 2);

    app.server
        .delete(&subscribe)
        .add_header(header::AUTHORIZATION, auth(&james))
        .await
        .assert_status(StatusCode::NO_CONTENT);
    app.server
        .delete(&subscribe)
        .add_header(header::AUTHORIZATION, auth(&james))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}
