//! End-to-end tests over the router, driven with `tower::ServiceExt` against
//! the seeded in-memory store. The AI-backed endpoints run with no API key
//! configured, so the external-failure paths are exercised without network.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use flavour_fusion::app;
use flavour_fusion::config::Config;
use flavour_fusion::schema::NewPairing;
use flavour_fusion::state::AppState;
use flavour_fusion::storage::{MemStorage, Storage};

fn test_app() -> Router {
    test_app_with_storage().0
}

fn test_app_with_storage() -> (Router, Arc<MemStorage>) {
    let config = Config {
        port: 0,
        database_url: None,
        openai_api_key: None,
        openai_base_url: "http://localhost:0".to_string(),
    };
    let storage = Arc::new(MemStorage::seeded());
    let app = app(AppState::with_storage(config, storage.clone()));
    (app, storage)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

fn message(body: &Value) -> &str {
    body["message"].as_str().unwrap_or_default()
}

#[tokio::test]
async fn registration_rejects_duplicate_username_and_email() {
    let app = test_app();
    let alice = json!({ "username": "alice", "password": "x", "email": "a@example.com" });

    let (status, body) = send(&app, Method::POST, "/api/users", Some(alice.clone())).await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].as_i64().is_some());
    assert_eq!(body["username"], "alice");

    let (status, body) = send(&app, Method::POST, "/api/users", Some(alice)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Username already exists");

    let same_email = json!({ "username": "alice2", "password": "x", "email": "a@example.com" });
    let (status, body) = send(&app, Method::POST, "/api/users", Some(same_email)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Email already exists");
}

#[tokio::test]
async fn login_checks_credentials_and_never_echoes_the_password() {
    let app = test_app();
    let alice = json!({ "username": "alice", "password": "hunter2", "email": "a@example.com" });
    send(&app, Method::POST, "/api/users", Some(alice)).await;

    let (status, body) =
        send(&app, Method::POST, "/api/login", Some(json!({ "username": "alice" }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Username and password are required");

    let wrong = json!({ "username": "alice", "password": "wrong" });
    let (status, body) = send(&app, Method::POST, "/api/login", Some(wrong)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message(&body), "Invalid credentials");

    let unknown = json!({ "username": "nobody", "password": "x" });
    let (status, _) = send(&app, Method::POST, "/api/login", Some(unknown)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let good = json!({ "username": "alice", "password": "hunter2" });
    let (status, body) = send(&app, Method::POST, "/api/login", Some(good)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert_eq!(body["email"], "a@example.com");
    assert!(body.get("password").is_none());
}

#[tokio::test]
async fn dietary_preferences_round_trip() {
    let app = test_app();

    let pref = json!({ "user_id": 1, "preference_type": "vegetarian" });
    let (status, created) = send(&app, Method::POST, "/api/dietary-preferences", Some(pref)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let (status, listed) =
        send(&app, Method::GET, "/api/users/1/dietary-preferences", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(listed.as_array().unwrap().len(), 1);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/dietary-preferences/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = send(&app, Method::GET, "/api/users/1/dietary-preferences", None).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn flavor_preference_update_validates_range_and_existence() {
    let app = test_app();

    let pref = json!({ "user_id": 1, "flavor_type": "sweet", "preference_level": 40 });
    let (status, created) = send(&app, Method::POST, "/api/flavor-preferences", Some(pref)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    let out_of_range = json!({ "preference_level": 150 });
    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/flavor-preferences/{id}"),
        Some(out_of_range),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        message(&body),
        "Preference level must be a number between 0 and 100"
    );

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/flavor-preferences/999",
        Some(json!({ "preference_level": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message(&body), "Flavor preference not found");

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/api/flavor-preferences/{id}"),
        Some(json!({ "preference_level": 75 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["preference_level"], 75);
    assert_eq!(updated["flavor_type"], "sweet");
}

#[tokio::test]
async fn ingredient_listing_search_and_conflict() {
    let app = test_app();

    let (status, all) = send(&app, Method::GET, "/api/ingredients", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all.as_array().unwrap().len(), 8);

    let (_, herbs) = send(&app, Method::GET, "/api/ingredients?q=herb", None).await;
    let herbs = herbs.as_array().unwrap();
    assert_eq!(herbs.len(), 1);
    assert_eq!(herbs[0]["name"], "Basil");

    let (status, tomato) = send(&app, Method::GET, "/api/ingredients/1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tomato["name"], "Tomato");

    let (status, body) = send(&app, Method::GET, "/api/ingredients/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message(&body), "Ingredient not found");

    // Conflict check is case-insensitive.
    let duplicate = json!({
        "name": "TOMATO",
        "flavor_profile": { "sweet": 65, "salty": 10, "sour": 80, "bitter": 5, "umami": 60 },
        "primary_taste": "Sweet",
        "category": "Vegetable"
    });
    let (status, body) = send(&app, Method::POST, "/api/ingredients", Some(duplicate)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Ingredient already exists");

    let ginger = json!({
        "name": "Ginger",
        "flavor_profile": { "sweet": 20, "salty": 0, "sour": 10, "bitter": 30, "umami": 5 },
        "primary_taste": "Pungent, Spicy",
        "category": "Root"
    });
    let (status, created) = send(&app, Method::POST, "/api/ingredients", Some(ginger)).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Ginger");
}

#[tokio::test]
async fn pairings_are_enriched_with_ingredient_names() {
    let app = test_app();

    let (status, pairings) = send(&app, Method::GET, "/api/pairings", None).await;
    assert_eq!(status, StatusCode::OK);
    let pairings = pairings.as_array().unwrap();
    assert_eq!(pairings.len(), 5);
    assert_eq!(pairings[0]["ingredient1_name"], "Tomato");
    assert_eq!(pairings[0]["ingredient2_name"], "Basil");
    assert_eq!(pairings[0]["affinity_score"], 95);

    let (status, for_tomato) = send(&app, Method::GET, "/api/ingredients/1/pairings", None).await;
    assert_eq!(status, StatusCode::OK);
    let for_tomato = for_tomato.as_array().unwrap();
    assert_eq!(for_tomato.len(), 2);
    let basil_entry = for_tomato
        .iter()
        .find(|entry| entry["paired_ingredient_name"] == "Basil")
        .expect("tomato pairs with basil");
    assert_eq!(basil_entry["affinity_score"], 95);
    assert_eq!(basil_entry["paired_ingredient_id"], 2);

    let (status, _) = send(&app, Method::GET, "/api/ingredients/999/pairings", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn non_numeric_path_ids_report_invalid_id() {
    let app = test_app();

    let (status, body) = send(&app, Method::GET, "/api/ingredients/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Invalid ID");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/flavor-preferences/abc",
        Some(json!({ "preference_level": 50 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Invalid ID");

    let (status, body) =
        send(&app, Method::GET, "/api/users/abc/dietary-preferences", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(message(&body), "Invalid user ID");
}

#[tokio::test]
async fn pairings_with_dangling_ingredients_report_unknown_names() {
    let (app, storage) = test_app_with_storage();

    // Nothing stops a pairing from outliving its ingredients; the listings
    // must still render such rows.
    let dangling = storage
        .create_pairing(NewPairing {
            ingredient1_id: 1,
            ingredient2_id: 999,
            affinity_score: 50,
            pairing_notes: None,
        })
        .await
        .unwrap();

    let (status, pairings) = send(&app, Method::GET, "/api/pairings", None).await;
    assert_eq!(status, StatusCode::OK);
    let entry = pairings
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["id"] == dangling.id)
        .expect("dangling pairing listed");
    assert_eq!(entry["ingredient1_name"], "Tomato");
    assert_eq!(entry["ingredient2_name"], "Unknown");

    let (status, for_tomato) = send(&app, Method::GET, "/api/ingredients/1/pairings", None).await;
    assert_eq!(status, StatusCode::OK);
    let entry = for_tomato
        .as_array()
        .unwrap()
        .iter()
        .find(|entry| entry["paired_ingredient_id"] == 999)
        .expect("dangling pairing listed");
    assert_eq!(entry["paired_ingredient_name"], "Unknown");
}

#[tokio::test]
async fn user_ingredient_inventory_round_trip() {
    let app = test_app();

    let item = json!({
        "user_id": 1,
        "ingredient_id": 1,
        "quantity": "500g",
        "expiry_date": "2026-09-15T00:00:00Z"
    });
    let (status, created) = send(&app, Method::POST, "/api/user-ingredients", Some(item)).await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_i64().unwrap();

    // Omitting the expiry date must keep the stored one.
    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/api/user-ingredients/{id}"),
        Some(json!({ "quantity": "250g" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["quantity"], "250g");
    assert_eq!(updated["expiry_date"], "2026-09-15T00:00:00Z");

    let (status, body) = send(
        &app,
        Method::PATCH,
        "/api/user-ingredients/999",
        Some(json!({ "quantity": "1kg" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(message(&body), "User ingredient not found");

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/user-ingredients/{id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = send(&app, Method::GET, "/api/users/1/ingredients", None).await;
    assert!(listed.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn pairing_recommendations_validate_input_and_surface_ai_failure() {
    let app = test_app();

    for body in [
        json!({ "ingredientIds": [] }),
        json!({}),
        json!({ "ingredientIds": "1,2" }),
    ] {
        let (status, response) =
            send(&app, Method::POST, "/api/pairing-recommendations", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message(&response), "Ingredient IDs array is required");
    }

    for body in [
        json!({ "ingredientIds": [999, 1000] }),
        json!({ "ingredientIds": ["not-a-number"] }),
    ] {
        let (status, response) =
            send(&app, Method::POST, "/api/pairing-recommendations", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(message(&response), "No valid ingredients found");
    }

    // Valid ids, but no API key configured: the upstream failure surfaces
    // as a generic 500. Stringified ids resolve the same way.
    for body in [
        json!({ "ingredientIds": [1, 2] }),
        json!({ "ingredientIds": ["1", "2"] }),
    ] {
        let (status, response) =
            send(&app, Method::POST, "/api/pairing-recommendations", Some(body)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(message(&response), "Failed to get pairing recommendations");
    }
}

fn multipart_request(uri: &str, parts: &str) -> Request<Body> {
    let boundary = "test-boundary";
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(parts.replace("BOUNDARY", boundary)))
        .unwrap()
}

#[tokio::test]
async fn identify_ingredients_requires_an_image_file() {
    let app = test_app();

    let without_image = multipart_request(
        "/api/identify-ingredients",
        "--BOUNDARY\r\n\
         Content-Disposition: form-data; name=\"note\"\r\n\r\n\
         hello\r\n\
         --BOUNDARY--\r\n",
    );
    let response = app.clone().oneshot(without_image).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(message(&body), "No image file provided");

    let wrong_type = multipart_request(
        "/api/identify-ingredients",
        "--BOUNDARY\r\n\
         Content-Disposition: form-data; name=\"image\"; filename=\"a.txt\"\r\n\
         Content-Type: text/plain\r\n\r\n\
         hello\r\n\
         --BOUNDARY--\r\n",
    );
    let response = app.clone().oneshot(wrong_type).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(message(&body), "Uploaded file must be an image");
}
