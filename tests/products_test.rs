//! Product listing filters, sorting, pagination and detail lookup.

mod common;

use axum::http::header::AUTHORIZATION;
use bson::{oid::ObjectId, DateTime};
use common::{bearer, signup, spawn_default, TestApp};
use serde_json::Value;
use trendscout::store::Product;

fn product(title: &str, niche: &str, platform: &str, region: &str, score: f64) -> Product {
    Product {
        id: ObjectId::new(),
        title: title.into(),
        platform: platform.into(),
        niche: niche.into(),
        region: region.into(),
        hype_score: score,
        growth_weekly: Some(score / 10.0),
        growth_monthly: None,
        metadata: None,
        created_at: Some(DateTime::now()),
    }
}

async fn seeded_app() -> (TestApp, String) {
    let app = spawn_default();
    app.store
        .add_product(product("LED Cat Collar", "pets", "tiktok", "US", 91.0));
    app.store
        .add_product(product("Slow Feeder Bowl", "pets", "amazon", "EU", 74.0));
    app.store
        .add_product(product("Sunset Desk Lamp", "home", "tiktok", "US", 86.0));
    let (access, _) = signup(&app.server, "shopper@example.com", "Str0ng!Pass").await;
    (app, access)
}

#[tokio::test]
async fn listing_requires_authentication() {
    let app = spawn_default();

    let response = app.server.get("/api/products/").await;

    assert_eq!(response.status_code(), 401);
    let body: Value = response.json();
    assert_eq!(body["detail"], "Missing Authorization header");
}

#[tokio::test]
async fn listing_returns_page_envelope_sorted_by_hype() {
    let (app, access) = seeded_app().await;

    let response = app
        .server
        .get("/api/products/")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["limit"], 50);
    assert_eq!(body["offset"], 0);
    assert_eq!(body["returned"], 3);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items[0]["title"], "LED Cat Collar");
    assert_eq!(items[1]["title"], "Sunset Desk Lamp");
    assert_eq!(items[2]["title"], "Slow Feeder Bowl");
    assert!(items[0]["id"].as_str().is_some_and(|id| !id.is_empty()));
    assert_eq!(items[0]["hypeScore"], 91.0);

    // Same query again returns the same page in the same order.
    let repeat = app
        .server
        .get("/api/products/")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;
    assert_eq!(repeat.json::<Value>(), body);
}

#[tokio::test]
async fn listing_filters_combine() {
    let (app, access) = seeded_app().await;

    let response = app
        .server
        .get("/api/products/?niche=pets&platform=tiktok")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "LED Cat Collar");
}

#[tokio::test]
async fn listing_text_search_matches_titles() {
    let (app, access) = seeded_app().await;

    let response = app
        .server
        .get("/api/products/?q=lamp")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["total"], 1);
    assert_eq!(body["items"][0]["title"], "Sunset Desk Lamp");
}

#[tokio::test]
async fn listing_paginates_with_limit_and_offset() {
    let (app, access) = seeded_app().await;

    let first = app
        .server
        .get("/api/products/?limit=2")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;
    let body: Value = first.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["returned"], 2);

    let second = app
        .server
        .get("/api/products/?limit=2&offset=2")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;
    let body: Value = second.json();
    assert_eq!(body["total"], 3);
    assert_eq!(body["returned"], 1);
    assert_eq!(body["offset"], 2);
    assert_eq!(body["items"][0]["title"], "Slow Feeder Bowl");
}

#[tokio::test]
async fn oversized_limit_is_clamped() {
    let (app, access) = seeded_app().await;

    let response = app
        .server
        .get("/api/products/?limit=10000")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["limit"], 500);
}

#[tokio::test]
async fn sort_parameter_orders_ascending_when_asked() {
    let (app, access) = seeded_app().await;

    let response = app
        .server
        .get("/api/products/?sort=hypeScore:asc")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;

    let body: Value = response.json();
    let items = body["items"].as_array().unwrap();
    assert_eq!(items[0]["title"], "Slow Feeder Bowl");
    assert_eq!(items[2]["title"], "LED Cat Collar");
}

#[tokio::test]
async fn non_numeric_paging_params_are_rejected() {
    let (app, access) = seeded_app().await;

    let response = app
        .server
        .get("/api/products/?limit=lots")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;

    assert_eq!(response.status_code(), 400);
    let body: Value = response.json();
    assert!(body["detail"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn product_detail_round_trips() {
    let (app, access) = seeded_app().await;
    let listing = app
        .server
        .get("/api/products/?q=collar")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;
    let body: Value = listing.json();
    let id = body["items"][0]["id"].as_str().unwrap().to_string();

    let response = app
        .server
        .get(&format!("/api/products/{id}"))
        .add_header(AUTHORIZATION, bearer(&access))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["id"], id.as_str());
    assert_eq!(body["title"], "LED Cat Collar");
    assert_eq!(body["niche"], "pets");
}

#[tokio::test]
async fn unknown_or_malformed_product_id_is_404() {
    let (app, access) = seeded_app().await;

    let unknown = app
        .server
        .get(&format!("/api/products/{}", ObjectId::new().to_hex()))
        .add_header(AUTHORIZATION, bearer(&access))
        .await;
    assert_eq!(unknown.status_code(), 404);
    let body: Value = unknown.json();
    assert_eq!(body["detail"], "Not found");

    let malformed = app
        .server
        .get("/api/products/definitely-not-an-id")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;
    assert_eq!(malformed.status_code(), 404);
    let body: Value = malformed.json();
    assert_eq!(body["detail"], "Not found");
}

#[tokio::test]
async fn searches_are_recorded_in_the_activity_log() {
    let (app, access) = seeded_app().await;
    let before = app.store.activity_count();

    app.server
        .get("/api/products/?niche=pets")
        .add_header(AUTHORIZATION, bearer(&access))
        .await;

    assert_eq!(app.store.activity_count(), before + 1);
}
