#![cfg(feature = "server")]

use apex_database::Database;
use apex_domain::config::ApiConfig;
use apex_event_bus::EventBus;
use apex_kernel::clock::ManualClock;
use apex_kernel::server::ApiState;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use chrono::{TimeZone, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

const DETAILS: &str = "/api/ladder/domains/domain:machine-learning";

fn app() -> Router {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()).shared();
    let config = ApiConfig::default();
    let database = Database::builder().namespace("http").init().unwrap();
    let events = EventBus::new();
    let slice = apex_ladder::init(&config, &database, &events, &clock).unwrap();

    let state = ApiState::builder()
        .config(config)
        .db(database)
        .events(events)
        .clock(clock)
        .register_slice(slice)
        .build()
        .unwrap();

    let (router, _) = apex_ladder::api::router().with_state(state).split_for_parts();
    router
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map_or_else(Body::empty, |body| Body::from(body.to_string())))
        .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() { Value::Null } else { serde_json::from_slice(&bytes).unwrap() };
    (status, json)
}

#[tokio::test]
async fn seeded_domains_are_listed_by_name() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/ladder/domains", None).await;

    assert_eq!(status, StatusCode::OK);
    let names: Vec<_> = body.as_array().unwrap().iter().map(|d| d["name"].clone()).collect();
    assert_eq!(names, vec![json!("DSA"), json!("SQL"), json!("Web Development")]);
}

#[tokio::test]
async fn domain_details_include_the_ladder_in_force() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/ladder/domains/domain:dsa", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tiers"].as_array().unwrap().len(), 4);
    assert_eq!(body["ladder"][3]["minScore"], 80);
    assert_eq!(body["tiers"][3]["features"].as_array().unwrap().len(), 4);
    assert!(body["violations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn bare_keys_are_accepted_as_domain_ids() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/ladder/domains/sql", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domain"]["id"], "domain:sql");
}

#[tokio::test]
async fn foreign_ids_are_rejected() {
    let app = app();
    let (status, body) = call(&app, Method::GET, "/api/ladder/domains/tier:dsa-1", None).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn duplicate_domain_names_conflict() {
    let app = app();
    let (status, body) =
        call(&app, Method::POST, "/api/ladder/domains", Some(json!({ "name": "dsa" }))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "domain_exists");
    assert_eq!(body["category"], "conflict");
}

#[tokio::test]
async fn new_domain_is_built_tier_by_tier() {
    let app = app();
    let (status, domain) = call(
        &app,
        Method::POST,
        "/api/ladder/domains",
        Some(json!({ "name": "Machine Learning", "description": "Models and data" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(domain["id"], "domain:machine-learning");

    let tiers = "/api/ladder/domains/domain:machine-learning/tiers";
    let (status, _) =
        call(&app, Method::POST, tiers, Some(json!({ "level": 1, "name": "Foundation" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, tier) = call(
        &app,
        Method::POST,
        tiers,
        Some(json!({
            "level": 2,
            "name": "Expert",
            "maxSlots": 5,
            "features": ["mock_interviews"],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(tier["id"], "tier:machine-learning-2");

    let (_, details) = call(&app, Method::GET, DETAILS, None).await;
    assert!(details["ladder"].as_array().unwrap().is_empty());
    assert_eq!(details["violations"].as_array().unwrap().len(), 2);

    let (status, published) = call(
        &app,
        Method::PUT,
        "/api/ladder/domains/domain:machine-learning/thresholds",
        Some(json!({ "thresholds": [
            { "level": 1, "minScore": 0, "maxScore": 69 },
            { "level": 2, "minScore": 70, "maxScore": 100 },
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(published.as_array().unwrap().len(), 2);

    let (_, details) = call(&app, Method::GET, DETAILS, None).await;
    assert_eq!(details["ladder"][1]["name"], "Expert");
}

#[tokio::test]
async fn invalid_thresholds_report_every_violation() {
    let app = app();
    let proposal = json!({ "thresholds": [
        { "level": 1, "minScore": 0, "maxScore": 30 },
        { "level": 2, "minScore": 40, "maxScore": 59 },
    ] });

    let (status, body) = call(
        &app,
        Method::POST,
        "/api/ladder/domains/domain:sql/thresholds/validate",
        Some(proposal.clone()),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    let violations = body["violations"].as_array().unwrap();
    let kinds: Vec<_> = violations.iter().map(|v| v["kind"].clone()).collect();
    assert_eq!(kinds, vec![json!("gap"), json!("gap")]);

    let (status, body) =
        call(&app, Method::PUT, "/api/ladder/domains/domain:sql/thresholds", Some(proposal)).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_ladder");
    assert_eq!(body["details"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn threshold_history_shows_version_states() {
    let app = app();
    let (status, body) =
        call(&app, Method::GET, "/api/ladder/domains/domain:dsa/tiers/2/thresholds", None).await;

    assert_eq!(status, StatusCode::OK);
    let states: Vec<_> = body.as_array().unwrap().iter().map(|v| v["state"].clone()).collect();
    assert_eq!(states, vec![json!("current"), json!("scheduled")]);
}

#[tokio::test]
async fn domains_can_be_renamed_in_description_and_deleted() {
    let app = app();
    let uri = "/api/ladder/domains/domain:sql";

    let (status, body) =
        call(&app, Method::PATCH, uri, Some(json!({ "description": "Queries" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["description"], "Queries");

    let (status, _) = call(&app, Method::DELETE, uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "domain_not_found");
}

#[tokio::test]
async fn unknown_fields_are_rejected() {
    let app = app();
    let (status, _) = call(
        &app,
        Method::POST,
        "/api/ladder/domains",
        Some(json!({ "name": "Rust", "owner": "someone" })),
    )
    .await;

    assert!(status.is_client_error());
}
