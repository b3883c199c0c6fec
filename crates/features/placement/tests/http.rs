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

fn app() -> Router {
    let clock = ManualClock::new(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap()).shared();
    let config = ApiConfig::default();
    let database = Database::builder().namespace("http").init().unwrap();
    let events = EventBus::new();
    let ladder = apex_ladder::init(&config, &database, &events, &clock).unwrap();
    let placement = apex_placement::init(&config, &database, &events, &clock).unwrap();

    let state = ApiState::builder()
        .config(config)
        .db(database)
        .events(events)
        .clock(clock)
        .register_slice(ladder)
        .register_slice(placement)
        .build()
        .unwrap();

    let (router, _) = apex_placement::api::router().with_state(state).split_for_parts();
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

/// Registers a candidate and enrolls them in the seeded DSA domain.
async fn enrolled(app: &Router, name: &str) -> String {
    let (status, body) =
        call(app, Method::POST, "/api/placement/candidates", Some(json!({ "displayName": name })))
            .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["id"].as_str().unwrap().to_owned();

    let uri = format!("/api/placement/candidates/{id}/domains");
    let (status, body) = call(app, Method::POST, &uri, Some(json!({ "domainId": "dsa" }))).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["tierId"], "tier:dsa-1");
    assert_eq!(body["status"], "ACTIVE");
    id
}

async fn submit(app: &Router, attempt: &str, candidate: &str, score: f64) -> (StatusCode, Value) {
    let body = json!({
        "attemptId": attempt,
        "candidateId": candidate,
        "domainId": "domain:dsa",
        "score": score,
    });
    call(app, Method::POST, "/api/placement/scores", Some(body)).await
}

#[tokio::test]
async fn score_submission_places_the_candidate() {
    let app = app();
    let id = enrolled(&app, "Ada").await;

    let (status, body) = submit(&app, "a-1", &id, 72.0).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["tierId"], "tier:dsa-3");
    assert_eq!(body["tierLevel"], 3);
    assert_eq!(body["movement"], "promoted");
    assert_eq!(body["participationCount"], 1);

    let uri = format!("/api/placement/candidates/{id}/domains/domain:dsa");
    let (status, body) = call(&app, Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tierName"], "Advanced");
    assert_eq!(body["nextTierId"], "tier:dsa-4");
    assert!((body["progressToNextTier"].as_f64().unwrap() - 0.6).abs() < 1e-9);

    let (status, body) = call(&app, Method::GET, &format!("{uri}/attempts"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["attemptId"], "attempt:a-1");
}

#[tokio::test]
async fn duplicate_attempt_is_a_conflict() {
    let app = app();
    let id = enrolled(&app, "Ada").await;

    assert_eq!(submit(&app, "a-1", &id, 50.0).await.0, StatusCode::OK);
    let (status, body) = submit(&app, "a-1", &id, 50.0).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_attempt");
}

#[tokio::test]
async fn out_of_range_score_is_unprocessable() {
    let app = app();
    let id = enrolled(&app, "Ada").await;

    let (status, body) = submit(&app, "a-1", &id, 101.0).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_score");
}

#[tokio::test]
async fn unknown_candidate_is_not_found() {
    let app = app();
    let (status, body) = submit(&app, "a-1", "candidate:ghost", 50.0).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "candidate_not_found");

    let uri = "/api/placement/candidates/tier:dsa-1";
    let (status, body) = call(&app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn occupants_are_anonymized() {
    let app = app();
    let ada = enrolled(&app, "Ada").await;
    let brian = enrolled(&app, "Brian").await;
    submit(&app, "a-1", &ada, 45.0).await;
    submit(&app, "b-1", &brian, 55.0).await;

    let uri = "/api/placement/domains/domain:dsa/tiers/tier:dsa-2/occupants";
    let (status, body) = call(&app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["rank"], 1);
    assert_eq!(rows[0]["averageScore"], 55.0);
    assert_eq!(rows[0]["status"], "ACTIVE");
    for row in rows {
        let pseudonym = row["candidateIdAnonymized"].as_str().unwrap();
        assert!(pseudonym.starts_with("cand-"));
        assert_ne!(pseudonym, ada);
        assert_ne!(pseudonym, brian);
        assert!(row.get("candidateId").is_none());
    }

    let uri = "/api/placement/domains/domain:dsa/tiers/tier:sql-2/waiting-list";
    let (status, body) = call(&app, Method::GET, uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "tier_not_found");
}

#[tokio::test]
async fn capacity_changes_are_guarded() {
    let app = app();
    let uri = "/api/placement/domains/domain:dsa/tiers/tier:dsa-4/capacity";

    let (status, body) = call(&app, Method::PUT, uri, Some(json!({ "maxSlots": 40 }))).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["maxSlots"], 40);

    let (status, body) = call(&app, Method::PUT, uri, Some(json!({ "maxSlots": 0 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "invalid_request");

    let entry = "/api/placement/domains/domain:dsa/tiers/tier:dsa-1/capacity";
    let (status, _) = call(&app, Method::PUT, entry, Some(json!({ "maxSlots": 10 }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn leave_and_withdraw() {
    let app = app();
    let id = enrolled(&app, "Ada").await;

    let uri = format!("/api/placement/candidates/{id}/domains/domain:dsa");
    let (status, body) = call(&app, Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "INACTIVE");

    let (status, body) =
        call(&app, Method::GET, &format!("/api/placement/candidates/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["enrollments"][0]["status"], "INACTIVE");

    let (status, body) =
        call(&app, Method::DELETE, &format!("/api/placement/candidates/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["domains"], json!(["domain:dsa"]));

    let (status, _) =
        call(&app, Method::GET, &format!("/api/placement/candidates/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
