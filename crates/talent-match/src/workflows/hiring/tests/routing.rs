use super::common::*;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::Duration;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::workflows::hiring::{
    pipeline_router, ConsentLedger, ManualClock, PipelineSettings, PipelineStateMachine,
};

fn request(method: Method, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request builds"),
        None => builder.body(Body::empty()).expect("request builds"),
    }
}

async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(request(method, uri, body))
        .await
        .expect("router responds");
    let status = response.status();
    (status, read_json_body(response).await)
}

const ENTRY: &str = "/api/v1/pipeline/entries/anon-1/job-1";

async fn opened_router() -> (Router, Arc<ManualClock>) {
    let (machine, _, clock) = build_machine();
    let router = pipeline_router(machine);
    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/pipeline/entries",
        Some(json!({ "candidate": candidate("anon-1"), "job": job("job-1") })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["stage"], "matched");
    assert_eq!(body["fit_score"], 100);
    (router, clock)
}

#[tokio::test]
async fn interest_then_acceptance_over_http() {
    let (router, _) = opened_router().await;

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("{ENTRY}/interest"),
        Some(json!({ "add_ons": ["technical_interview"], "exclusivity_requested": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "awaiting_candidate_response");

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("{ENTRY}/response"),
        Some(json!({ "accepted": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "interview_accepted");
    assert_eq!(body["consent_granted"], true);

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("{ENTRY}/candidate/full?company_id=acme"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["full_name"], "Ana Souza");

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("{ENTRY}/add-ons/technical_interview/payment"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "interview_accepted");
}

#[tokio::test]
async fn duplicate_interest_is_a_conflict() {
    let (router, _) = opened_router().await;
    let uri = format!("{ENTRY}/interest");

    let (status, _) = send(&router, Method::POST, &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&router, Method::POST, &uri, Some(json!({}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "invalid_state_transition");
}

#[tokio::test]
async fn late_response_is_gone() {
    let (router, clock) = opened_router().await;
    send(&router, Method::POST, &format!("{ENTRY}/interest"), Some(json!({}))).await;

    clock.advance(Duration::hours(49));
    let (status, body) = send(
        &router,
        Method::POST,
        &format!("{ENTRY}/response"),
        Some(json!({ "accepted": true })),
    )
    .await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "window_expired");

    let (status, body) = send(&router, Method::GET, ENTRY, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["stage"], "interest_expired");
    assert_eq!(body["archived"], true);
}

#[tokio::test]
async fn identity_is_forbidden_without_consent() {
    let (router, _) = opened_router().await;

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("{ENTRY}/candidate/full?company_id=acme"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "consent_not_granted");

    let (status, body) = send(
        &router,
        Method::GET,
        &format!("{ENTRY}/candidate?company_id=acme"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["anon_id"], "anon-1");
    assert!(body.get("full_name").is_none());
}

#[tokio::test]
async fn unknown_entries_and_add_ons_are_not_found() {
    let (router, _) = opened_router().await;

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/v1/pipeline/entries/ghost/job-1",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "entry_not_found");

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("{ENTRY}/add-ons/massage/payment"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "unknown_add_on");

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("{ENTRY}/add-ons/background_check/payment"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "add_on_not_requested");
}

#[tokio::test]
async fn weak_matches_are_unprocessable() {
    let (machine, _, _) = build_machine();
    let router = pipeline_router(machine);
    let mut weak = candidate("anon-9");
    weak.skills.clear();
    weak.years_experience = 0;
    weak.location = Some("Lisbon".to_string());

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/pipeline/entries",
        Some(json!({ "candidate": weak, "job": job("job-1") })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "below_match_threshold");

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/pipeline/entries",
        Some(json!({ "candidate": weak, "job": job("job-1"), "explicit_selection": true })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["fit_score"], 0);
}

#[tokio::test]
async fn board_groups_by_stage_label() {
    let (router, _) = opened_router().await;
    send(&router, Method::POST, &format!("{ENTRY}/interest"), Some(json!({}))).await;
    send(
        &router,
        Method::POST,
        "/api/v1/pipeline/entries",
        Some(json!({ "candidate": candidate("anon-2"), "job": job("job-1") })),
    )
    .await;

    let (status, body) = send(
        &router,
        Method::GET,
        "/api/v1/pipeline/jobs/job-1/board",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["matched"][0]["candidate_anon_id"], "anon-2");
    assert_eq!(
        body["awaiting_candidate_response"][0]["candidate_anon_id"],
        "anon-1"
    );
}

#[tokio::test]
async fn sweep_endpoint_reports_expired_invitations() {
    let (router, clock) = opened_router().await;
    send(&router, Method::POST, &format!("{ENTRY}/interest"), Some(json!({}))).await;
    clock.advance(Duration::days(3));

    let (status, body) = send(
        &router,
        Method::POST,
        "/api/v1/pipeline/sweeps/invitations",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["examined"], 1);
    assert_eq!(body["conflicts"], 0);
    assert_eq!(
        body["advanced"][0],
        json!({ "candidate_anon_id": "anon-1", "job_id": "job-1" })
    );
}

#[tokio::test]
async fn storage_failures_are_internal_errors() {
    let machine = Arc::new(PipelineStateMachine::new(
        Arc::new(UnavailableRepository),
        Arc::new(ConsentLedger::new()),
        Arc::new(MemoryDirectory::default()),
        Arc::new(ManualClock::new(start())),
        PipelineSettings::default(),
    ));
    let router = pipeline_router(machine);

    let (status, body) = send(&router, Method::GET, ENTRY, None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["code"], "unavailable");
}

#[tokio::test]
async fn add_on_payment_on_a_declined_entry_conflicts() {
    let (router, _) = opened_router().await;
    send(
        &router,
        Method::POST,
        &format!("{ENTRY}/interest"),
        Some(json!({ "add_ons": ["background_check"] })),
    )
    .await;
    let (status, _) = send(
        &router,
        Method::POST,
        &format!("{ENTRY}/response"),
        Some(json!({ "accepted": false })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &router,
        Method::POST,
        &format!("{ENTRY}/add-ons/background_check/payment"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "entry_archived");
}
