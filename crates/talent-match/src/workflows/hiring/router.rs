use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{
    AddOnService, CandidateProfile, CompanyId, EntryKey, JobId, JobOpening, PaymentReceipt,
    SkillLevel, TestResults,
};
use super::entry::PipelineEntry;
use super::machine::{PipelineError, PipelineStateMachine};
use super::repository::{IdentityDirectory, PipelineRepository, RepositoryError};

type SharedMachine<R, D> = Arc<PipelineStateMachine<R, D>>;

#[derive(Debug, Deserialize)]
pub struct OpenEntryRequest {
    pub candidate: CandidateProfile,
    pub job: JobOpening,
    #[serde(default)]
    pub explicit_selection: bool,
}

#[derive(Debug, Deserialize)]
pub struct MatchRequest {
    pub job: JobOpening,
    pub candidates: Vec<CandidateProfile>,
}

#[derive(Debug, Deserialize)]
pub struct SelfAssessmentRequest {
    pub skills: BTreeMap<String, SkillLevel>,
}

#[derive(Debug, Deserialize)]
pub struct ExpressInterestRequest {
    #[serde(default)]
    pub add_ons: BTreeSet<AddOnService>,
    #[serde(default)]
    pub exclusivity_requested: bool,
}

#[derive(Debug, Deserialize)]
pub struct CandidateResponseRequest {
    pub accepted: bool,
}

#[derive(Debug, Deserialize)]
pub struct RequesterQuery {
    pub company_id: String,
}

/// Router builder exposing the pipeline state machine over HTTP.
pub fn pipeline_router<R, D>(machine: SharedMachine<R, D>) -> Router
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    const ENTRY: &str = "/api/v1/pipeline/entries/:anon_id/:job_id";

    Router::new()
        .route("/api/v1/pipeline/entries", post(open_handler::<R, D>))
        .route("/api/v1/pipeline/matches", post(match_handler::<R, D>))
        .route(ENTRY, get(status_handler::<R, D>))
        .route(
            &format!("{ENTRY}/self-assessment"),
            post(self_assessment_handler::<R, D>),
        )
        .route(
            &format!("{ENTRY}/test-results"),
            post(test_results_handler::<R, D>),
        )
        .route(&format!("{ENTRY}/interest"), post(interest_handler::<R, D>))
        .route(&format!("{ENTRY}/response"), post(response_handler::<R, D>))
        .route(
            &format!("{ENTRY}/selection"),
            post(selection_handler::<R, D>),
        )
        .route(&format!("{ENTRY}/hire"), post(hire_handler::<R, D>))
        .route(&format!("{ENTRY}/payment"), post(payment_handler::<R, D>))
        .route(
            &format!("{ENTRY}/add-ons/:service/payment"),
            post(addon_payment_handler::<R, D>),
        )
        .route(
            &format!("{ENTRY}/guarantee"),
            post(guarantee_handler::<R, D>),
        )
        .route(
            &format!("{ENTRY}/candidate"),
            get(candidate_view_handler::<R, D>),
        )
        .route(
            &format!("{ENTRY}/candidate/full"),
            get(full_candidate_view_handler::<R, D>),
        )
        .route(
            "/api/v1/pipeline/jobs/:job_id/board",
            get(board_handler::<R, D>),
        )
        .route(
            "/api/v1/pipeline/sweeps/invitations",
            post(invitation_sweep_handler::<R, D>),
        )
        .route(
            "/api/v1/pipeline/sweeps/guarantees",
            post(guarantee_sweep_handler::<R, D>),
        )
        .with_state(machine)
}

/// Maps a pipeline failure onto an HTTP status and a stable error code.
pub(crate) fn error_response(error: PipelineError) -> Response {
    let status = match &error {
        PipelineError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        PipelineError::WindowExpired { .. } => StatusCode::GONE,
        PipelineError::ConcurrentModification { .. } => StatusCode::CONFLICT,
        PipelineError::ConsentNotGranted { .. } => StatusCode::FORBIDDEN,
        PipelineError::EntryNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::BelowMatchThreshold { .. } | PipelineError::AddOnNotRequested(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PipelineError::PaymentRejected { .. } => StatusCode::PAYMENT_REQUIRED,
        PipelineError::Repository(RepositoryError::Conflict)
        | PipelineError::EntryArchived { .. } => StatusCode::CONFLICT,
        PipelineError::Repository(_) | PipelineError::Directory(_) | PipelineError::Consent(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": error.to_string(),
        "code": error.code(),
    });
    (status, Json(payload)).into_response()
}

fn entry_response(result: Result<PipelineEntry, PipelineError>, status: StatusCode) -> Response {
    match result {
        Ok(entry) => (status, Json(entry.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

fn entry_key((anon_id, job_id): (String, String)) -> EntryKey {
    EntryKey::new(anon_id, job_id)
}

pub(crate) async fn open_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Json(request): Json<OpenEntryRequest>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let result = machine.open_entry(request.candidate, request.job, request.explicit_selection);
    entry_response(result, StatusCode::CREATED)
}

pub(crate) async fn match_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Json(request): Json<MatchRequest>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    match machine.match_candidates(&request.job, request.candidates) {
        Ok(entries) => {
            let views: Vec<_> = entries.iter().map(PipelineEntry::status_view).collect();
            (StatusCode::OK, Json(views)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    entry_response(machine.entry(&entry_key(path)), StatusCode::OK)
}

pub(crate) async fn self_assessment_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
    Json(request): Json<SelfAssessmentRequest>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let result = machine.record_self_assessment(&entry_key(path), request.skills);
    entry_response(result, StatusCode::OK)
}

pub(crate) async fn test_results_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
    Json(results): Json<TestResults>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let result = machine.record_test_results(&entry_key(path), results);
    entry_response(result, StatusCode::OK)
}

pub(crate) async fn interest_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
    Json(request): Json<ExpressInterestRequest>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let result = machine.express_interest(
        &entry_key(path),
        request.add_ons,
        request.exclusivity_requested,
    );
    entry_response(result, StatusCode::OK)
}

pub(crate) async fn response_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
    Json(request): Json<CandidateResponseRequest>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let result = machine.candidate_respond(&entry_key(path), request.accepted);
    entry_response(result, StatusCode::OK)
}

pub(crate) async fn selection_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    entry_response(machine.mark_selected(&entry_key(path)), StatusCode::OK)
}

pub(crate) async fn hire_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    entry_response(machine.confirm_hire(&entry_key(path)), StatusCode::OK)
}

pub(crate) async fn payment_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
    Json(receipt): Json<PaymentReceipt>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let result = machine.confirm_payment(&entry_key(path), receipt);
    entry_response(result, StatusCode::OK)
}

pub(crate) async fn addon_payment_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path((anon_id, job_id, service)): Path<(String, String, String)>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let Some(service) = AddOnService::parse(&service) else {
        let payload = json!({
            "error": format!("unknown add-on service '{service}'"),
            "code": "unknown_add_on",
        });
        return (StatusCode::NOT_FOUND, Json(payload)).into_response();
    };

    let result = machine.confirm_addon_payment(&EntryKey::new(anon_id, job_id), service);
    entry_response(result, StatusCode::OK)
}

pub(crate) async fn guarantee_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let now = machine.now();
    entry_response(
        machine.evaluate_guarantee(&entry_key(path), now),
        StatusCode::OK,
    )
}

pub(crate) async fn candidate_view_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
    Query(query): Query<RequesterQuery>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    match machine.candidate_view(&entry_key(path), &CompanyId(query.company_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn full_candidate_view_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(path): Path<(String, String)>,
    Query(query): Query<RequesterQuery>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    match machine.full_candidate_view(&entry_key(path), &CompanyId(query.company_id)) {
        Ok(view) => (StatusCode::OK, Json(view)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn board_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
    Path(job_id): Path<String>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    match machine.board(&JobId(job_id)) {
        Ok(board) => (StatusCode::OK, Json(board)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn invitation_sweep_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let now = machine.now();
    match machine.expire_stale_invitations(now) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn guarantee_sweep_handler<R, D>(
    State(machine): State<SharedMachine<R, D>>,
) -> Response
where
    R: PipelineRepository + 'static,
    D: IdentityDirectory + 'static,
{
    let now = machine.now();
    match machine.evaluate_guarantees(now) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}
