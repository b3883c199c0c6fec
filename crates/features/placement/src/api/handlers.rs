use super::models::{
    AttemptResponse, CandidateDetailsResponse, CandidateResponse, CapacityRequest,
    CapacityResponse, DomainStatusResponse, EnrollRequest, EnrollmentResponse, PlacementResponse,
    RankedCandidateResponse, RegisterCandidateRequest, ScoreRequest, WithdrawalResponse,
};
use crate::Placement;
use crate::error::PlacementError;
use crate::service::PlacementService;
use apex_derive::api_handler;
use apex_domain::constants::PLACEMENT_TAG;
use apex_domain::performance::ScoreEvent;
use apex_kernel::security::resource::ResourceGuard;
use apex_kernel::server::{ApiError, ApiResult, ApiState, ErrorBody};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

fn service(state: &ApiState) -> ApiResult<&PlacementService> {
    Ok(&state.try_get_slice::<Placement>()?.service)
}

#[api_handler(
    post,
    path = "/api/placement/candidates",
    request_body = RegisterCandidateRequest,
    responses(
        (status = CREATED, description = "Candidate registered", body = CandidateResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid display name", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn register_candidate(
    State(state): State<ApiState>,
    Json(request): Json<RegisterCandidateRequest>,
) -> ApiResult<(StatusCode, Json<CandidateResponse>)> {
    let candidate = service(&state)?.register_candidate(&request.display_name)?;
    Ok((StatusCode::CREATED, Json(candidate.into())))
}

#[api_handler(
    get,
    path = "/api/placement/candidates/{candidate_id}",
    params(("candidate_id" = String, Path, description = "Candidate id")),
    responses(
        (status = OK, description = "Candidate and their domain rows", body = CandidateDetailsResponse),
        (status = NOT_FOUND, description = "Unknown candidate", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn get_candidate(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<CandidateDetailsResponse>> {
    let service = service(&state)?;
    let id = ResourceGuard::verify(&raw_id)?;

    let candidate = service.candidate(&id)?;
    let enrollments = service.enrollments(&id)?;
    Ok(Json(CandidateDetailsResponse {
        candidate: candidate.into(),
        enrollments: enrollments.into_iter().map(EnrollmentResponse::from).collect(),
    }))
}

#[api_handler(
    delete,
    path = "/api/placement/candidates/{candidate_id}",
    params(("candidate_id" = String, Path, description = "Candidate id")),
    responses(
        (status = OK, description = "Candidate removed from every domain", body = WithdrawalResponse),
        (status = NOT_FOUND, description = "Unknown candidate", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn withdraw_candidate(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<WithdrawalResponse>> {
    let id = ResourceGuard::verify(&raw_id)?;
    let withdrawal = service(&state)?.withdraw(&id)?;
    Ok(Json(withdrawal.into()))
}

#[api_handler(
    post,
    path = "/api/placement/candidates/{candidate_id}/domains",
    params(("candidate_id" = String, Path, description = "Candidate id")),
    request_body = EnrollRequest,
    responses(
        (status = CREATED, description = "Enrolled in the entry tier, or back in the last tier", body = EnrollmentResponse),
        (status = NOT_FOUND, description = "Unknown candidate or domain", body = ErrorBody),
        (status = CONFLICT, description = "Already enrolled, or the ladder is incomplete", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn enroll(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    Json(request): Json<EnrollRequest>,
) -> ApiResult<(StatusCode, Json<EnrollmentResponse>)> {
    let candidate = ResourceGuard::verify(&raw_id)?;
    let domain = ResourceGuard::verify(&request.domain_id)?;
    let row = service(&state)?.enroll(&candidate, &domain)?;
    Ok((StatusCode::CREATED, Json(row.into())))
}

#[api_handler(
    get,
    path = "/api/placement/candidates/{candidate_id}/domains/{domain_id}",
    params(
        ("candidate_id" = String, Path, description = "Candidate id"),
        ("domain_id" = String, Path, description = "Domain id"),
    ),
    responses(
        (status = OK, description = "Tier, status and progress to the next tier", body = DomainStatusResponse),
        (status = NOT_FOUND, description = "Not enrolled, or unknown domain", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn domain_status(
    State(state): State<ApiState>,
    Path((raw_candidate, raw_domain)): Path<(String, String)>,
) -> ApiResult<Json<DomainStatusResponse>> {
    let candidate = ResourceGuard::verify(&raw_candidate)?;
    let domain = ResourceGuard::verify(&raw_domain)?;
    let status = service(&state)?.candidate_status(&candidate, &domain)?;
    Ok(Json(status.into()))
}

#[api_handler(
    delete,
    path = "/api/placement/candidates/{candidate_id}/domains/{domain_id}",
    params(
        ("candidate_id" = String, Path, description = "Candidate id"),
        ("domain_id" = String, Path, description = "Domain id"),
    ),
    responses(
        (status = OK, description = "Candidate is now inactive in the domain", body = EnrollmentResponse),
        (status = NOT_FOUND, description = "Not enrolled, or unknown domain", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn leave_domain(
    State(state): State<ApiState>,
    Path((raw_candidate, raw_domain)): Path<(String, String)>,
) -> ApiResult<Json<EnrollmentResponse>> {
    let candidate = ResourceGuard::verify(&raw_candidate)?;
    let domain = ResourceGuard::verify(&raw_domain)?;
    let row = service(&state)?.leave_domain(&candidate, &domain)?;
    Ok(Json(row.into()))
}

#[api_handler(
    get,
    path = "/api/placement/candidates/{candidate_id}/domains/{domain_id}/attempts",
    params(
        ("candidate_id" = String, Path, description = "Candidate id"),
        ("domain_id" = String, Path, description = "Domain id"),
    ),
    responses(
        (status = OK, description = "Recorded attempts, oldest first", body = [AttemptResponse]),
        (status = NOT_FOUND, description = "Not enrolled, or unknown domain", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn list_attempts(
    State(state): State<ApiState>,
    Path((raw_candidate, raw_domain)): Path<(String, String)>,
) -> ApiResult<Json<Vec<AttemptResponse>>> {
    let candidate = ResourceGuard::verify(&raw_candidate)?;
    let domain = ResourceGuard::verify(&raw_domain)?;
    let attempts = service(&state)?.attempts(&candidate, &domain)?;
    Ok(Json(attempts.into_iter().map(AttemptResponse::from).collect()))
}

#[api_handler(
    post,
    path = "/api/placement/scores",
    request_body = ScoreRequest,
    responses(
        (status = OK, description = "Placement after folding in the score", body = PlacementResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Score outside [0, 100]", body = ErrorBody),
        (status = NOT_FOUND, description = "Unknown domain or candidate not enrolled", body = ErrorBody),
        (status = CONFLICT, description = "Duplicate attempt, or the ladder is incomplete", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn submit_score(
    State(state): State<ApiState>,
    Json(request): Json<ScoreRequest>,
) -> ApiResult<Json<PlacementResponse>> {
    let service = service(&state)?;
    let event = ScoreEvent {
        attempt_id: ResourceGuard::verify(&request.attempt_id)?,
        candidate_id: ResourceGuard::verify(&request.candidate_id)?,
        domain_id: ResourceGuard::verify(&request.domain_id)?,
        score: request.score,
        timestamp: request.timestamp.unwrap_or_else(|| service.now()),
    };
    let outcome = service.place_candidate(event)?;
    Ok(Json(outcome.into()))
}

#[api_handler(
    get,
    path = "/api/placement/domains/{domain_id}/tiers/{tier_id}/occupants",
    params(
        ("domain_id" = String, Path, description = "Domain id"),
        ("tier_id" = String, Path, description = "Tier id, e.g. `tier:dsa-2`"),
    ),
    responses(
        (status = OK, description = "Occupants and the waiting candidates holding the tier, ranked and anonymized", body = [RankedCandidateResponse]),
        (status = NOT_FOUND, description = "Unknown domain or tier", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn tier_occupants(
    State(state): State<ApiState>,
    Path((raw_domain, raw_tier)): Path<(String, String)>,
) -> ApiResult<Json<Vec<RankedCandidateResponse>>> {
    let domain = ResourceGuard::verify(&raw_domain)?;
    let tier = ResourceGuard::verify(&raw_tier)?;
    let listing = service(&state)?.tier_occupants(&domain, &tier)?;
    Ok(Json(listing.into_iter().map(RankedCandidateResponse::from).collect()))
}

#[api_handler(
    get,
    path = "/api/placement/domains/{domain_id}/tiers/{tier_id}/waiting-list",
    params(
        ("domain_id" = String, Path, description = "Domain id"),
        ("tier_id" = String, Path, description = "Tier id"),
    ),
    responses(
        (status = OK, description = "Candidates waiting for a slot, ranked and anonymized", body = [RankedCandidateResponse]),
        (status = NOT_FOUND, description = "Unknown domain or tier", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn waiting_list(
    State(state): State<ApiState>,
    Path((raw_domain, raw_tier)): Path<(String, String)>,
) -> ApiResult<Json<Vec<RankedCandidateResponse>>> {
    let domain = ResourceGuard::verify(&raw_domain)?;
    let tier = ResourceGuard::verify(&raw_tier)?;
    let listing = service(&state)?.waiting_list(&domain, &tier)?;
    Ok(Json(listing.into_iter().map(RankedCandidateResponse::from).collect()))
}

#[api_handler(
    put,
    path = "/api/placement/domains/{domain_id}/tiers/{tier_id}/capacity",
    params(
        ("domain_id" = String, Path, description = "Domain id"),
        ("tier_id" = String, Path, description = "Tier id"),
    ),
    request_body = CapacityRequest,
    responses(
        (status = OK, description = "Capacity changed; freed slots backfilled", body = CapacityResponse),
        (status = CONFLICT, description = "More active occupants than the requested slots", body = ErrorBody),
        (status = UNPROCESSABLE_ENTITY, description = "Zero slots, or a bounded entry tier", body = ErrorBody),
    ),
    tag = PLACEMENT_TAG,
)]
pub(super) async fn set_capacity(
    State(state): State<ApiState>,
    Path((raw_domain, raw_tier)): Path<(String, String)>,
    Json(request): Json<CapacityRequest>,
) -> ApiResult<Json<CapacityResponse>> {
    let domain = ResourceGuard::verify(&raw_domain)?;
    let tier = ResourceGuard::verify(&raw_tier)?;
    let change = service(&state)?.resize_tier(&domain, &tier, request.max_slots)?;
    Ok(Json(change.into()))
}

impl From<PlacementError> for ApiError {
    fn from(err: PlacementError) -> Self {
        let err = err.normalize();
        let api = Self::new(err.category(), err.code(), err.to_string());
        match &err {
            PlacementError::IncompleteLadder { violations, .. } => {
                match serde_json::to_value(violations) {
                    Ok(details) => api.with_details(details),
                    Err(_) => api,
                }
            },
            _ => api,
        }
    }
}
