use super::models::{
    CreateDomainRequest, DomainDetailsResponse, DomainResponse, PublishThresholdsRequest,
    RungResponse, ThresholdResponse, TierRequest, TierResponse, UpdateDomainRequest,
    ValidationResponse,
};
use crate::error::LadderError;
use crate::service::LadderService;
use crate::Ladder;
use apex_derive::api_handler;
use apex_domain::constants::LADDER_TAG;
use apex_domain::ids::DomainId;
use apex_kernel::security::resource::ResourceGuard;
use apex_kernel::server::{ApiError, ApiResult, ApiState, ErrorBody};
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;

fn service(state: &ApiState) -> ApiResult<&LadderService> {
    Ok(&state.try_get_slice::<Ladder>()?.service)
}

fn domain_id(raw: &str) -> ApiResult<DomainId> {
    Ok(ResourceGuard::verify(raw)?)
}

#[api_handler(
    get,
    path = "/api/ladder/domains",
    responses((status = OK, description = "All skill domains, by name", body = [DomainResponse])),
    tag = LADDER_TAG,
)]
pub(super) async fn list_domains(
    State(state): State<ApiState>,
) -> ApiResult<Json<Vec<DomainResponse>>> {
    let domains = service(&state)?.list_domains();
    Ok(Json(domains.into_iter().map(DomainResponse::from).collect()))
}

#[api_handler(
    post,
    path = "/api/ladder/domains",
    request_body = CreateDomainRequest,
    responses(
        (status = CREATED, description = "Domain created", body = DomainResponse),
        (status = CONFLICT, description = "Name already taken", body = ErrorBody),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid name", body = ErrorBody),
    ),
    tag = LADDER_TAG,
)]
pub(super) async fn create_domain(
    State(state): State<ApiState>,
    Json(request): Json<CreateDomainRequest>,
) -> ApiResult<(StatusCode, Json<DomainResponse>)> {
    let domain = service(&state)?.create_domain(&request.name, &request.description)?;
    Ok((StatusCode::CREATED, Json(domain.into())))
}

#[api_handler(
    get,
    path = "/api/ladder/domains/{domain_id}",
    params(("domain_id" = String, Path, description = "Domain id, e.g. `domain:dsa`")),
    responses(
        (status = OK, description = "Domain, tiers and the ladder in force", body = DomainDetailsResponse),
        (status = NOT_FOUND, description = "Unknown domain", body = ErrorBody),
    ),
    tag = LADDER_TAG,
)]
pub(super) async fn get_domain(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
) -> ApiResult<Json<DomainDetailsResponse>> {
    let service = service(&state)?;
    let id = domain_id(&raw_id)?;

    let domain = service.domain(&id)?;
    let tiers = service.list_tiers(&id)?;
    let (ladder, violations) = match service.active_ladder(&id, None) {
        Ok(ladder) => (ladder.rungs().iter().map(RungResponse::from).collect(), Vec::new()),
        Err(LadderError::IncompleteLadder { violations, .. }) => (Vec::new(), violations),
        Err(err) => return Err(err.into()),
    };

    Ok(Json(DomainDetailsResponse {
        domain: domain.into(),
        tiers: tiers.into_iter().map(TierResponse::from).collect(),
        ladder,
        violations,
    }))
}

#[api_handler(
    patch,
    path = "/api/ladder/domains/{domain_id}",
    params(("domain_id" = String, Path, description = "Domain id")),
    request_body = UpdateDomainRequest,
    responses(
        (status = OK, description = "Description updated", body = DomainResponse),
        (status = NOT_FOUND, description = "Unknown domain", body = ErrorBody),
    ),
    tag = LADDER_TAG,
)]
pub(super) async fn update_domain(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    Json(request): Json<UpdateDomainRequest>,
) -> ApiResult<Json<DomainResponse>> {
    let id = domain_id(&raw_id)?;
    let domain = service(&state)?.update_description(&id, &request.description)?;
    Ok(Json(domain.into()))
}

#[api_handler(
    delete,
    path = "/api/ladder/domains/{domain_id}",
    params(("domain_id" = String, Path, description = "Domain id")),
    responses(
        (status = NO_CONTENT, description = "Domain, tiers and threshold history removed"),
        (status = NOT_FOUND, description = "Unknown domain", body = ErrorBody),
        (status = CONFLICT, description = "Candidates are still enrolled", body = ErrorBody),
    ),
    tag = LADDER_TAG,
)]
pub(super) async fn delete_domain(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = domain_id(&raw_id)?;
    service(&state)?.remove_domain(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

#[api_handler(
    post,
    path = "/api/ladder/domains/{domain_id}/tiers",
    params(("domain_id" = String, Path, description = "Domain id")),
    request_body = TierRequest,
    responses(
        (status = CREATED, description = "Tier appended to the ladder", body = TierResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid tier", body = ErrorBody),
    ),
    tag = LADDER_TAG,
)]
pub(super) async fn add_tier(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    Json(request): Json<TierRequest>,
) -> ApiResult<(StatusCode, Json<TierResponse>)> {
    let id = domain_id(&raw_id)?;
    let tier = service(&state)?.add_tier(&id, request.into())?;
    Ok((StatusCode::CREATED, Json(tier.into())))
}

#[api_handler(
    put,
    path = "/api/ladder/domains/{domain_id}/thresholds",
    params(("domain_id" = String, Path, description = "Domain id")),
    request_body = PublishThresholdsRequest,
    responses(
        (status = OK, description = "New threshold versions", body = [ThresholdResponse]),
        (status = UNPROCESSABLE_ENTITY, description = "Proposal is not a valid ladder", body = ErrorBody),
    ),
    tag = LADDER_TAG,
)]
pub(super) async fn publish_thresholds(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    Json(request): Json<PublishThresholdsRequest>,
) -> ApiResult<Json<Vec<ThresholdResponse>>> {
    let id = domain_id(&raw_id)?;
    let versions =
        service(&state)?.publish_thresholds(&id, &request.specs(), request.effective_date)?;
    Ok(Json(versions.into_iter().map(ThresholdResponse::from).collect()))
}

#[api_handler(
    post,
    path = "/api/ladder/domains/{domain_id}/thresholds/validate",
    params(("domain_id" = String, Path, description = "Domain id")),
    request_body = PublishThresholdsRequest,
    responses(
        (status = OK, description = "Validation result; nothing is stored", body = ValidationResponse),
        (status = NOT_FOUND, description = "Unknown domain", body = ErrorBody),
    ),
    tag = LADDER_TAG,
)]
pub(super) async fn validate_thresholds(
    State(state): State<ApiState>,
    Path(raw_id): Path<String>,
    Json(request): Json<PublishThresholdsRequest>,
) -> ApiResult<Json<ValidationResponse>> {
    let id = domain_id(&raw_id)?;
    let violations = match service(&state)?.validate_proposal(&id, &request.specs()) {
        Ok(()) => Vec::new(),
        Err(LadderError::InvalidLadder { source, .. }) => source.violations,
        Err(err) => return Err(err.into()),
    };
    Ok(Json(ValidationResponse { valid: violations.is_empty(), violations }))
}

#[api_handler(
    get,
    path = "/api/ladder/domains/{domain_id}/tiers/{level}/thresholds",
    params(
        ("domain_id" = String, Path, description = "Domain id"),
        ("level" = u8, Path, description = "Tier level"),
    ),
    responses(
        (status = OK, description = "Threshold versions, oldest first", body = [ThresholdResponse]),
        (status = NOT_FOUND, description = "Unknown domain", body = ErrorBody),
    ),
    tag = LADDER_TAG,
)]
pub(super) async fn threshold_history(
    State(state): State<ApiState>,
    Path((raw_id, level)): Path<(String, u8)>,
) -> ApiResult<Json<Vec<ThresholdResponse>>> {
    let id = domain_id(&raw_id)?;
    let history = service(&state)?.threshold_history(&id, level)?;
    Ok(Json(history.into_iter().map(ThresholdResponse::from).collect()))
}

impl From<LadderError> for ApiError {
    fn from(err: LadderError) -> Self {
        let err = err.normalize();
        let api = Self::new(err.category(), err.code(), err.to_string());
        let details = match &err {
            LadderError::InvalidLadder { source, .. } => {
                serde_json::to_value(&source.violations).ok()
            },
            LadderError::IncompleteLadder { violations, .. } => {
                serde_json::to_value(violations).ok()
            },
            _ => None,
        };
        match details {
            Some(details) => api.with_details(details),
            None => api,
        }
    }
}
