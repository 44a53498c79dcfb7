// src/outgoing_handlers.rs
//! Outgoing form endpoints. Every handler works on one session and answers with the
//! session's table view, so the console re-renders from a single source of truth.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;
use crate::allocation::key;
use crate::auth::{get_access_token, AccessToken};
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::*;
use crate::sessions::{lock, SessionView, SharedSession, SubmissionGuard};
use crate::validator::FieldValidator;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub gate_pass_no: i64,
    pub total_bags: u64,
    pub payload: OutgoingPayload,
    pub warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub gate_pass_no: i64,
    pub total_bags: u64,
    pub outgoing_gate_pass: serde_json::Value,
    pub session: SessionView,
}

// ==================== HELPERS ====================

fn session_for(
    app_state: &AppState,
    http_request: &HttpRequest,
    session_id: &str,
) -> ApiResult<(AccessToken, SharedSession)> {
    let token = get_access_token(http_request)?;
    let session = app_state.sessions.get(session_id, token.as_str())?;
    Ok((token, session))
}

/// Fetches the farmer's incoming vouchers and applies them if the session has not moved on
async fn load_vouchers(
    app_state: &AppState,
    token: &AccessToken,
    session: &SharedSession,
    farmer_storage_link_id: &str,
    generation: u64,
) -> ApiResult<()> {
    let vouchers = app_state
        .backend
        .incoming_vouchers(token.as_str(), farmer_storage_link_id)
        .await?;
    let count = vouchers.len();

    if lock(session)?.apply_vouchers(generation, vouchers) {
        log::debug!("Loaded {} incoming gate passes for farmer link {}", count, farmer_storage_link_id);
    }
    Ok(())
}

fn view_response(session: &SharedSession) -> ApiResult<HttpResponse> {
    let view = lock(session)?.view();
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

// ==================== SESSION LIFECYCLE ====================

pub async fn create_session(
    app_state: web::Data<Arc<AppState>>,
    request: Option<web::Json<CreateSessionRequest>>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let token = get_access_token(&http_request)?;

    let farmer = request
        .and_then(|r| r.into_inner().farmer_storage_link_id)
        .map(|f| f.trim().to_string())
        .filter(|f| !f.is_empty());
    if let Some(ref farmer) = farmer {
        FieldValidator::resource_id(farmer, "Farmer").map_err(ApiError::ValidationError)?;
    }

    let (id, session) = app_state.sessions.create(token.as_str())?;

    if let Some(farmer) = farmer {
        let generation = lock(&session)?.change_farmer(&farmer);
        if let Err(err) = load_vouchers(&app_state, &token, &session, &farmer, generation).await {
            app_state.sessions.remove(&id.to_string(), token.as_str())?;
            return Err(err);
        }
    }

    let view = lock(&session)?.view();
    Ok(HttpResponse::Created().json(ApiResponse::success(view)))
}

pub async fn get_session(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (_, session) = session_for(&app_state, &http_request, &path)?;
    view_response(&session)
}

pub async fn delete_session(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let token = get_access_token(&http_request)?;
    app_state.sessions.remove(&path, token.as_str())?;

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        (),
        "Outgoing form discarded".to_string(),
    )))
}

// ==================== FARMER & VOUCHERS ====================

pub async fn change_farmer(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<ChangeFarmerRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let (token, session) = session_for(&app_state, &http_request, &path)?;

    let farmer = request.farmer_storage_link_id.trim().to_string();
    let generation = lock(&session)?.change_farmer(&farmer);
    load_vouchers(&app_state, &token, &session, &farmer, generation).await?;

    view_response(&session)
}

pub async fn refresh_vouchers(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (token, session) = session_for(&app_state, &http_request, &path)?;

    let (farmer, generation) = lock(&session)?.begin_refresh()?;
    load_vouchers(&app_state, &token, &session, &farmer, generation).await?;

    view_response(&session)
}

// ==================== TABLE STATE ====================

pub async fn update_filters(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<UpdateFiltersRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (_, session) = session_for(&app_state, &http_request, &path)?;
    lock(&session)?.update_filters(&request);
    view_response(&session)
}

pub async fn toggle_column(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<ToggleColumnRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    request.validate()?;
    let (_, session) = session_for(&app_state, &http_request, &path)?;
    lock(&session)?.toggle_column(&request.size);
    view_response(&session)
}

pub async fn reset_session(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (_, session) = session_for(&app_state, &http_request, &path)?;
    lock(&session)?.reset();
    view_response(&session)
}

// ==================== ALLOCATIONS ====================

pub async fn set_allocation(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<SetAllocationRequest>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let allocation_key = key::decode(&request.key)
        .ok_or_else(|| ApiError::invalid_allocation_key(&request.key))?;
    let (_, session) = session_for(&app_state, &http_request, &path)?;

    lock(&session)?.set_allocation(allocation_key, request.quantity)?;
    view_response(&session)
}

pub async fn remove_allocation(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (session_id, encoded) = path.into_inner();
    let allocation_key = key::decode(&encoded)
        .ok_or_else(|| ApiError::invalid_allocation_key(&encoded))?;
    let (_, session) = session_for(&app_state, &http_request, &session_id)?;

    lock(&session)?.remove_allocation(&allocation_key);
    view_response(&session)
}

pub async fn toggle_voucher(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<(String, String)>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (session_id, voucher_id) = path.into_inner();
    let (_, session) = session_for(&app_state, &http_request, &session_id)?;

    lock(&session)?.toggle_voucher(&voucher_id)?;
    view_response(&session)
}

// ==================== REVIEW & SUBMIT ====================

/// Summary sheet: validates the form and shows the payload that submit would send
pub async fn review(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<OutgoingFormValues>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (token, session) = session_for(&app_state, &http_request, &path)?;
    let mut form = request.into_inner();

    let validation = lock(&session)?.validate_submission(&mut form)?;

    let gate_pass_no = app_state
        .backend
        .next_voucher_number(token.as_str(), VoucherNumberKind::Outgoing)
        .await?;

    let payload = lock(&session)?.build_payload(&form, gate_pass_no)?;

    Ok(HttpResponse::Ok().json(ApiResponse::success(ReviewResponse {
        gate_pass_no,
        total_bags: payload.total_bags(),
        payload,
        warnings: validation.warning_messages(),
    })))
}

pub async fn submit(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    request: web::Json<OutgoingFormValues>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let (token, session) = session_for(&app_state, &http_request, &path)?;
    let mut form = request.into_inner();

    // Fail fast before touching the backend
    lock(&session)?.validate_submission(&mut form)?;

    let gate_pass_no = app_state
        .backend
        .next_voucher_number(token.as_str(), VoucherNumberKind::Outgoing)
        .await?;

    let payload = {
        let mut guard = lock(&session)?;
        guard.begin_submission(&mut form)?;
        guard.build_payload(&form, gate_pass_no)
    };
    // From here on the submitting flag is cleared when `submission` drops
    let submission = SubmissionGuard::new(session.clone());
    let payload = payload?;

    let created = app_state.backend.create_outgoing(token.as_str(), &payload).await;
    let created = match created {
        Ok(record) => record,
        Err(err) => {
            log::warn!("Outgoing gate pass #{} was not created: {}", gate_pass_no, err);
            return Err(err);
        }
    };
    submission.succeed();

    log::info!(
        "Outgoing gate pass #{} created for farmer link {} ({} bags)",
        gate_pass_no,
        payload.farmer_storage_link_id,
        payload.total_bags()
    );

    // The submitted bags left the store; reload so the next outgoing sees current stock
    let refresh = lock(&session)?.begin_refresh();
    if let Ok((farmer, generation)) = refresh {
        if let Err(err) = load_vouchers(&app_state, &token, &session, &farmer, generation).await {
            log::warn!("Could not reload stock after outgoing gate pass #{}: {}", gate_pass_no, err);
        }
    }

    let view = lock(&session)?.view();
    Ok(HttpResponse::Created().json(ApiResponse::success_with_message(
        SubmitResponse {
            gate_pass_no,
            total_bags: payload.total_bags(),
            outgoing_gate_pass: created,
            session: view,
        },
        format!("Outgoing gate pass #{} created", gate_pass_no),
    )))
}
