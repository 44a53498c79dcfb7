// src/auth.rs
//! Bearer token handling.
//!
//! The console authenticates against the cold-storage backend; this service never
//! verifies tokens itself. The middleware only requires a non-empty bearer token and
//! stores it in request extensions so handlers can forward it.

use actix_web::dev::ServiceRequest;
use actix_web::{web, HttpMessage, HttpRequest, HttpResponse};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::StoreAdminLoginRequest;
use crate::AppState;

/// Bearer token of the current request, forwarded to the backend unchanged
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken(pub String);

impl AccessToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn get_access_token(req: &HttpRequest) -> ApiResult<AccessToken> {
    req.extensions()
        .get::<AccessToken>()
        .cloned()
        .ok_or_else(|| ApiError::Unauthorized("No access token found".to_string()))
}

// ======== BEARER MIDDLEWARE ========

pub async fn bearer_middleware(
    req: ServiceRequest,
    credentials: BearerAuth,
) -> Result<ServiceRequest, (actix_web::Error, ServiceRequest)> {
    let token = credentials.token().trim();

    if token.is_empty() {
        log::warn!("Rejected request to {} with an empty bearer token", req.path());
        return Err((
            ApiError::Unauthorized("Missing access token".to_string()).into(),
            req,
        ));
    }

    req.extensions_mut().insert(AccessToken(token.to_string()));
    Ok(req)
}

// ======== LOGIN ========

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub store_admin: serde_json::Value,
}

pub async fn login(
    app_state: web::Data<Arc<AppState>>,
    request: web::Json<StoreAdminLoginRequest>,
) -> ApiResult<HttpResponse> {
    request.validate()?;

    let data = app_state.backend.login(&request).await.map_err(|err| match err {
        // Wrong credentials come back as 401 from the backend; the console shows them as a form error
        ApiError::Unauthorized(msg) => ApiError::BadRequest(msg),
        other => other,
    })?;

    log::info!("Store admin {} logged in", request.mobile_number);

    Ok(HttpResponse::Ok().json(ApiResponse::success_with_message(
        LoginResponse {
            token: data.token,
            store_admin: data.store_admin,
        },
        "Login successful".to_string(),
    )))
}
