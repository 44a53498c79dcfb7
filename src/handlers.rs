// src/handlers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::auth::get_access_token;
use crate::error::ApiResult;
use crate::models::{FarmerOption, FarmerStorageLink};
use crate::AppState;

// ==================== COMMON STRUCTURES ====================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn success_with_message(data: T, message: String) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: Some(message),
        }
    }
}

// ==================== FARMERS ====================

#[derive(Debug, Deserialize, Default)]
pub struct FarmerSearchQuery {
    pub search: Option<String>,
}

/// Selector options for active farmer links, optionally narrowed by a search term
pub fn farmer_options(links: &[FarmerStorageLink], search: Option<&str>) -> Vec<FarmerOption> {
    let needle = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();

    links
        .iter()
        .filter(|link| link.is_active)
        .map(FarmerOption::from)
        .filter(|option| needle.is_empty() || option.searchable_text.to_lowercase().contains(&needle))
        .collect()
}

pub async fn list_farmers(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<FarmerSearchQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let token = get_access_token(&http_request)?;
    let links = app_state.backend.farmer_storage_links(token.as_str()).await?;

    let options = farmer_options(&links, query.search.as_deref());
    Ok(HttpResponse::Ok().json(ApiResponse::success(options)))
}
