// src/error.rs
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use std::fmt;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unauthorized(String),
    Conflict(String),
    InternalServerError(String),
    ValidationError(String),
    UpstreamError(String),
    UpstreamUnavailable(reqwest::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad Request: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not Found: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::InternalServerError(msg) => write!(f, "Internal Server Error: {}", msg),
            ApiError::ValidationError(msg) => write!(f, "Validation Error: {}", msg),
            ApiError::UpstreamError(msg) => write!(f, "Backend Error: {}", msg),
            ApiError::UpstreamUnavailable(err) => write!(f, "Backend Unavailable: {}", err),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ValidationError(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::UpstreamError(_) | ApiError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            ApiError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error_response = ErrorResponse {
            success: false,
            message: self.to_string(),
        };

        HttpResponse::build(self.status_code()).json(error_response)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::UpstreamUnavailable(err)
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(err: validator::ValidationErrors) -> Self {
        ApiError::ValidationError(err.to_string())
    }
}

impl ApiError {
    pub fn bad_request(msg: &str) -> Self {
        ApiError::BadRequest(msg.to_string())
    }

    pub fn not_found(what: &str) -> Self {
        ApiError::NotFound(format!("{} not found", what))
    }

    pub fn session_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("Outgoing session '{}' not found or expired", id))
    }

    pub fn invalid_allocation_key(key: &str) -> Self {
        ApiError::BadRequest(format!("Invalid allocation key '{}'", key))
    }

    pub fn unknown_bag(voucher_no: i64, size: &str, bag_index: usize) -> Self {
        ApiError::BadRequest(format!(
            "Voucher #{} has no '{}' bag at index {}",
            voucher_no, size, bag_index
        ))
    }

    pub fn quantity_out_of_range(quantity: i64) -> Self {
        ApiError::ValidationError(format!("Quantity {} is too large", quantity))
    }

    pub fn no_allocations() -> Self {
        ApiError::ValidationError(
            "Please add at least one allocation: select quantities in the vouchers table".to_string(),
        )
    }

    pub fn no_farmer_selected() -> Self {
        ApiError::ValidationError("Please select a farmer".to_string())
    }

    pub fn submission_in_progress() -> Self {
        ApiError::Conflict("An outgoing voucher from this form is already being submitted".to_string())
    }

    pub fn over_allocated(voucher_no: i64, size: &str, available: u32, requested: u32) -> Self {
        ApiError::ValidationError(format!(
            "Insufficient bags in voucher #{} size '{}'. Available: {}, Requested: {}",
            voucher_no, size, available, requested
        ))
    }

    pub fn lock_poisoned() -> Self {
        ApiError::InternalServerError("Session state is unavailable".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(err: ApiError) -> u16 {
        err.error_response().status().as_u16()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(ApiError::bad_request("x")), 400);
        assert_eq!(status(ApiError::not_found("Voucher")), 404);
        assert_eq!(status(ApiError::submission_in_progress()), 409);
        assert_eq!(status(ApiError::no_allocations()), 422);
        assert_eq!(status(ApiError::UpstreamError("boom".into())), 502);
        assert_eq!(status(ApiError::Unauthorized("expired".into())), 401);
    }

    #[test]
    fn test_messages() {
        assert_eq!(ApiError::not_found("Farmer").to_string(), "Not Found: Farmer not found");
        let err = ApiError::over_allocated(12, "Ration", 40, 55);
        assert_eq!(
            err.to_string(),
            "Validation Error: Insufficient bags in voucher #12 size 'Ration'. Available: 40, Requested: 55"
        );
    }
}
