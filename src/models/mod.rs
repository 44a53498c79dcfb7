// src/models/mod.rs

pub mod daybook;
pub mod enums;
pub mod farmer;
pub mod finance;
pub mod outgoing;
pub mod voucher;

pub use daybook::*;
pub use enums::*;
pub use farmer::*;
pub use finance::*;
pub use outgoing::*;
pub use voucher::*;

use serde::Deserialize;

// ==================== COMMON / SHARED ====================

/// Standard backend envelope `{success, data, message}`
#[derive(Debug, Deserialize)]
pub struct BackendEnvelope<T> {
    #[serde(default)]
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Optional date range, YYYY-MM-DD strings passed through to the backend
#[derive(Debug, Deserialize, Clone, Default)]
pub struct DateRangeQuery {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl DateRangeQuery {
    /// Non-empty bounds as query pairs
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(from) = self.from.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("from", from.to_string()));
        }
        if let Some(to) = self.to.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            params.push(("to", to.to_string()));
        }
        params
    }
}
