// src/backend.rs
//! Client for the cold-storage REST backend.
//!
//! Handlers talk to the backend through [`ColdStorageBackend`] so tests can swap in
//! an in-memory implementation. The console's bearer token is forwarded on every call.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::instrument;
use crate::config::BackendConfig;
use crate::error::{ApiError, ApiResult};
use crate::models::*;

#[async_trait]
pub trait ColdStorageBackend: Send + Sync {
    async fn login(&self, request: &StoreAdminLoginRequest) -> ApiResult<StoreAdminLoginData>;

    async fn farmer_storage_links(&self, token: &str) -> ApiResult<Vec<FarmerStorageLink>>;

    async fn incoming_vouchers(&self, token: &str, farmer_storage_link_id: &str) -> ApiResult<Vec<IncomingVoucher>>;

    async fn next_voucher_number(&self, token: &str, kind: VoucherNumberKind) -> ApiResult<i64>;

    /// Creates the outgoing voucher; returns the backend's record as-is
    async fn create_outgoing(&self, token: &str, payload: &OutgoingPayload) -> ApiResult<serde_json::Value>;

    async fn daybook(&self, token: &str, params: &DaybookParams) -> ApiResult<DaybookApiResponse>;

    async fn farmer_vouchers(&self, token: &str, farmer_storage_link_id: &str, range: &DateRangeQuery) -> ApiResult<FarmerVouchers>;

    async fn ledgers(&self, token: &str) -> ApiResult<Vec<Ledger>>;

    async fn balance_sheet(&self, token: &str, range: &DateRangeQuery) -> ApiResult<BalanceSheetData>;
}

// ==================== HTTP IMPLEMENTATION ====================

pub struct HttpBackend {
    client: reqwest::Client,
    api_root: String,
    max_attempts: u32,
    retry_backoff_ms: u64,
}

impl HttpBackend {
    pub fn new(config: &BackendConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        Ok(Self {
            client,
            api_root: config.api_root(),
            max_attempts: config.max_attempts.max(1),
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_root, path)
    }

    /// `prefix/<id>/<suffix..>` with `id` percent-encoded as a single path segment
    fn resource_url(&self, prefix: &str, id: &str, suffix: &[&str]) -> ApiResult<String> {
        if matches!(id.trim(), "" | "." | "..") {
            return Err(ApiError::BadRequest(format!("Invalid resource id '{}'", id)));
        }
        let mut url = reqwest::Url::parse(&self.url(prefix))
            .map_err(|e| ApiError::InternalServerError(format!("Invalid backend URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::InternalServerError("Backend URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .push(id)
            .extend(suffix);
        Ok(url.to_string())
    }

    fn auth_headers(token: &str) -> ApiResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if !token.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Unauthorized("Invalid bearer token".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    /// Maps a non-success response to an error carrying the backend's message
    async fn error_from_response(response: reqwest::Response) -> ApiError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = backend_message(&body)
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("Backend request failed").to_string());

        match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized(message),
            StatusCode::NOT_FOUND => ApiError::NotFound(message),
            _ => ApiError::UpstreamError(message),
        }
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        self.get_url_with_retry(&self.url(path), path, token, query).await
    }

    /// GET with linear backoff. Network errors and 5xx are retried; 4xx are returned at once.
    /// `path` is the route template used in logs.
    #[instrument(name = "backend_get_with_retry", skip(self, url, token, query))]
    async fn get_url_with_retry<T: DeserializeOwned>(
        &self,
        url: &str,
        path: &str,
        token: &str,
        query: &[(&str, String)],
    ) -> ApiResult<T> {
        let headers = Self::auth_headers(token)?;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let request = self.client.get(url).headers(headers.clone()).query(query);
            match request.send().await {
                Ok(response) if response.status().is_success() => {
                    return response.json::<T>().await.map_err(|e| {
                        log::error!("Unexpected backend response from {}: {}", path, e);
                        ApiError::UpstreamError(format!("Unexpected response from backend: {}", e))
                    });
                }
                Ok(response) => {
                    if !response.status().is_server_error() || attempt >= self.max_attempts {
                        return Err(Self::error_from_response(response).await);
                    }
                    log::warn!("GET {} returned {} (attempt {})", path, response.status(), attempt);
                }
                Err(e) => {
                    if attempt >= self.max_attempts {
                        log::error!("GET {} failed after {} attempts: {}", path, attempt, e);
                        return Err(ApiError::from(e));
                    }
                    log::warn!("GET {} failed (attempt {}): {}", path, attempt, e);
                }
            }
            tokio::time::sleep(Duration::from_millis(
                self.retry_backoff_ms.saturating_mul(attempt as u64),
            ))
            .await;
        }
    }

    /// Single-shot POST; creating vouchers must never be replayed
    #[instrument(name = "backend_post", skip(self, token, body))]
    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, token: &str, body: &B) -> ApiResult<T> {
        let response = self
            .client
            .post(self.url(path))
            .headers(Self::auth_headers(token)?)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ApiError::UpstreamError(format!("Unexpected response from backend: {}", e)))
    }
}

/// `message` field of a JSON error body, if any
fn backend_message(body: &str) -> Option<String> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()?
        .get("message")?
        .as_str()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

/// Unwraps `{success, data, message}`; a `success: false` envelope becomes an upstream error
pub fn unwrap_envelope<T>(envelope: BackendEnvelope<T>, what: &str) -> ApiResult<T> {
    if !envelope.success {
        return Err(ApiError::UpstreamError(
            envelope.message.unwrap_or_else(|| format!("Failed to fetch {}", what)),
        ));
    }
    envelope
        .data
        .ok_or_else(|| ApiError::UpstreamError(format!("Backend returned no {}", what)))
}

#[async_trait]
impl ColdStorageBackend for HttpBackend {
    async fn login(&self, request: &StoreAdminLoginRequest) -> ApiResult<StoreAdminLoginData> {
        let envelope: BackendEnvelope<StoreAdminLoginData> = self.post("/store-admin/login", "", request).await?;
        unwrap_envelope(envelope, "login data")
    }

    async fn farmer_storage_links(&self, token: &str) -> ApiResult<Vec<FarmerStorageLink>> {
        let envelope = self.get_with_retry("/store-admin/farmer-storage-links", token, &[]).await?;
        unwrap_envelope(envelope, "farmers")
    }

    async fn incoming_vouchers(&self, token: &str, farmer_storage_link_id: &str) -> ApiResult<Vec<IncomingVoucher>> {
        let url = self.resource_url("/incoming-gate-pass/farmer-storage-link", farmer_storage_link_id, &[])?;
        let envelope = self
            .get_url_with_retry(&url, "/incoming-gate-pass/farmer-storage-link/{id}", token, &[])
            .await?;
        unwrap_envelope(envelope, "incoming gate passes")
    }

    async fn next_voucher_number(&self, token: &str, kind: VoucherNumberKind) -> ApiResult<i64> {
        let envelope: BackendEnvelope<NextVoucherNumber> = self
            .get_with_retry("/store-admin/next-voucher-number", token, &[("type", kind.as_str().to_string())])
            .await?;
        // A fresh store has no vouchers yet; numbering starts at 1
        Ok(unwrap_envelope(envelope, "voucher number")?
            .next_voucher_number
            .filter(|n| *n > 0)
            .unwrap_or(1))
    }

    async fn create_outgoing(&self, token: &str, payload: &OutgoingPayload) -> ApiResult<serde_json::Value> {
        let envelope: BackendEnvelope<serde_json::Value> = self.post("/outgoing-gate-pass", token, payload).await?;
        if !envelope.success {
            return Err(ApiError::UpstreamError(
                envelope.message.unwrap_or_else(|| "Failed to create outgoing gate pass".to_string()),
            ));
        }
        Ok(envelope.data.unwrap_or(serde_json::Value::Null))
    }

    async fn daybook(&self, token: &str, params: &DaybookParams) -> ApiResult<DaybookApiResponse> {
        let response: DaybookApiResponse = self
            .get_with_retry("/store-admin/daybook", token, &params.to_query_pairs())
            .await?;
        if response.status != "Success" || response.data.is_none() {
            return Err(ApiError::UpstreamError("Failed to fetch daybook".to_string()));
        }
        Ok(response)
    }

    async fn farmer_vouchers(&self, token: &str, farmer_storage_link_id: &str, range: &DateRangeQuery) -> ApiResult<FarmerVouchers> {
        let url = self.resource_url("/store-admin/farmer-storage-links", farmer_storage_link_id, &["vouchers"])?;
        let envelope = self
            .get_url_with_retry(&url, "/store-admin/farmer-storage-links/{id}/vouchers", token, &range.to_params())
            .await?;
        unwrap_envelope(envelope, "farmer vouchers")
    }

    async fn ledgers(&self, token: &str) -> ApiResult<Vec<Ledger>> {
        let envelope = self.get_with_retry("/accounting/ledgers", token, &[]).await?;
        unwrap_envelope(envelope, "ledgers")
    }

    async fn balance_sheet(&self, token: &str, range: &DateRangeQuery) -> ApiResult<BalanceSheetData> {
        let envelope = self.get_with_retry("/accounting/balance-sheet", token, &range.to_params()).await?;
        unwrap_envelope(envelope, "balance sheet")
    }
}


/// In-memory backend for handler tests
#[cfg(test)]
pub mod fake {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeBackend {
        pub links: Vec<FarmerStorageLink>,
        pub vouchers: Vec<IncomingVoucher>,
        pub next_number: Option<i64>,
        pub fail_create: bool,
        pub created: Mutex<Vec<OutgoingPayload>>,
        pub daybook: Vec<DaybookEntry>,
        pub daybook_params: Mutex<Option<DaybookParams>>,
        pub farmer_vouchers: FarmerVouchers,
        pub ledgers: Vec<Ledger>,
        pub balance_sheet: BalanceSheetData,
    }

    #[async_trait]
    impl ColdStorageBackend for FakeBackend {
        async fn login(&self, request: &StoreAdminLoginRequest) -> ApiResult<StoreAdminLoginData> {
            if request.password == "secret" {
                Ok(StoreAdminLoginData {
                    store_admin: serde_json::json!({ "name": "Store Admin" }),
                    token: "token-1".to_string(),
                })
            } else {
                Err(ApiError::Unauthorized("Invalid mobile number or password".to_string()))
            }
        }

        async fn farmer_storage_links(&self, _token: &str) -> ApiResult<Vec<FarmerStorageLink>> {
            Ok(self.links.clone())
        }

        /// Stock reflects every outgoing gate pass created so far
        async fn incoming_vouchers(&self, _token: &str, _farmer_storage_link_id: &str) -> ApiResult<Vec<IncomingVoucher>> {
            let mut vouchers = self.vouchers.clone();
            for payload in self.created.lock().unwrap().iter() {
                for pass in &payload.incoming_gate_passes {
                    let Some(voucher) = vouchers.iter_mut().find(|v| v.id == pass.incoming_gate_pass_id) else {
                        continue;
                    };
                    for line in &pass.allocations {
                        let bag = voucher
                            .bag_sizes
                            .iter_mut()
                            .filter(|b| b.name.trim() == line.size)
                            .nth(line.bag_index);
                        if let Some(bag) = bag {
                            bag.current_quantity = bag.current_quantity.saturating_sub(line.quantity_to_allocate);
                        }
                    }
                }
            }
            Ok(vouchers)
        }

        async fn next_voucher_number(&self, _token: &str, _kind: VoucherNumberKind) -> ApiResult<i64> {
            Ok(self.next_number.unwrap_or(1))
        }

        async fn create_outgoing(&self, _token: &str, payload: &OutgoingPayload) -> ApiResult<serde_json::Value> {
            if self.fail_create {
                return Err(ApiError::UpstreamError("Insufficient bags in incoming gate pass".to_string()));
            }
            self.created.lock().unwrap().push(payload.clone());
            Ok(serde_json::json!({ "_id": "out-1", "gatePassNo": payload.gate_pass_no }))
        }

        async fn daybook(&self, _token: &str, params: &DaybookParams) -> ApiResult<DaybookApiResponse> {
            *self.daybook_params.lock().unwrap() = Some(*params);
            Ok(DaybookApiResponse {
                status: "Success".to_string(),
                data: Some(self.daybook.clone()),
                pagination: DaybookPagination {
                    current_page: params.page,
                    items_per_page: params.limit,
                    total_items: self.daybook.len() as i64,
                    total_pages: 1,
                    ..Default::default()
                },
            })
        }

        async fn farmer_vouchers(&self, _token: &str, _farmer_storage_link_id: &str, _range: &DateRangeQuery) -> ApiResult<FarmerVouchers> {
            Ok(self.farmer_vouchers.clone())
        }

        async fn ledgers(&self, _token: &str) -> ApiResult<Vec<Ledger>> {
            Ok(self.ledgers.clone())
        }

        async fn balance_sheet(&self, _token: &str, _range: &DateRangeQuery) -> ApiResult<BalanceSheetData> {
            Ok(self.balance_sheet.clone())
        }
    }
}
