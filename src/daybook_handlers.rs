// src/daybook_handlers.rs
//! Daybook listing and the farmer profile (a farmer's incoming and outgoing vouchers).

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::{DateTime, NaiveDate};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use crate::auth::get_access_token;
use crate::error::{ApiError, ApiResult};
use crate::handlers::ApiResponse;
use crate::models::*;
use crate::validator::FieldValidator;
use crate::AppState;

/// Daybook entry with its bag totals precomputed for the list view
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaybookEntryView {
    #[serde(flatten)]
    pub entry: DaybookEntry,
    pub total_bags_incoming: u64,
    pub total_bags_remaining: u64,
    pub total_bags_outgoing: u64,
    pub source_voucher_nos: Vec<i64>,
}

impl From<DaybookEntry> for DaybookEntryView {
    fn from(entry: DaybookEntry) -> Self {
        Self {
            source_voucher_nos: entry.source_voucher_numbers(),
            total_bags_incoming: entry.total_bags_incoming(),
            total_bags_remaining: entry.total_bags_remaining(),
            total_bags_outgoing: entry.total_bags_outgoing(),
            entry,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DaybookPage {
    pub entries: Vec<DaybookEntryView>,
    pub pagination: DaybookPagination,
}

// ==================== DAYBOOK ====================

pub async fn get_daybook(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<DaybookQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let token = get_access_token(&http_request)?;
    let params = query.normalized();

    let response = app_state.backend.daybook(token.as_str(), &params).await?;
    let entries = response
        .data
        .unwrap_or_default()
        .into_iter()
        .map(DaybookEntryView::from)
        .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(DaybookPage {
        entries,
        pagination: response.pagination,
    })))
}

// ==================== FARMER PROFILE ====================

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FarmerProfileQuery {
    #[serde(rename = "type")]
    pub entry_type: Option<DaybookType>,
    pub search: Option<String>,
    pub sort_by: Option<DaybookSortBy>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FarmerProfileStats {
    pub incoming_count: usize,
    pub outgoing_count: usize,
    pub total_incoming_bags: u64,
    pub total_outgoing_bags: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FarmerProfile {
    pub farmer_storage_link_id: String,
    pub stats: FarmerProfileStats,
    pub total_count: usize,
    pub entries: Vec<DaybookEntryView>,
}

/// Millisecond timestamp of an entry date; missing or unparseable dates sort as 0
fn entry_timestamp(date: &str) -> i64 {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return dt.timestamp_millis();
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap_or(0)
}

/// Calendar day of an entry date, taken from the UTC timestamp
fn entry_day(date: &str) -> Option<NaiveDate> {
    DateTime::parse_from_rfc3339(date)
        .map(|dt| dt.naive_utc().date())
        .ok()
        .or_else(|| NaiveDate::parse_from_str(date, "%Y-%m-%d").ok())
}

fn matches_search(entry: &DaybookEntry, needle: &str) -> bool {
    if entry.farmer_name().to_lowercase().contains(needle) {
        return true;
    }
    if entry.gate_pass_no.to_string().contains(needle) {
        return true;
    }
    // Both 1/2/2024 and 01/02/2024 spellings are searchable
    entry_day(&entry.date).map_or(false, |day| {
        day.format("%-d/%-m/%Y").to_string().contains(needle)
            || day.format("%d/%m/%Y").to_string().contains(needle)
    })
}

pub fn profile_stats(vouchers: &FarmerVouchers) -> FarmerProfileStats {
    FarmerProfileStats {
        incoming_count: vouchers.incoming.len(),
        outgoing_count: vouchers.outgoing.len(),
        total_incoming_bags: vouchers.incoming.iter().map(DaybookEntry::total_bags_incoming).sum(),
        total_outgoing_bags: vouchers.outgoing.iter().map(DaybookEntry::total_bags_outgoing).sum(),
    }
}

/// Incoming entries tagged as receipts and outgoing as deliveries, then type filter,
/// search and date sort applied
pub fn combine_entries(
    vouchers: FarmerVouchers,
    entry_type: DaybookType,
    search: &str,
    sort_by: DaybookSortBy,
) -> Vec<DaybookEntry> {
    let incoming = vouchers.incoming.into_iter().map(|mut e| {
        e.entry_type = Some(EntryType::Receipt);
        e
    });
    let outgoing = vouchers.outgoing.into_iter().map(|mut e| {
        e.entry_type = Some(EntryType::Delivery);
        e
    });

    let needle = search.trim().to_lowercase();
    let mut entries: Vec<DaybookEntry> = incoming
        .chain(outgoing)
        .filter(|e| match entry_type {
            DaybookType::All => true,
            DaybookType::Incoming => e.entry_type == Some(EntryType::Receipt),
            DaybookType::Outgoing => e.entry_type == Some(EntryType::Delivery),
        })
        .filter(|e| needle.is_empty() || matches_search(e, &needle))
        .collect();

    match sort_by {
        DaybookSortBy::Latest => entries.sort_by_key(|e| std::cmp::Reverse(entry_timestamp(&e.date))),
        DaybookSortBy::Oldest => entries.sort_by_key(|e| entry_timestamp(&e.date)),
    }
    entries
}

pub async fn get_farmer_profile(
    app_state: web::Data<Arc<AppState>>,
    path: web::Path<String>,
    query: web::Query<FarmerProfileQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let token = get_access_token(&http_request)?;
    let farmer_storage_link_id = path.into_inner();
    FieldValidator::resource_id(&farmer_storage_link_id, "Farmer").map_err(ApiError::ValidationError)?;
    let query = query.into_inner();

    let range = DateRangeQuery {
        from: query.from,
        to: query.to,
    };
    let vouchers = app_state
        .backend
        .farmer_vouchers(token.as_str(), &farmer_storage_link_id, &range)
        .await?;

    let stats = profile_stats(&vouchers);
    let entries: Vec<DaybookEntryView> = combine_entries(
        vouchers,
        query.entry_type.unwrap_or_default(),
        query.search.as_deref().unwrap_or(""),
        query.sort_by.unwrap_or_default(),
    )
    .into_iter()
    .map(DaybookEntryView::from)
    .collect();

    Ok(HttpResponse::Ok().json(ApiResponse::success(FarmerProfile {
        farmer_storage_link_id,
        stats,
        total_count: entries.len(),
        entries,
    })))
}
