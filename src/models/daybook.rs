// src/models/daybook.rs
//! Daybook entries (GET /store-admin/daybook and farmer voucher listings).
//! RECEIPT entries carry bag sizes; DELIVERY entries carry order details and snapshots.

use serde::{Deserialize, Serialize};
use super::voucher::BagSizeEntry;
use super::farmer::FarmerStorageLinkSummary;
use super::enums::{DaybookSortBy, DaybookType};

pub const DAYBOOK_DEFAULT_LIMIT: i64 = 10;
pub const DAYBOOK_MAX_LIMIT: i64 = 100;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum EntryType {
    #[serde(rename = "RECEIPT")]
    Receipt,
    #[serde(rename = "DELIVERY")]
    Delivery,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetail {
    pub size: String,
    #[serde(default)]
    pub quantity_available: u32,
    #[serde(default)]
    pub quantity_issued: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_gate_pass_no: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gate_pass_number: Option<i64>,
}

impl OrderDetail {
    /// Backend sends the source voucher number under either name
    pub fn source_voucher_no(&self) -> Option<i64> {
        self.incoming_gate_pass_no.or(self.gate_pass_number)
    }
}

/// State of an incoming voucher at the moment bags were issued from it
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingGatePassSnapshot {
    #[serde(rename = "_id")]
    pub id: String,
    pub gate_pass_no: i64,
    #[serde(default)]
    pub bag_sizes: Vec<BagSizeEntry>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DaybookEntry {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub farmer_storage_link_id: Option<FarmerStorageLinkSummary>,
    #[serde(default)]
    pub created_by: String,
    #[serde(default)]
    pub gate_pass_no: i64,
    #[serde(default)]
    pub date: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entry_type: Option<EntryType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variety: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truck_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bag_sizes: Option<Vec<BagSizeEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_details: Option<Vec<OrderDetail>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incoming_gate_pass_snapshots: Option<Vec<IncomingGatePassSnapshot>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub remarks: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manual_parchi_number: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl DaybookEntry {
    /// Bags received on an incoming entry (sum of initial quantities)
    pub fn total_bags_incoming(&self) -> u64 {
        self.bag_sizes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|b| b.initial_quantity as u64)
            .sum()
    }

    /// Bags still in store from an incoming entry
    pub fn total_bags_remaining(&self) -> u64 {
        self.bag_sizes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|b| b.current_quantity as u64)
            .sum()
    }

    /// Bags issued on an outgoing entry
    pub fn total_bags_outgoing(&self) -> u64 {
        self.order_details
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|d| d.quantity_issued as u64)
            .sum()
    }

    /// Incoming voucher numbers an outgoing entry drew from, in first-seen order
    pub fn source_voucher_numbers(&self) -> Vec<i64> {
        let from_details = self
            .order_details
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(OrderDetail::source_voucher_no);
        let from_snapshots = self
            .incoming_gate_pass_snapshots
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|s| s.gate_pass_no);

        let mut numbers = Vec::new();
        for no in from_details.chain(from_snapshots) {
            if !numbers.contains(&no) {
                numbers.push(no);
            }
        }
        numbers
    }

    pub fn farmer_name(&self) -> &str {
        self.farmer_storage_link_id
            .as_ref()
            .map(|l| l.farmer_id.name.as_str())
            .unwrap_or("")
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct DaybookPagination {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_items: i64,
    pub items_per_page: i64,
    pub has_next_page: bool,
    pub has_previous_page: bool,
    pub next_page: Option<i64>,
    pub previous_page: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct DaybookApiResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub data: Option<Vec<DaybookEntry>>,
    #[serde(default)]
    pub pagination: DaybookPagination,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct FarmerVouchers {
    pub incoming: Vec<DaybookEntry>,
    pub outgoing: Vec<DaybookEntry>,
}

// ==================== QUERY ====================

/// Daybook query as sent by the console; every field optional
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DaybookQuery {
    #[serde(rename = "type")]
    pub entry_type: Option<DaybookType>,
    pub sort_by: Option<DaybookSortBy>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Query after defaults and clamping: page >= 1, limit within 1..=100
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DaybookParams {
    #[serde(rename = "type")]
    pub entry_type: DaybookType,
    pub sort_by: DaybookSortBy,
    pub page: i64,
    pub limit: i64,
}

impl DaybookQuery {
    pub fn normalized(&self) -> DaybookParams {
        DaybookParams {
            entry_type: self.entry_type.unwrap_or_default(),
            sort_by: self.sort_by.unwrap_or_default(),
            page: self.page.unwrap_or(1).max(1),
            limit: self.limit.unwrap_or(DAYBOOK_DEFAULT_LIMIT).clamp(1, DAYBOOK_MAX_LIMIT),
        }
    }
}

impl DaybookParams {
    pub fn to_query_pairs(&self) -> Vec<(&'static str, String)> {
        vec![
            ("type", self.entry_type.as_str().to_string()),
            ("sortBy", self.sort_by.as_str().to_string()),
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daybook_query_clamping() {
        let params = DaybookQuery::default().normalized();
        assert_eq!(params.page, 1);
        assert_eq!(params.limit, DAYBOOK_DEFAULT_LIMIT);
        assert_eq!(params.entry_type, DaybookType::All);
        assert_eq!(params.sort_by, DaybookSortBy::Latest);

        let wild = DaybookQuery { page: Some(-4), limit: Some(1000), ..Default::default() }.normalized();
        assert_eq!((wild.page, wild.limit), (1, 100));

        let zero = DaybookQuery { page: Some(3), limit: Some(0), ..Default::default() }.normalized();
        assert_eq!((zero.page, zero.limit), (3, 1));

        let pairs = zero.to_query_pairs();
        assert_eq!(pairs[0], ("type", "all".to_string()));
        assert_eq!(pairs[1], ("sortBy", "latest".to_string()));
    }

    #[test]
    fn test_delivery_entry() {
        let json = r#"{
            "_id": "o1",
            "farmerStorageLinkId": {
                "_id": "link-1",
                "farmerId": {"_id": "f1", "name": "Ramesh Kumar", "address": "Agra", "mobileNumber": "9876543210"},
                "accountNumber": 101
            },
            "createdBy": "admin",
            "gatePassNo": 3,
            "date": "2024-02-11T00:00:00.000Z",
            "type": "DELIVERY",
            "orderDetails": [
                {"size": "Ration", "quantityAvailable": 60, "quantityIssued": 25, "gatePassNumber": 17},
                {"size": "Seed", "quantityAvailable": 20, "quantityIssued": 5}
            ],
            "status": "NOT_DISPATCHED",
            "remarks": "",
            "createdAt": "2024-02-11T10:00:00.000Z"
        }"#;

        let entry: DaybookEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.entry_type, Some(EntryType::Delivery));
        assert_eq!(entry.total_bags_outgoing(), 30);
        assert_eq!(entry.total_bags_incoming(), 0);
        assert_eq!(entry.farmer_name(), "Ramesh Kumar");
        let details = entry.order_details.as_ref().unwrap();
        assert_eq!(details[0].source_voucher_no(), Some(17));
        assert_eq!(details[1].source_voucher_no(), None);
        assert_eq!(entry.source_voucher_numbers(), vec![17]);
    }
}
