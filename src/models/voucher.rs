// src/models/voucher.rs
//! Incoming gate passes as returned by the backend.
//! One voucher may hold the same bag size in several chamber/floor/row locations;
//! those entries share a name and are told apart by their position (bag index).

use serde::{Deserialize, Serialize};

// ==================== LOCATION ====================

/// Chamber / floor / row address inside the cold store. Empty string = unset.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, Hash)]
#[serde(default)]
pub struct Location {
    pub chamber: String,
    pub floor: String,
    pub row: String,
}

impl Location {
    pub fn new(chamber: &str, floor: &str, row: &str) -> Self {
        Self {
            chamber: chamber.to_string(),
            floor: floor.to_string(),
            row: row.to_string(),
        }
    }

    /// True when at least one dimension carries a value
    pub fn is_set(&self) -> bool {
        !self.chamber.is_empty() || !self.floor.is_empty() || !self.row.is_empty()
    }
}

// ==================== BAG SIZE ====================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BagSizeEntry {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub initial_quantity: u32,
    #[serde(default)]
    pub current_quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

// ==================== INCOMING VOUCHER ====================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingVoucher {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub gate_pass_no: Option<i64>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub variety: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truck_number: Option<String>,
    #[serde(default)]
    pub bag_sizes: Vec<BagSizeEntry>,
}

impl IncomingVoucher {
    /// Voucher number for sorting; missing numbers sort as 0
    pub fn number(&self) -> i64 {
        self.gate_pass_no.unwrap_or(0)
    }

    pub fn date_key(&self) -> &str {
        self.date.as_deref().unwrap_or("")
    }

    pub fn total_initial(&self) -> u64 {
        self.bag_sizes.iter().map(|b| b.initial_quantity as u64).sum()
    }

    pub fn total_current(&self) -> u64 {
        self.bag_sizes.iter().map(|b| b.current_quantity as u64).sum()
    }
}

/// Next gate pass number the backend will issue for a voucher kind
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextVoucherNumber {
    #[serde(default)]
    pub next_voucher_number: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_backend_shape() {
        let json = r#"{
            "_id": "65f1a2b3c4d5e6f7a8b9c0d1",
            "gatePassNo": 17,
            "date": "2024-01-02T00:00:00.000Z",
            "variety": "Jyoti",
            "bagSizes": [
                {"name": "Ration", "initialQuantity": 100, "currentQuantity": 60,
                 "location": {"chamber": "1", "floor": "2", "row": "3"}},
                {"name": "Seed", "initialQuantity": 20, "currentQuantity": 20}
            ]
        }"#;

        let voucher: IncomingVoucher = serde_json::from_str(json).unwrap();
        assert_eq!(voucher.number(), 17);
        assert_eq!(voucher.truck_number, None);
        assert_eq!(voucher.bag_sizes.len(), 2);
        assert_eq!(voucher.bag_sizes[0].location, Some(Location::new("1", "2", "3")));
        assert_eq!(voucher.bag_sizes[1].location, None);
        assert_eq!(voucher.total_initial(), 120);
        assert_eq!(voucher.total_current(), 80);
    }

    #[test]
    fn test_missing_number_and_date() {
        let voucher: IncomingVoucher =
            serde_json::from_str(r#"{"_id": "a", "variety": "K"}"#).unwrap();
        assert_eq!(voucher.number(), 0);
        assert_eq!(voucher.date_key(), "");
        assert!(voucher.bag_sizes.is_empty());
    }

    #[test]
    fn test_location_is_set() {
        assert!(!Location::default().is_set());
        assert!(Location::new("", "", "4").is_set());
    }
}
