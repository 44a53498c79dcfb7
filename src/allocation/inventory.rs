// src/allocation/inventory.rs
//! Read-only views over a fetched voucher list: which sizes and locations exist,
//! and which bags of a voucher belong to a given size.

use serde::Serialize;
use std::collections::BTreeSet;
use crate::models::{IncomingVoucher, Location};

#[derive(Debug, Serialize, Clone, Default, PartialEq)]
pub struct UniqueLocations {
    pub chambers: Vec<String>,
    pub floors: Vec<String>,
    pub rows: Vec<String>,
}

impl UniqueLocations {
    pub fn is_empty(&self) -> bool {
        self.chambers.is_empty() && self.floors.is_empty() && self.rows.is_empty()
    }
}

/// One physical bag entry of a size inside a voucher.
/// `bag_index` is the position among entries with the same trimmed name.
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BagDetail {
    pub bag_index: usize,
    pub initial_quantity: u32,
    pub current_quantity: u32,
    pub location: Option<Location>,
}

fn non_empty_trimmed(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Sorted, deduplicated, non-empty bag size names across all vouchers
pub fn unique_size_names(vouchers: &[IncomingVoucher]) -> Vec<String> {
    vouchers
        .iter()
        .flat_map(|v| v.bag_sizes.iter())
        .filter_map(|b| non_empty_trimmed(&b.name))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn unique_location_values(vouchers: &[IncomingVoucher]) -> UniqueLocations {
    let mut chambers = BTreeSet::new();
    let mut floors = BTreeSet::new();
    let mut rows = BTreeSet::new();

    for location in vouchers
        .iter()
        .flat_map(|v| v.bag_sizes.iter())
        .filter_map(|b| b.location.as_ref())
    {
        if let Some(c) = non_empty_trimmed(&location.chamber) {
            chambers.insert(c.to_string());
        }
        if let Some(f) = non_empty_trimmed(&location.floor) {
            floors.insert(f.to_string());
        }
        if let Some(r) = non_empty_trimmed(&location.row) {
            rows.insert(r.to_string());
        }
    }

    UniqueLocations {
        chambers: chambers.into_iter().collect(),
        floors: floors.into_iter().collect(),
        rows: rows.into_iter().collect(),
    }
}

/// Variety dropdown options taken from the farmer's incoming vouchers
pub fn unique_varieties(vouchers: &[IncomingVoucher]) -> Vec<String> {
    vouchers
        .iter()
        .filter_map(|v| non_empty_trimmed(&v.variety))
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Every bag entry of `voucher` named `size_name` (trimmed comparison), in original order.
/// The position in the returned list is the bag index used in allocation keys.
pub fn bag_details_for_size(voucher: &IncomingVoucher, size_name: &str) -> Vec<BagDetail> {
    let wanted = size_name.trim();
    voucher
        .bag_sizes
        .iter()
        .filter(|b| b.name.trim() == wanted)
        .enumerate()
        .map(|(bag_index, b)| BagDetail {
            bag_index,
            initial_quantity: b.initial_quantity,
            current_quantity: b.current_quantity,
            location: b.location.clone(),
        })
        .collect()
}

/// The bag addressed by (size, bag index), if the voucher still has it
pub fn bag_detail_at(voucher: &IncomingVoucher, size_name: &str, bag_index: usize) -> Option<BagDetail> {
    bag_details_for_size(voucher, size_name).into_iter().nth(bag_index)
}
