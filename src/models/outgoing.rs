// src/models/outgoing.rs
//! Outgoing gate pass: form input coming from the console and the body posted to the backend

use serde::{Deserialize, Serialize};
use validator::Validate;
use super::voucher::Location;
use super::enums::SortOrder;
use crate::validator::validate_farmer_storage_link_id;

// ==================== PAYLOAD ====================

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AllocationLine {
    pub size: String,
    pub quantity_to_allocate: u32,
    pub bag_index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct IncomingGatePassAllocation {
    pub incoming_gate_pass_id: String,
    pub allocations: Vec<AllocationLine>,
}

/// POST body for creating an outgoing voucher. Built once per submission.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingPayload {
    pub farmer_storage_link_id: String,
    pub gate_pass_no: i64,
    pub date: String,
    pub variety: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub truck_number: Option<String>,
    pub incoming_gate_passes: Vec<IncomingGatePassAllocation>,
    pub remarks: String,
}

impl OutgoingPayload {
    pub fn total_bags(&self) -> u64 {
        self.incoming_gate_passes
            .iter()
            .flat_map(|p| p.allocations.iter())
            .map(|a| a.quantity_to_allocate as u64)
            .sum()
    }
}

// ==================== REQUESTS ====================

/// Header fields of the outgoing form. `order_date` is dd.mm.yyyy as typed in the console.
#[derive(Debug, Deserialize, Validate, Clone, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct OutgoingFormValues {
    #[validate(length(min = 1, message = "Please select a farmer"))]
    pub farmer_storage_link_id: String,

    #[validate(length(min = 1, message = "Please select a variety"))]
    pub variety: String,

    #[validate(length(min = 1, message = "Order date is required"))]
    pub order_date: String,

    #[validate(length(max = 100, message = "From cannot exceed 100 characters"))]
    pub from: Option<String>,

    #[validate(length(max = 100, message = "To cannot exceed 100 characters"))]
    pub to: Option<String>,

    #[validate(length(max = 50, message = "Truck number cannot exceed 50 characters"))]
    pub truck_number: Option<String>,

    #[validate(length(max = 500, message = "Remarks cannot exceed 500 characters"))]
    pub remarks: String,

    #[validate(length(max = 50, message = "Manual parchi number cannot exceed 50 characters"))]
    pub manual_parchi_number: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    pub farmer_storage_link_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangeFarmerRequest {
    #[validate(
        length(min = 1, message = "Please select a farmer"),
        custom(function = "validate_farmer_storage_link_id")
    )]
    pub farmer_storage_link_id: String,
}

/// Partial filter update; absent fields keep their current value
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFiltersRequest {
    pub variety: Option<String>,
    pub chamber: Option<String>,
    pub floor: Option<String>,
    pub row: Option<String>,
    pub sort: Option<SortOrder>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ToggleColumnRequest {
    #[validate(length(min = 1, message = "Size is required"))]
    pub size: String,
}

/// Cell edit addressed by an encoded allocation key
#[derive(Debug, Deserialize)]
pub struct SetAllocationRequest {
    pub key: String,
    pub quantity: i64,
}
