// src/allocation/payload.rs
//! Turns a session ledger plus the form header into the outgoing gate pass body.

use serde::Serialize;
use super::inventory::bag_detail_at;
use super::key::AllocationKey;
use super::ledger::AllocationLedger;
use crate::error::{ApiError, ApiResult};
use crate::models::{AllocationLine, IncomingGatePassAllocation, IncomingVoucher, OutgoingFormValues, OutgoingPayload};
use crate::validator::{parse_order_date, to_backend_date};

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn find_voucher<'a>(vouchers: &'a [IncomingVoucher], id: &str) -> Option<&'a IncomingVoucher> {
    vouchers.iter().find(|v| v.id == id)
}

/// Builds the submission body.
///
/// `Ok(None)` when the ledger holds no positive quantity. Entries are grouped per
/// voucher in ledger order; a location is attached only when the referenced bag has one.
pub fn build(
    form: &OutgoingFormValues,
    gate_pass_no: i64,
    ledger: &AllocationLedger,
    vouchers: &[IncomingVoucher],
) -> ApiResult<Option<OutgoingPayload>> {
    let mut groups: Vec<IncomingGatePassAllocation> = Vec::new();

    for (key, quantity) in ledger.iter().filter(|(_, q)| *q > 0) {
        let location = find_voucher(vouchers, &key.voucher_id)
            .and_then(|v| bag_detail_at(v, &key.size_name, key.bag_index))
            .and_then(|d| d.location)
            .filter(|l| l.is_set());

        let line = AllocationLine {
            size: key.size_name.trim().to_string(),
            quantity_to_allocate: quantity,
            bag_index: key.bag_index,
            location,
        };

        match groups.iter_mut().find(|g| g.incoming_gate_pass_id == key.voucher_id) {
            Some(group) => group.allocations.push(line),
            None => groups.push(IncomingGatePassAllocation {
                incoming_gate_pass_id: key.voucher_id.clone(),
                allocations: vec![line],
            }),
        }
    }

    if groups.is_empty() {
        return Ok(None);
    }

    let date = parse_order_date(&form.order_date)
        .map(to_backend_date)
        .ok_or_else(|| ApiError::ValidationError(format!("Invalid order date '{}'", form.order_date)))?;

    Ok(Some(OutgoingPayload {
        farmer_storage_link_id: form.farmer_storage_link_id.trim().to_string(),
        gate_pass_no,
        date,
        variety: form.variety.trim().to_string(),
        from: non_empty(form.from.as_deref()),
        to: non_empty(form.to.as_deref()),
        truck_number: non_empty(form.truck_number.as_deref()),
        incoming_gate_passes: groups,
        remarks: form.remarks.trim().to_string(),
    }))
}

// ==================== STOCK CHECK ====================

/// Ledger entry asking for more bags than its lot holds
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OverAllocation {
    pub key: String,
    pub voucher_no: i64,
    pub size: String,
    pub available: u32,
    pub requested: u32,
}

impl OverAllocation {
    pub fn message(&self) -> String {
        format!(
            "Voucher #{} size '{}': {} requested, {} available",
            self.voucher_no, self.size, self.requested, self.available
        )
    }

    pub fn to_api_error(&self) -> ApiError {
        ApiError::over_allocated(self.voucher_no, &self.size, self.available, self.requested)
    }
}

/// Entries over the referenced bag's current quantity, or pointing at a bag that no longer exists
/// Requests are summed per physical bag before comparing with its stock.
pub fn over_allocations(ledger: &AllocationLedger, vouchers: &[IncomingVoucher]) -> Vec<OverAllocation> {
    let mut per_bag: Vec<(AllocationKey, u32)> = Vec::new();
    for (key, quantity) in ledger.iter() {
        let bag = key.clone().canonical();
        match per_bag.iter_mut().find(|(k, _)| *k == bag) {
            Some((_, total)) => *total = total.saturating_add(quantity),
            None => per_bag.push((bag, quantity)),
        }
    }

    per_bag
        .into_iter()
        .filter_map(|(key, requested)| {
            let voucher = find_voucher(vouchers, &key.voucher_id);
            let available = voucher
                .and_then(|v| bag_detail_at(v, &key.size_name, key.bag_index))
                .map(|d| d.current_quantity)
                .unwrap_or(0);

            (requested > available).then(|| over_allocation(&key, voucher, available, requested))
        })
        .collect()
}

fn over_allocation(key: &AllocationKey, voucher: Option<&IncomingVoucher>, available: u32, requested: u32) -> OverAllocation {
    OverAllocation {
        key: key.encode(),
        voucher_no: voucher.map(|v| v.number()).unwrap_or(0),
        size: key.size_name.clone(),
        available,
        requested,
    }
}
