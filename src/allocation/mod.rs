// src/allocation/mod.rs
//! Outgoing allocation resolution: which bags of which incoming vouchers an
//! outgoing gate pass draws from.

pub mod filters;
pub mod inventory;
pub mod key;
pub mod ledger;
pub mod payload;

pub use filters::{
    column_picker_sizes, filter_by_location, filter_by_variety, group_by_date,
    sort_by_voucher_number, visible_sizes, LocationFilters,
};
pub use inventory::{bag_detail_at, bag_details_for_size, unique_location_values, unique_size_names, unique_varieties, UniqueLocations};
pub use key::AllocationKey;
pub use ledger::{AllocationLedger, AllocationState, LedgerEntry};
pub use payload::over_allocations;
