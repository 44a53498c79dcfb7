// src/allocation/ledger.rs
//! Per-session allocation ledger: how many bags to take from each
//! (voucher, size, bag index). Absent keys are unallocated; zero is never stored.

use serde::Serialize;
use std::collections::HashMap;
use super::inventory::bag_details_for_size;
use super::key::AllocationKey;
use crate::models::IncomingVoucher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "quantity", rename_all = "snake_case")]
pub enum AllocationState {
    Allocated(u32),
    Unallocated,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Slot {
    seq: u64,
    quantity: u32,
}

/// Ledger entry as exposed to views, in first-insertion order
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub key: String,
    pub voucher_id: String,
    pub size_name: String,
    pub bag_index: usize,
    pub quantity: u32,
}

#[derive(Debug, Clone, Default)]
pub struct AllocationLedger {
    slots: HashMap<AllocationKey, Slot>,
    next_seq: u64,
}

impl AllocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `quantity` for the key; zero removes it.
    /// Overwriting keeps the key's original position.
    pub fn set_quantity(&mut self, key: AllocationKey, quantity: u32) {
        if quantity == 0 {
            self.slots.remove(&key);
            return;
        }
        match self.slots.get_mut(&key) {
            Some(slot) => slot.quantity = quantity,
            None => {
                let seq = self.next_seq;
                self.next_seq += 1;
                self.slots.insert(key, Slot { seq, quantity });
            }
        }
    }

    pub fn remove(&mut self, key: &AllocationKey) -> bool {
        self.slots.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.next_seq = 0;
    }

    pub fn get(&self, key: &AllocationKey) -> AllocationState {
        match self.slots.get(key) {
            Some(slot) => AllocationState::Allocated(slot.quantity),
            None => AllocationState::Unallocated,
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// (key, quantity) pairs in first-insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&AllocationKey, u32)> {
        let mut entries: Vec<(&AllocationKey, &Slot)> = self.slots.iter().collect();
        entries.sort_by_key(|(_, slot)| slot.seq);
        entries.into_iter().map(|(key, slot)| (key, slot.quantity))
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.iter()
            .map(|(key, quantity)| LedgerEntry {
                key: key.encode(),
                voucher_id: key.voucher_id.clone(),
                size_name: key.size_name.clone(),
                bag_index: key.bag_index,
                quantity,
            })
            .collect()
    }

    pub fn has_voucher(&self, voucher_id: &str) -> bool {
        self.slots.keys().any(|k| k.voucher_id == voucher_id)
    }

    pub fn total_quantity(&self) -> u64 {
        self.slots.values().map(|s| s.quantity as u64).sum()
    }

    /// Drops every key of one voucher
    pub fn remove_voucher(&mut self, voucher_id: &str) -> usize {
        let before = self.slots.len();
        self.slots.retain(|k, _| k.voucher_id != voucher_id);
        before - self.slots.len()
    }

    /// Whole-voucher selection. Selecting fills every bag of the in-scope sizes that
    /// still has stock with its full current quantity; deselecting removes the voucher.
    pub fn toggle_voucher(&mut self, voucher: &IncomingVoucher, selecting: bool, sizes_in_scope: &[String]) {
        if !selecting {
            self.remove_voucher(&voucher.id);
            return;
        }

        for size in sizes_in_scope {
            for detail in bag_details_for_size(voucher, size) {
                if detail.current_quantity > 0 {
                    self.set_quantity(
                        AllocationKey::new(&voucher.id, size, detail.bag_index),
                        detail.current_quantity,
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::inventory::tests::{bag, voucher};
    use crate::models::Location;

    fn key(voucher_id: &str, size: &str, index: usize) -> AllocationKey {
        AllocationKey::new(voucher_id, size, index)
    }

    fn snapshot(ledger: &AllocationLedger) -> Vec<(AllocationKey, u32)> {
        ledger.iter().map(|(k, q)| (k.clone(), q)).collect()
    }

    #[test]
    fn test_set_quantity_is_sparse() {
        let mut ledger = AllocationLedger::new();
        ledger.set_quantity(key("V1", "A10", 0), 5);
        assert_eq!(ledger.get(&key("V1", "A10", 0)), AllocationState::Allocated(5));

        ledger.set_quantity(key("V1", "A10", 0), 0);
        assert_eq!(ledger.get(&key("V1", "A10", 0)), AllocationState::Unallocated);
        assert!(ledger.is_empty());

        ledger.set_quantity(key("V1", "A10", 1), 0);
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_no_clamping_in_ledger() {
        let mut ledger = AllocationLedger::new();
        ledger.set_quantity(key("V1", "A10", 0), 10_000);
        assert_eq!(ledger.get(&key("V1", "A10", 0)), AllocationState::Allocated(10_000));
    }

    #[test]
    fn test_iteration_keeps_first_insertion_order() {
        let mut ledger = AllocationLedger::new();
        ledger.set_quantity(key("V2", "Seed", 0), 1);
        ledger.set_quantity(key("V1", "Ration", 0), 2);
        ledger.set_quantity(key("V2", "Ration", 1), 3);
        ledger.set_quantity(key("V2", "Seed", 0), 9);

        let order: Vec<(String, u32)> = ledger.iter().map(|(k, q)| (k.encode(), q)).collect();
        assert_eq!(order, vec![
            ("V2|0|Seed".to_string(), 9),
            ("V1|0|Ration".to_string(), 2),
            ("V2|1|Ration".to_string(), 3),
        ]);
        assert_eq!(ledger.total_quantity(), 14);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut ledger = AllocationLedger::new();
        ledger.set_quantity(key("V1", "A10", 0), 5);
        ledger.set_quantity(key("V2", "A10", 0), 5);

        assert!(ledger.remove(&key("V1", "A10", 0)));
        assert!(!ledger.remove(&key("V1", "A10", 0)));
        assert_eq!(ledger.len(), 1);

        ledger.clear();
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_select_voucher_fills_current_quantities() {
        let v1 = voucher("V1", Some(1), "2024-01-01", "Jyoti", vec![
            bag("A10", 100, 60, Some(Location::new("1", "2", "3"))),
            bag("A10", 40, 0, None),
            bag("A10", 30, 30, None),
            bag("Seed", 20, 20, None),
        ]);

        let mut ledger = AllocationLedger::new();
        ledger.toggle_voucher(&v1, true, &["A10".to_string()]);

        assert_eq!(ledger.get(&key("V1", "A10", 0)), AllocationState::Allocated(60));
        assert_eq!(ledger.get(&key("V1", "A10", 1)), AllocationState::Unallocated);
        assert_eq!(ledger.get(&key("V1", "A10", 2)), AllocationState::Allocated(30));
        assert_eq!(ledger.get(&key("V1", "Seed", 0)), AllocationState::Unallocated);
        assert!(ledger.has_voucher("V1"));

        // selecting twice changes nothing
        let before = snapshot(&ledger);
        ledger.toggle_voucher(&v1, true, &["A10".to_string()]);
        assert_eq!(snapshot(&ledger), before);
    }

    #[test]
    fn test_toggle_on_then_off_restores_ledger() {
        let v1 = voucher("V1", Some(1), "2024-01-01", "Jyoti", vec![
            bag("A10", 100, 60, None),
            bag("Seed", 20, 20, None),
        ]);
        let sizes = vec!["A10".to_string(), "Seed".to_string()];

        let mut ledger = AllocationLedger::new();
        ledger.set_quantity(key("V2", "A10", 0), 7);
        let before = snapshot(&ledger);

        ledger.toggle_voucher(&v1, true, &sizes);
        assert_eq!(ledger.len(), 3);
        ledger.toggle_voucher(&v1, false, &sizes);

        assert_eq!(snapshot(&ledger), before);
        assert!(!ledger.has_voucher("V1"));

        // deselecting an unselected voucher is a no-op
        ledger.toggle_voucher(&v1, false, &sizes);
        assert_eq!(snapshot(&ledger), before);
    }

    #[test]
    fn test_entries_carry_encoded_keys() {
        let mut ledger = AllocationLedger::new();
        ledger.set_quantity(key("V1", "50|60", 2), 4);
        let entries = ledger.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].key, "V1|2|50|60");
        assert_eq!(entries[0].size_name, "50|60");
        assert_eq!(entries[0].quantity, 4);
    }
}
