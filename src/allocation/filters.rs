// src/allocation/filters.rs
//! Variety / location filters, voucher-number sort and date grouping of the
//! voucher table, plus the size-column selection rules.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::models::{IncomingVoucher, SortOrder};

pub const NO_DATE_LABEL: &str = "No date";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
#[serde(default)]
pub struct LocationFilters {
    pub chamber: String,
    pub floor: String,
    pub row: String,
}

impl LocationFilters {
    pub fn is_empty(&self) -> bool {
        self.chamber.trim().is_empty() && self.floor.trim().is_empty() && self.row.trim().is_empty()
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VoucherGroup {
    pub date_key: String,
    pub label: String,
    pub vouchers: Vec<IncomingVoucher>,
}

// ==================== FILTERS ====================

pub fn filter_by_variety(vouchers: &[IncomingVoucher], variety: &str) -> Vec<IncomingVoucher> {
    let wanted = variety.trim();
    if wanted.is_empty() {
        return vouchers.to_vec();
    }
    vouchers
        .iter()
        .filter(|v| v.variety.trim() == wanted)
        .cloned()
        .collect()
}

fn dimension_matches(filter: &str, value: &str) -> bool {
    let filter = filter.trim();
    filter.is_empty() || value.trim() == filter
}

/// Keeps vouchers where a single bag entry matches every non-empty dimension
pub fn filter_by_location(vouchers: &[IncomingVoucher], filters: &LocationFilters) -> Vec<IncomingVoucher> {
    if filters.is_empty() {
        return vouchers.to_vec();
    }
    vouchers
        .iter()
        .filter(|v| {
            v.bag_sizes.iter().any(|b| {
                let Some(location) = b.location.as_ref() else {
                    return false;
                };
                dimension_matches(&filters.chamber, &location.chamber)
                    && dimension_matches(&filters.floor, &location.floor)
                    && dimension_matches(&filters.row, &location.row)
            })
        })
        .cloned()
        .collect()
}

// ==================== SORT / GROUP ====================

/// Stable numeric sort; missing numbers count as 0
pub fn sort_by_voucher_number(vouchers: &mut [IncomingVoucher], order: SortOrder) {
    match order {
        SortOrder::Asc => vouchers.sort_by_key(|v| v.number()),
        SortOrder::Desc => vouchers.sort_by(|a, b| b.number().cmp(&a.number())),
    }
}

fn parse_date_key(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).date_naive());
    }
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|dt| dt.date())
}

/// "11 Feb 2026" style label for a voucher date key
pub fn format_group_date(date_key: &str) -> String {
    if date_key.trim().is_empty() {
        return NO_DATE_LABEL.to_string();
    }
    match parse_date_key(date_key) {
        Some(date) => date.format("%-d %b %Y").to_string(),
        None => date_key.to_string(),
    }
}

/// Groups by exact raw date string. Groups ascend by key; vouchers inside follow `order`.
pub fn group_by_date(vouchers: &[IncomingVoucher], order: SortOrder) -> Vec<VoucherGroup> {
    let mut groups: Vec<VoucherGroup> = Vec::new();

    for voucher in vouchers {
        let key = voucher.date_key();
        match groups.iter_mut().find(|g| g.date_key == key) {
            Some(group) => group.vouchers.push(voucher.clone()),
            None => groups.push(VoucherGroup {
                date_key: key.to_string(),
                label: format_group_date(key),
                vouchers: vec![voucher.clone()],
            }),
        }
    }

    groups.sort_by(|a, b| a.date_key.cmp(&b.date_key));
    for group in &mut groups {
        sort_by_voucher_number(&mut group.vouchers, order);
    }
    groups
}

// ==================== SIZE COLUMNS ====================

/// Sizes shown as table columns. An empty selection means every table size.
pub fn visible_sizes(table_sizes: &[String], visible_columns: &[String]) -> Vec<String> {
    if visible_columns.is_empty() {
        return table_sizes.to_vec();
    }
    table_sizes
        .iter()
        .filter(|s| visible_columns.contains(s))
        .cloned()
        .collect()
}

/// Options offered by the column picker
pub fn column_picker_sizes(table_sizes: &[String], all_sizes: &[String]) -> Vec<String> {
    if table_sizes.is_empty() {
        all_sizes.to_vec()
    } else {
        table_sizes.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::inventory::tests::{bag, voucher};
    use crate::models::Location;

    fn numbers(vouchers: &[IncomingVoucher]) -> Vec<i64> {
        vouchers.iter().map(|v| v.number()).collect()
    }

    fn located_vouchers() -> Vec<IncomingVoucher> {
        vec![
            voucher("V1", Some(1), "2024-01-01", "Jyoti", vec![
                bag("Ration", 10, 10, Some(Location::new("1", "2", "3"))),
            ]),
            voucher("V2", Some(2), "2024-01-01", "Chipsona", vec![
                bag("Ration", 10, 10, Some(Location::new("1", "1", "3"))),
                bag("Seed", 10, 10, Some(Location::new("2", "2", "1"))),
            ]),
            voucher("V3", Some(3), "2024-01-01", " Jyoti ", vec![bag("Seed", 5, 5, None)]),
        ]
    }

    #[test]
    fn test_filter_by_variety() {
        let vouchers = located_vouchers();
        assert_eq!(numbers(&filter_by_variety(&vouchers, "Jyoti")), vec![1, 3]);
        assert_eq!(numbers(&filter_by_variety(&vouchers, "  ")), vec![1, 2, 3]);
        assert!(filter_by_variety(&vouchers, "Kufri").is_empty());
    }

    #[test]
    fn test_empty_location_filter_is_identity() {
        let vouchers = located_vouchers();
        assert_eq!(filter_by_location(&vouchers, &LocationFilters::default()), vouchers);

        let blank = LocationFilters { chamber: " ".into(), floor: "".into(), row: "  ".into() };
        assert_eq!(filter_by_location(&vouchers, &blank), vouchers);
    }

    #[test]
    fn test_location_filter_needs_single_matching_entry() {
        let vouchers = located_vouchers();

        let chamber_1 = LocationFilters { chamber: "1".into(), ..Default::default() };
        assert_eq!(numbers(&filter_by_location(&vouchers, &chamber_1)), vec![1, 2]);

        // V2 has chamber 1 and floor 2, but on different entries
        let chamber_1_floor_2 = LocationFilters { chamber: "1".into(), floor: " 2 ".into(), row: "".into() };
        assert_eq!(numbers(&filter_by_location(&vouchers, &chamber_1_floor_2)), vec![1]);

        let no_match = LocationFilters { row: "9".into(), ..Default::default() };
        assert!(filter_by_location(&vouchers, &no_match).is_empty());
    }

    #[test]
    fn test_sort_by_voucher_number_is_stable() {
        let mut vouchers = vec![
            voucher("a", Some(3), "", "", vec![]),
            voucher("b", None, "", "", vec![]),
            voucher("c", Some(1), "", "", vec![]),
            voucher("d", Some(0), "", "", vec![]),
        ];

        sort_by_voucher_number(&mut vouchers, SortOrder::Asc);
        let ids: Vec<&str> = vouchers.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "d", "c", "a"]);

        sort_by_voucher_number(&mut vouchers, SortOrder::Desc);
        let ids: Vec<&str> = vouchers.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c", "b", "d"]);
    }

    #[test]
    fn test_group_by_date_orders_groups_by_key() {
        let vouchers = vec![
            voucher("x", Some(4), "2024-01-02", "", vec![]),
            voucher("y", Some(2), "2024-01-01", "", vec![]),
            voucher("z", Some(9), "2024-01-01", "", vec![]),
            voucher("w", Some(1), "2024-01-02", "", vec![]),
        ];

        for order in [SortOrder::Asc, SortOrder::Desc] {
            let groups = group_by_date(&vouchers, order);
            let keys: Vec<&str> = groups.iter().map(|g| g.date_key.as_str()).collect();
            assert_eq!(keys, vec!["2024-01-01", "2024-01-02"]);

            let expected_first = if order == SortOrder::Asc { vec![2, 9] } else { vec![9, 2] };
            let expected_second = if order == SortOrder::Asc { vec![1, 4] } else { vec![4, 1] };
            assert_eq!(numbers(&groups[0].vouchers), expected_first);
            assert_eq!(numbers(&groups[1].vouchers), expected_second);
        }
    }

    #[test]
    fn test_group_by_date_keeps_exact_strings() {
        let vouchers = vec![
            voucher("a", Some(1), "2024-01-01T10:00:00.000Z", "", vec![]),
            voucher("b", Some(2), "2024-01-01T00:00:00.000Z", "", vec![]),
            voucher("c", Some(3), "", "", vec![]),
        ];

        let groups = group_by_date(&vouchers, SortOrder::Asc);
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[0].label, NO_DATE_LABEL);
        assert_eq!(groups[1].label, "1 Jan 2024");
        assert_eq!(groups[2].label, "1 Jan 2024");
    }

    #[test]
    fn test_format_group_date() {
        assert_eq!(format_group_date("2026-02-11"), "11 Feb 2026");
        assert_eq!(format_group_date("2026-02-11T00:00:00.000Z"), "11 Feb 2026");
        assert_eq!(format_group_date("2026-02-11T08:30:00"), "11 Feb 2026");
        assert_eq!(format_group_date(""), NO_DATE_LABEL);
        assert_eq!(format_group_date("sometime"), "sometime");
    }

    #[test]
    fn test_visible_sizes() {
        let table: Vec<String> = vec!["Goli".into(), "Ration".into(), "Seed".into()];

        assert_eq!(visible_sizes(&table, &[]), table);
        assert_eq!(
            visible_sizes(&table, &["Seed".to_string(), "Goli".to_string(), "Cut".to_string()]),
            vec!["Goli".to_string(), "Seed".to_string()]
        );

        let all: Vec<String> = vec!["Cut".into(), "Goli".into()];
        assert_eq!(column_picker_sizes(&table, &all), table);
        assert_eq!(column_picker_sizes(&[], &all), all);
    }
}
