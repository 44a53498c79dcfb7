// src/allocation/key.rs
//! Allocation key: (incoming voucher id, bag size name, bag index).
//!
//! Inside the service the key is a plain struct used directly as a map key.
//! The string form only exists at the HTTP boundary, where the console addresses a
//! table cell by one opaque token:
//!
//! ```text
//! <voucher id with '\' and '|' backslash-escaped>|<bag index>|<size name verbatim>
//! ```
//!
//! The size name goes last and is never split, so free-text names containing the
//! delimiter survive the round trip.

use serde::Serialize;
use std::fmt;

const DELIMITER: char = '|';
const ESCAPE: char = '\\';

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationKey {
    pub voucher_id: String,
    pub size_name: String,
    pub bag_index: usize,
}

impl AllocationKey {
    pub fn new(voucher_id: &str, size_name: &str, bag_index: usize) -> Self {
        Self {
            voucher_id: voucher_id.to_string(),
            size_name: size_name.to_string(),
            bag_index,
        }
    }

    pub fn encode(&self) -> String {
        encode(&self.voucher_id, &self.size_name, self.bag_index)
    }

    /// Bag lookups compare trimmed size names, so the ledger stores them trimmed too
    pub fn canonical(mut self) -> Self {
        let trimmed = self.size_name.trim();
        if trimmed.len() != self.size_name.len() {
            self.size_name = trimmed.to_string();
        }
        self
    }
}

impl fmt::Display for AllocationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

pub fn encode(voucher_id: &str, size_name: &str, bag_index: usize) -> String {
    let mut out = String::with_capacity(voucher_id.len() + size_name.len() + 8);
    for c in voucher_id.chars() {
        if c == DELIMITER || c == ESCAPE {
            out.push(ESCAPE);
        }
        out.push(c);
    }
    out.push(DELIMITER);
    out.push_str(&bag_index.to_string());
    out.push(DELIMITER);
    out.push_str(size_name);
    out
}

/// Parses an encoded key. Malformed input yields `None`.
pub fn decode(key: &str) -> Option<AllocationKey> {
    let mut voucher_id = String::new();
    let mut chars = key.char_indices();
    let mut index_start = None;

    while let Some((_, c)) = chars.next() {
        match c {
            ESCAPE => match chars.next() {
                Some((_, escaped)) if escaped == DELIMITER || escaped == ESCAPE => voucher_id.push(escaped),
                _ => return None,
            },
            DELIMITER => {
                index_start = chars.next().map(|(i, _)| i);
                break;
            }
            other => voucher_id.push(other),
        }
    }

    let rest = &key[index_start?..];
    let (index, size_name) = rest.split_once(DELIMITER)?;
    if voucher_id.is_empty() || index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let bag_index = index.parse::<usize>().ok()?;

    Some(AllocationKey {
        voucher_id,
        size_name: size_name.to_string(),
        bag_index,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cases = [
            ("65f1a2b3c4d5e6f7a8b9c0d1", "Ration", 0),
            ("V1", "A10", 3),
            ("V1", "50|60 kg", 1),
            ("we|ird\\id", "size|with|pipes", 12),
            ("V2", "", 0),
            ("V3", "Goli (छोटा)", 2),
            ("V4", "trailing|", 0),
        ];
        for (voucher, size, index) in cases {
            let encoded = encode(voucher, size, index);
            assert_eq!(
                decode(&encoded),
                Some(AllocationKey::new(voucher, size, index)),
                "round trip failed for {:?}",
                encoded
            );
        }
    }

    #[test]
    fn test_display_matches_encode() {
        let key = AllocationKey::new("V1", "A10", 0);
        assert_eq!(key.to_string(), "V1|0|A10");
        assert_eq!(key.encode(), encode("V1", "A10", 0));
    }

    #[test]
    fn test_malformed_keys() {
        assert_eq!(decode(""), None);
        assert_eq!(decode("V1"), None);
        assert_eq!(decode("V1|"), None);
        assert_eq!(decode("V1|0"), None);
        assert_eq!(decode("V1|x|A10"), None);
        assert_eq!(decode("V1|-1|A10"), None);
        assert_eq!(decode("|0|A10"), None);
        assert_eq!(decode("V1\\x|0|A10"), None);
        assert_eq!(decode("V1\\"), None);
        assert_eq!(decode("V1|99999999999999999999999999|A10"), None);
    }
}
