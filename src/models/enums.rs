// src/models/enums.rs
//! Query-string enums generated by a single define_choice_enum! macro

use serde::{Serialize, Deserialize};

/// Generates a choice enum with as_str, from_str, is_valid, Display
macro_rules! define_choice_enum {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $( $variant:ident => $str_val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "snake_case")]
        $vis enum $name {
            $( $variant ),+
        }

        impl $name {
            #[inline]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $str_val ),+
                }
            }

            pub fn from_str(s: &str) -> Option<Self> {
                match s.trim().to_lowercase().as_str() {
                    $( $str_val => Some($name::$variant), )+
                    _ => None,
                }
            }

            #[inline]
            pub fn is_valid(s: &str) -> bool {
                Self::from_str(s).is_some()
            }

            pub const fn all_values() -> &'static [&'static str] {
                &[ $( $str_val ),+ ]
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = String;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_str(s).ok_or_else(|| format!("Invalid {}: '{}'", stringify!($name), s))
            }
        }
    };
}

// ==================== VOUCHER SORT ====================

define_choice_enum! {
    /// Voucher-number sort order inside the outgoing vouchers table
    pub enum SortOrder {
        Asc => "asc",
        Desc => "desc",
    }
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::Asc
    }
}

// ==================== DAYBOOK ====================

define_choice_enum! {
    /// Which vouchers a daybook or farmer profile listing shows
    pub enum DaybookType {
        All => "all",
        Incoming => "incoming",
        Outgoing => "outgoing",
    }
}

impl Default for DaybookType {
    fn default() -> Self {
        DaybookType::All
    }
}

define_choice_enum! {
    /// latest = newest first, oldest = oldest first
    pub enum DaybookSortBy {
        Latest => "latest",
        Oldest => "oldest",
    }
}

impl Default for DaybookSortBy {
    fn default() -> Self {
        DaybookSortBy::Latest
    }
}

define_choice_enum! {
    pub enum VoucherNumberKind {
        Incoming => "incoming",
        Outgoing => "outgoing",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_order() {
        assert_eq!(SortOrder::Asc.as_str(), "asc");
        assert_eq!(SortOrder::from_str("DESC"), Some(SortOrder::Desc));
        assert_eq!(SortOrder::default(), SortOrder::Asc);
        assert!(!SortOrder::is_valid("up"));
    }

    #[test]
    fn test_daybook_choices() {
        assert_eq!(DaybookType::from_str(" incoming "), Some(DaybookType::Incoming));
        assert_eq!(DaybookType::all_values(), &["all", "incoming", "outgoing"]);
        assert_eq!(DaybookSortBy::default().to_string(), "latest");
        assert!("sideways".parse::<DaybookSortBy>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&DaybookSortBy::Oldest).unwrap();
        assert_eq!(json, "\"oldest\"");
        let parsed: SortOrder = serde_json::from_str("\"desc\"").unwrap();
        assert_eq!(parsed, SortOrder::Desc);
    }
}
