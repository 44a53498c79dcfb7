// src/models/farmer.rs
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LinkedFarmer {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub mobile_number: String,
}

/// Farmer ↔ cold-storage account link (GET /store-admin/farmer-storage-links)
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FarmerStorageLink {
    #[serde(rename = "_id")]
    pub id: String,
    pub farmer_id: LinkedFarmer,
    #[serde(default)]
    pub cold_storage_id: String,
    pub account_number: i64,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Link as embedded in daybook entries
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FarmerStorageLinkSummary {
    #[serde(rename = "_id")]
    pub id: String,
    pub farmer_id: LinkedFarmer,
    #[serde(default)]
    pub account_number: i64,
}

/// Dropdown option for the farmer selector
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FarmerOption {
    pub value: String,
    pub label: String,
    pub searchable_text: String,
}

impl From<&FarmerStorageLink> for FarmerOption {
    fn from(link: &FarmerStorageLink) -> Self {
        Self {
            value: link.id.clone(),
            label: format!("{} (Account #{})", link.farmer_id.name, link.account_number),
            searchable_text: format!(
                "{} {} {} {}",
                link.farmer_id.name, link.account_number, link.farmer_id.mobile_number, link.farmer_id.address
            ),
        }
    }
}

// ==================== LOGIN ====================

#[derive(Debug, Serialize, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct StoreAdminLoginRequest {
    #[validate(length(min = 10, max = 15, message = "Mobile number must be 10 to 15 digits"))]
    pub mobile_number: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StoreAdminLoginData {
    pub store_admin: serde_json::Value,
    pub token: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_farmer_option_label() {
        let link = FarmerStorageLink {
            id: "link-1".into(),
            farmer_id: LinkedFarmer {
                id: "f1".into(),
                name: "Suresh Lal".into(),
                address: "Mathura".into(),
                mobile_number: "9000000000".into(),
            },
            cold_storage_id: "cs1".into(),
            account_number: 102,
            is_active: true,
            notes: None,
        };

        let option = FarmerOption::from(&link);
        assert_eq!(option.value, "link-1");
        assert_eq!(option.label, "Suresh Lal (Account #102)");
        assert_eq!(option.searchable_text, "Suresh Lal 102 9000000000 Mathura");
    }
}
