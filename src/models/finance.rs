// src/models/finance.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ledger {
    #[serde(rename = "_id")]
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub ledger_type: String,
    #[serde(default)]
    pub sub_type: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub opening_balance: Option<f64>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub closing_balance: Option<f64>,
    #[serde(default)]
    pub is_system_ledger: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BreakdownItem {
    pub name: String,
    #[serde(default)]
    pub balance: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct AssetsSection {
    pub total: f64,
    pub breakdown: Vec<BreakdownItem>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Assets {
    pub fixed_assets: AssetsSection,
    pub current_assets: AssetsSection,
    pub total: f64,
}

/// Liability sections come either as `{total, breakdown}` or as plain name → amount maps
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct LiabilitiesAndEquity {
    pub current_liabilities: Map<String, Value>,
    pub long_term_liabilities: Map<String, Value>,
    pub equity: Map<String, Value>,
    pub net_profit: Option<f64>,
    pub net_loss: Option<f64>,
    pub total: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct BalanceSheetData {
    pub assets: Assets,
    pub liabilities_and_equity: LiabilitiesAndEquity,
}

/// One rendered line of a balance sheet side
#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheetRow {
    pub label: String,
    pub amount: Option<f64>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_header: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_total: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_profit: Option<bool>,
}

impl BalanceSheetRow {
    pub fn header(label: &str) -> Self {
        Self { label: label.to_string(), amount: None, is_header: true, is_total: false, is_profit: None }
    }

    pub fn item(label: &str, amount: f64) -> Self {
        Self { label: label.to_string(), amount: Some(amount), is_header: false, is_total: false, is_profit: None }
    }

    pub fn total(section: &str, amount: f64) -> Self {
        Self {
            label: format!("Total {}", section),
            amount: Some(amount),
            is_header: false,
            is_total: true,
            is_profit: None,
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BalanceSheetView {
    pub liability_rows: Vec<BalanceSheetRow>,
    pub asset_rows: Vec<BalanceSheetRow>,
    pub total_liabilities_and_equity: f64,
    pub total_assets: f64,
    pub is_balanced: bool,
}
