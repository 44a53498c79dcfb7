// src/finance_handlers.rs
use actix_web::{web, HttpRequest, HttpResponse};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use crate::auth::get_access_token;
use crate::error::ApiResult;
use crate::handlers::ApiResponse;
use crate::models::*;
use crate::AppState;

const BALANCE_TOLERANCE: f64 = 0.01;

#[derive(Debug, Deserialize, Default)]
pub struct LedgerSearchQuery {
    pub search: Option<String>,
}

// ==================== LEDGERS ====================

pub fn filter_ledgers(ledgers: Vec<Ledger>, search: Option<&str>) -> Vec<Ledger> {
    let needle = search.map(|s| s.trim().to_lowercase()).unwrap_or_default();
    if needle.is_empty() {
        return ledgers;
    }
    ledgers
        .into_iter()
        .filter(|ledger| ledger.name.to_lowercase().contains(&needle))
        .collect()
}

pub async fn list_ledgers(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<LedgerSearchQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let token = get_access_token(&http_request)?;
    let ledgers = app_state.backend.ledgers(token.as_str()).await?;

    let ledgers = filter_ledgers(ledgers, query.search.as_deref());
    Ok(HttpResponse::Ok().json(ApiResponse::success(ledgers)))
}

// ==================== BALANCE SHEET ====================

/// Rows for a liability or equity section.
///
/// Sections arrive as `{total, breakdown}` or as a plain name → amount map; a
/// section with nothing to show yields no rows at all.
fn section_rows(section: &Map<String, Value>, label: &str) -> Vec<BalanceSheetRow> {
    let total = section.get("total").and_then(Value::as_f64);
    let breakdown = section
        .get("breakdown")
        .and_then(Value::as_array)
        .filter(|items| !items.is_empty());

    let mut rows = Vec::new();
    if let Some(items) = breakdown {
        rows.push(BalanceSheetRow::header(label));
        for item in items {
            let name = item.get("name").and_then(Value::as_str).unwrap_or("");
            let balance = item.get("balance").and_then(Value::as_f64).unwrap_or(0.0);
            rows.push(BalanceSheetRow::item(name, balance));
        }
        if let Some(total) = total {
            rows.push(BalanceSheetRow::total(label, total));
        }
    } else if let Some(total) = total {
        rows.push(BalanceSheetRow::header(label));
        rows.push(BalanceSheetRow::total(label, total));
    } else {
        let amounts: Vec<(&String, f64)> = section
            .iter()
            .filter_map(|(name, value)| value.as_f64().map(|amount| (name, amount)))
            .collect();
        if !amounts.is_empty() {
            rows.push(BalanceSheetRow::header(label));
            rows.extend(amounts.into_iter().map(|(name, amount)| BalanceSheetRow::item(name, amount)));
        }
    }
    rows
}

fn asset_rows(section: &AssetsSection, label: &str) -> Vec<BalanceSheetRow> {
    let mut rows = vec![BalanceSheetRow::header(label)];
    rows.extend(section.breakdown.iter().map(|item| BalanceSheetRow::item(&item.name, item.balance)));
    rows.push(BalanceSheetRow::total(label, section.total));
    rows
}

pub fn build_balance_sheet(data: &BalanceSheetData) -> BalanceSheetView {
    let le = &data.liabilities_and_equity;

    let mut liability_rows = section_rows(&le.current_liabilities, "Current Liabilities");
    liability_rows.extend(section_rows(&le.long_term_liabilities, "Long Term Liabilities"));
    liability_rows.extend(section_rows(&le.equity, "Equity"));

    let net_profit = le.net_profit.unwrap_or(0.0);
    if net_profit > 0.0 {
        liability_rows.push(BalanceSheetRow {
            is_profit: Some(true),
            ..BalanceSheetRow::item("Add: Profit", net_profit)
        });
    }
    let net_loss = le.net_loss.unwrap_or(0.0);
    if net_loss > 0.0 {
        liability_rows.push(BalanceSheetRow {
            is_profit: Some(false),
            ..BalanceSheetRow::item("Less: Loss", net_loss)
        });
    }

    let mut asset_rows_all = asset_rows(&data.assets.fixed_assets, "Fixed Assets");
    asset_rows_all.extend(asset_rows(&data.assets.current_assets, "Current Assets"));

    let total_liabilities_and_equity = le.total.unwrap_or(0.0);
    let total_assets = data.assets.total;

    BalanceSheetView {
        liability_rows,
        asset_rows: asset_rows_all,
        total_liabilities_and_equity,
        total_assets,
        is_balanced: (total_assets - total_liabilities_and_equity).abs() < BALANCE_TOLERANCE,
    }
}

pub async fn get_balance_sheet(
    app_state: web::Data<Arc<AppState>>,
    query: web::Query<DateRangeQuery>,
    http_request: HttpRequest,
) -> ApiResult<HttpResponse> {
    let token = get_access_token(&http_request)?;
    let data = app_state.backend.balance_sheet(token.as_str(), &query).await?;

    let view = build_balance_sheet(&data);
    if !view.is_balanced {
        log::warn!(
            "Balance sheet does not balance: assets {:.2}, liabilities and equity {:.2}",
            view.total_assets, view.total_liabilities_and_equity
        );
    }
    Ok(HttpResponse::Ok().json(ApiResponse::success(view)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ledger(name: &str) -> Ledger {
        serde_json::from_value(json!({ "_id": name, "name": name, "type": "Asset" })).unwrap()
    }

    fn labels(rows: &[BalanceSheetRow]) -> Vec<&str> {
        rows.iter().map(|r| r.label.as_str()).collect()
    }

    #[test]
    fn test_filter_ledgers() {
        let all = vec![ledger("Cash"), ledger("Rent Received"), ledger("Cash at Bank")];

        let cash = filter_ledgers(all.clone(), Some(" CASH "));
        assert_eq!(cash.len(), 2);
        assert_eq!(filter_ledgers(all.clone(), Some("")).len(), 3);
        assert_eq!(filter_ledgers(all, None).len(), 3);
    }

    #[test]
    fn test_section_shapes() {
        let with_breakdown = json!({
            "total": 150.0,
            "breakdown": [{ "name": "Creditors", "balance": 100.0 }, { "name": "Advances", "balance": 50.0 }]
        });
        let rows = section_rows(with_breakdown.as_object().unwrap(), "Current Liabilities");
        assert_eq!(
            labels(&rows),
            vec!["Current Liabilities", "Creditors", "Advances", "Total Current Liabilities"]
        );
        assert!(rows[0].is_header);
        assert!(rows[3].is_total);

        let total_only = json!({ "total": 80.0, "breakdown": [] });
        let rows = section_rows(total_only.as_object().unwrap(), "Long Term Liabilities");
        assert_eq!(labels(&rows), vec!["Long Term Liabilities", "Total Long Term Liabilities"]);

        let plain = json!({ "capital": 500.0, "note": "ignored" });
        let rows = section_rows(plain.as_object().unwrap(), "Equity");
        assert_eq!(labels(&rows), vec!["Equity", "capital"]);
        assert_eq!(rows[1].amount, Some(500.0));

        assert!(section_rows(&Map::new(), "Equity").is_empty());
    }

    #[test]
    fn test_balance_sheet_rows_and_balance() {
        let data: BalanceSheetData = serde_json::from_value(json!({
            "assets": {
                "fixedAssets": { "total": 400.0, "breakdown": [{ "name": "Building", "balance": 400.0 }] },
                "currentAssets": { "total": 200.0, "breakdown": [{ "name": "Cash", "balance": 200.0 }] },
                "total": 600.0
            },
            "liabilitiesAndEquity": {
                "currentLiabilities": { "total": 100.0, "breakdown": [] },
                "equity": { "capital": 450.0 },
                "netProfit": 50.0,
                "netLoss": 0.0,
                "total": 600.0
            }
        }))
        .unwrap();

        let view = build_balance_sheet(&data);
        assert_eq!(
            labels(&view.liability_rows),
            vec!["Current Liabilities", "Total Current Liabilities", "Equity", "capital", "Add: Profit"]
        );
        assert_eq!(view.liability_rows[4].is_profit, Some(true));
        assert_eq!(
            labels(&view.asset_rows),
            vec!["Fixed Assets", "Building", "Total Fixed Assets", "Current Assets", "Cash", "Total Current Assets"]
        );
        assert!(view.is_balanced);

        let mut lossy = data.clone();
        lossy.liabilities_and_equity.net_profit = None;
        lossy.liabilities_and_equity.net_loss = Some(25.0);
        lossy.liabilities_and_equity.total = Some(575.0);
        let view = build_balance_sheet(&lossy);
        let last = view.liability_rows.last().unwrap();
        assert_eq!(last.label, "Less: Loss");
        assert_eq!(last.is_profit, Some(false));
        assert!(!view.is_balanced);
    }
}
