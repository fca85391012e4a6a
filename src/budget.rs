//! Budget arithmetic and the shared lookup tables for months and poin.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

/// Indonesian month names as the backend and dashboards spell them.
const MONTHS_ID: [&str; 12] = [
    "Januari",
    "Februari",
    "Maret",
    "April",
    "Mei",
    "Juni",
    "Juli",
    "Agustus",
    "September",
    "Oktober",
    "November",
    "Desember",
];

const MONTHS_EN: [&str; 12] = [
    "january",
    "february",
    "march",
    "april",
    "may",
    "june",
    "july",
    "august",
    "september",
    "october",
    "november",
    "december",
];

/// Spending categories, keyed by the backend's poin id.
pub const POIN: [(u32, &str); 7] = [
    (1, "AKUISISI"),
    (2, "OUTLET"),
    (3, "SF"),
    (4, "CB PROGRAM"),
    (5, "REGION (CVM & SO)"),
    (6, "MATPRO"),
    (7, "GAMES"),
];

/// Month number (1-12) from an Indonesian or English month name, or a numeric string.
#[must_use]
pub fn month_number(month: &str) -> Option<u32> {
    let normalized = month.trim();
    if let Ok(number) = normalized.parse::<u32>() {
        return (1..=12).contains(&number).then_some(number);
    }
    MONTHS_ID
        .iter()
        .position(|name| name.eq_ignore_ascii_case(normalized))
        .or_else(|| {
            MONTHS_EN
                .iter()
                .position(|name| name.eq_ignore_ascii_case(normalized))
        })
        .and_then(|index| u32::try_from(index + 1).ok())
}

/// Indonesian month name for a month number, as the dashboards label it.
#[must_use]
pub fn month_name(number: u32) -> Option<&'static str> {
    let index = usize::try_from(number.checked_sub(1)?).ok()?;
    MONTHS_ID.get(index).copied()
}

#[must_use]
pub fn poin_id(name: &str) -> Option<u32> {
    let wanted = name.trim().to_uppercase();
    POIN.iter()
        .find(|(_, poin)| *poin == wanted)
        .map(|(id, _)| *id)
}

#[must_use]
pub fn poin_name(id: u32) -> Option<&'static str> {
    POIN.iter().find(|(poin, _)| *poin == id).map(|(_, name)| *name)
}

/// `amount / total * 100`, or zero when there is no budget to compare against.
#[must_use]
pub fn percentage(amount: f64, total: f64) -> f64 {
    if total <= 0.0 || !total.is_finite() || !amount.is_finite() {
        return 0.0;
    }
    amount / total * 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SectorUsage {
    pub id_poin: u32,
    #[serde(rename = "type")]
    pub name: String,
    pub used: f64,
    pub recommended: f64,
    pub percentage: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct UsageSummary {
    pub sectors: Vec<SectorUsage>,
    pub total_used: f64,
    pub total_recommended: f64,
    pub marketing_fee: f64,
    pub usage_percentage: f64,
    pub remaining: f64,
}

impl UsageSummary {
    /// Build from `(id_poin, name, used, recommended)` rows and the period's marketing fee.
    #[must_use]
    pub fn from_sectors<I>(rows: I, marketing_fee: f64) -> Self
    where
        I: IntoIterator<Item = (u32, String, f64, f64)>,
    {
        let sectors: Vec<SectorUsage> = rows
            .into_iter()
            .map(|(id_poin, name, used, recommended)| SectorUsage {
                id_poin,
                name,
                used,
                recommended,
                percentage: round2(percentage(used, recommended)),
            })
            .collect();
        let total_used: f64 = sectors.iter().map(|sector| sector.used).sum();
        let total_recommended: f64 = sectors.iter().map(|sector| sector.recommended).sum();
        Self {
            sectors,
            total_used,
            total_recommended,
            marketing_fee,
            usage_percentage: round2(percentage(total_used, marketing_fee)),
            remaining: marketing_fee - total_used,
        }
    }

    /// Build from a backend dashboard body (`usage_details` + `marketing_fee`).
    ///
    /// Missing or malformed rows are skipped; the backend sends amounts as numbers
    /// or decimal strings depending on the view.
    #[must_use]
    pub fn from_dashboard(body: &Value) -> Self {
        let rows = body
            .get("usage_details")
            .and_then(Value::as_array)
            .map(|details| {
                details
                    .iter()
                    .filter_map(|detail| {
                        let id = detail.get("id_poin").and_then(as_id)?;
                        let name = detail
                            .get("type")
                            .and_then(Value::as_str)
                            .map(str::to_string)
                            .or_else(|| poin_name(id).map(str::to_string))?;
                        let used = detail.get("total_amount").and_then(as_number).unwrap_or(0.0);
                        let recommended = detail
                            .get("recommendation")
                            .and_then(as_number)
                            .unwrap_or(0.0);
                        Some((id, name, used, recommended))
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();
        let marketing_fee = body.get("marketing_fee").and_then(as_number).unwrap_or(0.0);
        Self::from_sectors(rows, marketing_fee)
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok(),
        _ => None,
    }
}

/// Whole, non-negative ids only: `2`, `2.0` and `"2"` pass, `1.5` does not.
fn as_id(value: &Value) -> Option<u32> {
    match value {
        Value::Number(number) => match number.as_u64() {
            Some(id) => u32::try_from(id).ok(),
            None => {
                let float = number.as_f64()?;
                if float.fract() != 0.0 || float < 0.0 || float > f64::from(u32::MAX) {
                    return None;
                }
                u32::try_from(float as u64).ok()
            }
        },
        Value::String(text) => text.trim().parse::<u32>().ok(),
        _ => None,
    }
}
