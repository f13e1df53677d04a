//! Normalized entities returned by the analytics backend

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;
use crate::identity::{Currency, SnapshotId};
use crate::selection::format_date;

/// One data tape available for a company and product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    /// Extraction date, when known.
    pub date: Option<NaiveDate>,
    pub filename: String,
}

impl Snapshot {
    /// Label shown in a snapshot picker.
    pub fn label(&self) -> String {
        match self.date {
            Some(date) => format_date(date),
            None => self.filename.clone(),
        }
    }
}

/// Per-product configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductConfig {
    /// Reporting currency of the tape.
    pub currency: Currency,
    pub description: String,
    /// False when the backend fell back to defaults for an unconfigured product.
    pub configured: bool,
}

impl ProductConfig {
    /// Currencies the display toggle offers: reporting currency, then USD.
    pub fn currency_options(&self) -> Vec<Currency> {
        let mut options = vec![self.currency.clone()];
        if !self.currency.is_usd() {
            options.push(Currency::usd());
        }
        options
    }
}

/// Inclusive as-of date bounds derived from a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub min: NaiveDate,
    pub max: NaiveDate,
}

impl DateRange {
    pub fn new(min: NaiveDate, max: NaiveDate) -> Result<Self, CoreError> {
        if min > max {
            return Err(CoreError::InvalidDate {
                value: format_date(min),
                reason: format!("range start is after end {}", format_date(max)),
            });
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.min <= date && date <= self.max
    }
}

/// Headline portfolio KPIs shown on the Overview tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortfolioSummary {
    pub snapshot_date: Option<String>,
    pub as_of_date: Option<String>,
    pub reported_currency: Option<Currency>,
    pub display_currency: Option<Currency>,
    pub usd_rate: f64,
    pub total_deals: u64,
    pub total_purchase_value: f64,
    pub total_collected: f64,
    pub total_denied: f64,
    pub total_pending: f64,
    pub collection_rate: f64,
    pub denial_rate: f64,
    pub pending_rate: f64,
    pub completed_deals: u64,
    pub active_deals: u64,
    pub status_breakdown: BTreeMap<String, u64>,
}

/// Chart data for one tab. The shape is owned by the chart renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChartPayload(pub serde_json::Value);

impl ChartPayload {
    pub fn as_json(&self) -> &serde_json::Value {
        &self.0
    }

    /// Number of rows under the conventional `data` array, if present.
    pub fn row_count(&self) -> Option<usize> {
        self.0.get("data").and_then(|d| d.as_array()).map(|a| a.len())
    }
}

/// Generated text and when it was produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Narrative {
    pub text: String,
    pub generated_at: DateTime<Utc>,
}

impl Narrative {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            generated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

/// One line of a chat transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
    /// Error placeholders are shown but never sent back as history.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
            is_error: false,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            is_error: false,
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
            is_error: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_currency_options_dedupes_usd() {
        let usd = ProductConfig {
            currency: Currency::usd(),
            description: String::new(),
            configured: true,
        };
        assert_eq!(usd.currency_options(), vec![Currency::usd()]);

        let aed = ProductConfig {
            currency: Currency::new("AED"),
            ..usd
        };
        assert_eq!(
            aed.currency_options(),
            vec![Currency::new("AED"), Currency::usd()]
        );
    }

    #[test]
    fn test_date_range_bounds() {
        let range = DateRange::new(date(2024, 1, 1), date(2024, 1, 31)).unwrap();
        assert!(range.contains(date(2024, 1, 1)));
        assert!(range.contains(date(2024, 1, 31)));
        assert!(!range.contains(date(2024, 2, 1)));
        assert!(DateRange::new(date(2024, 2, 1), date(2024, 1, 1)).is_err());
    }

    #[test]
    fn test_snapshot_label_prefers_date() {
        let dated = Snapshot {
            id: "2024-01-31".into(),
            date: Some(date(2024, 1, 31)),
            filename: "2024-01-31_tape.csv".to_string(),
        };
        assert_eq!(dated.label(), "2024-01-31");
        let undated = Snapshot {
            id: "tape.csv".into(),
            date: None,
            filename: "tape.csv".to_string(),
        };
        assert_eq!(undated.label(), "tape.csv");
    }

    #[test]
    fn test_summary_tolerates_missing_fields() {
        let summary: PortfolioSummary =
            serde_json::from_str(r#"{"total_deals": 12, "collection_rate": 81.5}"#).unwrap();
        assert_eq!(summary.total_deals, 12);
        assert!(summary.status_breakdown.is_empty());
    }

    #[test]
    fn test_chat_turn_error_flag_serialization() {
        let json = serde_json::to_value(ChatTurn::user("hi")).unwrap();
        assert!(json.get("is_error").is_none());
        assert_eq!(json["role"], "user");
        let json = serde_json::to_value(ChatTurn::error("oops")).unwrap();
        assert_eq!(json["is_error"], true);
    }
}
