//! Normalization of backend responses into the internal schema.
//!
//! The backend is loose about shapes: lists hold bare strings or objects,
//! fields arrive in `snake_case` or camelCase, and AI endpoints return a
//! bare string or a wrapping object. Every variant is resolved here so
//! nothing past the API boundary sees them.

use chrono::NaiveDate;
use creditlens_core::{
    parse_date, ChartPayload, ChatRole, ChatTurn, CompanyId, Currency, DateRange, FetchError,
    FetchResult, PortfolioSummary, ProductConfig, ProductId, Snapshot, SnapshotId,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

static DATE_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})").expect("Invalid date prefix regex"));

static CAMEL_BOUNDARY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([a-z0-9])([A-Z])").expect("Invalid camelCase regex"));

/// Keys under which list items carry their identifier.
const ID_FIELDS: &[&str] = &["name", "id", "slug", "company", "product"];

/// Keys under which AI endpoints wrap their text.
const TEXT_FIELDS: &[&str] = &["commentary", "insight", "answer", "text", "response"];

// ============================================================================
// FIELD NAMES
// ============================================================================

/// `snapshotDate` -> `snapshot_date`. Already snake_case keys are unchanged.
pub fn snake_case(key: &str) -> String {
    CAMEL_BOUNDARY
        .replace_all(key, "${1}_${2}")
        .to_ascii_lowercase()
}

/// Rewrite the keys of a top-level object to snake_case. Other values pass through.
pub fn normalize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::with_capacity(map.len());
            for (key, value) in map {
                let key = snake_case(&key);
                // First non-null value wins when two spellings collide.
                match normalized.get(&key) {
                    Some(existing) if !existing.is_null() => {}
                    _ => {
                        normalized.insert(key, value);
                    }
                }
            }
            Value::Object(normalized)
        }
        other => other,
    }
}

fn field<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| map.get(*name).filter(|v| !v.is_null()))
}

fn str_field<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    field(map, names).and_then(Value::as_str)
}

fn shape_error(what: &str, value: &Value) -> FetchError {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    FetchError::backend(format!("unexpected {} shape: {}", what, kind))
}

// ============================================================================
// LISTS
// ============================================================================

/// Accept a bare array or an object wrapping exactly one array.
fn list_items(what: &str, value: Value) -> FetchResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(map) => {
            let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
                Value::Array(items) => Some(items),
                _ => None,
            });
            match (arrays.next(), arrays.next()) {
                (Some(items), None) => Ok(items),
                _ => Err(FetchError::backend(format!(
                    "unexpected {} shape: object without a single list",
                    what
                ))),
            }
        }
        Value::Null => Err(FetchError::empty(what)),
        other => Err(shape_error(what, &other)),
    }
}

fn identifiers(what: &str, value: Value) -> FetchResult<Vec<String>> {
    let items = list_items(what, value)?;
    let mut ids = Vec::with_capacity(items.len());
    for item in &items {
        let id = match item {
            Value::String(s) => Some(s.as_str()),
            Value::Object(map) => str_field(map, ID_FIELDS),
            _ => None,
        };
        match id.map(str::trim) {
            Some(id) if !id.is_empty() => {
                if !ids.iter().any(|existing| existing == id) {
                    ids.push(id.to_string());
                }
            }
            _ => return Err(shape_error(what, item)),
        }
    }
    if ids.is_empty() {
        return Err(FetchError::empty(what));
    }
    Ok(ids)
}

pub fn companies(value: Value) -> FetchResult<Vec<CompanyId>> {
    Ok(identifiers("companies", value)?
        .into_iter()
        .map(CompanyId::from)
        .collect())
}

pub fn products(value: Value) -> FetchResult<Vec<ProductId>> {
    Ok(identifiers("products", value)?
        .into_iter()
        .map(ProductId::from)
        .collect())
}

/// Extraction date encoded as a filename prefix, e.g. `2026-02-20_tape.csv`.
pub fn date_from_filename(filename: &str) -> Option<NaiveDate> {
    DATE_PREFIX
        .captures(filename)
        .and_then(|caps| caps.get(1))
        .and_then(|m| parse_date(m.as_str()).ok())
}

fn snapshot(item: &Value) -> FetchResult<Snapshot> {
    let (filename, date) = match item {
        Value::String(filename) => (filename.clone(), None),
        Value::Object(map) => {
            let map = match normalize_keys(Value::Object(map.clone())) {
                Value::Object(map) => map,
                _ => Map::new(),
            };
            let filename = str_field(&map, &["filename", "file_name", "file", "name"])
                .unwrap_or_default()
                .to_string();
            let date = str_field(&map, &["date", "snapshot_date"]).map(str::to_string);
            (filename, date)
        }
        other => return Err(shape_error("snapshot", other)),
    };

    let date = match date {
        Some(raw) => Some(parse_date(&raw).map_err(|e| FetchError::backend(e.to_string()))?),
        None => date_from_filename(&filename),
    };
    // The backend selects tapes by date, falling back to the filename.
    let id = match date {
        Some(date) => SnapshotId::new(creditlens_core::format_date(date)),
        None if !filename.is_empty() => SnapshotId::new(filename.clone()),
        None => return Err(shape_error("snapshot", item)),
    };
    Ok(Snapshot { id, date, filename })
}

/// Tapes, oldest first; undated tapes sort before dated ones.
pub fn snapshots(value: Value) -> FetchResult<Vec<Snapshot>> {
    let items = list_items("snapshots", value)?;
    let mut snapshots = items.iter().map(snapshot).collect::<FetchResult<Vec<_>>>()?;
    if snapshots.is_empty() {
        return Err(FetchError::empty("snapshots"));
    }
    snapshots.sort_by_key(|s| s.date);
    snapshots.dedup_by(|a, b| a.id == b.id);
    Ok(snapshots)
}

// ============================================================================
// OBJECTS
// ============================================================================

fn object(what: &str, value: Value) -> FetchResult<Map<String, Value>> {
    match normalize_keys(value) {
        Value::Object(map) => Ok(map),
        Value::Null => Err(FetchError::empty(what)),
        other => Err(shape_error(what, &other)),
    }
}

pub fn product_config(value: Value) -> FetchResult<ProductConfig> {
    let map = object("product config", value)?;
    let currency = match str_field(&map, &["currency", "reported_currency", "reporting_currency"])
    {
        Some(code) => code
            .parse::<Currency>()
            .map_err(|e| FetchError::backend(e.to_string()))?,
        None => Currency::usd(),
    };
    let description = str_field(&map, &["description"])
        .unwrap_or_default()
        .to_string();
    let configured = field(&map, &["configured"])
        .and_then(Value::as_bool)
        .unwrap_or(true);
    Ok(ProductConfig {
        currency,
        description,
        configured,
    })
}

pub fn date_range(value: Value) -> FetchResult<DateRange> {
    let map = object("date range", value)?;
    let nested = field(&map, &["date_range"]).and_then(Value::as_object);
    let min = bound(&map, nested, &["min_date", "min"]);
    let max = bound(&map, nested, &["max_date", "max"]);
    let (min, max) = match (min, max) {
        (Some(min), Some(max)) => (min, max),
        _ => return Err(FetchError::empty("date range")),
    };
    let min = parse_date(min).map_err(|e| FetchError::backend(e.to_string()))?;
    let max = parse_date(max).map_err(|e| FetchError::backend(e.to_string()))?;
    DateRange::new(min, max).map_err(|e| FetchError::backend(e.to_string()))
}

fn bound<'a>(
    map: &'a Map<String, Value>,
    nested: Option<&'a Map<String, Value>>,
    names: &[&str],
) -> Option<&'a str> {
    str_field(map, names).or_else(|| nested.and_then(|n| str_field(n, names)))
}

pub fn summary(value: Value) -> FetchResult<PortfolioSummary> {
    let map = object("summary", value)?;
    if map.is_empty() {
        return Err(FetchError::empty("summary"));
    }
    serde_json::from_value(Value::Object(map))
        .map_err(|e| FetchError::backend(format!("undecodable summary: {}", e)))
}

pub fn chart(value: Value) -> FetchResult<ChartPayload> {
    match value {
        Value::Null => Err(FetchError::empty("chart data")),
        Value::Array(items) if items.is_empty() => Err(FetchError::empty("chart data")),
        Value::Object(map) if map.is_empty() => Err(FetchError::empty("chart data")),
        other => Ok(ChartPayload(other)),
    }
}

/// Text of an AI response: a bare string or an object wrapping one.
pub fn narrative_text(value: Value) -> FetchResult<String> {
    let text = match &value {
        Value::String(text) => Some(text.as_str()),
        Value::Object(map) => str_field(map, TEXT_FIELDS),
        _ => None,
    };
    match text.map(str::trim) {
        Some("") => Err(FetchError::empty("narrative text")),
        Some(text) => Ok(text.to_string()),
        None if value.is_null() => Err(FetchError::empty("narrative text")),
        None => Err(shape_error("narrative", &value)),
    }
}

/// Human-readable detail from an error body (`{"detail": ...}` from FastAPI).
pub fn error_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let map = value.as_object()?;
    match field(map, &["detail", "message", "error"])? {
        Value::String(detail) => Some(detail.clone()),
        Value::Array(items) => {
            let messages: Vec<&str> = items
                .iter()
                .filter_map(|item| item.get("msg").and_then(Value::as_str))
                .collect();
            (!messages.is_empty()).then(|| messages.join("; "))
        }
        other => Some(other.to_string()),
    }
}

// ============================================================================
// REQUESTS
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct HistoryTurn<'a> {
    pub role: ChatRole,
    pub content: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatRequest<'a> {
    pub question: &'a str,
    pub history: Vec<HistoryTurn<'a>>,
    pub snapshot: &'a str,
    pub currency: &'a str,
}

/// Prior turns as sent to the backend. Error placeholders are never sent.
pub fn history(turns: &[ChatTurn]) -> Vec<HistoryTurn<'_>> {
    turns
        .iter()
        .filter(|t| !t.is_error)
        .map(|t| HistoryTurn {
            role: t.role,
            content: &t.content,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use creditlens_core::ErrorKind;
    use serde_json::json;

    #[test]
    fn test_companies_accepts_strings_and_objects() {
        let ids = companies(json!(["acme", {"name": "globex", "products": ["a"]}])).unwrap();
        assert_eq!(ids, vec![CompanyId::new("acme"), CompanyId::new("globex")]);
    }

    #[test]
    fn test_empty_list_is_empty_result() {
        let err = products(json!([])).unwrap_err();
        assert_eq!(err.kind, ErrorKind::EmptyResult);
    }

    #[test]
    fn test_wrapped_list() {
        let ids = products(json!({"products": ["loan_product"]})).unwrap();
        assert_eq!(ids, vec![ProductId::new("loan_product")]);
    }

    #[test]
    fn test_snapshot_id_prefers_date() {
        let list = snapshots(json!([
            {"filename": "2024-02-29_tape.csv", "date": "2024-02-29"},
            "2024-01-31_tape.csv",
            {"fileName": "legacy.xlsx"},
        ]))
        .unwrap();
        let ids: Vec<&str> = list.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["legacy.xlsx", "2024-01-31", "2024-02-29"]);
        assert_eq!(list[1].filename, "2024-01-31_tape.csv");
    }

    #[test]
    fn test_date_from_filename() {
        assert_eq!(
            date_from_filename("2026-02-20_klaim_dealsheet.csv"),
            NaiveDate::from_ymd_opt(2026, 2, 20)
        );
        assert_eq!(date_from_filename("dealsheet.csv"), None);
        assert_eq!(date_from_filename("2026-13-40_bad.csv"), None);
    }

    #[test]
    fn test_product_config_defaults() {
        let config = product_config(json!({"currency": "aed", "description": "Receivables"}))
            .unwrap();
        assert_eq!(config.currency.as_str(), "AED");
        assert!(config.configured);

        let fallback = product_config(json!({"currency": "USD", "description": "", "configured": false}))
            .unwrap();
        assert!(!fallback.configured);
    }

    #[test]
    fn test_date_range_variants() {
        let snake = date_range(json!({"min_date": "2023-07-01", "max_date": "2024-01-31"})).unwrap();
        let camel = date_range(json!({"minDate": "2023-07-01", "maxDate": "2024-01-31"})).unwrap();
        let nested =
            date_range(json!({"date_range": {"min": "2023-07-01", "max": "2024-01-31"}})).unwrap();
        assert_eq!(snake, camel);
        assert_eq!(snake, nested);

        let missing = date_range(json!({"min_date": null, "max_date": null})).unwrap_err();
        assert_eq!(missing.kind, ErrorKind::EmptyResult);
    }

    #[test]
    fn test_summary_camel_case() {
        let summary = summary(json!({"totalDeals": 42, "collectionRate": 80.5, "usd_rate": 3.67}))
            .unwrap();
        assert_eq!(summary.total_deals, 42);
        assert!((summary.collection_rate - 80.5).abs() < f64::EPSILON);
        assert!((summary.usd_rate - 3.67).abs() < f64::EPSILON);
    }

    #[test]
    fn test_narrative_text_shapes() {
        assert_eq!(narrative_text(json!("plain")).unwrap(), "plain");
        assert_eq!(
            narrative_text(json!({"commentary": "c", "generated_at": "x"})).unwrap(),
            "c"
        );
        assert_eq!(narrative_text(json!({"answer": "a", "question": "q"})).unwrap(), "a");
        assert_eq!(
            narrative_text(json!({"insight": "  "})).unwrap_err().kind,
            ErrorKind::EmptyResult
        );
        assert_eq!(
            narrative_text(json!(12)).unwrap_err().kind,
            ErrorKind::BackendError
        );
    }

    #[test]
    fn test_error_detail() {
        assert_eq!(
            error_detail(r#"{"detail": "No snapshots found"}"#).as_deref(),
            Some("No snapshots found")
        );
        assert_eq!(
            error_detail(r#"{"detail": [{"msg": "field required"}]}"#).as_deref(),
            Some("field required")
        );
        assert_eq!(error_detail("<html>"), None);
    }

    #[test]
    fn test_history_skips_error_turns() {
        let turns = vec![
            ChatTurn::user("q1"),
            ChatTurn::error("Error — please try again."),
            ChatTurn::user("q2"),
            ChatTurn::assistant("a2"),
        ];
        let sent = history(&turns);
        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|t| !t.content.starts_with("Error")));
    }

    #[test]
    fn test_chat_body_fields() {
        let turns = vec![ChatTurn::user("q1"), ChatTurn::assistant("a1")];
        let body = ChatRequest {
            question: "Why?",
            history: history(&turns),
            snapshot: "2024-01-31",
            currency: "AED",
        };
        let value = serde_json::to_value(&body).unwrap();
        let mut keys: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, ["currency", "history", "question", "snapshot"]);
        assert_eq!(value["history"].as_array().map(Vec::len), Some(2));
    }

    #[test]
    fn test_snake_case() {
        assert_eq!(snake_case("snapshotDate"), "snapshot_date");
        assert_eq!(snake_case("min_date"), "min_date");
        assert_eq!(snake_case("usdRate2"), "usd_rate2");
    }
}
