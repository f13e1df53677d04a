//! Persistence for lightweight view state.
//!
//! A saved tab this build does not know opens Overview instead of
//! discarding the saved company and product.

use crate::tabs::Tab;
use creditlens_core::{CompanyId, ProductId};
use serde::{Deserialize, Deserializer, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedState {
    #[serde(default = "overview", deserialize_with = "tab_or_overview")]
    pub active_tab: Tab,
    #[serde(default)]
    pub company: Option<CompanyId>,
    #[serde(default)]
    pub product: Option<ProductId>,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub fn load(path: &Path) -> Result<Option<PersistedState>, PersistenceError> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)?;
    let mut state = serde_json::from_str::<PersistedState>(&contents)?;
    // A product is only meaningful under its company.
    if state.company.is_none() {
        state.product = None;
    }
    Ok(Some(state))
}

pub fn save(path: &Path, state: &PersistedState) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = serde_json::to_string_pretty(state)?;
    std::fs::write(path, contents)?;
    Ok(())
}

fn overview() -> Tab {
    Tab::Overview
}

fn tab_or_overview<'de, D>(deserializer: D) -> Result<Tab, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    Ok(raw.parse().unwrap_or_else(|_| {
        tracing::warn!(tab = %raw, "Unknown persisted tab, opening Overview");
        Tab::Overview
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_loads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load(&dir.path().join("state.json")).unwrap().is_none());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let state = PersistedState {
            active_tab: Tab::Revenue,
            company: Some(CompanyId::new("acme")),
            product: Some(ProductId::new("loan_product")),
        };
        save(&path, &state).unwrap();
        assert_eq!(load(&path).unwrap(), Some(state));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(load(&path), Err(PersistenceError::Serde(_))));
    }

    #[test]
    fn test_unknown_tab_opens_overview_and_keeps_selection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(
            &path,
            r#"{"active_tab": "settings", "company": "acme", "product": "loan_product"}"#,
        )
        .unwrap();
        let state = load(&path).unwrap().unwrap();
        assert_eq!(state.active_tab, Tab::Overview);
        assert_eq!(state.company, Some(CompanyId::new("acme")));
        assert_eq!(state.product, Some(ProductId::new("loan_product")));
    }

    #[test]
    fn test_product_without_company_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, r#"{"active_tab": "cohort", "product": "loan_product"}"#).unwrap();
        let state = load(&path).unwrap().unwrap();
        assert_eq!(state.active_tab, Tab::CohortAnalysis);
        assert_eq!(state.company, None);
        assert_eq!(state.product, None);
    }
}
