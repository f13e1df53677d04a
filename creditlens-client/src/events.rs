//! Completions delivered to the view controller's event loop.

use creditlens_cache::{ChartKey, NarrativeKey, Settled};
use creditlens_core::{
    ChartPayload, CompanyId, DateRange, FetchResult, Fingerprint, Narrative, PortfolioSummary,
    ProductConfig, ProductId, ResolvedTuple, Snapshot,
};

use crate::chat::ChatTicket;

/// A finished backend request.
///
/// Option-list completions carry the scope fingerprint captured when they
/// were requested.
#[derive(Debug)]
pub enum ControllerEvent {
    Companies {
        result: FetchResult<Vec<CompanyId>>,
    },
    Products {
        scope: Fingerprint,
        result: FetchResult<Vec<ProductId>>,
    },
    Snapshots {
        scope: Fingerprint,
        result: FetchResult<Vec<Snapshot>>,
    },
    ProductConfig {
        scope: Fingerprint,
        result: FetchResult<ProductConfig>,
    },
    DateRange {
        scope: Fingerprint,
        result: FetchResult<DateRange>,
    },
    Summary(Settled<ResolvedTuple, PortfolioSummary>),
    Chart(Settled<ChartKey, ChartPayload>),
    Narrative(Settled<NarrativeKey, Narrative>),
    ChatReply {
        ticket: ChatTicket,
        result: FetchResult<String>,
    },
}

impl ControllerEvent {
    /// Short label for log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ControllerEvent::Companies { .. } => "companies",
            ControllerEvent::Products { .. } => "products",
            ControllerEvent::Snapshots { .. } => "snapshots",
            ControllerEvent::ProductConfig { .. } => "config",
            ControllerEvent::DateRange { .. } => "date_range",
            ControllerEvent::Summary(_) => "summary",
            ControllerEvent::Chart(_) => "chart",
            ControllerEvent::Narrative(_) => "narrative",
            ControllerEvent::ChatReply { .. } => "chat",
        }
    }
}
