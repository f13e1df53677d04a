//! Contract of the analytics backend.

use async_trait::async_trait;

use crate::entities::{ChartPayload, ChatTurn, DateRange, PortfolioSummary, ProductConfig, Snapshot};
use crate::error::FetchResult;
use crate::identity::{CompanyId, ProductId, SnapshotId};
use crate::selection::{ChartTab, ResolvedTuple};

/// Analytics backend consumed by the dashboard.
///
/// Implementations translate transport and decoding failures into a
/// [`FetchError`](crate::FetchError) with the matching [`ErrorKind`](crate::ErrorKind).
/// AI endpoints return bare text; generation timestamps are added by the caller.
#[async_trait]
pub trait AnalyticsBackend: Send + Sync {
    async fn companies(&self) -> FetchResult<Vec<CompanyId>>;

    async fn products(&self, company: &CompanyId) -> FetchResult<Vec<ProductId>>;

    /// Tapes for a company and product, oldest first.
    async fn snapshots(&self, company: &CompanyId, product: &ProductId)
        -> FetchResult<Vec<Snapshot>>;

    async fn product_config(
        &self,
        company: &CompanyId,
        product: &ProductId,
    ) -> FetchResult<ProductConfig>;

    async fn date_range(
        &self,
        company: &CompanyId,
        product: &ProductId,
        snapshot: &SnapshotId,
    ) -> FetchResult<DateRange>;

    async fn summary(&self, tuple: &ResolvedTuple) -> FetchResult<PortfolioSummary>;

    async fn chart(&self, tuple: &ResolvedTuple, tab: ChartTab) -> FetchResult<ChartPayload>;

    async fn commentary(&self, tuple: &ResolvedTuple) -> FetchResult<String>;

    async fn tab_insight(&self, tuple: &ResolvedTuple, tab: ChartTab) -> FetchResult<String>;

    /// Answer `question` given the prior non-error turns.
    async fn chat(
        &self,
        tuple: &ResolvedTuple,
        question: &str,
        history: &[ChatTurn],
    ) -> FetchResult<String>;
}
