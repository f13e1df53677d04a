//! REST client for the analytics backend.

use std::time::Duration;

use async_trait::async_trait;
use creditlens_core::{
    AnalyticsBackend, ChartPayload, ChartTab, ChatTurn, CompanyId, DateRange, FetchError,
    FetchResult, PortfolioSummary, ProductConfig, ProductId, ResolvedTuple, Snapshot, SnapshotId,
};
use reqwest::Url;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::wire;

#[derive(Debug, thiserror::Error)]
pub enum ApiClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("HTTP {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("Config error: {0}")]
    Config(String),
}

impl From<ApiClientError> for FetchError {
    fn from(err: ApiClientError) -> Self {
        match &err {
            ApiClientError::Http(http) if http.is_decode() => FetchError::backend(err.to_string()),
            ApiClientError::Http(http) if http.is_status() => FetchError::backend(err.to_string()),
            ApiClientError::Http(_) => FetchError::network(err.to_string()),
            ApiClientError::Serde(_) | ApiClientError::Status { .. } => {
                FetchError::backend(err.to_string())
            }
            ApiClientError::Config(_) => FetchError::network(err.to_string()),
        }
    }
}

type Query = [(&'static str, String)];

#[derive(Debug, Clone)]
pub struct RestClient {
    client: reqwest::Client,
    base_url: Url,
}

impl RestClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiClientError> {
        Self::with_base_url(
            &config.api_base_url,
            Duration::from_millis(config.request_timeout_ms),
        )
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, ApiClientError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let base_url = Url::parse(base_url.trim())
            .map_err(|e| ApiClientError::Config(format!("invalid api_base_url: {}", e)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiClientError::Config(
                "api_base_url cannot carry a path".to_string(),
            ));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Join path segments onto the base URL, percent-encoding each one.
    pub fn url(&self, segments: &[&str]) -> Result<Url, ApiClientError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiClientError::Config("api_base_url cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn product_url(
        &self,
        company: &CompanyId,
        product: &ProductId,
        rest: &[&str],
    ) -> Result<Url, ApiClientError> {
        let mut segments = vec!["companies", company.as_str(), "products", product.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    async fn get_json(&self, url: Url, query: &Query) -> Result<Value, ApiClientError> {
        tracing::debug!(method = "GET", url = %url, "Backend request");
        let mut request = self.client.get(url);
        if !query.is_empty() {
            request = request.query(query);
        }
        let response = request.send().await?;
        self.parse_response(response).await
    }

    async fn post_json<B>(&self, url: Url, query: &Query, body: &B) -> Result<Value, ApiClientError>
    where
        B: serde::Serialize + ?Sized,
    {
        tracing::debug!(method = "POST", url = %url, "Backend request");
        let response = self
            .client
            .post(url)
            .query(query)
            .json(body)
            .send()
            .await?;
        self.parse_response(response).await
    }

    async fn parse_response(&self, response: reqwest::Response) -> Result<Value, ApiClientError> {
        let status = response.status();
        let text = response.text().await?;
        if status.is_success() {
            if text.trim().is_empty() {
                return Ok(Value::Null);
            }
            return Ok(serde_json::from_str(&text)?);
        }
        let detail = wire::error_detail(&text).unwrap_or(text);
        tracing::warn!(status = status.as_u16(), detail = %detail, "Backend returned error");
        Err(ApiClientError::Status {
            status: status.as_u16(),
            detail,
        })
    }

    async fn get_tuple_json(
        &self,
        tuple: &ResolvedTuple,
        rest: &[&str],
        extra: Option<(&'static str, String)>,
    ) -> Result<Value, ApiClientError> {
        let url = self.product_url(&tuple.company, &tuple.product, rest)?;
        let mut query = tuple.query_pairs().to_vec();
        query.extend(extra);
        self.get_json(url, &query).await
    }
}

#[async_trait]
impl AnalyticsBackend for RestClient {
    async fn companies(&self) -> FetchResult<Vec<CompanyId>> {
        let url = self.url(&["companies"])?;
        wire::companies(self.get_json(url, &[]).await?)
    }

    async fn products(&self, company: &CompanyId) -> FetchResult<Vec<ProductId>> {
        let url = self.url(&["companies", company.as_str(), "products"])?;
        wire::products(self.get_json(url, &[]).await?)
    }

    async fn snapshots(
        &self,
        company: &CompanyId,
        product: &ProductId,
    ) -> FetchResult<Vec<Snapshot>> {
        let url = self.product_url(company, product, &["snapshots"])?;
        wire::snapshots(self.get_json(url, &[]).await?)
    }

    async fn product_config(
        &self,
        company: &CompanyId,
        product: &ProductId,
    ) -> FetchResult<ProductConfig> {
        let url = self.product_url(company, product, &["config"])?;
        wire::product_config(self.get_json(url, &[]).await?)
    }

    async fn date_range(
        &self,
        company: &CompanyId,
        product: &ProductId,
        snapshot: &SnapshotId,
    ) -> FetchResult<DateRange> {
        let url = self.product_url(company, product, &["date-range"])?;
        let query = [("snapshot", snapshot.to_string())];
        wire::date_range(self.get_json(url, &query).await?)
    }

    async fn summary(&self, tuple: &ResolvedTuple) -> FetchResult<PortfolioSummary> {
        wire::summary(self.get_tuple_json(tuple, &["summary"], None).await?)
    }

    async fn chart(&self, tuple: &ResolvedTuple, tab: ChartTab) -> FetchResult<ChartPayload> {
        wire::chart(
            self.get_tuple_json(tuple, &["charts", tab.slug()], None)
                .await?,
        )
    }

    async fn commentary(&self, tuple: &ResolvedTuple) -> FetchResult<String> {
        wire::narrative_text(self.get_tuple_json(tuple, &["ai-commentary"], None).await?)
    }

    async fn tab_insight(&self, tuple: &ResolvedTuple, tab: ChartTab) -> FetchResult<String> {
        let value = self
            .get_tuple_json(tuple, &["ai-tab-insight"], Some(("tab", tab.slug().to_string())))
            .await?;
        wire::narrative_text(value)
    }

    async fn chat(
        &self,
        tuple: &ResolvedTuple,
        question: &str,
        history: &[ChatTurn],
    ) -> FetchResult<String> {
        let url = self.product_url(&tuple.company, &tuple.product, &["chat"])?;
        let body = wire::ChatRequest {
            question,
            history: wire::history(history),
            snapshot: tuple.snapshot.as_str(),
            currency: tuple.currency.as_str(),
        };
        let value = self.post_json(url, &tuple.query_pairs(), &body).await?;
        wire::narrative_text(value)
    }
}
