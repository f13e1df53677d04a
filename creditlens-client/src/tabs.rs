//! Dashboard tabs and navigation.

use creditlens_core::{ChartTab, CoreError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tab {
    #[serde(rename = "overview")]
    Overview,
    #[serde(rename = "actual-vs-expected")]
    ActualVsExpected,
    #[serde(rename = "deployment")]
    Deployment,
    #[serde(rename = "collection-velocity")]
    Collection,
    #[serde(rename = "denial-trend")]
    DenialTrend,
    #[serde(rename = "ageing")]
    Ageing,
    #[serde(rename = "revenue")]
    Revenue,
    #[serde(rename = "concentration")]
    Portfolio,
    #[serde(rename = "cohort")]
    CohortAnalysis,
}

impl Tab {
    pub fn title(&self) -> &'static str {
        match self {
            Tab::Overview => "Overview",
            Tab::ActualVsExpected => "Actual vs Expected",
            Tab::Deployment => "Deployment",
            Tab::Collection => "Collection",
            Tab::DenialTrend => "Denial Trend",
            Tab::Ageing => "Ageing",
            Tab::Revenue => "Revenue",
            Tab::Portfolio => "Portfolio",
            Tab::CohortAnalysis => "Cohort Analysis",
        }
    }

    pub fn all() -> &'static [Tab] {
        &[
            Tab::Overview,
            Tab::ActualVsExpected,
            Tab::Deployment,
            Tab::Collection,
            Tab::DenialTrend,
            Tab::Ageing,
            Tab::Revenue,
            Tab::Portfolio,
            Tab::CohortAnalysis,
        ]
    }

    /// Chart endpoint backing this tab. The Overview tab shows the summary.
    pub fn chart_tab(&self) -> Option<ChartTab> {
        match self {
            Tab::Overview => None,
            Tab::ActualVsExpected => Some(ChartTab::ActualVsExpected),
            Tab::Deployment => Some(ChartTab::Deployment),
            Tab::Collection => Some(ChartTab::CollectionVelocity),
            Tab::DenialTrend => Some(ChartTab::DenialTrend),
            Tab::Ageing => Some(ChartTab::Ageing),
            Tab::Revenue => Some(ChartTab::Revenue),
            Tab::Portfolio => Some(ChartTab::Concentration),
            Tab::CohortAnalysis => Some(ChartTab::Cohort),
        }
    }

    pub fn slug(&self) -> &'static str {
        match self.chart_tab() {
            Some(chart) => chart.slug(),
            None => "overview",
        }
    }

    pub fn index(&self) -> usize {
        Self::all().iter().position(|t| t == self).unwrap_or(0)
    }

    pub fn from_index(index: usize) -> Option<Tab> {
        Self::all().get(index).copied()
    }

    pub fn next(&self) -> Tab {
        let all = Self::all();
        all[(self.index() + 1) % all.len()]
    }

    pub fn previous(&self) -> Tab {
        let all = Self::all();
        let idx = self.index();
        let prev = if idx == 0 { all.len() - 1 } else { idx - 1 };
        all[prev]
    }
}

impl From<ChartTab> for Tab {
    fn from(chart: ChartTab) -> Self {
        match chart {
            ChartTab::ActualVsExpected => Tab::ActualVsExpected,
            ChartTab::Deployment => Tab::Deployment,
            ChartTab::CollectionVelocity => Tab::Collection,
            ChartTab::DenialTrend => Tab::DenialTrend,
            ChartTab::Ageing => Tab::Ageing,
            ChartTab::Revenue => Tab::Revenue,
            ChartTab::Concentration => Tab::Portfolio,
            ChartTab::Cohort => Tab::CohortAnalysis,
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

impl FromStr for Tab {
    type Err = CoreError;

    /// Accepts a slug (`collection-velocity`) or a title (`Collection`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("overview") {
            return Ok(Tab::Overview);
        }
        if let Some(tab) = Self::all()
            .iter()
            .find(|t| t.title().eq_ignore_ascii_case(trimmed))
        {
            return Ok(*tab);
        }
        trimmed.parse::<ChartTab>().map(Tab::from)
    }
}
