//! Cache keys scoped to a resolved parameter tuple.
//!
//! Keys carry the tuple they were derived from, so an entry can never be
//! looked up under a different selection than the one that produced it.

use std::fmt;

use creditlens_core::{ChartTab, Fingerprint, ResolvedTuple};

/// Any key derived from a resolved tuple.
pub trait TupleScoped {
    fn tuple(&self) -> &ResolvedTuple;

    fn fingerprint(&self) -> Fingerprint {
        self.tuple().fingerprint()
    }
}

impl TupleScoped for ResolvedTuple {
    fn tuple(&self) -> &ResolvedTuple {
        self
    }
}

/// Chart data for one tab under one tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChartKey {
    inner: ChartKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct ChartKeyInner {
    tuple: ResolvedTuple,
    tab: ChartTab,
}

impl ChartKey {
    pub fn new(tuple: ResolvedTuple, tab: ChartTab) -> Self {
        Self {
            inner: ChartKeyInner { tuple, tab },
        }
    }

    pub fn tab(&self) -> ChartTab {
        self.inner.tab
    }
}

impl TupleScoped for ChartKey {
    fn tuple(&self) -> &ResolvedTuple {
        &self.inner.tuple
    }
}

impl fmt::Display for ChartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "chart:{}:{}", self.inner.tab, self.inner.tuple)
    }
}

/// Kind of generated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NarrativeKind {
    /// Portfolio-wide commentary, independent of the active tab.
    Commentary,
    /// Short insight shown above one chart tab.
    TabInsight(ChartTab),
}

impl NarrativeKind {
    /// Text shown in place of a failed generation.
    pub fn fallback_message(&self) -> &'static str {
        match self {
            NarrativeKind::Commentary => "Failed to generate commentary.",
            NarrativeKind::TabInsight(_) => "Failed to load insight.",
        }
    }
}

impl fmt::Display for NarrativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NarrativeKind::Commentary => f.write_str("commentary"),
            NarrativeKind::TabInsight(tab) => write!(f, "insight:{}", tab),
        }
    }
}

/// Generated text for one tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NarrativeKey {
    inner: NarrativeKeyInner,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct NarrativeKeyInner {
    tuple: ResolvedTuple,
    kind: NarrativeKind,
}

impl NarrativeKey {
    pub fn new(tuple: ResolvedTuple, kind: NarrativeKind) -> Self {
        Self {
            inner: NarrativeKeyInner { tuple, kind },
        }
    }

    pub fn commentary(tuple: ResolvedTuple) -> Self {
        Self::new(tuple, NarrativeKind::Commentary)
    }

    pub fn tab_insight(tuple: ResolvedTuple, tab: ChartTab) -> Self {
        Self::new(tuple, NarrativeKind::TabInsight(tab))
    }

    pub fn kind(&self) -> NarrativeKind {
        self.inner.kind
    }
}

impl TupleScoped for NarrativeKey {
    fn tuple(&self) -> &ResolvedTuple {
        &self.inner.tuple
    }
}

impl fmt::Display for NarrativeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.inner.kind, self.inner.tuple)
    }
}
