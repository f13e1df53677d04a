//! CreditLens Core - Selection and Entity Types
//!
//! Pure data structures shared by the cache and client crates: identifiers,
//! the cascading selection levels, normalized backend entities and the
//! backend contract.

pub mod backend;
pub mod entities;
pub mod error;
pub mod identity;
pub mod selection;

pub use backend::AnalyticsBackend;
pub use entities::{
    ChartPayload, ChatRole, ChatTurn, DateRange, Narrative, PortfolioSummary, ProductConfig,
    Snapshot,
};
pub use error::{CoreError, CoreResult, ErrorKind, FetchError, FetchResult};
pub use identity::{CompanyId, Currency, Fingerprint, ProductId, SnapshotId};
pub use selection::{
    format_date, parse_date, ChartTab, Choice, Level, ResolvedTuple, Selection, DATE_FORMAT,
};
