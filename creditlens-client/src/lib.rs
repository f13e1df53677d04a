//! CreditLens client library exports.

pub mod api_client;
pub mod chat;
pub mod config;
pub mod controller;
pub mod error;
pub mod events;
pub mod params;
pub mod persistence;
pub mod tab_loader;
pub mod tabs;
pub mod telemetry;
pub mod wire;

pub use controller::{LoadState, ViewController, ViewSnapshot};
pub use params::{ChangeEvent, ParameterStore, RejectReason, SelectOutcome};
pub use tabs::Tab;
