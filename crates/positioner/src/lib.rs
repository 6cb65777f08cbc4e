//! Profile-driven window placement.
//!
//! Ties the pure layout core to a platform backend: configuration loading
//! and migration, the canonical display list, per-application positioning
//! strategies and the placement run itself.

pub mod config;
pub mod displays;
pub mod orchestrator;
pub mod profiles;
pub mod report;
pub mod strategy;

pub use config::{Config, ConfigFormat, ConfigWarning};
pub use displays::DisplayService;
pub use orchestrator::Positioner;
pub use report::{
    FailureReason, PlacementReport, RoleTarget, RunAbort, SkipReason, SlotOutcome, SlotReport,
    Verification,
};
pub use strategy::{StrategyKind, StrategySelector};
