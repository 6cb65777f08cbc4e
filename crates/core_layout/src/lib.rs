//! quadpos Core Layout
//!
//! Platform-agnostic display geometry and layout math.
//!
//! This crate holds everything that can be computed without talking to the OS:
//! - Translation of display origins from arrangement space to positioning space
//! - Deterministic display naming
//! - Profile definitions and matching against connected resolutions
//! - Quadrant partitioning and corner alignment

use thiserror::Error;

pub mod display;
pub mod geometry;
pub mod naming;
pub mod profile;
pub mod quadrant;

pub use display::{
    enrich, identify_display, translate, DetectionSource, Display, DisplayDetails, RawDisplay,
    Relation,
};
pub use geometry::{Point, Rect, Resolution, Size};
pub use naming::{display_name, hardware_hint, is_builtin_name, BUILTIN_DISPLAY_NAME};
pub use profile::{
    match_profile, Layout, MatchPolicy, MonitorRole, MonitorSpec, Profile, ProfileCatalog,
    ResolutionSpec, RoleLayout, BUILTIN_PLACEHOLDER,
};
pub use quadrant::{
    align_or_estimate, align_to_corner, partition, Quadrant, QuadrantRects, FALLBACK_WINDOW_SIZE,
};

/// Errors raised while parsing layout values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LayoutError {
    #[error("Invalid resolution '{0}' (expected WIDTHxHEIGHT)")]
    InvalidResolution(String),

    #[error("Unknown quadrant '{0}'")]
    UnknownQuadrant(String),

    #[error("Unknown monitor role '{0}'")]
    UnknownRole(String),
}
