//! Structured results of a placement run.

use std::fmt;
use std::time::Duration;

use quadpos_core_layout::{MonitorRole, Point, Quadrant, Resolution};
use serde::Serialize;
use thiserror::Error;

use crate::strategy::StrategyKind;

/// What a read-back after placement showed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Verification {
    /// The window landed within tolerance of the target.
    Confirmed { actual: Point },
    /// The window landed outside tolerance.
    Offset { actual: Point, dx: i32, dy: i32 },
    /// Nothing could be read back, or verification is disabled.
    Unverified,
}

/// Why a slot was not attempted.
///
/// The role is already on the enclosing [`SlotReport`], so it is left out
/// of the serialized reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    #[error("application not found or not running")]
    NotRunning,

    #[error("no quadrant region for list layouts")]
    NoQuadrantRegion,

    #[error("profile has no monitor for role '{role}'")]
    RoleNotInProfile {
        #[serde(skip_serializing)]
        role: MonitorRole,
    },

    #[error("no connected display for role '{role}' ({resolution})")]
    MissingDisplay {
        #[serde(skip_serializing)]
        role: MonitorRole,
        resolution: String,
    },

    #[error("accessibility permission not granted")]
    PermissionDenied,
}

/// Why an attempted slot failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FailureReason {
    #[error("position command rejected (code: {code})")]
    Rejected { code: i32 },

    #[error("no windows found")]
    NoWindows,

    #[error("{message}")]
    Platform { message: String },
}

/// Outcome of one application slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SlotOutcome {
    Placed {
        target: Point,
        strategy: StrategyKind,
        attempts: u32,
        verification: Verification,
        /// Display the window ended up on, when it could be read back.
        landed_on: Option<String>,
    },
    Skipped(SkipReason),
    Failed(FailureReason),
}

impl SlotOutcome {
    pub fn is_placed(&self) -> bool {
        matches!(self, SlotOutcome::Placed { .. })
    }
}

/// One application entry of the layout and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotReport {
    pub role: MonitorRole,
    /// Absent for list layouts.
    pub quadrant: Option<Quadrant>,
    pub bundle_id: String,
    /// Localized name, when the application is running.
    pub app_name: Option<String>,
    #[serde(flatten)]
    pub outcome: SlotOutcome,
}

impl SlotReport {
    /// Name used in user-facing lines.
    pub fn display_name(&self) -> &str {
        self.app_name.as_deref().unwrap_or(&self.bundle_id)
    }
}

/// A monitor role that was resolved to a connected display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleTarget {
    pub role: MonitorRole,
    pub display: String,
    pub resolution: Resolution,
    /// False when the display is not the OS main display. Windows may then
    /// be held to the main display's bounds.
    pub main_display: bool,
}

/// Why a run ended before any slot was attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RunAbort {
    #[error("no matching profile found for current monitor configuration")]
    NoMatchingProfile,

    #[error("profile '{name}' not found in configuration")]
    UnknownProfile { name: String },
}

/// The result of one placement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlacementReport {
    /// Profile used for the run.
    pub profile: Option<String>,
    pub aborted: Option<RunAbort>,
    /// True when the accessibility permission was missing.
    pub permission_denied: bool,
    pub targets: Vec<RoleTarget>,
    pub slots: Vec<SlotReport>,
    #[serde(serialize_with = "serialize_secs")]
    pub duration: Duration,
}

fn serialize_secs<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl PlacementReport {
    pub(crate) fn abort_with(reason: RunAbort, profile: Option<String>) -> Self {
        Self {
            profile,
            aborted: Some(reason),
            permission_denied: false,
            targets: Vec::new(),
            slots: Vec::new(),
            duration: Duration::ZERO,
        }
    }

    /// A run succeeds when a profile was selected, whatever the slots did.
    pub fn success(&self) -> bool {
        self.aborted.is_none()
    }

    /// Number of slots whose placement request was accepted.
    pub fn placed_count(&self) -> usize {
        self.slots.iter().filter(|s| s.outcome.is_placed()).count()
    }

    /// Number of slots that were attempted or skipped.
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }
}

impl fmt::Display for PlacementReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(reason) = &self.aborted {
            return write!(f, "{}", reason);
        }
        write!(
            f,
            "Placed {} of {} applications in {:.2} seconds",
            self.placed_count(),
            self.slot_count(),
            self.duration.as_secs_f64()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(outcome: SlotOutcome) -> SlotReport {
        SlotReport {
            role: MonitorRole::Primary,
            quadrant: Some(Quadrant::TopLeft),
            bundle_id: "com.google.Chrome".to_string(),
            app_name: None,
            outcome,
        }
    }

    #[test]
    fn test_placed_count_ignores_skips_and_failures() {
        let report = PlacementReport {
            profile: Some("home".to_string()),
            aborted: None,
            permission_denied: false,
            targets: Vec::new(),
            slots: vec![
                slot(SlotOutcome::Placed {
                    target: Point::new(0, 0),
                    strategy: StrategyKind::Standard,
                    attempts: 1,
                    verification: Verification::Unverified,
                    landed_on: None,
                }),
                slot(SlotOutcome::Skipped(SkipReason::NotRunning)),
                slot(SlotOutcome::Failed(FailureReason::Rejected { code: -25200 })),
            ],
            duration: Duration::from_millis(1500),
        };
        assert!(report.success());
        assert_eq!(report.placed_count(), 1);
        assert_eq!(report.slot_count(), 3);
        assert_eq!(
            report.to_string(),
            "Placed 1 of 3 applications in 1.50 seconds"
        );
    }

    #[test]
    fn test_aborted_report() {
        let report = PlacementReport::abort_with(RunAbort::NoMatchingProfile, None);
        assert!(!report.success());
        assert_eq!(report.placed_count(), 0);
        assert_eq!(
            report.to_string(),
            "no matching profile found for current monitor configuration"
        );
    }

    #[test]
    fn test_reason_messages() {
        assert_eq!(
            FailureReason::Rejected { code: -25200 }.to_string(),
            "position command rejected (code: -25200)"
        );
        assert_eq!(
            SkipReason::MissingDisplay {
                role: MonitorRole::Primary,
                resolution: "3840x2160".to_string()
            }
            .to_string(),
            "no connected display for role 'primary' (3840x2160)"
        );
        assert_eq!(
            slot(SlotOutcome::Skipped(SkipReason::NotRunning)).display_name(),
            "com.google.Chrome"
        );
    }

    #[test]
    fn test_report_serializes_outcomes() {
        let json = serde_json::to_value(slot(SlotOutcome::Skipped(SkipReason::NotRunning)))
            .unwrap();
        assert_eq!(json["outcome"], "skipped");
        assert_eq!(json["reason"], "not_running");
        assert_eq!(json["bundle_id"], "com.google.Chrome");

        let json = serde_json::to_value(slot(SlotOutcome::Placed {
            target: Point::new(3440, 0),
            strategy: StrategyKind::Retry,
            attempts: 2,
            verification: Verification::Unverified,
            landed_on: None,
        }))
        .unwrap();
        assert_eq!(json["outcome"], "placed");
        assert_eq!(json["strategy"], "retry");
        assert_eq!(json["attempts"], 2);
        assert_eq!(json["verification"]["status"], "unverified");
    }

    #[test]
    fn test_skip_reason_role_not_repeated() {
        let text = serde_json::to_string(&slot(SlotOutcome::Skipped(
            SkipReason::MissingDisplay {
                role: MonitorRole::Primary,
                resolution: "3840x2160".to_string(),
            },
        )))
        .unwrap();
        assert_eq!(text.matches("\"role\"").count(), 1);
        assert!(text.contains("\"reason\":\"missing_display\""));
        assert!(text.contains("\"resolution\":\"3840x2160\""));
    }
}
