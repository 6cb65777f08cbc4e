//! Positioning strategies.
//!
//! A strategy is the sequence of placement attempts made for one window.
//! Most applications accept a single position request; some fight external
//! repositioning and need several attempts with a read-back in between.
//! Which strategy an application gets is decided by configuration, see
//! [`StrategySelector`].

use std::collections::BTreeMap;
use std::fmt;
use std::thread;
use std::time::Duration;

use quadpos_core_layout::Point;
use quadpos_platform::{Pid, PlatformError, WindowControl};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::{BehaviorConfig, Config};
use crate::report::Verification;

/// Read-back tolerance of the standard strategy, in pixels per axis.
pub const STANDARD_TOLERANCE: i32 = 5;

/// Read-back tolerance of the retry strategy, in pixels per axis.
pub const RETRY_TOLERANCE: i32 = 25;

/// Which strategy to use for an application.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// One request, optionally verified.
    #[default]
    Standard,
    /// Several requests until the read-back lands within tolerance.
    #[serde(alias = "chrome")]
    Retry,
}

impl StrategyKind {
    /// Pixels per axis a read-back may be off and still count as placed.
    pub fn tolerance(&self) -> i32 {
        match self {
            StrategyKind::Standard => STANDARD_TOLERANCE,
            StrategyKind::Retry => RETRY_TOLERANCE,
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StrategyKind::Standard => f.write_str("standard"),
            StrategyKind::Retry => f.write_str("retry"),
        }
    }
}

/// Result of a strategy that got at least one request accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Requests made, including rejected ones.
    pub attempts: u32,
    pub verification: Verification,
}

/// A way of moving one window to a target position.
pub trait PositioningStrategy {
    fn kind(&self) -> StrategyKind;

    /// Move the first window of `pid` so its top-left corner is at `target`.
    ///
    /// Returns an error only when no request was accepted.
    fn place(
        &self,
        windows: &dyn WindowControl,
        pid: Pid,
        target: Point,
    ) -> Result<Placement, PlatformError>;
}

/// Compare the window's current position against the target.
fn read_back(windows: &dyn WindowControl, pid: Pid, target: Point, tolerance: i32) -> Verification {
    match windows.window_frame(pid) {
        Ok(frame) => {
            let actual = frame.origin();
            let (dx, dy) = actual.distance_to(target);
            if actual.within(target, tolerance) {
                Verification::Confirmed { actual }
            } else {
                Verification::Offset { actual, dx, dy }
            }
        }
        Err(e) => {
            tracing::debug!("Could not read back position of PID {}: {}", pid, e);
            Verification::Unverified
        }
    }
}

fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

/// A single request, with an optional diagnostic read-back.
#[derive(Debug, Clone)]
pub struct StandardStrategy {
    pub verify: bool,
    pub settle: Duration,
}

impl PositioningStrategy for StandardStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Standard
    }

    fn place(
        &self,
        windows: &dyn WindowControl,
        pid: Pid,
        target: Point,
    ) -> Result<Placement, PlatformError> {
        windows.set_position(pid, target)?;

        let verification = if self.verify {
            settle(self.settle);
            read_back(windows, pid, target, self.kind().tolerance())
        } else {
            Verification::Unverified
        };
        Ok(Placement {
            attempts: 1,
            verification,
        })
    }
}

/// Repeated requests until the read-back lands within tolerance.
///
/// Rejected requests are retried. A request that is accepted but lands off
/// target is also retried; when every attempt lands off target the last
/// read-back is reported as an offset placement.
#[derive(Debug, Clone)]
pub struct RetryStrategy {
    pub attempts: u32,
    pub settle: Duration,
}

impl PositioningStrategy for RetryStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Retry
    }

    fn place(
        &self,
        windows: &dyn WindowControl,
        pid: Pid,
        target: Point,
    ) -> Result<Placement, PlatformError> {
        let attempts = self.attempts.max(1);
        let mut last_error = None;
        let mut last_offset = None;

        for attempt in 1..=attempts {
            match windows.set_position(pid, target) {
                Ok(()) => {}
                Err(PlatformError::Rejected { code }) => {
                    tracing::debug!(
                        "Attempt {}/{} for PID {} rejected (code: {})",
                        attempt,
                        attempts,
                        pid,
                        code
                    );
                    last_error = Some(PlatformError::Rejected { code });
                    continue;
                }
                Err(e) => return Err(e),
            }

            settle(self.settle);
            match read_back(windows, pid, target, self.kind().tolerance()) {
                Verification::Offset { actual, dx, dy } => {
                    tracing::debug!(
                        "Attempt {}/{} for PID {} landed at {} ({}px/{}px off)",
                        attempt,
                        attempts,
                        pid,
                        actual,
                        dx,
                        dy
                    );
                    last_offset = Some(Verification::Offset { actual, dx, dy });
                }
                verification => {
                    return Ok(Placement {
                        attempts: attempt,
                        verification,
                    })
                }
            }
        }

        match (last_offset, last_error) {
            (Some(verification), _) => Ok(Placement {
                attempts,
                verification,
            }),
            (None, Some(e)) => Err(e),
            (None, None) => Err(PlatformError::NoWindows { pid }),
        }
    }
}

/// Build the strategy for a kind with the configured timings.
pub fn build(kind: StrategyKind, behavior: &BehaviorConfig) -> Box<dyn PositioningStrategy> {
    let settle = Duration::from_millis(behavior.verify_settle_ms);
    match kind {
        StrategyKind::Standard => Box::new(StandardStrategy {
            verify: behavior.verify,
            settle,
        }),
        StrategyKind::Retry => Box::new(RetryStrategy {
            attempts: behavior.retry_attempts,
            settle,
        }),
    }
}

/// Picks the strategy for an application.
///
/// Resolution order: the application's own `positioning_strategy`, then the
/// first strategy rule whose pattern matches the bundle id, then standard.
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    overrides: BTreeMap<String, StrategyKind>,
    rules: Vec<(Regex, StrategyKind)>,
}

impl StrategySelector {
    /// Compile the selector. Rules with an invalid pattern are skipped.
    pub fn from_config(config: &Config) -> Self {
        let overrides = config
            .applications
            .iter()
            .filter_map(|(id, app)| app.positioning_strategy.map(|s| (id.clone(), s)))
            .collect();

        let rules = config
            .strategy_rules
            .iter()
            .filter_map(|rule| match Regex::new(&rule.match_bundle_id) {
                Ok(re) => Some((re, rule.strategy)),
                Err(e) => {
                    tracing::warn!(
                        "Invalid regex in strategy rule match_bundle_id {}: {}",
                        rule.match_bundle_id,
                        e
                    );
                    None
                }
            })
            .collect();

        Self { overrides, rules }
    }

    pub fn select(&self, bundle_id: &str) -> StrategyKind {
        if let Some(kind) = self.overrides.get(bundle_id) {
            return *kind;
        }
        self.rules
            .iter()
            .find(|(re, _)| re.is_match(bundle_id))
            .map(|(_, kind)| *kind)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ApplicationConfig, StrategyRule};
    use quadpos_core_layout::Rect;
    use quadpos_platform::fixture::{FixtureApp, Snapshot};
    use quadpos_platform::FixturePlatform;

    fn platform(app: FixtureApp) -> FixturePlatform {
        FixturePlatform::new(Snapshot {
            applications: vec![app],
            ..Snapshot::default()
        })
    }

    fn chrome() -> FixtureApp {
        FixtureApp::new("Google Chrome", "com.google.Chrome", 42)
            .with_window(Rect::new(0, 0, 400, 300))
    }

    fn retry(attempts: u32) -> RetryStrategy {
        RetryStrategy {
            attempts,
            settle: Duration::ZERO,
        }
    }

    #[test]
    fn test_standard_confirmed() {
        let platform = platform(chrome());
        let strategy = StandardStrategy {
            verify: true,
            settle: Duration::ZERO,
        };
        let placement = strategy.place(&platform, 42, Point::new(3440, 0)).unwrap();
        assert_eq!(placement.attempts, 1);
        assert_eq!(
            placement.verification,
            Verification::Confirmed {
                actual: Point::new(3440, 0)
            }
        );
    }

    #[test]
    fn test_standard_reports_offset_without_retrying() {
        let platform = platform(chrome().with_drift(Point::new(0, 38), None));
        let strategy = StandardStrategy {
            verify: true,
            settle: Duration::ZERO,
        };
        let placement = strategy.place(&platform, 42, Point::new(100, 100)).unwrap();
        assert!(matches!(
            placement.verification,
            Verification::Offset { dx: 0, dy: 38, .. }
        ));
        assert_eq!(platform.moves().len(), 1);
    }

    #[test]
    fn test_standard_without_verification() {
        let platform = platform(chrome());
        let strategy = StandardStrategy {
            verify: false,
            settle: Duration::ZERO,
        };
        let placement = strategy.place(&platform, 42, Point::new(10, 10)).unwrap();
        assert_eq!(placement.verification, Verification::Unverified);
    }

    #[test]
    fn test_standard_rejection_is_error() {
        let platform = platform(chrome().rejecting(-25200, None));
        let strategy = StandardStrategy {
            verify: true,
            settle: Duration::ZERO,
        };
        let err = strategy.place(&platform, 42, Point::new(10, 10)).unwrap_err();
        assert!(matches!(err, PlatformError::Rejected { code: -25200 }));
    }

    #[test]
    fn test_retry_within_tolerance_first_time() {
        let platform = platform(chrome().with_drift(Point::new(20, 20), None));
        let placement = retry(3).place(&platform, 42, Point::new(1920, 0)).unwrap();
        assert_eq!(placement.attempts, 1);
        assert!(matches!(placement.verification, Verification::Confirmed { .. }));
    }

    #[test]
    fn test_retry_converges_after_drift() {
        let platform = platform(chrome().with_drift(Point::new(120, 0), Some(1)));
        let placement = retry(3).place(&platform, 42, Point::new(1920, 0)).unwrap();
        assert_eq!(placement.attempts, 2);
        assert_eq!(
            placement.verification,
            Verification::Confirmed {
                actual: Point::new(1920, 0)
            }
        );
    }

    #[test]
    fn test_retry_exhausted_offset_is_still_placed() {
        let platform = platform(chrome().with_drift(Point::new(0, 60), None));
        let placement = retry(3).place(&platform, 42, Point::new(0, 0)).unwrap();
        assert_eq!(placement.attempts, 3);
        assert_eq!(platform.moves().len(), 3);
        assert!(matches!(
            placement.verification,
            Verification::Offset { dy: 60, .. }
        ));
    }

    #[test]
    fn test_retry_survives_transient_rejection() {
        let platform = platform(chrome().rejecting(-25205, Some(2)));
        let placement = retry(3).place(&platform, 42, Point::new(5, 5)).unwrap();
        assert_eq!(placement.attempts, 3);
        assert!(matches!(placement.verification, Verification::Confirmed { .. }));
    }

    #[test]
    fn test_retry_all_rejected_is_error() {
        let platform = platform(chrome().rejecting(-25205, None));
        let err = retry(2).place(&platform, 42, Point::new(5, 5)).unwrap_err();
        assert!(matches!(err, PlatformError::Rejected { code: -25205 }));
        assert_eq!(platform.moves().len(), 2);
    }

    #[test]
    fn test_retry_unmeasurable_stops_after_first_accept() {
        let platform = platform(chrome().unmeasurable());
        let placement = retry(3).place(&platform, 42, Point::new(5, 5)).unwrap();
        assert_eq!(placement.attempts, 1);
        assert_eq!(placement.verification, Verification::Unverified);
    }

    #[test]
    fn test_zero_attempts_still_tries_once() {
        let platform = platform(chrome());
        let placement = retry(0).place(&platform, 42, Point::new(5, 5)).unwrap();
        assert_eq!(placement.attempts, 1);
    }

    #[test]
    fn test_selector_resolution_order() {
        let mut config = Config::default();
        config.applications.insert(
            "com.google.Chrome".to_string(),
            ApplicationConfig {
                positioning_strategy: Some(StrategyKind::Standard),
            },
        );
        config.strategy_rules = vec![
            StrategyRule {
                match_bundle_id: "^com\\.google\\.".to_string(),
                strategy: StrategyKind::Retry,
            },
            StrategyRule {
                match_bundle_id: "([".to_string(),
                strategy: StrategyKind::Retry,
            },
        ];

        let selector = StrategySelector::from_config(&config);
        assert_eq!(selector.select("com.google.Chrome"), StrategyKind::Standard);
        assert_eq!(selector.select("com.google.Chrome.canary"), StrategyKind::Retry);
        assert_eq!(selector.select("md.obsidian"), StrategyKind::Standard);
    }

    #[test]
    fn test_chrome_alias() {
        let kind: StrategyKind = serde_json::from_str("\"chrome\"").unwrap();
        assert_eq!(kind, StrategyKind::Retry);
        assert_eq!(serde_json::to_string(&kind).unwrap(), "\"retry\"");
        assert_eq!(kind.tolerance(), RETRY_TOLERANCE);
    }

    #[test]
    fn test_build_uses_behavior() {
        let behavior = BehaviorConfig::default();
        assert_eq!(build(StrategyKind::Standard, &behavior).kind(), StrategyKind::Standard);
        assert_eq!(build(StrategyKind::Retry, &behavior).kind(), StrategyKind::Retry);
    }
}
