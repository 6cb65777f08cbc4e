//! Placement runs.
//!
//! A run selects a profile, resolves every monitor role of its layout to a
//! connected display, and then walks the layout one application slot at a
//! time. Slots are independent: whatever happens to one is recorded in the
//! report and the run moves on to the next.

use std::thread;
use std::time::{Duration, Instant};

use quadpos_core_layout::{
    align_or_estimate, hardware_hint, identify_display, match_profile, partition, Display,
    MonitorRole, MonitorSpec, Point, Profile, Quadrant, Rect, ResolutionSpec, RoleLayout,
};
use quadpos_platform::{Capabilities, PlatformError, RunningApp};

use crate::config::Config;
use crate::displays::DisplayService;
use crate::report::{
    FailureReason, PlacementReport, RoleTarget, RunAbort, SkipReason, SlotOutcome, SlotReport,
    Verification,
};
use crate::strategy::{self, StrategySelector};

/// Runs placements for one configuration against one set of capabilities.
pub struct Positioner<'a> {
    config: &'a Config,
    caps: Capabilities<'a>,
    selector: StrategySelector,
}

/// Where the entries of one role go.
enum RoleResolution<'d> {
    Target(&'d Display),
    Skip(SkipReason),
}

impl<'a> Positioner<'a> {
    pub fn new(config: &'a Config, caps: Capabilities<'a>) -> Self {
        Self {
            config,
            caps,
            selector: StrategySelector::from_config(config),
        }
    }

    fn display_service(&self) -> DisplayService<'a> {
        DisplayService::new(&self.caps)
    }

    /// The canonical display list.
    pub fn list_displays(&self) -> Vec<Display> {
        self.display_service().canonical()
    }

    /// Name of the profile matching the connected displays, if any.
    pub fn detect_profile(&self) -> Option<String> {
        let current = self.display_service().current_resolutions();
        tracing::debug!(
            "Current resolutions: {}",
            current
                .iter()
                .map(|r| r.to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );

        let profile = match_profile(&self.config.profiles, &current, self.config.matching)?;
        tracing::debug!("Detected profile: {}", profile.name);
        Some(profile.name.clone())
    }

    /// Running applications, or none when enumeration fails.
    fn running_apps(&self) -> Vec<RunningApp> {
        match self.caps.processes.running_apps() {
            Ok(apps) => apps,
            Err(e) => {
                tracing::warn!("Failed to enumerate running applications: {}", e);
                Vec::new()
            }
        }
    }

    /// Place every application of a profile's layout.
    ///
    /// With no name, the profile is detected from the connected displays.
    pub fn position(&self, profile_name: Option<&str>) -> PlacementReport {
        let started = Instant::now();

        let profile = match profile_name {
            Some(name) => match self.config.profiles.get(name) {
                Some(profile) => profile,
                None => {
                    tracing::error!("Profile '{}' not found in configuration", name);
                    return PlacementReport::abort_with(
                        RunAbort::UnknownProfile {
                            name: name.to_string(),
                        },
                        None,
                    );
                }
            },
            None => {
                let detected = self
                    .detect_profile()
                    .and_then(|name| self.config.profiles.get(&name));
                match detected {
                    Some(profile) => profile,
                    None => {
                        tracing::warn!(
                            "No matching profile found for current monitor configuration"
                        );
                        return PlacementReport::abort_with(RunAbort::NoMatchingProfile, None);
                    }
                }
            }
        };
        tracing::info!("Positioning applications for profile: {}", profile.name);

        let permission_denied = !self.caps.windows.is_trusted();
        if permission_denied {
            tracing::error!("Accessibility permission not granted; no window will be moved");
        }

        let displays = self.list_displays();
        let apps = if permission_denied {
            Vec::new()
        } else {
            self.running_apps()
        };

        let mut targets = Vec::new();
        let mut slots = Vec::new();

        for (role, role_layout) in self.config.layout_for(profile) {
            let role = *role;
            let resolution = self.resolve_role(profile, role, &displays);
            if let RoleResolution::Target(target) = &resolution {
                targets.push(RoleTarget {
                    role,
                    display: target.name.clone(),
                    resolution: target.resolution,
                    main_display: target.is_primary,
                });
            }

            match role_layout {
                RoleLayout::Quadrants(entries) => {
                    let padding = self.config.behavior.padding();
                    if let RoleResolution::Target(target) = &resolution {
                        let name = &target.name;
                        for (quadrant, rect) in partition(target.frame(), padding).iter() {
                            tracing::debug!("{} {}: {}", name, quadrant, rect);
                        }
                    }

                    for (quadrant, bundle_id) in entries {
                        let outcome = match &resolution {
                            RoleResolution::Skip(reason) => SlotOutcome::Skipped(reason.clone()),
                            RoleResolution::Target(_) if permission_denied => {
                                SlotOutcome::Skipped(SkipReason::PermissionDenied)
                            }
                            RoleResolution::Target(target) => self.place_slot(
                                &apps,
                                bundle_id,
                                *quadrant,
                                partition(target.frame(), padding).get(*quadrant),
                                target,
                                &displays,
                            ),
                        };
                        slots.push(SlotReport {
                            role,
                            quadrant: Some(*quadrant),
                            bundle_id: bundle_id.clone(),
                            app_name: find_app(&apps, bundle_id).map(|a| a.name.clone()),
                            outcome,
                        });
                    }
                }
                RoleLayout::Regions(entries) => {
                    for bundle_id in entries {
                        let reason = match &resolution {
                            RoleResolution::Skip(reason) => reason.clone(),
                            RoleResolution::Target(_) => {
                                tracing::debug!(
                                    "{} is listed for role {} without a quadrant; not placed",
                                    bundle_id,
                                    role
                                );
                                SkipReason::NoQuadrantRegion
                            }
                        };
                        slots.push(SlotReport {
                            role,
                            quadrant: None,
                            bundle_id: bundle_id.clone(),
                            app_name: find_app(&apps, bundle_id).map(|a| a.name.clone()),
                            outcome: SlotOutcome::Skipped(reason),
                        });
                    }
                }
            }
        }

        let report = PlacementReport {
            profile: Some(profile.name.clone()),
            aborted: None,
            permission_denied,
            targets,
            slots,
            duration: started.elapsed(),
        };
        tracing::info!("{}", report);
        report
    }

    /// Find the connected display a role of the profile refers to.
    fn resolve_role<'d>(
        &self,
        profile: &Profile,
        role: MonitorRole,
        displays: &'d [Display],
    ) -> RoleResolution<'d> {
        let Some(spec) = profile.monitor_for(role) else {
            tracing::warn!(
                "Profile '{}' has no monitor for role '{}'; skipping its applications",
                profile.name,
                role
            );
            return RoleResolution::Skip(SkipReason::RoleNotInProfile { role });
        };

        match find_target(spec, displays) {
            Some(target) => {
                tracing::debug!(
                    "Role {} -> {} at {}",
                    role,
                    target.name,
                    target.positioning_origin
                );
                if role == MonitorRole::Primary && !target.is_primary {
                    tracing::warn!(
                        "{} is used as the primary role but is not the main display; \
                         windows may be kept within the main display's bounds",
                        target.name
                    );
                }
                RoleResolution::Target(target)
            }
            None => {
                tracing::warn!(
                    "No connected display for role '{}' ({}); skipping its applications",
                    role,
                    spec.resolution
                );
                RoleResolution::Skip(SkipReason::MissingDisplay {
                    role,
                    resolution: spec.resolution.to_string(),
                })
            }
        }
    }

    /// Move one application into its quadrant.
    fn place_slot(
        &self,
        apps: &[RunningApp],
        bundle_id: &str,
        quadrant: Quadrant,
        region: Rect,
        monitor: &Display,
        displays: &[Display],
    ) -> SlotOutcome {
        let Some(app) = find_app(apps, bundle_id) else {
            tracing::warn!("Application {} not found or not running", bundle_id);
            return SlotOutcome::Skipped(SkipReason::NotRunning);
        };
        let windows = self.caps.windows;
        let behavior = &self.config.behavior;

        if let Err(e) = windows.raise(app.pid) {
            tracing::debug!("Could not raise {} (PID {}): {}", app.name, app.pid, e);
        }
        settle(Duration::from_millis(behavior.raise_settle_ms));

        let size = match windows.window_size(app.pid) {
            Ok(size) => Some(size),
            Err(e) => {
                tracing::debug!(
                    "No window size for {} ({}); estimating {}",
                    app.name,
                    e,
                    behavior.fallback_window
                );
                None
            }
        };
        let target = align_or_estimate(region, quadrant, size, behavior.fallback_window);
        tracing::debug!(
            "{} -> {} {} region {}, aligned to {}",
            app.name,
            monitor.name,
            quadrant,
            region,
            target
        );

        let kind = self.selector.select(bundle_id);
        let strategy = strategy::build(kind, behavior);
        match strategy.place(windows, app.pid, target) {
            Ok(placement) => {
                let landed = landed_point(&placement.verification).and_then(|actual| {
                    identify_display(displays, actual, Some(monitor.name.as_str()))
                });
                log_verification(&app.name, &placement.verification, landed);
                let landed_on = landed.map(|d| d.name.clone());

                SlotOutcome::Placed {
                    target,
                    strategy: kind,
                    attempts: placement.attempts,
                    verification: placement.verification,
                    landed_on,
                }
            }
            Err(e) => {
                tracing::warn!("Failed to position {}: {}", app.name, e);
                SlotOutcome::Failed(failure_reason(e))
            }
        }
    }
}

fn find_app<'r>(apps: &'r [RunningApp], bundle_id: &str) -> Option<&'r RunningApp> {
    apps.iter()
        .find(|app| app.bundle_id.as_deref() == Some(bundle_id))
}

/// The first display a monitor entry describes.
///
/// The built-in placeholder matches by derived name. For an explicit
/// resolution a primary display is preferred when the role is primary.
fn find_target<'d>(spec: &MonitorSpec, displays: &'d [Display]) -> Option<&'d Display> {
    match spec.resolution {
        ResolutionSpec::Builtin => displays.iter().find(|d| d.is_builtin()),
        ResolutionSpec::Exact(resolution) => {
            let mut candidates = displays.iter().filter(|d| d.resolution == resolution);
            if spec.role == MonitorRole::Primary {
                let all: Vec<&Display> = candidates.collect();
                all.iter()
                    .find(|d| d.is_primary)
                    .or_else(|| all.first())
                    .copied()
            } else {
                candidates.next()
            }
        }
    }
}

fn landed_point(verification: &Verification) -> Option<Point> {
    match verification {
        Verification::Confirmed { actual } | Verification::Offset { actual, .. } => Some(*actual),
        Verification::Unverified => None,
    }
}

/// Name of a display with its hardware hint, as in "4K_Display_0 [4K External]".
fn describe_display(monitor: &Display) -> String {
    match hardware_hint(monitor.resolution) {
        Some(hint) => format!("{} [{}]", monitor.name, hint),
        None => monitor.name.clone(),
    }
}

fn log_verification(app: &str, verification: &Verification, landed_on: Option<&Display>) {
    let on = landed_on
        .map(describe_display)
        .unwrap_or_else(|| "no display".to_string());
    match verification {
        Verification::Confirmed { actual } => {
            tracing::debug!("{} is at {} on {}", app, actual, on);
        }
        Verification::Offset { actual, dx, dy } => {
            tracing::debug!(
                "{} is at {} on {}, off target by {}px/{}px",
                app,
                actual,
                on,
                dx,
                dy
            );
        }
        Verification::Unverified => {
            tracing::debug!("{} position could not be read back", app);
        }
    }
}

fn failure_reason(error: PlatformError) -> FailureReason {
    match error {
        PlatformError::Rejected { code } => FailureReason::Rejected { code },
        PlatformError::NoWindows { .. } => FailureReason::NoWindows,
        other => FailureReason::Platform {
            message: other.to_string(),
        },
    }
}

fn settle(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadpos_core_layout::{translate, RawDisplay, Resolution};

    fn displays() -> Vec<Display> {
        translate(&[
            RawDisplay {
                index: 0,
                stable_id: None,
                width: 2056,
                height: 1329,
                x: 0,
                y: 0,
                is_primary: false,
            },
            RawDisplay {
                index: 1,
                stable_id: None,
                width: 3840,
                height: 2160,
                x: 0,
                y: 1329,
                is_primary: true,
            },
        ])
    }

    #[test]
    fn test_builtin_placeholder_matches_panel() {
        let displays = displays();
        let spec = MonitorSpec::new(ResolutionSpec::Builtin, MonitorRole::Builtin);
        let target = find_target(&spec, &displays).unwrap();
        assert!(target.is_builtin());
    }

    #[test]
    fn test_exact_resolution_target() {
        let displays = displays();
        let spec = MonitorSpec::new(
            ResolutionSpec::Exact(Resolution::new(3840, 2160)),
            MonitorRole::Primary,
        );
        assert_eq!(find_target(&spec, &displays).unwrap().name, "4K_Display_1");

        let spec = MonitorSpec::new(
            ResolutionSpec::Exact(Resolution::new(2560, 1440)),
            MonitorRole::Right,
        );
        assert!(find_target(&spec, &displays).is_none());
    }

    #[test]
    fn test_failure_reason_mapping() {
        assert_eq!(
            failure_reason(PlatformError::Rejected { code: -25200 }),
            FailureReason::Rejected { code: -25200 }
        );
        assert_eq!(
            failure_reason(PlatformError::NoWindows { pid: 7 }),
            FailureReason::NoWindows
        );
        assert!(matches!(
            failure_reason(PlatformError::PermissionDenied),
            FailureReason::Platform { .. }
        ));
    }

    #[test]
    fn test_describe_display_adds_hint() {
        let displays = displays();
        assert_eq!(
            describe_display(&displays[1]),
            "4K_Display_1 [4K External]"
        );
        assert_eq!(
            describe_display(&displays[0]),
            "Built-in Retina Display_1 [Built-in MacBook]"
        );
    }

    #[test]
    fn test_landed_point() {
        let actual = Point::new(10, 20);
        assert_eq!(landed_point(&Verification::Confirmed { actual }), Some(actual));
        assert_eq!(landed_point(&Verification::Unverified), None);
    }
}
