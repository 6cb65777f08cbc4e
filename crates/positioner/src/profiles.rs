//! Profile generation from the connected displays.

use std::path::Path;

use anyhow::{Context, Result};
use quadpos_core_layout::{Display, MonitorRole, MonitorSpec, ResolutionSpec};
use serde::Serialize;

use crate::config::Config;

/// Monitor entries describing the connected displays.
///
/// The built-in panel becomes the `builtin` placeholder, the primary display
/// is recorded by resolution, and the display at enumeration index 1 becomes
/// `left` or `right` depending on which side of the primary it sits in the
/// arrangement. Any further displays are not described.
pub fn suggest_monitors(displays: &[Display]) -> Vec<MonitorSpec> {
    displays
        .iter()
        .filter_map(|monitor| {
            if monitor.is_builtin() {
                Some(MonitorSpec::new(ResolutionSpec::Builtin, MonitorRole::Builtin))
            } else if monitor.is_primary {
                Some(MonitorSpec::new(
                    ResolutionSpec::Exact(monitor.resolution),
                    MonitorRole::Primary,
                ))
            } else if monitor.index == 1 {
                let role = if monitor.arrangement_origin.x < 0 {
                    MonitorRole::Left
                } else {
                    MonitorRole::Right
                };
                Some(MonitorSpec::new(ResolutionSpec::Exact(monitor.resolution), role))
            } else {
                tracing::debug!("{} is not described by the generated profile", monitor.name);
                None
            }
        })
        .collect()
}

#[derive(Serialize)]
struct Snippet<'a> {
    monitors: &'a [MonitorSpec],
}

/// YAML snippet for a profile's `monitors`, indented for pasting under
/// `profiles:`.
pub fn render_snippet(profile_name: &str, monitors: &[MonitorSpec]) -> Result<String> {
    let body = serde_yaml::to_string(&Snippet { monitors })
        .context("Failed to render profile snippet")?;

    let mut out = format!("{}:\n", profile_name);
    for line in body.lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    Ok(out)
}

/// Replace a profile's monitors and write the configuration back.
///
/// A missing profile is created with no layout of its own, so it uses the
/// shared layout. An existing profile keeps its layout.
pub fn update_profile(
    config: &mut Config,
    path: &Path,
    profile_name: &str,
    monitors: Vec<MonitorSpec>,
) -> Result<()> {
    let existed = config.profiles.get(profile_name).is_some();
    config.profiles.upsert_monitors(profile_name, monitors);
    config
        .save(path)
        .with_context(|| format!("Failed to update profile '{}'", profile_name))?;

    if existed {
        tracing::info!("Profile '{}' updated", profile_name);
    } else {
        tracing::info!("Profile '{}' created", profile_name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use quadpos_core_layout::{translate, RawDisplay, Resolution};

    fn raw(index: usize, width: i32, height: i32, x: i32, y: i32, is_primary: bool) -> RawDisplay {
        RawDisplay {
            index,
            stable_id: None,
            width,
            height,
            x,
            y,
            is_primary,
        }
    }

    #[test]
    fn test_suggest_external_primary_with_laptop() {
        let displays = translate(&[
            raw(0, 3840, 2160, 0, 0, true),
            raw(1, 2056, 1329, 900, -1329, false),
        ]);
        let monitors = suggest_monitors(&displays);
        assert_eq!(
            monitors,
            vec![
                MonitorSpec::new(
                    ResolutionSpec::Exact(Resolution::new(3840, 2160)),
                    MonitorRole::Primary
                ),
                MonitorSpec::new(ResolutionSpec::Builtin, MonitorRole::Builtin),
            ]
        );
    }

    #[test]
    fn test_suggest_side_display() {
        let displays = translate(&[
            raw(0, 2056, 1329, 0, 0, true),
            raw(1, 2560, 1440, -2560, 0, false),
            raw(2, 3440, 1440, 2056, 0, false),
        ]);
        let monitors = suggest_monitors(&displays);
        assert_eq!(monitors.len(), 2);
        assert_eq!(monitors[0].role, MonitorRole::Builtin);
        assert_eq!(monitors[1].role, MonitorRole::Left);

        let displays = translate(&[
            raw(0, 2056, 1329, 0, 0, true),
            raw(1, 2560, 1440, 2056, 0, false),
        ]);
        assert_eq!(suggest_monitors(&displays)[1].role, MonitorRole::Right);
    }

    #[test]
    fn test_snippet_is_nested_under_profile() {
        let snippet = render_snippet(
            "office",
            &[MonitorSpec::new(ResolutionSpec::Builtin, MonitorRole::Builtin)],
        )
        .unwrap();
        assert!(snippet.starts_with("office:\n  monitors:\n"));
        assert!(snippet.contains("resolution: builtin"));
        assert!(snippet.contains("position: builtin"));
    }

    #[test]
    fn test_update_profile_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        let mut config = Config::default();

        let monitors = vec![MonitorSpec::new(
            ResolutionSpec::Exact(Resolution::new(3840, 2160)),
            MonitorRole::Primary,
        )];
        update_profile(&mut config, &path, "desk", monitors.clone()).unwrap();

        let reloaded = Config::load_from_path(&path).unwrap();
        assert_eq!(reloaded.profiles.get("desk").unwrap().monitors, monitors);
        assert!(reloaded.profiles.get("desk").unwrap().layout.is_none());
    }
}
