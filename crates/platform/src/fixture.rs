//! Snapshot-driven backend.
//!
//! Loads a JSON description of a desktop (displays, running applications and
//! their first windows) and answers every collaborator call from it. Moves
//! are applied to the in-memory windows and recorded, so a run can be
//! inspected afterwards. Used by the test-suite and by `--fixture` dry runs.

use std::cell::RefCell;
use std::path::Path;

use quadpos_core_layout::{DisplayDetails, Point, RawDisplay, Rect};
use serde::{Deserialize, Serialize};

use crate::apps::{visible_apps, AppEntry};
use crate::{
    Backend, DisplayDetailsSource, DisplaySource, Pid, PlatformError, ProcessSource, RunningApp,
    WindowControl,
};

fn default_true() -> bool {
    true
}

/// A recorded desktop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Accessibility trust; defaults to granted.
    #[serde(default = "default_true")]
    pub trusted: bool,
    #[serde(default)]
    pub displays: Vec<RawDisplay>,
    /// Richer display source; absent means the backend has none.
    #[serde(default)]
    pub details: Option<Vec<DisplayDetails>>,
    #[serde(default)]
    pub fail_displays: bool,
    #[serde(default)]
    pub fail_details: bool,
    #[serde(default)]
    pub fail_processes: bool,
    #[serde(default)]
    pub applications: Vec<FixtureApp>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self {
            trusted: true,
            displays: Vec::new(),
            details: None,
            fail_displays: false,
            fail_details: false,
            fail_processes: false,
            applications: Vec::new(),
        }
    }
}

/// A running application and its first window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureApp {
    pub name: String,
    #[serde(default)]
    pub bundle_id: Option<String>,
    pub pid: Pid,
    #[serde(default)]
    pub hidden: bool,
    /// First window frame in positioning space; absent means no windows.
    #[serde(default)]
    pub window: Option<Rect>,
    /// False when the window's frame cannot be read back.
    #[serde(default = "default_true")]
    pub measurable: bool,
    /// Offset the window manager adds to every requested position.
    #[serde(default)]
    pub drift: Point,
    /// Only the first `n` moves drift; all of them when absent.
    #[serde(default)]
    pub drift_moves: Option<u32>,
    /// Result code returned for rejected moves.
    #[serde(default)]
    pub reject_code: Option<i32>,
    /// Only the first `n` moves are rejected; all of them when absent.
    #[serde(default)]
    pub reject_moves: Option<u32>,
}

impl FixtureApp {
    pub fn new(name: impl Into<String>, bundle_id: impl Into<String>, pid: Pid) -> Self {
        Self {
            name: name.into(),
            bundle_id: Some(bundle_id.into()),
            pid,
            hidden: false,
            window: None,
            measurable: true,
            drift: Point::default(),
            drift_moves: None,
            reject_code: None,
            reject_moves: None,
        }
    }

    pub fn with_window(mut self, frame: Rect) -> Self {
        self.window = Some(frame);
        self
    }

    pub fn unmeasurable(mut self) -> Self {
        self.measurable = false;
        self
    }

    pub fn with_drift(mut self, drift: Point, moves: Option<u32>) -> Self {
        self.drift = drift;
        self.drift_moves = moves;
        self
    }

    pub fn rejecting(mut self, code: i32, moves: Option<u32>) -> Self {
        self.reject_code = Some(code);
        self.reject_moves = moves;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }
}

/// One placement request seen by the fixture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRecord {
    pub pid: Pid,
    pub requested: Point,
    pub accepted: bool,
}

#[derive(Debug)]
struct WindowState {
    frame: Option<Rect>,
    moves: u32,
}

/// Backend answering from a [`Snapshot`].
#[derive(Debug)]
pub struct FixturePlatform {
    snapshot: Snapshot,
    windows: RefCell<Vec<WindowState>>,
    moves: RefCell<Vec<MoveRecord>>,
    raises: RefCell<Vec<Pid>>,
}

impl FixturePlatform {
    pub fn new(snapshot: Snapshot) -> Self {
        let windows = snapshot
            .applications
            .iter()
            .map(|app| WindowState {
                frame: app.window,
                moves: 0,
            })
            .collect();
        Self {
            snapshot,
            windows: RefCell::new(windows),
            moves: RefCell::new(Vec::new()),
            raises: RefCell::new(Vec::new()),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, PlatformError> {
        let snapshot: Snapshot =
            serde_json::from_str(json).map_err(|e| PlatformError::Fixture(e.to_string()))?;
        Ok(Self::new(snapshot))
    }

    pub fn load(path: &Path) -> Result<Self, PlatformError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PlatformError::Fixture(format!("{}: {}", path.display(), e)))?;
        tracing::debug!("Loaded fixture snapshot from {}", path.display());
        Self::from_json(&content)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Every placement request, in order.
    pub fn moves(&self) -> Vec<MoveRecord> {
        self.moves.borrow().clone()
    }

    /// Every raised pid, in order.
    pub fn raises(&self) -> Vec<Pid> {
        self.raises.borrow().clone()
    }

    /// Current frame of a pid's first window.
    pub fn frame_of(&self, pid: Pid) -> Option<Rect> {
        let pos = self.position_of(pid)?;
        self.windows.borrow()[pos].frame
    }

    fn position_of(&self, pid: Pid) -> Option<usize> {
        self.snapshot.applications.iter().position(|a| a.pid == pid)
    }

    /// Locate a pid's app, enforcing trust and window presence.
    fn window_index(&self, pid: Pid) -> Result<usize, PlatformError> {
        if !self.snapshot.trusted {
            return Err(PlatformError::PermissionDenied);
        }
        let pos = self
            .position_of(pid)
            .ok_or(PlatformError::NoWindows { pid })?;
        if self.windows.borrow()[pos].frame.is_none() {
            return Err(PlatformError::NoWindows { pid });
        }
        Ok(pos)
    }
}

impl DisplaySource for FixturePlatform {
    fn displays(&self) -> Result<Vec<RawDisplay>, PlatformError> {
        if self.snapshot.fail_displays {
            return Err(PlatformError::Enumeration("fixture display failure".to_string()));
        }
        Ok(self.snapshot.displays.clone())
    }
}

impl DisplayDetailsSource for FixturePlatform {
    fn display_details(&self) -> Result<Vec<DisplayDetails>, PlatformError> {
        if self.snapshot.fail_details {
            return Err(PlatformError::Enumeration("fixture details failure".to_string()));
        }
        Ok(self.snapshot.details.clone().unwrap_or_default())
    }
}

impl ProcessSource for FixturePlatform {
    fn running_apps(&self) -> Result<Vec<RunningApp>, PlatformError> {
        if self.snapshot.fail_processes {
            return Err(PlatformError::Enumeration("fixture process failure".to_string()));
        }
        Ok(visible_apps(self.snapshot.applications.iter().map(|a| {
            AppEntry {
                name: Some(a.name.clone()),
                bundle_id: a.bundle_id.clone(),
                pid: a.pid,
                regular: true,
                hidden: a.hidden,
            }
        })))
    }
}

impl WindowControl for FixturePlatform {
    fn is_trusted(&self) -> bool {
        self.snapshot.trusted
    }

    fn window_frame(&self, pid: Pid) -> Result<Rect, PlatformError> {
        let pos = self.window_index(pid)?;
        if !self.snapshot.applications[pos].measurable {
            return Err(PlatformError::Unavailable(format!("frame of PID {}", pid)));
        }
        self.windows.borrow()[pos]
            .frame
            .ok_or(PlatformError::NoWindows { pid })
    }

    fn raise(&self, pid: Pid) -> Result<(), PlatformError> {
        self.window_index(pid)?;
        self.raises.borrow_mut().push(pid);
        Ok(())
    }

    fn set_position(&self, pid: Pid, position: Point) -> Result<(), PlatformError> {
        let pos = self.window_index(pid)?;
        let app = &self.snapshot.applications[pos];
        let mut windows = self.windows.borrow_mut();
        let state = &mut windows[pos];
        let attempt = state.moves;
        state.moves += 1;

        if let Some(code) = app.reject_code {
            if app.reject_moves.map_or(true, |n| attempt < n) {
                self.moves.borrow_mut().push(MoveRecord {
                    pid,
                    requested: position,
                    accepted: false,
                });
                return Err(PlatformError::Rejected { code });
            }
        }

        let drifts = app.drift_moves.map_or(true, |n| attempt < n);
        let landed = if drifts {
            Point::new(position.x + app.drift.x, position.y + app.drift.y)
        } else {
            position
        };
        if let Some(frame) = state.frame.as_mut() {
            frame.x = landed.x;
            frame.y = landed.y;
        }
        self.moves.borrow_mut().push(MoveRecord {
            pid,
            requested: position,
            accepted: true,
        });
        Ok(())
    }
}

impl Backend for FixturePlatform {
    fn name(&self) -> &'static str {
        "fixture"
    }

    fn display_source(&self) -> &dyn DisplaySource {
        self
    }

    fn details_source(&self) -> Option<&dyn DisplayDetailsSource> {
        if self.snapshot.details.is_some() {
            Some(self)
        } else {
            None
        }
    }

    fn processes(&self) -> &dyn ProcessSource {
        self
    }

    fn windows(&self) -> &dyn WindowControl {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample() -> Snapshot {
        Snapshot {
            trusted: true,
            displays: vec![RawDisplay {
                index: 0,
                stable_id: None,
                width: 3840,
                height: 2160,
                x: 0,
                y: 0,
                is_primary: true,
            }],
            applications: vec![
                FixtureApp::new("Google Chrome", "com.google.Chrome", 101)
                    .with_window(Rect::new(100, 100, 800, 600)),
                FixtureApp::new("Finder", "com.apple.finder", 102).hidden(),
            ],
            ..Snapshot::default()
        }
    }

    #[test]
    fn test_hidden_apps_not_listed() {
        let platform = FixturePlatform::new(sample());
        let apps = platform.running_apps().unwrap();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].bundle_id.as_deref(), Some("com.google.Chrome"));
    }

    #[test]
    fn test_set_position_moves_window() {
        let platform = FixturePlatform::new(sample());
        platform.set_position(101, Point::new(1920, 0)).unwrap();
        assert_eq!(platform.frame_of(101), Some(Rect::new(1920, 0, 800, 600)));
        assert_eq!(platform.moves().len(), 1);
        assert!(platform.moves()[0].accepted);
    }

    #[test]
    fn test_drift_limited_to_first_moves() {
        let mut snapshot = sample();
        snapshot.applications[0] = snapshot.applications[0]
            .clone()
            .with_drift(Point::new(40, 0), Some(1));
        let platform = FixturePlatform::new(snapshot);

        platform.set_position(101, Point::new(0, 0)).unwrap();
        assert_eq!(platform.window_frame(101).unwrap().origin(), Point::new(40, 0));
        platform.set_position(101, Point::new(0, 0)).unwrap();
        assert_eq!(platform.window_frame(101).unwrap().origin(), Point::new(0, 0));
    }

    #[test]
    fn test_rejection_reports_code() {
        let mut snapshot = sample();
        snapshot.applications[0] = snapshot.applications[0].clone().rejecting(-25200, None);
        let platform = FixturePlatform::new(snapshot);

        let err = platform.set_position(101, Point::new(0, 0)).unwrap_err();
        assert!(matches!(err, PlatformError::Rejected { code: -25200 }));
        assert_eq!(platform.frame_of(101), Some(Rect::new(100, 100, 800, 600)));
        assert!(!platform.moves()[0].accepted);
    }

    #[test]
    fn test_untrusted_fails_every_window_call() {
        let mut snapshot = sample();
        snapshot.trusted = false;
        let platform = FixturePlatform::new(snapshot);
        assert!(matches!(platform.raise(101), Err(PlatformError::PermissionDenied)));
        assert!(matches!(platform.window_size(101), Err(PlatformError::PermissionDenied)));
        assert!(matches!(
            platform.set_position(101, Point::new(0, 0)),
            Err(PlatformError::PermissionDenied)
        ));
    }

    #[test]
    fn test_unknown_pid_has_no_windows() {
        let platform = FixturePlatform::new(sample());
        assert!(matches!(
            platform.window_frame(999),
            Err(PlatformError::NoWindows { pid: 999 })
        ));
    }

    #[test]
    fn test_details_presence_follows_snapshot() {
        let platform = FixturePlatform::new(sample());
        assert!(platform.display_details().unwrap().is_empty());
        assert!(platform.details_source().is_none());

        let mut snapshot = sample();
        snapshot.details = Some(Vec::new());
        let platform = FixturePlatform::new(snapshot);
        assert!(platform.details_source().is_some());
    }

    #[test]
    fn test_load_from_file() {
        let json = r#"{
            "displays": [
                {"index": 0, "width": 2056, "height": 1329, "x": 0, "y": 0, "is_primary": true}
            ],
            "applications": [{"name": "Obsidian", "bundle_id": "md.obsidian", "pid": 7}]
        }"#;
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();

        let platform = FixturePlatform::load(file.path()).unwrap();
        assert!(platform.is_trusted());
        assert_eq!(platform.displays().unwrap().len(), 1);
        assert!(matches!(
            platform.window_frame(7),
            Err(PlatformError::NoWindows { pid: 7 })
        ));
    }

    #[test]
    fn test_malformed_fixture() {
        assert!(matches!(
            FixturePlatform::from_json("{ not json"),
            Err(PlatformError::Fixture(_))
        ));
    }
}
