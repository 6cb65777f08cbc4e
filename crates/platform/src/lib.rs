//! quadpos Platform
//!
//! The OS services quadpos consumes, expressed as traits so the placement
//! core can run against a real desktop or against a recorded snapshot.
//!
//! This crate handles:
//! - Display enumeration (basic and, optionally, a richer source)
//! - Running application enumeration
//! - Window control by process id (measure, raise, move)
//! - A JSON fixture backend usable on any OS
//! - A macOS backend (CoreGraphics + Accessibility)

use quadpos_core_layout::{DisplayDetails, Point, RawDisplay, Rect, Size};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod apps;
pub mod fixture;
#[cfg(target_os = "macos")]
pub mod macos;

pub use fixture::{FixturePlatform, MoveRecord};

/// Process identifier as used by the window-control service.
pub type Pid = u32;

/// Errors that can occur while talking to the OS.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Accessibility permission not granted")]
    PermissionDenied,

    #[error("No windows found for PID {pid}")]
    NoWindows { pid: Pid },

    #[error("Position command rejected (code: {code})")]
    Rejected { code: i32 },

    #[error("Window attribute unavailable: {0}")]
    Unavailable(String),

    #[error("Enumeration failed: {0}")]
    Enumeration(String),

    #[error("{0} is not supported on this platform")]
    Unsupported(&'static str),

    #[error("Fixture error: {0}")]
    Fixture(String),
}

/// A running application as reported by the process service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunningApp {
    /// Localized display name ("Google Chrome").
    pub name: String,
    /// Bundle or package identifier, when the application has one.
    #[serde(default)]
    pub bundle_id: Option<String>,
    pub pid: Pid,
}

/// Basic display enumeration in arrangement space.
pub trait DisplaySource {
    fn displays(&self) -> Result<Vec<RawDisplay>, PlatformError>;
}

/// Richer display enumeration (OS names, work areas).
pub trait DisplayDetailsSource {
    fn display_details(&self) -> Result<Vec<DisplayDetails>, PlatformError>;
}

/// Enumeration of running, non-hidden applications.
pub trait ProcessSource {
    fn running_apps(&self) -> Result<Vec<RunningApp>, PlatformError>;
}

/// Control over an application's first window.
///
/// Every operation addresses the first window of the process. When the
/// process is not trusted for accessibility control, every operation fails
/// with [`PlatformError::PermissionDenied`].
pub trait WindowControl {
    /// Whether this process may control other applications' windows.
    fn is_trusted(&self) -> bool;

    /// Current frame of the first window, in positioning space.
    fn window_frame(&self, pid: Pid) -> Result<Rect, PlatformError>;

    /// Current size of the first window.
    fn window_size(&self, pid: Pid) -> Result<Size, PlatformError> {
        self.window_frame(pid).map(|r| r.size())
    }

    /// Bring the first window to the front.
    fn raise(&self, pid: Pid) -> Result<(), PlatformError>;

    /// Move the first window's top-left corner to `position`.
    ///
    /// A non-zero OS result code is reported as [`PlatformError::Rejected`].
    fn set_position(&self, pid: Pid, position: Point) -> Result<(), PlatformError>;
}

/// A complete set of OS collaborators.
pub trait Backend {
    /// Short name used in diagnostics ("macos", "fixture").
    fn name(&self) -> &'static str;

    fn display_source(&self) -> &dyn DisplaySource;

    /// The richer display source, when this backend has one.
    fn details_source(&self) -> Option<&dyn DisplayDetailsSource>;

    fn processes(&self) -> &dyn ProcessSource;

    fn windows(&self) -> &dyn WindowControl;
}

/// Borrowed capability handles handed to the placement core.
///
/// Each handle can be substituted independently; the richer display source
/// is optional and callers branch on its presence.
#[derive(Clone, Copy)]
pub struct Capabilities<'a> {
    pub displays: &'a dyn DisplaySource,
    pub details: Option<&'a dyn DisplayDetailsSource>,
    pub processes: &'a dyn ProcessSource,
    pub windows: &'a dyn WindowControl,
}

impl<'a> Capabilities<'a> {
    pub fn from_backend(backend: &'a dyn Backend) -> Self {
        Self {
            displays: backend.display_source(),
            details: backend.details_source(),
            processes: backend.processes(),
            windows: backend.windows(),
        }
    }

    /// The same capabilities without the richer display source.
    pub fn basic_only(self) -> Self {
        Self {
            details: None,
            ..self
        }
    }
}

/// The backend for the operating system this binary was built for.
pub fn native_backend() -> Result<Box<dyn Backend>, PlatformError> {
    #[cfg(target_os = "macos")]
    {
        Ok(Box::new(macos::MacosPlatform::new()))
    }

    #[cfg(not(target_os = "macos"))]
    {
        tracing::warn!("No native backend for this OS; use a fixture snapshot");
        Err(PlatformError::Unsupported("native display and window control"))
    }
}
