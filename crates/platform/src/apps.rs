//! Running application filtering.
//!
//! Backends report every process they can see as an [`AppEntry`]. Only
//! regular applications (those with a Dock presence) that are not hidden
//! are candidates for placement.

use crate::{Pid, RunningApp};

/// One process as reported by a backend, before filtering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppEntry {
    pub name: Option<String>,
    pub bundle_id: Option<String>,
    pub pid: Pid,
    /// Regular activation policy: shows in the Dock and may own windows.
    pub regular: bool,
    pub hidden: bool,
}

impl AppEntry {
    fn into_visible(self) -> Option<RunningApp> {
        if !self.regular || self.hidden {
            return None;
        }
        Some(RunningApp {
            name: self.name?,
            bundle_id: self.bundle_id.filter(|b| !b.is_empty()),
            pid: self.pid,
        })
    }
}

/// Regular, non-hidden applications with a name, in reported order.
pub fn visible_apps(entries: impl IntoIterator<Item = AppEntry>) -> Vec<RunningApp> {
    entries
        .into_iter()
        .filter_map(AppEntry::into_visible)
        .collect()
}
