//! Canonical display list.
//!
//! Wraps the basic and richer display sources. Enumeration failures are
//! absorbed here: callers get an empty list and a warning in the log, and
//! treat "no displays" as "nothing to position against".

use std::collections::BTreeSet;

use quadpos_core_layout::{enrich, translate, Display, RawDisplay, Resolution};
use quadpos_platform::{Capabilities, DisplayDetailsSource, DisplaySource};

pub struct DisplayService<'a> {
    basic: &'a dyn DisplaySource,
    details: Option<&'a dyn DisplayDetailsSource>,
}

impl<'a> DisplayService<'a> {
    pub fn new(caps: &Capabilities<'a>) -> Self {
        Self {
            basic: caps.displays,
            details: caps.details,
        }
    }

    /// Raw enumeration in arrangement space.
    pub fn raw(&self) -> Vec<RawDisplay> {
        match self.basic.displays() {
            Ok(displays) => displays,
            Err(e) => {
                tracing::warn!("Display enumeration failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Displays translated from the basic source only.
    pub fn basic(&self) -> Vec<Display> {
        translate(&self.raw())
    }

    /// Displays from the richer source joined to the basic translation.
    ///
    /// Falls back to [`DisplayService::basic`] when there is no richer
    /// source, or when it fails or reports nothing.
    pub fn canonical(&self) -> Vec<Display> {
        let basic = self.basic();
        let Some(details_source) = self.details else {
            return basic;
        };

        match details_source.display_details() {
            Ok(details) if !details.is_empty() => {
                let enriched = enrich(&basic, &details);
                for unmapped in enriched.iter().filter(|d| !d.mapped) {
                    tracing::warn!(
                        "No coordinate mapping for {}; using arrangement origin {}",
                        unmapped.name,
                        unmapped.arrangement_origin
                    );
                }
                enriched
            }
            Ok(_) => {
                tracing::debug!("Richer display source reported nothing; using basic source");
                basic
            }
            Err(e) => {
                tracing::warn!("Richer display source failed, using basic source: {}", e);
                basic
            }
        }
    }

    /// Resolutions of every connected display.
    pub fn current_resolutions(&self) -> BTreeSet<Resolution> {
        self.raw().iter().map(RawDisplay::resolution).collect()
    }
}
