//! Profiles and profile matching.
//!
//! A profile names an expected monitor topology: which resolutions must be
//! connected, and which role each one plays. The layout attached to a role
//! says which application goes where on that monitor.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::geometry::Resolution;
use crate::naming::is_builtin_resolution;
use crate::quadrant::Quadrant;
use crate::LayoutError;

/// Placeholder written in place of a resolution for the built-in panel.
pub const BUILTIN_PLACEHOLDER: &str = "builtin";

/// The role a monitor plays within a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorRole {
    Primary,
    Builtin,
    Left,
    Right,
    Above,
    Below,
}

impl MonitorRole {
    pub const ALL: [MonitorRole; 6] = [
        MonitorRole::Primary,
        MonitorRole::Builtin,
        MonitorRole::Left,
        MonitorRole::Right,
        MonitorRole::Above,
        MonitorRole::Below,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MonitorRole::Primary => "primary",
            MonitorRole::Builtin => "builtin",
            MonitorRole::Left => "left",
            MonitorRole::Right => "right",
            MonitorRole::Above => "above",
            MonitorRole::Below => "below",
        }
    }
}

impl fmt::Display for MonitorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MonitorRole {
    type Err = LayoutError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MonitorRole::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| LayoutError::UnknownRole(s.to_string()))
    }
}

/// A monitor entry's resolution: either a concrete one or the built-in panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ResolutionSpec {
    /// The laptop panel, assumed always connected.
    Builtin,
    Exact(Resolution),
}

impl TryFrom<String> for ResolutionSpec {
    type Error = LayoutError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == BUILTIN_PLACEHOLDER {
            Ok(ResolutionSpec::Builtin)
        } else {
            value.parse().map(ResolutionSpec::Exact)
        }
    }
}

impl From<ResolutionSpec> for String {
    fn from(spec: ResolutionSpec) -> Self {
        spec.to_string()
    }
}

impl fmt::Display for ResolutionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolutionSpec::Builtin => f.write_str(BUILTIN_PLACEHOLDER),
            ResolutionSpec::Exact(res) => res.fmt(f),
        }
    }
}

/// One monitor entry of a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorSpec {
    pub resolution: ResolutionSpec,
    /// Role of the monitor. Spelled `position` in configuration files.
    #[serde(rename = "position")]
    pub role: MonitorRole,
}

impl MonitorSpec {
    pub fn new(resolution: ResolutionSpec, role: MonitorRole) -> Self {
        Self { resolution, role }
    }
}

/// What to put on one monitor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleLayout {
    /// One application per quadrant.
    Quadrants(BTreeMap<Quadrant, String>),
    /// Applications without an assigned quadrant.
    Regions(Vec<String>),
}

/// Layout for every monitor role, iterated in role order.
pub type Layout = BTreeMap<MonitorRole, RoleLayout>;

/// A named monitor-topology template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub name: String,
    pub monitors: Vec<MonitorSpec>,
    /// Per-profile layout overriding the shared one.
    pub layout: Option<Layout>,
}

/// Serialized body of a profile; the name is the map key.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileBody {
    #[serde(default)]
    monitors: Vec<MonitorSpec>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    layout: Option<Layout>,
}

impl Profile {
    pub fn new(name: impl Into<String>, monitors: Vec<MonitorSpec>) -> Self {
        Self {
            name: name.into(),
            monitors,
            layout: None,
        }
    }

    /// Resolutions that must be connected for this profile to apply.
    ///
    /// Built-in placeholders are left out; the panel is assumed present.
    pub fn required_resolutions(&self) -> BTreeSet<Resolution> {
        self.monitors
            .iter()
            .filter_map(|m| match m.resolution {
                ResolutionSpec::Exact(res) => Some(res),
                ResolutionSpec::Builtin => None,
            })
            .collect()
    }

    /// The monitor entry for a role. The first entry wins on duplicates.
    pub fn monitor_for(&self, role: MonitorRole) -> Option<&MonitorSpec> {
        self.monitors.iter().find(|m| m.role == role)
    }

    /// Roles that appear more than once.
    pub fn duplicate_roles(&self) -> Vec<MonitorRole> {
        let mut seen = BTreeSet::new();
        let mut dups = BTreeSet::new();
        for m in &self.monitors {
            if !seen.insert(m.role) {
                dups.insert(m.role);
            }
        }
        dups.into_iter().collect()
    }
}

/// Profiles in configured order.
///
/// Serialized as a map keyed by profile name. Document order is preserved,
/// since first-match selection depends on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileCatalog {
    profiles: Vec<Profile>,
}

impl ProfileCatalog {
    pub fn new(profiles: Vec<Profile>) -> Self {
        Self { profiles }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.iter()
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Profile> {
        self.profiles.iter_mut().find(|p| p.name == name)
    }

    /// Replace a profile's monitors, appending a new profile if absent.
    pub fn upsert_monitors(&mut self, name: &str, monitors: Vec<MonitorSpec>) {
        match self.get_mut(name) {
            Some(profile) => profile.monitors = monitors,
            None => self.profiles.push(Profile::new(name, monitors)),
        }
    }

    pub fn as_slice(&self) -> &[Profile] {
        &self.profiles
    }
}

impl Serialize for ProfileCatalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.profiles.len()))?;
        for profile in &self.profiles {
            let body = ProfileBody {
                monitors: profile.monitors.clone(),
                layout: profile.layout.clone(),
            };
            map.serialize_entry(&profile.name, &body)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for ProfileCatalog {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct CatalogVisitor;

        impl<'de> Visitor<'de> for CatalogVisitor {
            type Value = ProfileCatalog;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of profile names to profiles")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut profiles: Vec<Profile> = Vec::new();
                while let Some((name, body)) = access.next_entry::<String, ProfileBody>()? {
                    if profiles.iter().any(|p| p.name == name) {
                        return Err(serde::de::Error::custom(format!(
                            "duplicate profile '{}'",
                            name
                        )));
                    }
                    profiles.push(Profile {
                        name,
                        monitors: body.monitors,
                        layout: body.layout,
                    });
                }
                Ok(ProfileCatalog { profiles })
            }
        }

        deserializer.deserialize_map(CatalogVisitor)
    }
}

/// How the current display set is matched against profiles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// First profile (in catalog order) whose requirements are all connected.
    #[default]
    FirstMatch,
    /// Among subset matches, the one requiring the most resolutions.
    /// Catalog order breaks ties.
    MostSpecific,
    /// Requirements must equal the connected external resolutions.
    Exact,
}

/// Select the profile matching the connected resolutions.
///
/// `current` is the set of connected resolutions; duplicates are already
/// collapsed by the set. A profile with no external requirements matches any
/// set, so under [`MatchPolicy::FirstMatch`] it shadows every profile listed
/// after it.
pub fn match_profile<'a>(
    catalog: &'a ProfileCatalog,
    current: &BTreeSet<Resolution>,
    policy: MatchPolicy,
) -> Option<&'a Profile> {
    let is_subset = |p: &&Profile| p.required_resolutions().is_subset(current);

    match policy {
        MatchPolicy::FirstMatch => catalog.iter().find(is_subset),
        MatchPolicy::MostSpecific => catalog
            .iter()
            .filter(is_subset)
            .fold(None, |best: Option<&Profile>, p| match best {
                Some(b) if b.required_resolutions().len() >= p.required_resolutions().len() => {
                    Some(b)
                }
                _ => Some(p),
            }),
        MatchPolicy::Exact => {
            let external: BTreeSet<Resolution> = current
                .iter()
                .copied()
                .filter(|r| !is_builtin_resolution(*r))
                .collect();
            catalog
                .iter()
                .find(|p| p.required_resolutions() == external)
        }
    }
}
