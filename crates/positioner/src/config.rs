//! Configuration management for quadpos.
//!
//! Configuration is loaded from the first existing file among (in order):
//! 1. `<platform config dir>/config.yaml` (e.g. `~/Library/Application Support/quadpos`)
//! 2. `~/.config/quadpos/config.yaml`
//! 3. `./config.yaml`
//!
//! followed by the same three locations with `.yml` and `.toml` extensions.
//! YAML is the primary format; a `.toml` extension selects TOML.
//!
//! Files written before the `version` key existed (profiles carrying their
//! own `main_screen_quadrants`/`macbook_screen` layout) are migrated to the
//! current shape at load time.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use directories::ProjectDirs;
use quadpos_core_layout::{Layout, MatchPolicy, Profile, ProfileCatalog, RoleLayout, Size};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

use crate::strategy::StrategyKind;

/// Schema version written by this build.
pub const CURRENT_VERSION: u64 = 2;

/// Main configuration structure for quadpos.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Schema version.
    pub version: u64,
    /// How the connected displays are matched against profiles.
    pub matching: MatchPolicy,
    /// Profiles in document order.
    pub profiles: ProfileCatalog,
    /// Layout shared by every profile without its own.
    pub layout: Layout,
    /// Per-application settings keyed by bundle id.
    pub applications: BTreeMap<String, ApplicationConfig>,
    /// Strategy rules; the first matching rule wins.
    pub strategy_rules: Vec<StrategyRule>,
    /// Behavior configuration.
    pub behavior: BehaviorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CURRENT_VERSION,
            matching: MatchPolicy::default(),
            profiles: ProfileCatalog::default(),
            layout: Layout::default(),
            applications: BTreeMap::new(),
            strategy_rules: Vec::new(),
            behavior: BehaviorConfig::default(),
        }
    }
}

/// Settings for one application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Strategy used to place this application's window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub positioning_strategy: Option<StrategyKind>,
}

/// A rule selecting a strategy by bundle id.
///
/// # Example Config
///
/// ```yaml
/// strategy_rules:
///   - match_bundle_id: "^com\\.google\\.Chrome"
///     strategy: retry
///   - match_bundle_id: "^org\\.mozilla\\."
///     strategy: retry
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyRule {
    /// Regex pattern matched against the bundle id.
    pub match_bundle_id: String,
    /// Strategy used when the pattern matches.
    pub strategy: StrategyKind,
}

/// Behavior-related configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Delay after raising a window, before moving it.
    #[serde(default = "default_raise_settle")]
    pub raise_settle_ms: u64,

    /// Delay after moving a window, before reading its position back.
    #[serde(default = "default_verify_settle")]
    pub verify_settle_ms: u64,

    /// Whether to read positions back after placement.
    #[serde(default = "default_true")]
    pub verify: bool,

    /// Attempts made by the retry strategy.
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    /// Window size assumed when the real one cannot be measured.
    #[serde(default = "default_fallback_window")]
    pub fallback_window: Size,

    /// Inset removed from every display edge before splitting into quadrants.
    #[serde(default)]
    pub quadrant_padding: i32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            raise_settle_ms: default_raise_settle(),
            verify_settle_ms: default_verify_settle(),
            verify: true,
            retry_attempts: default_retry_attempts(),
            fallback_window: default_fallback_window(),
            quadrant_padding: 0,
        }
    }
}

impl BehaviorConfig {
    /// Quadrant padding as applied; negative values count as 0.
    pub fn padding(&self) -> i32 {
        self.quadrant_padding.max(0)
    }
}

// Default value functions for serde
fn default_log_level() -> String {
    "info".to_string()
}

fn default_raise_settle() -> u64 {
    50
}

fn default_verify_settle() -> u64 {
    100
}

fn default_true() -> bool {
    true
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_fallback_window() -> Size {
    quadpos_core_layout::FALLBACK_WINDOW_SIZE
}

/// File format, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// A problem found by [`Config::validate`]. Loading still succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigWarning {
    pub field: String,
    pub message: String,
}

impl ConfigWarning {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl Config {
    /// Find the configuration file in the standard locations.
    pub fn discover() -> Result<PathBuf> {
        let paths = config_paths();
        for path in &paths {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Ok(path.clone());
            }
        }

        let searched: Vec<String> = paths.iter().map(|p| p.display().to_string()).collect();
        bail!(
            "Configuration file not found (searched: {})",
            searched.join(", ")
        )
    }

    /// Load configuration from a specific path.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content, ConfigFormat::from_path(path))
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Parse configuration text, migrating older schemas.
    pub fn parse(content: &str, format: ConfigFormat) -> Result<Self> {
        let mut value: Value = match format {
            _ if content.trim().is_empty() => Value::Null,
            ConfigFormat::Yaml => serde_yaml::from_str(content)?,
            ConfigFormat::Toml => {
                let table: toml::Value = toml::from_str(content)?;
                serde_yaml::to_value(table)?
            }
        };
        if value.is_null() {
            value = Value::Mapping(Mapping::new());
        }

        let version = detect_version(&value);
        if version > CURRENT_VERSION {
            bail!(
                "Unsupported config version {} (this build understands up to {})",
                version,
                CURRENT_VERSION
            );
        }
        if version < CURRENT_VERSION {
            let rewrites = migrate_v1(&mut value);
            tracing::info!("Migrated legacy config ({} rewrites)", rewrites);
        }

        let config: Config = serde_yaml::from_value(value)?;
        Ok(config)
    }

    /// Serialize in the given format.
    pub fn render(&self, format: ConfigFormat) -> Result<String> {
        Ok(match format {
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        })
    }

    /// Write the configuration back to `path`.
    ///
    /// The file is written to a temporary sibling and renamed over the
    /// original, so readers never observe a partially written file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let mut canonical = self.clone();
        canonical.version = CURRENT_VERSION;
        let content = canonical.render(ConfigFormat::from_path(path))?;

        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)
            .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
        tmp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write config for {}", path.display()))?;
        tmp.persist(path)
            .with_context(|| format!("Failed to replace config file: {}", path.display()))?;

        tracing::info!("Config saved to {}", path.display());
        Ok(())
    }

    /// The layout in effect for a profile: its own, else the shared one.
    pub fn layout_for<'a>(&'a self, profile: &'a Profile) -> &'a Layout {
        profile.layout.as_ref().unwrap_or(&self.layout)
    }

    /// Check the configuration for problems that do not prevent loading.
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.profiles.is_empty() {
            warnings.push(ConfigWarning::new("profiles", "no profiles defined"));
        }

        for profile in self.profiles.iter() {
            for role in profile.duplicate_roles() {
                warnings.push(ConfigWarning::new(
                    format!("profiles.{}.monitors", profile.name),
                    format!("role '{}' appears more than once; the first entry is used", role),
                ));
            }

            let layout = self.layout_for(profile);
            for role in layout.keys() {
                if profile.monitor_for(*role).is_none() {
                    warnings.push(ConfigWarning::new(
                        format!("profiles.{}", profile.name),
                        format!("layout role '{}' has no monitor in this profile", role),
                    ));
                }
            }

            if self.matching == MatchPolicy::FirstMatch && profile.required_resolutions().is_empty()
            {
                let shadowed: Vec<&str> = self
                    .profiles
                    .iter()
                    .skip_while(|p| p.name != profile.name)
                    .skip(1)
                    .map(|p| p.name.as_str())
                    .collect();
                if !shadowed.is_empty() {
                    warnings.push(ConfigWarning::new(
                        format!("profiles.{}", profile.name),
                        format!(
                            "matches any display set and shadows: {}",
                            shadowed.join(", ")
                        ),
                    ));
                }
            }
        }

        for (index, rule) in self.strategy_rules.iter().enumerate() {
            if let Err(e) = Regex::new(&rule.match_bundle_id) {
                warnings.push(ConfigWarning::new(
                    format!("strategy_rules[{}].match_bundle_id", index),
                    format!("invalid regex, rule ignored: {}", e),
                ));
            }
        }

        if self.behavior.retry_attempts == 0 {
            warnings.push(ConfigWarning::new(
                "behavior.retry_attempts",
                "must be at least 1; using 1",
            ));
        }

        let fallback = self.behavior.fallback_window;
        if fallback.width <= 0 || fallback.height <= 0 {
            warnings.push(ConfigWarning::new(
                "behavior.fallback_window",
                format!("{} is not a valid size", fallback),
            ));
        }

        if self.behavior.quadrant_padding < 0 {
            warnings.push(ConfigWarning::new(
                "behavior.quadrant_padding",
                "negative padding; using 0",
            ));
        }

        warnings
    }
}

/// Schema version of an unparsed document.
///
/// Documents without a `version` key are version 1 when they use any legacy
/// construct and version 2 otherwise.
fn detect_version(value: &Value) -> u64 {
    if let Some(version) = value.get("version").and_then(Value::as_u64) {
        return version;
    }
    if has_legacy_shape(value) {
        1
    } else {
        CURRENT_VERSION
    }
}

const LEGACY_QUADRANTS_KEY: &str = "main_screen_quadrants";
const LEGACY_BUILTIN_KEY: &str = "macbook_screen";
const LEGACY_BUILTIN_RESOLUTION: &str = "macbook";

fn has_legacy_shape(value: &Value) -> bool {
    let Some(profiles) = value.get("profiles").and_then(Value::as_mapping) else {
        return false;
    };
    profiles.values().any(|profile| {
        let legacy_layout = profile
            .get("layout")
            .and_then(Value::as_mapping)
            .is_some_and(|l| {
                l.contains_key(LEGACY_QUADRANTS_KEY) || l.contains_key(LEGACY_BUILTIN_KEY)
            });
        let legacy_monitor = profile
            .get("monitors")
            .and_then(Value::as_sequence)
            .is_some_and(|monitors| {
                monitors.iter().any(|m| {
                    m.get("resolution").and_then(Value::as_str) == Some(LEGACY_BUILTIN_RESOLUTION)
                })
            });
        legacy_layout || legacy_monitor
    })
}

/// Rewrite a version 1 document into the version 2 shape in place.
///
/// Returns the number of rewritten entries.
pub fn migrate_v1(value: &mut Value) -> usize {
    let mut rewrites = 0;

    if let Some(profiles) = value.get_mut("profiles").and_then(Value::as_mapping_mut) {
        for (_, profile) in profiles.iter_mut() {
            if let Some(monitors) = profile.get_mut("monitors").and_then(Value::as_sequence_mut) {
                for monitor in monitors.iter_mut() {
                    if let Some(resolution) = monitor.get_mut("resolution") {
                        if resolution.as_str() == Some(LEGACY_BUILTIN_RESOLUTION) {
                            *resolution = Value::from(quadpos_core_layout::BUILTIN_PLACEHOLDER);
                            rewrites += 1;
                        }
                    }
                }
            }

            if let Some(layout) = profile.get_mut("layout").and_then(Value::as_mapping_mut) {
                if let Some(quadrants) = layout.remove(LEGACY_QUADRANTS_KEY) {
                    layout.insert(Value::from("primary"), quadrants);
                    rewrites += 1;
                }
                if let Some(regions) = layout.remove(LEGACY_BUILTIN_KEY) {
                    layout.insert(Value::from("builtin"), regions);
                    rewrites += 1;
                }
            }
        }
    }

    if let Some(root) = value.as_mapping_mut() {
        root.insert(Value::from("version"), Value::from(CURRENT_VERSION));
    }
    rewrites
}

/// Get all possible config file paths in priority order.
pub fn config_paths() -> Vec<PathBuf> {
    let mut dirs = Vec::new();

    // 1. Platform standard directory
    if let Some(proj_dirs) = ProjectDirs::from("com", "quadpos", "quadpos") {
        dirs.push(proj_dirs.config_dir().to_path_buf());
    }

    // 2. Unix-style: ~/.config/quadpos
    if let Some(home) = dirs_home() {
        dirs.push(home.join(".config").join("quadpos"));
    }

    // 3. Current directory
    dirs.push(PathBuf::new());

    let mut paths = Vec::new();
    for file in ["config.yaml", "config.yml", "config.toml"] {
        for dir in &dirs {
            let path = dir.join(file);
            if !paths.contains(&path) {
                paths.push(path);
            }
        }
    }
    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}
