//! Display naming.
//!
//! Derives a stable, human-readable identifier for a display from its
//! resolution and enumeration index. The name is a pure function of those
//! inputs, which lets two independent enumeration passes agree on it and
//! use it as a join key.

use crate::geometry::Resolution;

/// Name given to the built-in laptop panel regardless of its index.
pub const BUILTIN_DISPLAY_NAME: &str = "Built-in Retina Display_1";

/// Prefix shared by every built-in panel name.
const BUILTIN_PREFIX: &str = "Built-in";

/// How a known resolution is turned into a name.
enum Family {
    /// Always the same name.
    Fixed(&'static str),
    /// `<label>_Display_<index>`.
    Indexed(&'static str),
}

/// Resolutions with a dedicated family label.
const KNOWN_RESOLUTIONS: &[(i32, i32, Family)] = &[
    (2056, 1329, Family::Fixed(BUILTIN_DISPLAY_NAME)),
    (3840, 2160, Family::Indexed("4K")),
    (2560, 1440, Family::Indexed("QHD")),
    (3440, 1440, Family::Indexed("UltraWide")),
];

/// Derive the display name for a resolution at an enumeration index.
///
/// Known resolutions map to their family label; anything else becomes
/// `Display_<width>x<height>_<index>`. Origin and primary flag do not take
/// part, so the same panel keeps its name when the arrangement changes.
pub fn display_name(resolution: Resolution, index: usize) -> String {
    let known = KNOWN_RESOLUTIONS
        .iter()
        .find(|(w, h, _)| *w == resolution.width && *h == resolution.height);

    match known {
        Some((_, _, Family::Fixed(name))) => (*name).to_string(),
        Some((_, _, Family::Indexed(label))) => format!("{}_Display_{}", label, index),
        None => format!(
            "Display_{}x{}_{}",
            resolution.width, resolution.height, index
        ),
    }
}

/// Check whether a derived name denotes the built-in panel.
pub fn is_builtin_name(name: &str) -> bool {
    name.starts_with(BUILTIN_PREFIX)
}

/// Check whether a resolution is the built-in panel's resolution.
pub fn is_builtin_resolution(resolution: Resolution) -> bool {
    is_builtin_name(&display_name(resolution, 0))
}

/// Short hardware hint used in diagnostics ("[4K External]" and friends).
pub fn hardware_hint(resolution: Resolution) -> Option<&'static str> {
    match (resolution.width, resolution.height) {
        (2056, 1329) => Some("Built-in MacBook"),
        (3840, 2160) => Some("4K External"),
        (2560, 1440) => Some("2560x1440 External"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_name_ignores_index() {
        let res = Resolution::new(2056, 1329);
        assert_eq!(display_name(res, 0), BUILTIN_DISPLAY_NAME);
        assert_eq!(display_name(res, 3), BUILTIN_DISPLAY_NAME);
        assert!(is_builtin_resolution(res));
    }

    #[test]
    fn test_known_families_use_index() {
        assert_eq!(display_name(Resolution::new(3840, 2160), 1), "4K_Display_1");
        assert_eq!(display_name(Resolution::new(2560, 1440), 2), "QHD_Display_2");
        assert_eq!(
            display_name(Resolution::new(3440, 1440), 0),
            "UltraWide_Display_0"
        );
    }

    #[test]
    fn test_unknown_resolution_fallback() {
        assert_eq!(
            display_name(Resolution::new(1920, 1080), 4),
            "Display_1920x1080_4"
        );
        assert!(!is_builtin_resolution(Resolution::new(1920, 1080)));
    }

    #[test]
    fn test_naming_is_deterministic() {
        let res = Resolution::new(2560, 1440);
        assert_eq!(display_name(res, 1), display_name(res, 1));
        assert_ne!(display_name(res, 1), display_name(res, 2));
    }

    #[test]
    fn test_is_builtin_name() {
        assert!(is_builtin_name("Built-in Retina Display_1"));
        assert!(!is_builtin_name("4K_Display_1"));
    }

    #[test]
    fn test_hardware_hint() {
        assert_eq!(hardware_hint(Resolution::new(3840, 2160)), Some("4K External"));
        assert_eq!(hardware_hint(Resolution::new(1280, 800)), None);
    }
}
