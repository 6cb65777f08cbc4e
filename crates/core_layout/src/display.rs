//! Display geometry translation.
//!
//! Operating systems report display origins in an *arrangement* space whose
//! origin is the bottom-left corner of the primary display, with y growing
//! upwards. Window placement happens in a *positioning* space whose origin is
//! the top-left corner of the primary display, with y growing downwards.
//!
//! [`translate`] converts a raw enumeration into canonical [`Display`]s, and
//! [`enrich`] merges a second, richer enumeration into that result.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::{Point, Rect, Resolution};
use crate::naming::{display_name, is_builtin_name};

/// One display as reported by the basic enumeration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawDisplay {
    /// Ordinal among currently enumerated displays.
    pub index: usize,
    /// Platform identifier that survives re-enumeration, if the OS has one.
    #[serde(default)]
    pub stable_id: Option<String>,
    pub width: i32,
    pub height: i32,
    /// Origin in arrangement space (bottom-left origin).
    pub x: i32,
    pub y: i32,
    pub is_primary: bool,
}

impl RawDisplay {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// One display as reported by the richer enumeration source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayDetails {
    pub index: usize,
    #[serde(default)]
    pub stable_id: Option<String>,
    /// OS-provided display name ("LEN P24h-20").
    pub os_name: String,
    pub width: i32,
    pub height: i32,
    /// Origin in arrangement space.
    pub x: i32,
    pub y: i32,
    pub is_primary: bool,
    /// Usable area excluding menu bar and dock, when reported.
    #[serde(default)]
    pub work_area: Option<Rect>,
}

impl DisplayDetails {
    pub fn resolution(&self) -> Resolution {
        Resolution::new(self.width, self.height)
    }
}

/// Where a canonical display's metrics came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionSource {
    /// The basic enumeration, translated directly.
    Basic,
    /// The richer enumeration, joined to the basic translation.
    Enhanced,
}

impl fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetectionSource::Basic => f.write_str("basic"),
            DetectionSource::Enhanced => f.write_str("enhanced"),
        }
    }
}

/// Where a display sits relative to the primary display in positioning space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    Primary,
    Above,
    Below,
    LeftOf,
    RightOf,
    Overlapping,
}

impl Relation {
    /// Classify a positioning origin.
    ///
    /// Vertical placement wins over horizontal placement: a display that is
    /// both above and to the left is reported as `Above`.
    pub fn classify(is_primary: bool, positioning: Point) -> Self {
        if is_primary {
            Relation::Primary
        } else if positioning.y < 0 {
            Relation::Above
        } else if positioning.y > 0 {
            Relation::Below
        } else if positioning.x < 0 {
            Relation::LeftOf
        } else if positioning.x > 0 {
            Relation::RightOf
        } else {
            Relation::Overlapping
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Relation::Primary => "primary",
            Relation::Above => "above_primary",
            Relation::Below => "below_primary",
            Relation::LeftOf => "left_of_primary",
            Relation::RightOf => "right_of_primary",
            Relation::Overlapping => "overlapping_primary",
        };
        f.write_str(s)
    }
}

/// A connected display in canonical form.
///
/// Recomputed from scratch on every query; nothing here is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Display {
    pub index: usize,
    /// Derived name, see [`crate::naming::display_name`].
    pub name: String,
    #[serde(default)]
    pub stable_id: Option<String>,
    /// OS-provided name, only known from the richer source.
    #[serde(default)]
    pub os_name: Option<String>,
    pub resolution: Resolution,
    pub arrangement_origin: Point,
    pub positioning_origin: Point,
    pub is_primary: bool,
    #[serde(default)]
    pub work_area: Option<Rect>,
    pub source: DetectionSource,
    /// False when the positioning origin could not be derived and the
    /// arrangement origin was used as-is.
    pub mapped: bool,
}

impl Display {
    /// Relation to the primary display, derived from the positioning origin.
    pub fn relation(&self) -> Relation {
        Relation::classify(self.is_primary, self.positioning_origin)
    }

    /// Full display rectangle in positioning space.
    pub fn frame(&self) -> Rect {
        Rect::from_origin_size(self.positioning_origin, self.resolution.size())
    }

    /// Whether this is the built-in laptop panel.
    pub fn is_builtin(&self) -> bool {
        is_builtin_name(&self.name)
    }
}

/// Index of the display acting as primary.
///
/// The first display flagged primary wins; if none is flagged, the first
/// enumerated display is used.
fn primary_position(raw: &[RawDisplay]) -> Option<usize> {
    if raw.is_empty() {
        return None;
    }
    Some(raw.iter().position(|d| d.is_primary).unwrap_or(0))
}

/// Translate an arrangement-space origin to positioning space.
///
/// `primary_height` is the height of the primary display's frame. Only the
/// sign of the arrangement y takes part: a display reported above the
/// baseline in arrangement space lands a full display height above the
/// primary, one reported below lands directly under it.
pub fn to_positioning(arrangement: Point, height: i32, primary_height: i32) -> Point {
    let y = if arrangement.y > 0 {
        -height
    } else if arrangement.y < 0 {
        primary_height
    } else {
        0
    };
    Point::new(arrangement.x, y)
}

/// Convert a raw enumeration into canonical displays.
///
/// The primary display always lands at the positioning origin. An empty
/// input yields an empty output: "no displays" is a valid, non-fatal answer.
pub fn translate(raw: &[RawDisplay]) -> Vec<Display> {
    let Some(primary_pos) = primary_position(raw) else {
        return Vec::new();
    };
    let primary_height = raw[primary_pos].height;

    raw.iter()
        .enumerate()
        .map(|(pos, d)| {
            let is_primary = pos == primary_pos;
            let arrangement = Point::new(d.x, d.y);
            let positioning = if is_primary {
                Point::new(0, 0)
            } else {
                to_positioning(arrangement, d.height, primary_height)
            };

            Display {
                index: d.index,
                name: display_name(d.resolution(), d.index),
                stable_id: d.stable_id.clone(),
                os_name: None,
                resolution: d.resolution(),
                arrangement_origin: arrangement,
                positioning_origin: positioning,
                is_primary,
                work_area: None,
                source: DetectionSource::Basic,
                mapped: true,
            }
        })
        .collect()
}

/// Find the basic translation entry that corresponds to a richer entry.
///
/// When both sides carry a stable id that is the only key used. Otherwise
/// the derived name is compared, which is best-effort: two identically sized
/// displays can only be told apart by their enumeration index.
fn find_mapping<'a>(
    basic: &'a [Display],
    details: &DisplayDetails,
    name: &str,
) -> Option<&'a Display> {
    basic.iter().find(|b| match (&b.stable_id, &details.stable_id) {
        (Some(a), Some(b_id)) => a == b_id,
        _ => b.name == name,
    })
}

/// Merge the richer enumeration into the basic translation.
///
/// Each richer entry keeps its own arrangement metrics and work area and
/// borrows the positioning origin of its basic counterpart. Entries without
/// a counterpart fall back to their arrangement origin and are marked
/// unmapped.
pub fn enrich(basic: &[Display], details: &[DisplayDetails]) -> Vec<Display> {
    details
        .iter()
        .map(|d| {
            let name = display_name(d.resolution(), d.index);
            let arrangement = Point::new(d.x, d.y);
            let mapping = find_mapping(basic, d, &name);

            Display {
                index: d.index,
                stable_id: d.stable_id.clone(),
                os_name: Some(d.os_name.clone()),
                resolution: d.resolution(),
                arrangement_origin: arrangement,
                positioning_origin: mapping.map_or(arrangement, |m| m.positioning_origin),
                is_primary: d.is_primary,
                work_area: d.work_area,
                source: DetectionSource::Enhanced,
                mapped: mapping.is_some(),
                name,
            }
        })
        .collect()
}

/// Find the display whose positioning frame contains a point.
///
/// When frames overlap, `prefer` (a derived name) breaks the tie; otherwise
/// the first match in enumeration order wins.
pub fn identify_display<'a>(
    displays: &'a [Display],
    point: Point,
    prefer: Option<&str>,
) -> Option<&'a Display> {
    let mut first = None;
    for display in displays.iter().filter(|d| d.frame().contains(point)) {
        if prefer.is_some_and(|p| p == display.name) {
            return Some(display);
        }
        first.get_or_insert(display);
    }
    first
}

#[cfg(test)]
mod tests {
    use super::*;

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

    /// MacBook as primary with a 4K monitor stacked above it.
    fn laptop_with_4k_above() -> Vec<RawDisplay> {
        vec![
            raw(0, 2056, 1329, 0, 0, true),
            raw(1, 3840, 2160, 0, 1329, false),
        ]
    }

    #[test]
    fn test_primary_always_at_origin() {
        let raws = vec![
            raw(0, 3840, 2160, 0, 1329, false),
            raw(1, 2056, 1329, 500, -300, true),
        ];
        let displays = translate(&raws);
        let primary = displays.iter().find(|d| d.is_primary).unwrap();
        assert_eq!(primary.positioning_origin, Point::new(0, 0));
        assert_eq!(primary.arrangement_origin, Point::new(500, -300));
        assert_eq!(primary.relation(), Relation::Primary);
    }

    #[test]
    fn test_display_above_in_arrangement_goes_negative() {
        let displays = translate(&laptop_with_4k_above());
        let external = &displays[1];
        assert_eq!(external.positioning_origin, Point::new(0, -2160));
        assert_eq!(external.relation(), Relation::Above);
        assert_eq!(external.name, "4K_Display_1");
    }

    #[test]
    fn test_display_below_in_arrangement_lands_under_primary() {
        let raws = vec![
            raw(0, 3840, 2160, 0, 0, true),
            raw(1, 2056, 1329, 800, -1329, false),
        ];
        let displays = translate(&raws);
        assert_eq!(displays[1].positioning_origin, Point::new(800, 2160));
        assert_eq!(displays[1].relation(), Relation::Below);
    }

    #[test]
    fn test_side_by_side_relations() {
        let raws = vec![
            raw(0, 2056, 1329, 0, 0, true),
            raw(1, 2560, 1440, -2560, 0, false),
            raw(2, 1920, 1080, 2056, 0, false),
            raw(3, 1920, 1080, 0, 0, false),
        ];
        let displays = translate(&raws);
        assert_eq!(displays[1].positioning_origin, Point::new(-2560, 0));
        assert_eq!(displays[1].relation(), Relation::LeftOf);
        assert_eq!(displays[2].relation(), Relation::RightOf);
        assert_eq!(displays[3].relation(), Relation::Overlapping);
    }

    #[test]
    fn test_relation_follows_sign_pattern() {
        assert_eq!(Relation::classify(false, Point::new(-100, -5)), Relation::Above);
        assert_eq!(Relation::classify(false, Point::new(100, 5)), Relation::Below);
        assert_eq!(Relation::classify(false, Point::new(-1, 0)), Relation::LeftOf);
        assert_eq!(Relation::classify(false, Point::new(1, 0)), Relation::RightOf);
        assert_eq!(Relation::classify(false, Point::new(0, 0)), Relation::Overlapping);
        assert_eq!(Relation::classify(true, Point::new(-1, -1)), Relation::Primary);
    }

    #[test]
    fn test_empty_enumeration_translates_to_nothing() {
        assert!(translate(&[]).is_empty());
    }

    #[test]
    fn test_missing_primary_flag_uses_first_display() {
        let raws = vec![
            raw(0, 3840, 2160, 0, 0, false),
            raw(1, 2056, 1329, 0, -1329, false),
        ];
        let displays = translate(&raws);
        assert!(displays[0].is_primary);
        assert!(!displays[1].is_primary);
        assert_eq!(displays[1].positioning_origin, Point::new(0, 2160));
    }

    #[test]
    fn test_enrich_joins_by_name() {
        let basic = translate(&laptop_with_4k_above());
        let details = vec![
            DisplayDetails {
                index: 0,
                stable_id: None,
                os_name: "Built-in Retina Display".to_string(),
                width: 2056,
                height: 1329,
                x: 0,
                y: 0,
                is_primary: true,
                work_area: Some(Rect::new(0, 0, 2056, 1290)),
            },
            DisplayDetails {
                index: 1,
                stable_id: None,
                os_name: "SAMSUNG".to_string(),
                width: 3840,
                height: 2160,
                x: 0,
                y: 1329,
                is_primary: false,
                work_area: None,
            },
        ];

        let displays = enrich(&basic, &details);
        assert_eq!(displays.len(), 2);
        assert!(displays.iter().all(|d| d.mapped));
        assert_eq!(displays[1].positioning_origin, Point::new(0, -2160));
        assert_eq!(displays[1].os_name.as_deref(), Some("SAMSUNG"));
        assert_eq!(displays[1].source, DetectionSource::Enhanced);
        assert_eq!(displays[0].work_area, Some(Rect::new(0, 0, 2056, 1290)));
    }

    #[test]
    fn test_enrich_prefers_stable_id() {
        let mut raws = laptop_with_4k_above();
        raws[0].stable_id = Some("1".to_string());
        raws[1].stable_id = Some("2".to_string());
        let basic = translate(&raws);

        // Richer source enumerates in a different order, so names differ.
        let details = vec![DisplayDetails {
            index: 0,
            stable_id: Some("2".to_string()),
            os_name: "SAMSUNG".to_string(),
            width: 3840,
            height: 2160,
            x: 0,
            y: 1329,
            is_primary: false,
            work_area: None,
        }];

        let displays = enrich(&basic, &details);
        assert!(displays[0].mapped);
        assert_eq!(displays[0].name, "4K_Display_0");
        assert_eq!(displays[0].positioning_origin, Point::new(0, -2160));
    }

    #[test]
    fn test_enrich_unmapped_falls_back_to_arrangement() {
        let basic = translate(&laptop_with_4k_above());
        let details = vec![DisplayDetails {
            index: 5,
            stable_id: None,
            os_name: "Projector".to_string(),
            width: 1280,
            height: 720,
            x: -1280,
            y: 200,
            is_primary: false,
            work_area: None,
        }];

        let displays = enrich(&basic, &details);
        assert!(!displays[0].mapped);
        assert_eq!(displays[0].positioning_origin, Point::new(-1280, 200));
    }

    #[test]
    fn test_identify_display_prefers_named() {
        let mut displays = translate(&laptop_with_4k_above());
        assert_eq!(
            identify_display(&displays, Point::new(10, -10), None).map(|d| d.name.as_str()),
            Some("4K_Display_1")
        );
        assert_eq!(
            identify_display(&displays, Point::new(10, 10), None).map(|d| d.name.as_str()),
            Some("Built-in Retina Display_1")
        );
        assert!(identify_display(&displays, Point::new(5000, 5000), None).is_none());

        // Force an overlap and check the preference wins.
        displays[1].positioning_origin = Point::new(0, 0);
        let hit = identify_display(&displays, Point::new(10, 10), Some("4K_Display_1")).unwrap();
        assert_eq!(hit.name, "4K_Display_1");
        let hit = identify_display(&displays, Point::new(10, 10), None).unwrap();
        assert!(hit.is_builtin());
    }
}
