//! Static sprite-sheet metadata for a character type.
//!
//! ```text
//! sprite/
//! ├── mod.rs        CharacterSpec: sheets, geometry, timing, behaviour hooks
//! ├── animation.rs  Animator: frame stepping and background offsets
//! ├── state.rs      typestate phases of the action sequence
//! ├── character.rs  Character: one live entity tying the above together
//! └── roster.rs     Roster: validated specs keyed by type identifier
//! ```
pub mod animation;
pub mod character;
pub mod roster;
pub mod state;

use crate::engine::{Facing, Millis, Point, Rect, Size};
use crate::error::{EngineError, SpecError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimationName {
    Idle,
    Run,
    Entrance,
    Attack,
    Attack2,
    Hurt,
    Death,
}

impl AnimationName {
    pub const ALL: [AnimationName; 7] = [
        AnimationName::Idle,
        AnimationName::Run,
        AnimationName::Entrance,
        AnimationName::Attack,
        AnimationName::Attack2,
        AnimationName::Hurt,
        AnimationName::Death,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AnimationName::Idle => "idle",
            AnimationName::Run => "run",
            AnimationName::Entrance => "entrance",
            AnimationName::Attack => "attack",
            AnimationName::Attack2 => "attack2",
            AnimationName::Hurt => "hurt",
            AnimationName::Death => "death",
        }
    }

    /// Looping animations repeat until replaced; the rest play once.
    pub fn is_looping(self) -> bool {
        matches!(self, AnimationName::Idle | AnimationName::Run)
    }

    /// What to play instead when a character has no sheet for `self`.
    fn fallback(self) -> Option<AnimationName> {
        match self {
            AnimationName::Attack2 => Some(AnimationName::Attack),
            AnimationName::Run => Some(AnimationName::Idle),
            _ => None,
        }
    }
}

impl fmt::Display for AnimationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AnimationName {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnimationName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| EngineError::UnrecognizedAnimation(s.to_string()))
    }
}

/// How frames are arranged on the sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Layout {
    /// One row, left to right.
    #[default]
    Strip,
    /// Row-major grid.
    Grid { columns: u32, rows: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameGeometry {
    pub frame_width: f64,
    pub frame_height: f64,
    pub frame_count: u32,
    #[serde(default)]
    pub layout: Layout,
}

impl FrameGeometry {
    /// (column, row) of frame `index`.
    pub fn cell(&self, index: u32) -> (u32, u32) {
        match self.layout {
            Layout::Strip => (index, 0),
            Layout::Grid { columns, .. } => (index % columns, index / columns),
        }
    }

    /// Background offset that shows frame `index` through a frame-sized window.
    pub fn offset(&self, index: u32, scale: f64) -> Point {
        let (col, row) = self.cell(index);
        Point {
            x: -(f64::from(col) * self.frame_width * scale),
            y: -(f64::from(row) * self.frame_height * scale),
        }
    }

    /// Size of the whole sheet at `scale`.
    pub fn sheet_size(&self, scale: f64) -> Size {
        let (columns, rows) = match self.layout {
            Layout::Strip => (self.frame_count, 1),
            Layout::Grid { columns, rows } => (columns, rows),
        };
        Size {
            width: f64::from(columns) * self.frame_width * scale,
            height: f64::from(rows) * self.frame_height * scale,
        }
    }

    pub fn frame_size(&self, scale: f64) -> Size {
        Size {
            width: self.frame_width * scale,
            height: self.frame_height * scale,
        }
    }
}

/// One named animation of a character.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetSpec {
    pub image: String,
    pub geometry: FrameGeometry,
    pub frame_duration_ms: u32,
    /// Frame at which the strike lands; publishes a damage event once per run.
    #[serde(default)]
    pub hit_frame: Option<u32>,
}

impl SheetSpec {
    pub fn duration_ms(&self) -> Millis {
        Millis::from(self.geometry.frame_count) * Millis::from(self.frame_duration_ms)
    }
}

/// Where an attacker stands relative to its target's hitbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Anchor {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Approach {
    pub anchor: Anchor,
    #[serde(default)]
    pub gap: f64,
}

impl Approach {
    /// Horizontal position to strike from.
    pub fn horizontal_offset(&self, target: &Rect) -> f64 {
        let edge = match self.anchor {
            Anchor::Left => target.left(),
            Anchor::Center => target.center_x(),
            Anchor::Right => target.right(),
        };
        edge + self.gap
    }
}

/// Chance to chain another strike before walking back.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FollowUp {
    pub chance: f64,
    #[serde(default = "FollowUp::default_repeats")]
    pub max_repeats: u8,
}

impl FollowUp {
    fn default_repeats() -> u8 {
        1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionTiming {
    pub advance_ms: u32,
    pub retreat_ms: u32,
    pub flee_ms: u32,
}

impl Default for MotionTiming {
    fn default() -> Self {
        MotionTiming {
            advance_ms: 300,
            retreat_ms: 200,
            flee_ms: 600,
        }
    }
}

/// Per-type hooks layered on the shared engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Behaviour {
    pub approach: Approach,
    #[serde(default)]
    pub follow_up: Option<FollowUp>,
    /// Health ratio at or below which the character runs off instead of recoiling.
    #[serde(default)]
    pub flee_below: Option<f64>,
    #[serde(default = "Behaviour::default_flee_distance")]
    pub flee_distance: f64,
    #[serde(default)]
    pub death_fade_ms: Option<u32>,
    #[serde(default)]
    pub motion: MotionTiming,
}

impl Behaviour {
    fn default_flee_distance() -> f64 {
        800.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cues {
    pub spawn: Option<String>,
    pub attack: Option<String>,
    pub hurt: Option<String>,
    pub death: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterSpec {
    pub kind: String,
    pub max_health: u32,
    #[serde(default = "CharacterSpec::default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub vertical_offset: f64,
    #[serde(default)]
    pub facing: Facing,
    pub sheets: BTreeMap<AnimationName, SheetSpec>,
    pub behaviour: Behaviour,
    #[serde(default)]
    pub cues: Cues,
}

impl CharacterSpec {
    const REQUIRED: [AnimationName; 2] = [AnimationName::Idle, AnimationName::Death];

    fn default_scale() -> f64 {
        1.0
    }

    pub fn has(&self, name: AnimationName) -> bool {
        self.sheets.contains_key(&name)
    }

    pub fn sheet(&self, name: AnimationName) -> Result<&SheetSpec, EngineError> {
        self.sheets
            .get(&name)
            .ok_or_else(|| EngineError::UnknownAnimation {
                kind: self.kind.clone(),
                animation: name,
            })
    }

    /// `name` if present, otherwise its fallback chain.
    pub fn resolve(&self, name: AnimationName) -> Option<AnimationName> {
        let mut candidate = Some(name);
        while let Some(current) = candidate {
            if self.has(current) {
                return Some(current);
            }
            candidate = current.fallback();
        }
        None
    }

    pub fn validate(&self) -> Result<(), SpecError> {
        let kind = || self.kind.clone();
        if !(self.scale > 0.0) {
            return Err(SpecError::BadScale {
                kind: kind(),
                scale: self.scale,
            });
        }
        if self.max_health == 0 {
            return Err(SpecError::NoHealth { kind: kind() });
        }
        for animation in Self::REQUIRED {
            if !self.has(animation) {
                return Err(SpecError::MissingAnimation {
                    kind: kind(),
                    animation,
                });
            }
        }
        for (&animation, sheet) in &self.sheets {
            let frame_count = sheet.geometry.frame_count;
            if frame_count == 0 {
                return Err(SpecError::EmptyAnimation {
                    kind: kind(),
                    animation,
                });
            }
            if sheet.frame_duration_ms == 0 {
                return Err(SpecError::ZeroFrameDuration {
                    kind: kind(),
                    animation,
                });
            }
            if let Some(hit_frame) = sheet.hit_frame.filter(|hit| *hit >= frame_count) {
                return Err(SpecError::HitFrameOutOfRange {
                    kind: kind(),
                    animation,
                    hit_frame,
                    frame_count,
                });
            }
            if let Layout::Grid { columns, rows } = sheet.geometry.layout {
                if u64::from(columns) * u64::from(rows) < u64::from(frame_count) {
                    return Err(SpecError::GridTooSmall {
                        kind: kind(),
                        animation,
                        columns,
                        rows,
                        frame_count,
                    });
                }
            }
        }
        if let Some(follow_up) = self.behaviour.follow_up {
            if !(0.0..=1.0).contains(&follow_up.chance) {
                return Err(SpecError::BadChance {
                    kind: kind(),
                    chance: follow_up.chance,
                });
            }
        }
        if let Some(ratio) = self.behaviour.flee_below {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(SpecError::BadFleeThreshold { kind: kind(), ratio });
            }
        }
        Ok(())
    }

    /// Hitbox of a character standing at `position` with no visual to measure.
    pub fn resting_box(&self, position: Point) -> Rect {
        let size = self
            .sheets
            .get(&AnimationName::Idle)
            .map(|sheet| sheet.geometry.frame_size(self.scale))
            .unwrap_or_default();
        Rect::new(position, size)
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::{brute, sheet};
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn strip_offsets_step_left_by_scaled_width() {
        let geometry = sheet("x.png", 6, 100).geometry;
        let offset = geometry.offset(3, 2.0);
        assert_relative_eq!(offset.x, -600.0);
        assert_relative_eq!(offset.y, 0.0);
    }

    #[test]
    fn grid_offsets_wrap_rows() {
        let geometry = FrameGeometry {
            frame_width: 50.0,
            frame_height: 40.0,
            frame_count: 10,
            layout: Layout::Grid {
                columns: 4,
                rows: 3,
            },
        };
        assert_eq!(geometry.cell(0), (0, 0));
        assert_eq!(geometry.cell(5), (1, 1));
        assert_eq!(geometry.cell(9), (1, 2));
        let offset = geometry.offset(9, 1.5);
        assert_relative_eq!(offset.x, -75.0);
        assert_relative_eq!(offset.y, -120.0);
        let sheet = geometry.sheet_size(2.0);
        assert_relative_eq!(sheet.width, 400.0);
        assert_relative_eq!(sheet.height, 240.0);
    }

    #[test]
    fn names_round_trip_through_strings() {
        for name in AnimationName::ALL {
            assert_eq!(name.as_str().parse::<AnimationName>(), Ok(name));
        }
        assert_eq!(
            "dance".parse::<AnimationName>(),
            Err(EngineError::UnrecognizedAnimation("dance".to_string()))
        );
    }

    #[test]
    fn resolve_walks_fallbacks() {
        let spec = brute();
        assert_eq!(spec.resolve(AnimationName::Attack2), Some(AnimationName::Attack));
        assert_eq!(spec.resolve(AnimationName::Run), Some(AnimationName::Idle));
        assert_eq!(spec.resolve(AnimationName::Entrance), None);
        assert_eq!(spec.resolve(AnimationName::Hurt), Some(AnimationName::Hurt));
    }

    #[test]
    fn sheet_lookup_reports_unknown_animation() {
        let spec = brute();
        assert_eq!(
            spec.sheet(AnimationName::Run).unwrap_err(),
            EngineError::UnknownAnimation {
                kind: "brute".to_string(),
                animation: AnimationName::Run
            }
        );
        assert_eq!(spec.sheet(AnimationName::Attack).unwrap().duration_ms(), 800);
    }

    #[test]
    fn approach_anchors_on_target_edges() {
        let target = Rect::new(
            Point { x: 100.0, y: 0.0 },
            Size {
                width: 60.0,
                height: 60.0,
            },
        );
        let right = Approach {
            anchor: Anchor::Right,
            gap: 20.0,
        };
        let left = Approach {
            anchor: Anchor::Left,
            gap: -90.0,
        };
        let center = Approach {
            anchor: Anchor::Center,
            gap: 0.0,
        };
        assert_relative_eq!(right.horizontal_offset(&target), 180.0);
        assert_relative_eq!(left.horizontal_offset(&target), 10.0);
        assert_relative_eq!(center.horizontal_offset(&target), 130.0);
    }

    #[test]
    fn validation_accepts_fixture() {
        assert_eq!(brute().validate(), Ok(()));
    }

    #[test]
    fn validation_rejects_missing_death() {
        let mut spec = brute();
        spec.sheets.remove(&AnimationName::Death);
        assert_eq!(
            spec.validate(),
            Err(SpecError::MissingAnimation {
                kind: "brute".to_string(),
                animation: AnimationName::Death
            })
        );
    }

    #[test]
    fn validation_rejects_hit_frame_past_end() {
        let mut spec = brute();
        if let Some(attack) = spec.sheets.get_mut(&AnimationName::Attack) {
            attack.hit_frame = Some(8);
        }
        assert!(matches!(
            spec.validate(),
            Err(SpecError::HitFrameOutOfRange { hit_frame: 8, .. })
        ));
    }

    #[test]
    fn validation_rejects_small_grid() {
        let mut spec = brute();
        if let Some(hurt) = spec.sheets.get_mut(&AnimationName::Hurt) {
            hurt.geometry.layout = Layout::Grid {
                columns: 0,
                rows: 4,
            };
        }
        assert!(matches!(
            spec.validate(),
            Err(SpecError::GridTooSmall { columns: 0, .. })
        ));
    }

    #[test]
    fn validation_rejects_bad_hooks() {
        let mut spec = brute();
        spec.behaviour.follow_up = Some(FollowUp {
            chance: 1.5,
            max_repeats: 1,
        });
        assert!(matches!(spec.validate(), Err(SpecError::BadChance { .. })));

        let mut spec = brute();
        spec.behaviour.flee_below = Some(1.0);
        assert!(matches!(
            spec.validate(),
            Err(SpecError::BadFleeThreshold { .. })
        ));

        let mut spec = brute();
        spec.scale = 0.0;
        assert!(matches!(spec.validate(), Err(SpecError::BadScale { .. })));
    }

    #[test]
    fn resting_box_uses_scaled_idle_frame() {
        let mut spec = brute();
        spec.scale = 2.0;
        let rect = spec.resting_box(Point { x: 5.0, y: 7.0 });
        assert_relative_eq!(rect.size.width, 200.0);
        assert_relative_eq!(rect.size.height, 160.0);
        assert_relative_eq!(rect.position.x, 5.0);
    }
}
