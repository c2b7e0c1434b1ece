use crate::error::SpecError;
use crate::sprite::roster::Roster;
use crate::sprite::CharacterSpec;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// The roster shipped with the crate.
pub const BUILTIN_ROSTER: &str = include_str!("../assets/roster.json");

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Added to a motion's declared duration before the sequence moves on
    /// without a completion report from the host.
    pub transition_grace_ms: u32,
    /// Seed for follow-up attack rolls. Entropy when absent.
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            transition_grace_ms: 50,
            seed: None,
        }
    }
}

/// On-disk roster format: engine settings plus character types.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterFile {
    #[serde(default)]
    pub engine: EngineConfig,
    pub characters: Vec<CharacterSpec>,
}

impl RosterFile {
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).context("Malformed roster file")
    }

    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_ROSTER).context("Built-in roster is broken")
    }

    pub fn into_parts(self) -> Result<(Roster, EngineConfig), SpecError> {
        Ok((Roster::new(self.characters)?, self.engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sprite::{AnimationName, Layout};

    #[test]
    fn builtin_roster_loads_and_validates() {
        let (roster, config) = RosterFile::builtin().unwrap().into_parts().unwrap();
        for kind in ["goblin", "goblin_king", "flying_demon", "werewolf", "warrior", "mage"] {
            assert!(roster.get(kind).is_some(), "missing {kind}");
        }
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn builtin_goblin_matches_combat_timing() {
        let (roster, _) = RosterFile::builtin().unwrap().into_parts().unwrap();
        let goblin = roster.get("goblin").unwrap();
        let attack = goblin.sheet(AnimationName::Attack).unwrap();
        assert_eq!(attack.geometry.frame_count, 8);
        assert_eq!(attack.frame_duration_ms, 100);
        assert_eq!(attack.hit_frame, Some(4));
        assert_eq!(goblin.sheet(AnimationName::Hurt).unwrap().geometry.frame_count, 4);
        assert_eq!(goblin.behaviour.follow_up.map(|f| f.chance), Some(0.5));
        assert_eq!(goblin.behaviour.motion.advance_ms, 300);
        assert_eq!(goblin.behaviour.motion.retreat_ms, 200);
        assert_eq!(goblin.max_health, 100);
    }

    #[test]
    fn builtin_has_grid_sheets_and_flee_hook() {
        let (roster, _) = RosterFile::builtin().unwrap().into_parts().unwrap();
        let king = roster.get("goblin_king").unwrap();
        assert!(matches!(
            king.sheet(AnimationName::Attack).unwrap().geometry.layout,
            Layout::Grid { .. }
        ));
        assert_eq!(roster.get("werewolf").unwrap().behaviour.flee_below, Some(0.5));
    }

    #[test]
    fn minimal_file_takes_defaults() {
        let text = r#"{
            "engine": { "seed": 7 },
            "characters": [{
                "kind": "slime",
                "max_health": 12,
                "sheets": {
                    "idle":  { "image": "slime/idle.png",
                               "geometry": { "frame_width": 32, "frame_height": 32, "frame_count": 2 },
                               "frame_duration_ms": 200 },
                    "death": { "image": "slime/death.png",
                               "geometry": { "frame_width": 32, "frame_height": 32, "frame_count": 3 },
                               "frame_duration_ms": 120 }
                },
                "behaviour": { "approach": { "anchor": "right" } }
            }]
        }"#;
        let file = RosterFile::from_json(text).unwrap();
        assert_eq!(file.engine.seed, Some(7));
        assert_eq!(file.engine.transition_grace_ms, 50);
        let slime = &file.characters[0];
        assert_eq!(slime.scale, 1.0);
        assert_eq!(slime.behaviour.motion.advance_ms, 300);
        assert_eq!(slime.behaviour.flee_distance, 800.0);
        assert!(slime.cues.spawn.is_none());
        assert!(file.into_parts().is_ok());
    }

    #[test]
    fn invalid_content_surfaces_as_spec_error() {
        let mut file = RosterFile::builtin().unwrap();
        let copy = file.characters[0].clone();
        file.characters.push(copy.clone());
        assert_eq!(
            file.into_parts().map(|_| ()),
            Err(SpecError::DuplicateKind(copy.kind))
        );
    }

    #[test]
    fn malformed_json_is_reported_with_context() {
        let err = RosterFile::from_json("{ \"characters\": 3 }").unwrap_err();
        assert!(format!("{err:#}").starts_with("Malformed roster file"));
    }
}
