//! Sprite-sheet animation and combat choreography for a browser card RPG.
//!
//! ```text
//! ┌──────────────── Layers (leaves first) ─────────────────┐
//! │  sprite (CharacterSpec) → sprite::animation (Animator) │
//! │      → sprite::state / sprite::character (phases)      │
//! │      → health → stage (Stage) → game (Arena, JS)        │
//! └────────────────────────────────────────────────────────┘
//! ```
use log::LevelFilter;
use wasm_bindgen::prelude::*;

pub mod browser;
pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod game;
pub mod health;
pub mod signal;
pub mod sprite;
pub mod stage;

#[cfg(test)]
mod testing;

pub use config::{EngineConfig, RosterFile};
pub use engine::{Facing, MotionTicket, Point, Rect, Size, SpriteHandle};
pub use error::{EngineError, SpecError};
pub use signal::{ActionOutcome, Completion, DamageEvent, Signal};
pub use sprite::character::{DamageOutcome, Phase};
pub use sprite::roster::Roster;
pub use sprite::{AnimationName, CharacterSpec};
pub use stage::{EntityId, Stage};

// ==================== Main Functions ====================
/// Main entry for the WebAssembly module
/// - better panic messages
/// - console logging
#[wasm_bindgen(start)]
pub fn main_js() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    browser::init_logging(LevelFilter::Info);
    Ok(())
}
