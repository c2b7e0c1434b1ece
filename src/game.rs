//! Browser host: the frame-loop driver and the `Arena` facade exported to JS.
//!
//! ```text
//! ┌──────────────────── Update Flow ─────────────────────────────┐
//! │  requestAnimationFrame                                        │
//! │     └─► GameLoop ──► Skirmish::update(now)                    │
//! │              ├─► MotionInbox drained ──► Stage::motion_finished│
//! │              └─► Stage::advance_to(now - started)             │
//! │  JS (level scripts, combat system)                            │
//! │     └─► Arena::spawn / attack / damage / ... ──► Stage        │
//! │     └─► Arena::drainSignals ◄── damage, sound, health, deaths │
//! └───────────────────────────────────────────────────────────────┘
//! ```
use crate::browser;
use crate::config::RosterFile;
use crate::dom::{DomSprite, MotionInbox};
use crate::engine::{Game, GameLoop, Millis, Point, SpriteHandle};
use crate::signal::{self, Completion, SignalReceiver};
use crate::sprite::AnimationName;
use crate::stage::{EntityId, Stage};
use anyhow::{Context, Result};
use js_sys::Promise;
use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::HtmlElement;

type SharedStage = Rc<RefCell<Stage>>;

/// Feeds wall-clock time and finished motions into the stage every frame.
pub struct Skirmish {
    stage: SharedStage,
    inbox: MotionInbox,
    started_at: Option<f64>,
}

impl Skirmish {
    pub fn new(stage: SharedStage, inbox: MotionInbox) -> Self {
        Skirmish {
            stage,
            inbox,
            started_at: None,
        }
    }
}

impl Game for Skirmish {
    fn update(&mut self, now_ms: f64) {
        let started_at = *self.started_at.get_or_insert(now_ms);
        let Ok(mut stage) = self.stage.try_borrow_mut() else {
            log::trace!("stage busy, skipping frame");
            return;
        };
        let reports: Vec<_> = self.inbox.borrow_mut().drain(..).collect();
        for (id, ticket) in reports {
            stage.motion_finished(id, ticket);
        }
        stage.advance_to((now_ms - started_at).max(0.0) as Millis);
    }
}

fn to_js(err: impl Display) -> JsValue {
    JsValue::from_str(&err.to_string())
}

fn completion_promise(completion: Completion) -> Promise {
    future_to_promise(async move { Ok(JsValue::from_str(completion.await.as_str())) })
}

/// The engine as seen from JavaScript.
#[wasm_bindgen]
pub struct Arena {
    stage: SharedStage,
    signals: SignalReceiver,
    container: HtmlElement,
    inbox: MotionInbox,
}

#[wasm_bindgen]
impl Arena {
    /// Spawn a character of `kind`; returns its id.
    pub fn spawn(&self, kind: &str, x: f64, y: f64) -> Result<u32, JsValue> {
        let container = &self.container;
        let inbox = &self.inbox;
        let id = self
            .stage
            .borrow_mut()
            .spawn(kind, Point { x, y }, |id| {
                match DomSprite::new(container, id, Rc::clone(inbox)) {
                    Ok(sprite) => Some(Box::new(sprite) as Box<dyn SpriteHandle>),
                    Err(err) => {
                        log::warn!("{id} spawns without a visual: {err:#}");
                        None
                    }
                }
            })
            .map_err(to_js)?;
        Ok(id.0)
    }

    /// Resolves to "completed", "interrupted" or "skipped".
    pub fn attack(&self, attacker: u32, target: u32) -> Result<Promise, JsValue> {
        let completion = self
            .stage
            .borrow_mut()
            .perform_attack_on(EntityId(attacker), EntityId(target))
            .map_err(to_js)?;
        Ok(completion_promise(completion))
    }

    /// Returns `{ outcome: "survived", remaining }`, `{ outcome: "died" }` or
    /// `{ outcome: "alreadyDown" }`.
    pub fn damage(&self, id: u32, amount: u32) -> Result<JsValue, JsValue> {
        let outcome = self
            .stage
            .borrow_mut()
            .apply_damage(EntityId(id), amount)
            .map_err(to_js)?;
        serde_wasm_bindgen::to_value(&outcome).map_err(to_js)
    }

    pub fn heal(&self, id: u32, amount: u32) -> Result<u32, JsValue> {
        self.stage
            .borrow_mut()
            .heal(EntityId(id), amount)
            .map_err(to_js)
    }

    /// Play the death sequence.
    pub fn kill(&self, id: u32) -> Result<Promise, JsValue> {
        let completion = self
            .stage
            .borrow_mut()
            .perform_death(EntityId(id))
            .map_err(to_js)?;
        Ok(completion_promise(completion))
    }

    /// Remove at once, without a death animation.
    pub fn remove(&self, id: u32) -> Result<(), JsValue> {
        self.stage
            .borrow_mut()
            .dismiss(EntityId(id))
            .map_err(to_js)
    }

    /// Play a named animation on an idle character, from `start_frame` when
    /// given.
    pub fn play(&self, id: u32, animation: &str, start_frame: Option<u32>) -> Result<bool, JsValue> {
        let name = animation.parse::<AnimationName>().map_err(to_js)?;
        self.stage
            .borrow_mut()
            .start_animation(EntityId(id), name, start_frame.unwrap_or(0))
            .map_err(to_js)
    }

    pub fn phase(&self, id: u32) -> Result<String, JsValue> {
        let stage = self.stage.borrow();
        let character = stage.character(EntityId(id)).map_err(to_js)?;
        Ok(character.phase().to_string())
    }

    /// Everything published since the last call, oldest first.
    #[wasm_bindgen(js_name = drainSignals)]
    pub fn drain_signals(&mut self) -> Result<JsValue, JsValue> {
        let signals = signal::drain(&mut self.signals);
        serde_wasm_bindgen::to_value(&signals).map_err(to_js)
    }
}

async fn load_roster(roster_url: Option<String>) -> Result<RosterFile> {
    match roster_url {
        Some(url) => browser::fetch_json::<RosterFile>(&url)
            .await
            .with_context(|| format!("Failed to load roster from : {url}")),
        None => RosterFile::builtin(),
    }
}

/// Load a roster (the built-in one when `roster_url` is absent), start the
/// frame loop and return the arena drawing into `container_id`.
#[wasm_bindgen(js_name = openArena)]
pub async fn open_arena(container_id: String, roster_url: Option<String>) -> Result<Arena, JsValue> {
    let container =
        browser::element_by_id(&container_id).map_err(|err| to_js(format!("{err:#}")))?;
    // sprites are placed relative to the container
    if let Err(err) = container.style().set_property("position", "relative") {
        log::warn!("could not position {container_id}: {:#?}", err);
    }
    let file = load_roster(roster_url)
        .await
        .map_err(|err| to_js(format!("{err:#}")))?;
    let (roster, config) = file.into_parts().map_err(to_js)?;
    log::info!("roster ready with {} character types", roster.len());

    let (stage, signals) = Stage::new(roster, config);
    let stage = Rc::new(RefCell::new(stage));
    let inbox = MotionInbox::default();
    GameLoop::start(Skirmish::new(Rc::clone(&stage), Rc::clone(&inbox)))
        .map_err(|err| to_js(format!("{err:#}")))?;

    Ok(Arena {
        stage,
        signals,
        container,
        inbox,
    })
}
