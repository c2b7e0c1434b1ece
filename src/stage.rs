//! The set of live characters and the services they share.
//!
//! ```text
//! ┌────────────── One dispatch ───────────────────────────────┐
//! │  host call / due timer                                     │
//! │      └─► Stage looks up the character                      │
//! │            └─► Character runs its phase machine            │
//! │                  ├─► Animator (frames, timers)             │
//! │                  ├─► Visual (SpriteHandle writes)          │
//! │                  └─► Signals (damage, sound, scene hooks)  │
//! │      └─► dead or fled characters are dropped               │
//! └────────────────────────────────────────────────────────────┘
//! ```
use crate::config::EngineConfig;
use crate::engine::{Millis, MotionTicket, Point, Rect, SpriteHandle, Timers, Visual};
use crate::error::EngineError;
use crate::health::Health;
use crate::signal::{Completion, Signal, SignalReceiver, Signals};
use crate::sprite::character::{Backstage, Character, DamageOutcome};
use crate::sprite::roster::Roster;
use crate::sprite::AnimationName;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub u32);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub struct Stage {
    roster: Roster,
    config: EngineConfig,
    timers: Timers,
    signals: Signals,
    rng: StdRng,
    characters: BTreeMap<EntityId, Character>,
    announced: HashSet<String>,
    next_id: u32,
}

impl Stage {
    pub fn new(roster: Roster, config: EngineConfig) -> (Stage, SignalReceiver) {
        let (signals, rx) = Signals::channel();
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let stage = Stage {
            roster,
            config,
            timers: Timers::new(),
            signals,
            rng,
            characters: BTreeMap::new(),
            announced: HashSet::new(),
            next_id: 1,
        };
        (stage, rx)
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn now(&self) -> Millis {
        self.timers.now()
    }

    /// Create a character of type `kind` at `position`. `make_visual` is
    /// handed the new id and returns the handle the character will own, if any.
    pub fn spawn<F>(&mut self, kind: &str, position: Point, make_visual: F) -> Result<EntityId, EngineError>
    where
        F: FnOnce(EntityId) -> Option<Box<dyn SpriteHandle>>,
    {
        let spec = self
            .roster
            .get(kind)
            .ok_or_else(|| EngineError::UnknownKind(kind.to_string()))?;
        let id = EntityId(self.next_id);
        self.next_id += 1;

        let visual = Visual::new(make_visual(id));
        if self.announced.insert(spec.kind.clone()) {
            if let Some(cue) = &spec.cues.spawn {
                self.signals.publish(Signal::Sound {
                    source: id,
                    cue: cue.clone(),
                });
            }
        }
        log::info!("spawned {kind} as {id}");
        self.characters
            .insert(id, Character::new(id, spec, position, visual));
        self.dispatch(id, |character, bs| character.appear(bs))?;
        Ok(id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.characters.contains_key(&id)
    }

    pub fn character(&self, id: EntityId) -> Result<&Character, EngineError> {
        self.characters
            .get(&id)
            .ok_or(EngineError::UnknownEntity(id))
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.characters.keys().copied()
    }

    pub fn health(&self, id: EntityId) -> Result<Health, EngineError> {
        Ok(self.character(id)?.health())
    }

    pub fn live_timers(&self, id: EntityId) -> usize {
        self.timers.live_for(id)
    }

    pub fn start_animation(
        &mut self,
        id: EntityId,
        name: AnimationName,
        start_frame: u32,
    ) -> Result<bool, EngineError> {
        self.dispatch(id, |character, bs| character.start_animation(name, start_frame, bs))?
    }

    pub fn perform_attack(&mut self, id: EntityId, target: Rect) -> Result<Completion, EngineError> {
        self.dispatch(id, |character, bs| character.perform_attack(&target, bs))?
    }

    /// Attack another character, aiming at its current hitbox.
    pub fn perform_attack_on(&mut self, id: EntityId, target: EntityId) -> Result<Completion, EngineError> {
        let hitbox = self.character(target)?.hitbox();
        self.perform_attack(id, hitbox)
    }

    pub fn perform_hurt(&mut self, id: EntityId) -> Result<Completion, EngineError> {
        self.dispatch(id, |character, bs| character.perform_hurt(bs))
    }

    pub fn perform_death(&mut self, id: EntityId) -> Result<Completion, EngineError> {
        self.dispatch(id, |character, bs| character.perform_death(bs))
    }

    pub fn perform_flee(&mut self, id: EntityId) -> Result<Completion, EngineError> {
        self.dispatch(id, |character, bs| character.perform_flee(bs))
    }

    pub fn apply_damage(&mut self, id: EntityId, amount: u32) -> Result<DamageOutcome, EngineError> {
        self.dispatch(id, |character, bs| character.apply_damage(amount, bs))
    }

    pub fn heal(&mut self, id: EntityId, amount: u32) -> Result<u32, EngineError> {
        self.dispatch(id, |character, bs| character.heal(amount, bs))
    }

    /// Report that the motion `ticket` of `id` finished on the host side.
    /// Reports for entities that are already gone are ignored.
    pub fn motion_finished(&mut self, id: EntityId, ticket: MotionTicket) -> bool {
        match self.dispatch(id, |character, bs| character.motion_finished(ticket, bs)) {
            Ok(accepted) => accepted,
            Err(_) => {
                log::trace!("motion report for departed {id}");
                false
            }
        }
    }

    /// Remove a character at once, skipping its death animation.
    pub fn dismiss(&mut self, id: EntityId) -> Result<(), EngineError> {
        let mut character = self
            .characters
            .remove(&id)
            .ok_or(EngineError::UnknownEntity(id))?;
        let mut bs = Backstage {
            timers: &mut self.timers,
            signals: &self.signals,
            rng: &mut self.rng,
            config: &self.config,
        };
        character.dismiss(&mut bs);
        log::info!("dismissed {id}");
        Ok(())
    }

    /// Fire every timer due up to `now`, in order.
    pub fn advance_to(&mut self, now: Millis) {
        while let Some((timer, owner)) = self.timers.pop_due(now) {
            if let Err(err) = self.dispatch(owner, |character, bs| character.on_timer(timer, bs)) {
                log::trace!("timer for {owner}: {err}");
            }
        }
        self.timers.settle(now);
    }

    pub fn advance_by(&mut self, delta: Millis) {
        self.advance_to(self.now() + delta);
    }

    fn dispatch<T>(
        &mut self,
        id: EntityId,
        f: impl FnOnce(&mut Character, &mut Backstage) -> T,
    ) -> Result<T, EngineError> {
        let character = self
            .characters
            .get_mut(&id)
            .ok_or(EngineError::UnknownEntity(id))?;
        let mut bs = Backstage {
            timers: &mut self.timers,
            signals: &self.signals,
            rng: &mut self.rng,
            config: &self.config,
        };
        let result = f(character, &mut bs);
        if character.is_gone() {
            log::info!("{id} left the stage as {}", character.phase());
            self.timers.cancel_all_for(id);
            self.characters.remove(&id);
        }
        Ok(result)
    }
}
