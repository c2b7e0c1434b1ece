use crate::config::EngineConfig;
use crate::engine::{Millis, MotionTicket, Point, Rect, TimerId, Timers, Visual};
use crate::error::EngineError;
use crate::health::Health;
use crate::signal::{ActionOutcome, Completion, DamageEvent, Signal, Signals};
use crate::sprite::animation::{Animator, Step};
use crate::sprite::state::{
    self, ActorState, CueKind, Effect, Effects, Event, IsDying, IsStriking, Travel,
};
use crate::sprite::{AnimationName, CharacterSpec};
use crate::stage::EntityId;
use futures::channel::oneshot;
use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use std::fmt;
use std::rc::Rc;

/// Where a character is in its action sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Entering,
    Advancing,
    Striking,
    Retreating,
    Recoiling,
    Fleeing,
    Dying,
    Fading,
    Dead,
    Fled,
}

impl Phase {
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Idle => "idle",
            Phase::Entering => "entering",
            Phase::Advancing => "advancing",
            Phase::Striking => "striking",
            Phase::Retreating => "retreating",
            Phase::Recoiling => "recoiling",
            Phase::Fleeing => "fleeing",
            Phase::Dying => "dying",
            Phase::Fading => "fading",
            Phase::Dead => "dead",
            Phase::Fled => "fled",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
enum ActorStateMachine {
    Idle(ActorState<state::Idle>),
    Entering(ActorState<state::Entering>),
    Advancing(ActorState<state::Advancing>),
    Striking(ActorState<state::Striking>),
    Retreating(ActorState<state::Retreating>),
    Recoiling(ActorState<state::Recoiling>),
    Fleeing(ActorState<state::Fleeing>),
    Dying(ActorState<state::Dying>),
    Fading(ActorState<state::Fading>),
    Dead(ActorState<state::Dead>),
    Fled(ActorState<state::Fled>),
}

macro_rules! into_machine {
    ($($phase:ident),* $(,)?) => {
        $(
            impl From<ActorState<state::$phase>> for ActorStateMachine {
                fn from(state: ActorState<state::$phase>) -> Self {
                    ActorStateMachine::$phase(state)
                }
            }
        )*
    };
}

into_machine!(
    Idle, Entering, Advancing, Striking, Retreating, Recoiling, Fleeing, Dying, Fading, Dead,
    Fled,
);

impl From<IsStriking> for ActorStateMachine {
    fn from(is_striking: IsStriking) -> Self {
        match is_striking {
            IsStriking::Again(striking) => striking.into(),
            IsStriking::Done(retreating) => retreating.into(),
        }
    }
}

impl From<IsDying> for ActorStateMachine {
    fn from(is_dying: IsDying) -> Self {
        match is_dying {
            IsDying::Fading(fading) => fading.into(),
            IsDying::Dead(dead) => dead.into(),
        }
    }
}

impl ActorStateMachine {
    /// Events a phase has no transition for leave it unchanged and push nothing.
    fn transition(self, event: Event, fx: &mut Effects) -> Self {
        use ActorStateMachine::*;
        match (self, event) {
            (Idle(state), Event::Enter) => state.enter(fx).into(),

            (Idle(state), Event::Attack { from, approach }) => {
                state.attack(from, approach, fx).into()
            }
            (Entering(state), Event::Attack { from, approach }) => {
                state.attack(from, approach, fx).into()
            }
            (Recoiling(state), Event::Attack { from, approach }) => {
                state.attack(from, approach, fx).into()
            }

            (Idle(state), Event::Hurt) => state.hurt(fx).into(),
            (Entering(state), Event::Hurt) => state.hurt(fx).into(),
            (Recoiling(state), Event::Hurt) => state.hurt(fx).into(),

            (Idle(state), Event::Flee { to }) => state.flee(to, fx).into(),
            (Entering(state), Event::Flee { to }) => state.flee(to, fx).into(),
            (Recoiling(state), Event::Flee { to }) => state.flee(to, fx).into(),

            (Idle(state), Event::Die { fade }) => state.die(fade, fx).into(),
            (Entering(state), Event::Die { fade }) => state.die(fade, fx).into(),
            (Advancing(state), Event::Die { fade }) => state.die(fade, fx).into(),
            (Striking(state), Event::Die { fade }) => state.die(fade, fx).into(),
            (Retreating(state), Event::Die { fade }) => state.die(fade, fx).into(),
            (Recoiling(state), Event::Die { fade }) => state.die(fade, fx).into(),
            (Fleeing(state), Event::Die { fade }) => state.die(fade, fx).into(),

            (Advancing(state), Event::Arrived) => state.arrive(fx).into(),
            (Retreating(state), Event::Arrived) => state.arrive(fx).into(),
            (Fleeing(state), Event::Arrived) => state.arrive(fx).into(),
            (Fading(state), Event::Arrived) => state.arrive(fx).into(),

            (Striking(state), Event::StrikeFinished { chain }) => state.finish(chain, fx).into(),
            (Entering(state), Event::AnimationFinished) => state.finish(fx).into(),
            (Recoiling(state), Event::AnimationFinished) => state.finish(fx).into(),
            (Dying(state), Event::AnimationFinished) => state.finish(fx).into(),
            // a one-shot the host played by hand ran out
            (Idle(state), Event::AnimationFinished) => {
                fx.push(Effect::Play(AnimationName::Idle));
                Idle(state)
            }
            _ => self,
        }
    }

    fn phase(&self) -> Phase {
        use ActorStateMachine::*;
        match self {
            Idle(_) => Phase::Idle,
            Entering(_) => Phase::Entering,
            Advancing(_) => Phase::Advancing,
            Striking(_) => Phase::Striking,
            Retreating(_) => Phase::Retreating,
            Recoiling(_) => Phase::Recoiling,
            Fleeing(_) => Phase::Fleeing,
            Dying(_) => Phase::Dying,
            Fading(_) => Phase::Fading,
            Dead(_) => Phase::Dead,
            Fled(_) => Phase::Fled,
        }
    }

    /// Where an attack started; set only while walking out, striking and walking back.
    fn origin(&self) -> Option<Point> {
        match self {
            ActorStateMachine::Advancing(state) => Some(state.home()),
            ActorStateMachine::Striking(state) => Some(state.home()),
            ActorStateMachine::Retreating(state) => Some(state.home()),
            _ => None,
        }
    }

    fn strikes(&self) -> Option<u8> {
        match self {
            ActorStateMachine::Striking(state) => Some(state.strikes()),
            _ => None,
        }
    }

    fn is_at_rest(&self) -> bool {
        matches!(
            self,
            ActorStateMachine::Idle(_)
                | ActorStateMachine::Entering(_)
                | ActorStateMachine::Recoiling(_)
        )
    }

    fn is_alive(&self) -> bool {
        !matches!(
            self,
            ActorStateMachine::Dying(_)
                | ActorStateMachine::Fading(_)
                | ActorStateMachine::Dead(_)
                | ActorStateMachine::Fled(_)
        )
    }
}

/// Engine services a character borrows while handling one call.
pub struct Backstage<'a> {
    pub timers: &'a mut Timers,
    pub signals: &'a Signals,
    pub rng: &'a mut StdRng,
    pub config: &'a EngineConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum DamageOutcome {
    Survived { remaining: u32 },
    Died,
    /// The character was already dying; nothing changed.
    AlreadyDown,
}

#[derive(Debug, Clone, Copy)]
struct Motion {
    ticket: MotionTicket,
    fallback: TimerId,
}

/// One live character: spec, phase, frames, health and visual handle.
#[derive(Debug)]
pub struct Character {
    id: EntityId,
    spec: Rc<CharacterSpec>,
    state: ActorStateMachine,
    animator: Animator,
    health: Health,
    visual: Visual,
    position: Point,
    motion: Option<Motion>,
    next_ticket: u32,
    pending: Option<oneshot::Sender<ActionOutcome>>,
    flee_pending: bool,
}

impl Character {
    pub fn new(id: EntityId, spec: Rc<CharacterSpec>, position: Point, visual: Visual) -> Self {
        Character {
            id,
            health: Health::new(spec.max_health),
            spec,
            state: ActorStateMachine::Idle(ActorState::new()),
            animator: Animator::new(id),
            visual,
            position,
            motion: None,
            next_ticket: 0,
            pending: None,
            flee_pending: false,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn spec(&self) -> &CharacterSpec {
        &self.spec
    }

    pub fn phase(&self) -> Phase {
        self.state.phase()
    }

    pub fn health(&self) -> Health {
        self.health
    }

    pub fn origin(&self) -> Option<Point> {
        self.state.origin()
    }

    pub fn position(&self) -> Point {
        self.position
    }

    pub fn animation(&self) -> AnimationName {
        self.animator.current()
    }

    pub fn frame(&self) -> u32 {
        self.animator.frame()
    }

    pub fn is_alive(&self) -> bool {
        self.state.is_alive()
    }

    /// Dead or fled: nothing more will happen to this character.
    pub fn is_gone(&self) -> bool {
        matches!(self.phase(), Phase::Dead | Phase::Fled)
    }

    pub fn has_visual(&self) -> bool {
        self.visual.is_present()
    }

    /// The measured hitbox, or the idle frame at the logical position when
    /// there is nothing to measure.
    pub fn hitbox(&self) -> Rect {
        self.visual
            .hitbox()
            .unwrap_or_else(|| self.spec.resting_box(self.position))
    }

    /// Put the character on stage and start its entrance or idle loop.
    pub fn appear(&mut self, bs: &mut Backstage) {
        self.visual.attach();
        let placed = self.placed(self.position);
        if let Some(handle) = self.visual.live() {
            handle.set_facing(self.spec.facing);
            handle.set_position(placed);
        }
        if self.spec.has(AnimationName::Entrance) {
            self.act(Event::Enter, bs);
        } else {
            self.run(vec![Effect::Play(AnimationName::Idle)], bs);
        }
    }

    /// Play `name` directly from `start_frame`, e.g. to resume an attack
    /// partway through. Only an idle character takes raw animation requests;
    /// returns false when it is busy with a sequence.
    pub fn start_animation(
        &mut self,
        name: AnimationName,
        start_frame: u32,
        bs: &mut Backstage,
    ) -> Result<bool, EngineError> {
        if self.phase() != Phase::Idle {
            log::debug!("{}: busy {}, ignoring {name}", self.id, self.phase());
            return Ok(false);
        }
        let step = self
            .animator
            .start(&self.spec, name, start_frame, bs.timers, &mut self.visual)?;
        self.on_step(step, bs);
        Ok(true)
    }

    /// Walk up to `target`, strike, and walk back.
    pub fn perform_attack(
        &mut self,
        target: &Rect,
        bs: &mut Backstage,
    ) -> Result<Completion, EngineError> {
        self.spec.sheet(AnimationName::Attack)?;
        if !self.state.is_at_rest() {
            log::debug!("{}: cannot attack while {}", self.id, self.phase());
            return Ok(Completion::ready(ActionOutcome::Skipped));
        }
        let approach = Point {
            x: self.spec.behaviour.approach.horizontal_offset(target),
            y: self.position.y,
        };
        let completion = self.begin();
        self.act(
            Event::Attack {
                from: self.position,
                approach,
            },
            bs,
        );
        Ok(completion)
    }

    pub fn perform_hurt(&mut self, bs: &mut Backstage) -> Completion {
        if !self.spec.has(AnimationName::Hurt) || !self.state.is_at_rest() {
            log::debug!("{}: no hurt reaction while {}", self.id, self.phase());
            return Completion::ready(ActionOutcome::Skipped);
        }
        let completion = self.begin();
        self.act(Event::Hurt, bs);
        completion
    }

    /// Play the death animation once, then let the visual go. No-op if
    /// already dying.
    pub fn perform_death(&mut self, bs: &mut Backstage) -> Completion {
        if !self.is_alive() {
            return Completion::ready(ActionOutcome::Skipped);
        }
        self.halt(bs.timers);
        self.flee_pending = false;
        let completion = self.begin();
        self.act(
            Event::Die {
                fade: self.spec.behaviour.death_fade_ms.is_some(),
            },
            bs,
        );
        completion
    }

    /// Run off stage, away from where the character faces.
    pub fn perform_flee(&mut self, bs: &mut Backstage) -> Completion {
        if !self.state.is_at_rest() {
            return Completion::ready(ActionOutcome::Skipped);
        }
        self.flee_pending = false;
        let to = Point {
            x: self.position.x + self.spec.facing.away() * self.spec.behaviour.flee_distance,
            y: self.position.y,
        };
        let completion = self.begin();
        self.act(Event::Flee { to }, bs);
        completion
    }

    pub fn apply_damage(&mut self, amount: u32, bs: &mut Backstage) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome::AlreadyDown;
        }
        let change = self.health.damage(amount);
        self.publish_health(bs);
        if change.depleted {
            self.perform_death(bs);
            return DamageOutcome::Died;
        }

        if self.should_flee() {
            if self.state.is_at_rest() {
                self.perform_flee(bs);
            } else if self.phase() != Phase::Fleeing {
                log::debug!("{}: will flee once back at rest", self.id);
                self.flee_pending = true;
            }
        } else {
            self.perform_hurt(bs);
        }
        DamageOutcome::Survived {
            remaining: change.current,
        }
    }

    /// Returns the health after healing. Dying characters are not healed.
    pub fn heal(&mut self, amount: u32, bs: &mut Backstage) -> u32 {
        if self.is_alive() {
            self.health.heal(amount);
            self.publish_health(bs);
        }
        self.health.current()
    }

    /// A timer owned by this character fired.
    pub fn on_timer(&mut self, timer: TimerId, bs: &mut Backstage) {
        if self.animator.timer() == Some(timer) {
            let step = self.animator.tick(bs.timers, &mut self.visual);
            self.on_step(step, bs);
        } else if self.motion.map(|motion| motion.fallback) == Some(timer) {
            log::debug!(
                "{}: no completion report for motion, continuing after grace",
                self.id
            );
            self.motion = None;
            self.act(Event::Arrived, bs);
        } else {
            log::trace!("{}: stale timer {timer:?}", self.id);
        }
    }

    /// The host finished the motion identified by `ticket`. Returns false for
    /// stale or unknown tickets.
    pub fn motion_finished(&mut self, ticket: MotionTicket, bs: &mut Backstage) -> bool {
        match self.motion {
            Some(motion) if motion.ticket == ticket => {
                bs.timers.cancel(motion.fallback);
                self.motion = None;
                self.act(Event::Arrived, bs);
                true
            }
            _ => {
                log::trace!("{}: ignoring stale motion {ticket:?}", self.id);
                false
            }
        }
    }

    /// Drop everything immediately, without a death animation.
    pub fn dismiss(&mut self, bs: &mut Backstage) {
        self.halt(bs.timers);
        self.visual.release();
        self.settle(ActionOutcome::Interrupted);
    }

    fn should_flee(&self) -> bool {
        self.spec
            .behaviour
            .flee_below
            .is_some_and(|ratio| self.health.ratio() <= ratio)
    }

    fn begin(&mut self) -> Completion {
        let (tx, completion) = Completion::pending();
        if let Some(previous) = self.pending.replace(tx) {
            let _ = previous.send(ActionOutcome::Interrupted);
        }
        completion
    }

    fn settle(&mut self, outcome: ActionOutcome) {
        if let Some(tx) = self.pending.take() {
            let _ = tx.send(outcome);
        }
    }

    /// Cancel every timer this character owns.
    fn halt(&mut self, timers: &mut Timers) {
        self.animator.stop(timers);
        self.motion = None;
        timers.cancel_all_for(self.id);
    }

    fn act(&mut self, event: Event, bs: &mut Backstage) {
        let before = self.phase();
        let mut fx = Effects::new();
        self.state = self.state.transition(event, &mut fx);
        let after = self.phase();
        if before != after {
            log::debug!("{}: {before} -> {after}", self.id);
        }
        self.run(fx, bs);

        if self.flee_pending && self.phase() == Phase::Idle {
            self.perform_flee(bs);
        }
    }

    fn run(&mut self, fx: Effects, bs: &mut Backstage) {
        for effect in fx {
            match effect {
                Effect::Play(name) => self.play(name, bs),
                Effect::Travel { to, travel } => self.travel(to, travel, bs),
                Effect::FadeOut => self.fade(bs),
                Effect::Cue(kind) => self.cue(kind, bs),
                Effect::Settle(outcome) => self.settle(outcome),
                Effect::Release => {
                    self.halt(bs.timers);
                    self.visual.release();
                }
                Effect::Perished => bs.signals.publish(Signal::DeathComplete { entity: self.id }),
                Effect::Departed => bs.signals.publish(Signal::Fled { entity: self.id }),
            }
        }
    }

    fn play(&mut self, name: AnimationName, bs: &mut Backstage) {
        let Some(resolved) = self.spec.resolve(name) else {
            log::warn!("{}: '{}' has no {name} to play", self.id, self.spec.kind);
            return;
        };
        if resolved.is_looping() && self.animator.is_playing(resolved) {
            return;
        }
        match self
            .animator
            .start(&self.spec, resolved, 0, bs.timers, &mut self.visual)
        {
            Ok(step) => self.on_step(step, bs),
            Err(err) => log::warn!("{}: {err}", self.id),
        }
    }

    fn on_step(&mut self, step: Step, bs: &mut Backstage) {
        match step {
            Step::Frame { index, hit: true } => bs.signals.publish(Signal::Damage(DamageEvent {
                source: self.id,
                animation: self.animator.current(),
                frame_index: index,
            })),
            Step::Frame { .. } | Step::Stopped => {}
            Step::Finished => self.animation_finished(bs),
        }
    }

    fn animation_finished(&mut self, bs: &mut Backstage) {
        match self.state.strikes() {
            Some(strikes) => {
                let chain = self.spec.behaviour.follow_up.is_some_and(|follow_up| {
                    strikes <= follow_up.max_repeats && bs.rng.gen_bool(follow_up.chance)
                });
                self.act(Event::StrikeFinished { chain }, bs);
            }
            None => self.act(Event::AnimationFinished, bs),
        }
    }

    fn travel(&mut self, to: Point, travel: Travel, bs: &mut Backstage) {
        let timing = self.spec.behaviour.motion;
        let duration_ms = match travel {
            Travel::Advance => timing.advance_ms,
            Travel::Retreat => timing.retreat_ms,
            Travel::Flee => timing.flee_ms,
        };
        self.position = to;
        let ticket = self.issue_motion(duration_ms, bs);
        let placed = self.placed(to);
        match self.visual.live() {
            Some(handle) => handle.slide_to(placed, duration_ms, ticket),
            None => log::trace!("{}: no visual to slide", self.id),
        }
    }

    fn fade(&mut self, bs: &mut Backstage) {
        let duration_ms = self.spec.behaviour.death_fade_ms.unwrap_or_default();
        let ticket = self.issue_motion(duration_ms, bs);
        match self.visual.live() {
            Some(handle) => handle.fade_out(duration_ms, ticket),
            None => log::trace!("{}: no visual to fade", self.id),
        }
    }

    /// New ticket for a motion of `duration_ms`, with a fallback timer in case
    /// the host never reports it.
    fn issue_motion(&mut self, duration_ms: u32, bs: &mut Backstage) -> MotionTicket {
        if let Some(previous) = self.motion.take() {
            bs.timers.cancel(previous.fallback);
        }
        self.next_ticket = self.next_ticket.wrapping_add(1);
        let ticket = MotionTicket(self.next_ticket);
        let grace = Millis::from(bs.config.transition_grace_ms);
        let fallback = bs.timers.after(self.id, Millis::from(duration_ms) + grace);
        self.motion = Some(Motion { ticket, fallback });
        ticket
    }

    fn cue(&self, kind: CueKind, bs: &Backstage) {
        let cues = &self.spec.cues;
        let cue = match kind {
            CueKind::Attack => &cues.attack,
            CueKind::Hurt => &cues.hurt,
            CueKind::Death => &cues.death,
        };
        if let Some(cue) = cue {
            bs.signals.publish(Signal::Sound {
                source: self.id,
                cue: cue.clone(),
            });
        }
    }

    fn publish_health(&self, bs: &Backstage) {
        bs.signals.publish(Signal::Health {
            entity: self.id,
            current: self.health.current(),
            max: self.health.max(),
        });
    }

    fn placed(&self, position: Point) -> Point {
        Point {
            x: position.x,
            y: position.y + self.spec.vertical_offset,
        }
    }
}
