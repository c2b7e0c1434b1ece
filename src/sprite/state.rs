//! Phases of a character's action sequence, one type per phase.
//!
//! ```text
//! ┌──────────── Phase Transition Flow ────────────────────────────┐
//! │  Idle/Entering/Recoiling → Attack → Advancing                 │
//! │  Advancing  → Arrived          → Striking                     │
//! │  Striking   → Strike(chain)    → Striking                     │
//! │  Striking   → Strike(no chain) → Retreating                   │
//! │  Retreating → Arrived          → Idle                         │
//! │  Idle/Entering/Recoiling → Hurt → Recoiling → Idle            │
//! │  Idle/Entering/Recoiling → Flee → Fleeing → Fled              │
//! │  any living phase → Die → Dying → (Fading →) Dead             │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Transitions consume the old state, so a phase can only be left through
//! the methods defined for it. Each transition pushes the [`Effect`]s the
//! owning character has to carry out.
use crate::engine::Point;
use crate::sprite::AnimationName;
use crate::signal::ActionOutcome;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Enter,
    Attack { from: Point, approach: Point },
    Hurt,
    Flee { to: Point },
    Die { fade: bool },
    /// The last requested motion (slide or fade) finished.
    Arrived,
    /// A one-shot animation other than a strike finished.
    AnimationFinished,
    /// A strike finished; `chain` asks for another one.
    StrikeFinished { chain: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Travel {
    Advance,
    Retreat,
    Flee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CueKind {
    Attack,
    Hurt,
    Death,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Effect {
    Play(AnimationName),
    Travel { to: Point, travel: Travel },
    FadeOut,
    Cue(CueKind),
    /// Resolve the pending action completion.
    Settle(ActionOutcome),
    /// Detach and drop the visual.
    Release,
    Perished,
    Departed,
}

pub type Effects = Vec<Effect>;

// ==================== Phase markers ====================
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Idle;
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entering;
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Advancing {
    home: Point,
}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Striking {
    home: Point,
    strikes: u8,
}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Retreating {
    home: Point,
}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Recoiling;
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fleeing;
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dying {
    fade: bool,
}
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fading;
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dead;
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fled;

/// Phases that can still die.
pub trait Living {}
/// Living phases that accept a new attack, hurt or flee.
pub trait AtRest: Living {}

impl Living for Idle {}
impl Living for Entering {}
impl Living for Advancing {}
impl Living for Striking {}
impl Living for Retreating {}
impl Living for Recoiling {}
impl Living for Fleeing {}
impl AtRest for Idle {}
impl AtRest for Entering {}
impl AtRest for Recoiling {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActorState<S> {
    _state: S,
}

pub enum IsStriking {
    Again(ActorState<Striking>),
    Done(ActorState<Retreating>),
}

pub enum IsDying {
    Fading(ActorState<Fading>),
    Dead(ActorState<Dead>),
}

impl<S> ActorState<S> {
    fn with(state: S) -> Self {
        ActorState { _state: state }
    }
}

impl ActorState<Idle> {
    pub fn new() -> Self {
        ActorState::with(Idle)
    }

    pub fn enter(self, fx: &mut Effects) -> ActorState<Entering> {
        fx.push(Effect::Play(AnimationName::Entrance));
        ActorState::with(Entering)
    }
}

impl Default for ActorState<Idle> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: AtRest> ActorState<S> {
    /// Remember where we stand and walk toward the target.
    pub fn attack(self, from: Point, approach: Point, fx: &mut Effects) -> ActorState<Advancing> {
        fx.push(Effect::Play(AnimationName::Run));
        fx.push(Effect::Travel {
            to: approach,
            travel: Travel::Advance,
        });
        ActorState::with(Advancing { home: from })
    }

    pub fn hurt(self, fx: &mut Effects) -> ActorState<Recoiling> {
        fx.push(Effect::Cue(CueKind::Hurt));
        fx.push(Effect::Play(AnimationName::Hurt));
        ActorState::with(Recoiling)
    }

    pub fn flee(self, to: Point, fx: &mut Effects) -> ActorState<Fleeing> {
        fx.push(Effect::Play(AnimationName::Run));
        fx.push(Effect::Travel {
            to,
            travel: Travel::Flee,
        });
        ActorState::with(Fleeing)
    }
}

impl<S: Living> ActorState<S> {
    pub fn die(self, fade: bool, fx: &mut Effects) -> ActorState<Dying> {
        fx.push(Effect::Cue(CueKind::Death));
        fx.push(Effect::Play(AnimationName::Death));
        ActorState::with(Dying { fade })
    }
}

impl ActorState<Entering> {
    pub fn finish(self, fx: &mut Effects) -> ActorState<Idle> {
        fx.push(Effect::Play(AnimationName::Idle));
        ActorState::with(Idle)
    }
}

impl ActorState<Advancing> {
    pub fn home(&self) -> Point {
        self._state.home
    }

    pub fn arrive(self, fx: &mut Effects) -> ActorState<Striking> {
        fx.push(Effect::Cue(CueKind::Attack));
        fx.push(Effect::Play(AnimationName::Attack));
        ActorState::with(Striking {
            home: self._state.home,
            strikes: 1,
        })
    }
}

impl ActorState<Striking> {
    pub fn home(&self) -> Point {
        self._state.home
    }

    /// Strikes played so far in this attack, the current one included.
    pub fn strikes(&self) -> u8 {
        self._state.strikes
    }

    pub fn finish(self, chain: bool, fx: &mut Effects) -> IsStriking {
        if chain {
            fx.push(Effect::Cue(CueKind::Attack));
            fx.push(Effect::Play(AnimationName::Attack2));
            IsStriking::Again(ActorState::with(Striking {
                home: self._state.home,
                strikes: self._state.strikes.saturating_add(1),
            }))
        } else {
            fx.push(Effect::Play(AnimationName::Run));
            fx.push(Effect::Travel {
                to: self._state.home,
                travel: Travel::Retreat,
            });
            IsStriking::Done(ActorState::with(Retreating {
                home: self._state.home,
            }))
        }
    }
}

impl ActorState<Retreating> {
    pub fn home(&self) -> Point {
        self._state.home
    }

    pub fn arrive(self, fx: &mut Effects) -> ActorState<Idle> {
        fx.push(Effect::Play(AnimationName::Idle));
        fx.push(Effect::Settle(ActionOutcome::Completed));
        ActorState::with(Idle)
    }
}

impl ActorState<Recoiling> {
    pub fn finish(self, fx: &mut Effects) -> ActorState<Idle> {
        fx.push(Effect::Play(AnimationName::Idle));
        fx.push(Effect::Settle(ActionOutcome::Completed));
        ActorState::with(Idle)
    }
}

impl ActorState<Fleeing> {
    pub fn arrive(self, fx: &mut Effects) -> ActorState<Fled> {
        fx.push(Effect::Release);
        fx.push(Effect::Departed);
        fx.push(Effect::Settle(ActionOutcome::Completed));
        ActorState::with(Fled)
    }
}

impl ActorState<Dying> {
    pub fn finish(self, fx: &mut Effects) -> IsDying {
        if self._state.fade {
            fx.push(Effect::FadeOut);
            IsDying::Fading(ActorState::with(Fading))
        } else {
            IsDying::Dead(rest_in_peace(fx))
        }
    }
}

impl ActorState<Fading> {
    pub fn arrive(self, fx: &mut Effects) -> ActorState<Dead> {
        rest_in_peace(fx)
    }
}

fn rest_in_peace(fx: &mut Effects) -> ActorState<Dead> {
    fx.push(Effect::Release);
    fx.push(Effect::Perished);
    fx.push(Effect::Settle(ActionOutcome::Completed));
    ActorState::with(Dead)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOME: Point = Point { x: 500.0, y: 40.0 };
    const TARGET: Point = Point { x: 120.0, y: 40.0 };

    #[test]
    fn attack_walks_out_and_back() {
        let mut fx = Effects::new();
        let advancing = ActorState::new().attack(HOME, TARGET, &mut fx);
        assert_eq!(advancing.home(), HOME);
        assert_eq!(
            fx,
            vec![
                Effect::Play(AnimationName::Run),
                Effect::Travel {
                    to: TARGET,
                    travel: Travel::Advance
                },
            ]
        );

        fx.clear();
        let striking = advancing.arrive(&mut fx);
        assert_eq!(striking.strikes(), 1);
        assert_eq!(fx.last(), Some(&Effect::Play(AnimationName::Attack)));

        fx.clear();
        let retreating = match striking.finish(false, &mut fx) {
            IsStriking::Done(state) => state,
            IsStriking::Again(_) => panic!("no chain requested"),
        };
        assert_eq!(retreating.home(), HOME);
        assert!(fx.contains(&Effect::Travel {
            to: HOME,
            travel: Travel::Retreat
        }));

        fx.clear();
        retreating.arrive(&mut fx);
        assert_eq!(
            fx,
            vec![
                Effect::Play(AnimationName::Idle),
                Effect::Settle(ActionOutcome::Completed)
            ]
        );
    }

    #[test]
    fn chained_strike_plays_second_attack() {
        let mut fx = Effects::new();
        let striking = ActorState::new()
            .attack(HOME, TARGET, &mut fx)
            .arrive(&mut fx);
        fx.clear();
        match striking.finish(true, &mut fx) {
            IsStriking::Again(again) => {
                assert_eq!(again.strikes(), 2);
                assert_eq!(again.home(), HOME);
            }
            IsStriking::Done(_) => panic!("chain requested"),
        }
        assert_eq!(fx.last(), Some(&Effect::Play(AnimationName::Attack2)));
    }

    #[test]
    fn hurt_returns_to_idle_and_settles() {
        let mut fx = Effects::new();
        let recoiling = ActorState::new().hurt(&mut fx);
        assert_eq!(fx.last(), Some(&Effect::Play(AnimationName::Hurt)));
        fx.clear();
        recoiling.finish(&mut fx);
        assert!(fx.contains(&Effect::Settle(ActionOutcome::Completed)));
    }

    #[test]
    fn death_without_fade_releases_immediately() {
        let mut fx = Effects::new();
        let dying = ActorState::new().die(false, &mut fx);
        assert_eq!(
            fx,
            vec![
                Effect::Cue(CueKind::Death),
                Effect::Play(AnimationName::Death)
            ]
        );
        fx.clear();
        assert!(matches!(dying.finish(&mut fx), IsDying::Dead(_)));
        assert_eq!(
            fx,
            vec![
                Effect::Release,
                Effect::Perished,
                Effect::Settle(ActionOutcome::Completed)
            ]
        );
    }

    #[test]
    fn death_with_fade_waits_for_motion() {
        let mut fx = Effects::new();
        let dying = ActorState::new().hurt(&mut fx).die(true, &mut fx);
        fx.clear();
        let fading = match dying.finish(&mut fx) {
            IsDying::Fading(state) => state,
            IsDying::Dead(_) => panic!("fade requested"),
        };
        assert_eq!(fx, vec![Effect::FadeOut]);
        fx.clear();
        fading.arrive(&mut fx);
        assert!(fx.contains(&Effect::Perished));
    }

    #[test]
    fn flee_ends_in_departure() {
        let mut fx = Effects::new();
        let fleeing = ActorState::new().flee(Point { x: 1300.0, y: 40.0 }, &mut fx);
        fx.clear();
        fleeing.arrive(&mut fx);
        assert_eq!(fx[0], Effect::Release);
        assert_eq!(fx[1], Effect::Departed);
    }
}
