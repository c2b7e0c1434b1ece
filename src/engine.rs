use crate::browser;
use crate::stage::EntityId;
use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
// ELI5: web assembly is a single threaded environment, so Rc RefCell > Mutex
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

/// Engine time, in whole milliseconds since the stage clock started.
pub type Millis = u64;

// ==================== Geometry ====================
#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub position: Point,
    pub size: Size,
}

impl Rect {
    pub fn new(position: Point, size: Size) -> Self {
        Rect { position, size }
    }

    pub fn left(&self) -> f64 {
        self.position.x
    }

    pub fn right(&self) -> f64 {
        self.position.x + self.size.width
    }

    pub fn center_x(&self) -> f64 {
        self.position.x + self.size.width * 0.5
    }
}

// ==================== Visual boundary ====================
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    Left,
    Right,
}

impl Facing {
    /// Horizontal sign pointing away from whatever the character faces.
    pub fn away(self) -> f64 {
        match self {
            Facing::Left => 1.0,
            Facing::Right => -1.0,
        }
    }
}

/// Identifies one requested motion so late completion reports can be told
/// apart from the current one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct MotionTicket(pub u32);

/// The only surface the engine draws through. Implementations own whatever
/// the host renders with (a DOM element in the browser, a recorder in tests).
pub trait SpriteHandle {
    /// Show `image`, drawn at `sheet_size` (the whole sheet, already scaled).
    fn set_image(&mut self, image: &str, sheet_size: Size);
    fn set_frame_size(&mut self, size: Size);
    /// Background offset selecting the visible frame.
    fn set_offset(&mut self, offset: Point);
    /// Jump to a position with no transition.
    fn set_position(&mut self, position: Point);
    /// Smoothly move to `position`; the host reports the end with `ticket`.
    fn slide_to(&mut self, position: Point, duration_ms: u32, ticket: MotionTicket);
    fn fade_out(&mut self, duration_ms: u32, ticket: MotionTicket);
    fn set_facing(&mut self, facing: Facing);
    fn hitbox(&self) -> Rect;
    fn attach(&mut self);
    fn detach(&mut self);
    fn is_attached(&self) -> bool;
}

/// Owned, optional visual handle of one character.
#[derive(Default)]
pub struct Visual {
    handle: Option<Box<dyn SpriteHandle>>,
}

impl Visual {
    pub fn new(handle: Option<Box<dyn SpriteHandle>>) -> Self {
        Visual { handle }
    }

    /// The handle, if it exists and is still attached to the scene.
    pub fn live(&mut self) -> Option<&mut (dyn SpriteHandle + 'static)> {
        self.handle.as_deref_mut().filter(|handle| handle.is_attached())
    }

    pub fn hitbox(&self) -> Option<Rect> {
        self.handle
            .as_deref()
            .filter(|handle| handle.is_attached())
            .map(|handle| handle.hitbox())
    }

    pub fn attach(&mut self) {
        if let Some(handle) = self.handle.as_deref_mut() {
            handle.attach();
        }
    }

    /// Detach and drop the handle. Later writes become no-ops.
    pub fn release(&mut self) {
        if let Some(mut handle) = self.handle.take() {
            handle.detach();
        }
    }

    pub fn is_present(&self) -> bool {
        self.handle.is_some()
    }
}

impl std::fmt::Debug for Visual {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Visual")
            .field("present", &self.handle.is_some())
            .finish()
    }
}

// ==================== Timers ====================
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug, Clone, Copy)]
struct TimerEntry {
    owner: EntityId,
    due: Millis,
    repeat: Option<Millis>,
}

/// Recurring and one-shot timers on a virtual clock.
///
/// The host moves the clock forward with [`Timers::pop_due`]; nothing fires
/// on its own. Timers due at the same instant fire in creation order, and a
/// timer created while another one is being handled counts from the instant
/// that one fired.
#[derive(Debug, Default)]
pub struct Timers {
    clock: Millis,
    horizon: Millis,
    next_id: u64,
    queue: BTreeSet<(Millis, TimerId)>,
    entries: HashMap<TimerId, TimerEntry>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> Millis {
        self.clock
    }

    /// Fire every `period` ms, first at `now + period`.
    pub fn every(&mut self, owner: EntityId, period: Millis) -> TimerId {
        let period = period.max(1);
        self.schedule(owner, period, Some(period))
    }

    /// Fire once after `delay` ms.
    pub fn after(&mut self, owner: EntityId, delay: Millis) -> TimerId {
        self.schedule(owner, delay, None)
    }

    fn schedule(&mut self, owner: EntityId, delay: Millis, repeat: Option<Millis>) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        let due = self.clock + delay;
        self.queue.insert((due, id));
        self.entries.insert(id, TimerEntry { owner, due, repeat });
        id
    }

    /// Returns false when the timer had already fired (one-shot) or been cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        match self.entries.remove(&id) {
            Some(entry) => {
                self.queue.remove(&(entry.due, id));
                true
            }
            None => false,
        }
    }

    pub fn is_live(&self, id: TimerId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn live_for(&self, owner: EntityId) -> usize {
        self.entries
            .values()
            .filter(|entry| entry.owner == owner)
            .count()
    }

    pub fn cancel_all_for(&mut self, owner: EntityId) {
        let ids: Vec<TimerId> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.owner == owner)
            .map(|(id, _)| *id)
            .collect();
        for id in ids {
            self.cancel(id);
        }
    }

    /// Pop the earliest timer due at or before `now`, moving the clock to its
    /// due instant. Recurring timers are re-armed before they are returned.
    pub fn pop_due(&mut self, now: Millis) -> Option<(TimerId, EntityId)> {
        let &(due, id) = self.queue.iter().next()?;
        if due > now {
            return None;
        }
        self.horizon = self.horizon.max(now);
        self.queue.remove(&(due, id));
        self.clock = self.clock.max(due);
        let entry = self.entries.get_mut(&id)?;
        let owner = entry.owner;
        match entry.repeat {
            Some(period) => {
                entry.due = due + period;
                self.queue.insert((entry.due, id));
            }
            None => {
                self.entries.remove(&id);
            }
        }
        Some((id, owner))
    }

    /// Drop the firings of a recurring timer that are already due by the
    /// instant the host is catching up to, keeping its phase. Returns how many
    /// were dropped.
    pub fn skip_missed(&mut self, id: TimerId) -> u32 {
        let horizon = self.horizon;
        let Some(entry) = self.entries.get_mut(&id) else {
            return 0;
        };
        let Some(period) = entry.repeat else {
            return 0;
        };
        if entry.due > horizon {
            return 0;
        }
        let missed = (horizon - entry.due) / period + 1;
        self.queue.remove(&(entry.due, id));
        entry.due += missed * period;
        self.queue.insert((entry.due, id));
        u32::try_from(missed).unwrap_or(u32::MAX)
    }

    /// Move the clock to `now` once nothing more is due.
    pub fn settle(&mut self, now: Millis) {
        self.clock = self.clock.max(now);
    }
}

// ==================== Frame loop ====================
pub trait Game {
    fn update(&mut self, now_ms: f64);
}

pub struct GameLoop;

type SharedLoopClosure = Rc<RefCell<Option<browser::LoopClosure>>>;

impl GameLoop {
    /// Drive `game` from requestAnimationFrame for the lifetime of the page.
    pub fn start(mut game: impl Game + 'static) -> Result<()> {
        let f: SharedLoopClosure = Rc::new(RefCell::new(None));
        let g = f.clone();
        *g.borrow_mut() = Some(browser::create_raf_closure(move |perf: f64| {
            game.update(perf);
            if let Some(closure) = f.borrow().as_ref() {
                if let Err(err) = browser::request_animation_frame(closure) {
                    log::error!("GameLoop stopped: {err:#}");
                }
            }
        }));

        browser::request_animation_frame(
            g.borrow()
                .as_ref()
                .ok_or_else(|| anyhow!("GameLoop: Loop is None"))?,
        )?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: EntityId = EntityId(1);
    const B: EntityId = EntityId(2);

    fn drain(timers: &mut Timers, now: Millis) -> Vec<(Millis, TimerId)> {
        let mut fired = Vec::new();
        while let Some((id, _)) = timers.pop_due(now) {
            fired.push((timers.now(), id));
        }
        timers.settle(now);
        fired
    }

    #[test]
    fn interval_fires_once_per_period() {
        let mut timers = Timers::new();
        let id = timers.every(A, 100);
        let fired = drain(&mut timers, 350);
        assert_eq!(fired, vec![(100, id), (200, id), (300, id)]);
        assert!(timers.is_live(id));
        assert_eq!(timers.now(), 350);
    }

    #[test]
    fn timeout_fires_once_and_is_gone() {
        let mut timers = Timers::new();
        let id = timers.after(A, 50);
        assert_eq!(drain(&mut timers, 49), vec![]);
        assert_eq!(drain(&mut timers, 1000), vec![(50, id)]);
        assert!(!timers.is_live(id));
        assert!(!timers.cancel(id));
    }

    #[test]
    fn same_instant_fires_in_creation_order() {
        let mut timers = Timers::new();
        let first = timers.after(B, 100);
        let second = timers.every(A, 100);
        let fired = drain(&mut timers, 100);
        assert_eq!(fired, vec![(100, first), (100, second)]);
    }

    #[test]
    fn timers_created_mid_dispatch_count_from_firing_instant() {
        let mut timers = Timers::new();
        timers.after(A, 100);
        let (_, owner) = timers.pop_due(1000).unwrap();
        assert_eq!(owner, A);
        let follow = timers.after(A, 30);
        assert_eq!(drain(&mut timers, 1000), vec![(130, follow)]);
    }

    #[test]
    fn cancel_and_per_owner_accounting() {
        let mut timers = Timers::new();
        let a1 = timers.every(A, 10);
        timers.after(A, 10);
        timers.every(B, 10);
        assert_eq!(timers.live_for(A), 2);
        assert!(timers.cancel(a1));
        assert_eq!(timers.live_for(A), 1);
        timers.cancel_all_for(A);
        assert_eq!(timers.live_for(A), 0);
        assert_eq!(timers.live_for(B), 1);
        assert_eq!(drain(&mut timers, 10).len(), 1);
    }

    #[test]
    fn skip_missed_jumps_an_interval_past_the_horizon() {
        let mut timers = Timers::new();
        let id = timers.every(A, 100);
        let once = timers.after(B, 250);
        assert_eq!(timers.pop_due(1_000), Some((id, A)));
        assert_eq!(timers.skip_missed(id), 9);
        assert_eq!(timers.skip_missed(once), 0);
        assert_eq!(drain(&mut timers, 1_100), vec![(250, once), (1_100, id)]);
        assert_eq!(timers.skip_missed(id), 0);
    }

    #[test]
    fn zero_period_interval_still_advances() {
        let mut timers = Timers::new();
        let id = timers.every(A, 0);
        assert_eq!(drain(&mut timers, 2), vec![(1, id), (2, id)]);
    }

    #[test]
    fn rect_edges() {
        let rect = Rect::new(
            Point { x: 10.0, y: 0.0 },
            Size {
                width: 40.0,
                height: 5.0,
            },
        );
        assert_eq!(rect.left(), 10.0);
        assert_eq!(rect.right(), 50.0);
        assert_eq!(rect.center_x(), 30.0);
        assert_eq!(Facing::Left.away(), 1.0);
        assert_eq!(Facing::Right.away(), -1.0);
    }
}
