//! Frame stepping for one character.
//!
//! An [`Animator`] owns at most one interval timer. Starting an animation
//! always cancels the previous timer first, so a character never has two
//! frame loops running.
use crate::engine::{Millis, TimerId, Timers, Visual};
use crate::error::EngineError;
use crate::sprite::{AnimationName, CharacterSpec, FrameGeometry};
use crate::stage::EntityId;

/// Result of showing a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Frame `index` is showing. `hit` is true the first time the hit frame
    /// is reached during this run.
    Frame { index: u32, hit: bool },
    /// A one-shot animation ran past its last frame. Reported once per start.
    Finished,
    /// Nothing is running.
    Stopped,
}

#[derive(Debug)]
pub struct Animator {
    owner: EntityId,
    current: AnimationName,
    geometry: Option<FrameGeometry>,
    scale: f64,
    frame: u32,
    hit_frame: Option<u32>,
    hit_sent: bool,
    finished: bool,
    timer: Option<TimerId>,
}

impl Animator {
    pub fn new(owner: EntityId) -> Self {
        Animator {
            owner,
            current: AnimationName::Idle,
            geometry: None,
            scale: 1.0,
            frame: 0,
            hit_frame: None,
            hit_sent: false,
            finished: false,
            timer: None,
        }
    }

    pub fn current(&self) -> AnimationName {
        self.current
    }

    pub fn frame(&self) -> u32 {
        self.frame
    }

    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// True while `name` is the animation with a live frame loop.
    pub fn is_playing(&self, name: AnimationName) -> bool {
        self.current == name && self.timer.is_some()
    }

    /// Cancel whatever is running and show `start_frame` of `name`.
    pub fn start(
        &mut self,
        spec: &CharacterSpec,
        name: AnimationName,
        start_frame: u32,
        timers: &mut Timers,
        visual: &mut Visual,
    ) -> Result<Step, EngineError> {
        let sheet = spec.sheet(name)?;
        self.stop(timers);

        let geometry = sheet.geometry;
        self.current = name;
        self.geometry = Some(geometry);
        self.scale = spec.scale;
        self.frame = start_frame.min(geometry.frame_count.saturating_sub(1));
        self.hit_frame = sheet.hit_frame;
        self.hit_sent = false;
        self.finished = false;

        match visual.live() {
            Some(handle) => {
                handle.set_image(&sheet.image, geometry.sheet_size(spec.scale));
                handle.set_frame_size(geometry.frame_size(spec.scale));
                handle.set_offset(geometry.offset(self.frame, spec.scale));
            }
            None => log::trace!("{}: no visual for {name} start", self.owner),
        }

        self.timer = Some(timers.every(self.owner, Millis::from(sheet.frame_duration_ms)));
        Ok(Step::Frame {
            index: self.frame,
            hit: self.take_hit(),
        })
    }

    /// Advance one frame. Called when this animator's timer fires.
    pub fn tick(&mut self, timers: &mut Timers, visual: &mut Visual) -> Step {
        let Some(geometry) = self.geometry else {
            return Step::Stopped;
        };
        if self.finished || self.timer.is_none() {
            return Step::Stopped;
        }

        let next = self.frame + 1;
        if self.current.is_looping() {
            // a loop behind the clock jumps ahead instead of replaying frames
            let missed = self.timer.map_or(0, |id| timers.skip_missed(id));
            let steps = u64::from(next) + u64::from(missed);
            self.frame = (steps % u64::from(geometry.frame_count)) as u32;
        } else if next >= geometry.frame_count {
            self.finished = true;
            self.stop(timers);
            return Step::Finished;
        } else {
            self.frame = next;
        }

        match visual.live() {
            Some(handle) => handle.set_offset(geometry.offset(self.frame, self.scale)),
            None => log::trace!("{}: skipped frame {} of {}", self.owner, self.frame, self.current),
        }

        Step::Frame {
            index: self.frame,
            hit: self.take_hit(),
        }
    }

    pub fn stop(&mut self, timers: &mut Timers) {
        if let Some(id) = self.timer.take() {
            timers.cancel(id);
        }
    }

    fn take_hit(&mut self) -> bool {
        if !self.hit_sent && self.hit_frame == Some(self.frame) {
            self.hit_sent = true;
            return true;
        }
        false
    }
}
