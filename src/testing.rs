//! Test doubles for the visual boundary.
use crate::engine::{Facing, MotionTicket, Point, Rect, Size, SpriteHandle};
use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct SpriteLog {
    pub images: Vec<String>,
    pub frame_sizes: Vec<Size>,
    pub offsets: Vec<Point>,
    pub positions: Vec<Point>,
    pub slides: Vec<(Point, u32, MotionTicket)>,
    pub fades: Vec<(u32, MotionTicket)>,
    pub facing: Option<Facing>,
    pub attached: bool,
    pub attach_count: u32,
    pub detach_count: u32,
}

/// Records every call; clones share one log.
#[derive(Debug, Clone, Default)]
pub struct RecordingSprite {
    log: Rc<RefCell<SpriteLog>>,
}

impl RecordingSprite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attached() -> Self {
        let sprite = Self::new();
        sprite.log_mut().attached = true;
        sprite
    }

    pub fn log(&self) -> Ref<'_, SpriteLog> {
        self.log.borrow()
    }

    pub fn log_mut(&self) -> RefMut<'_, SpriteLog> {
        self.log.borrow_mut()
    }

    pub fn last_slide(&self) -> Option<(Point, u32, MotionTicket)> {
        self.log().slides.last().copied()
    }
}

impl SpriteHandle for RecordingSprite {
    fn set_image(&mut self, image: &str, _sheet_size: Size) {
        self.log_mut().images.push(image.to_string());
    }

    fn set_frame_size(&mut self, size: Size) {
        self.log_mut().frame_sizes.push(size);
    }

    fn set_offset(&mut self, offset: Point) {
        self.log_mut().offsets.push(offset);
    }

    fn set_position(&mut self, position: Point) {
        self.log_mut().positions.push(position);
    }

    fn slide_to(&mut self, position: Point, duration_ms: u32, ticket: MotionTicket) {
        let mut log = self.log_mut();
        log.slides.push((position, duration_ms, ticket));
        log.positions.push(position);
    }

    fn fade_out(&mut self, duration_ms: u32, ticket: MotionTicket) {
        self.log_mut().fades.push((duration_ms, ticket));
    }

    fn set_facing(&mut self, facing: Facing) {
        self.log_mut().facing = Some(facing);
    }

    fn hitbox(&self) -> Rect {
        let log = self.log();
        Rect::new(
            log.positions.last().copied().unwrap_or_default(),
            log.frame_sizes.last().copied().unwrap_or_default(),
        )
    }

    fn attach(&mut self) {
        let mut log = self.log_mut();
        log.attached = true;
        log.attach_count += 1;
    }

    fn detach(&mut self) {
        let mut log = self.log_mut();
        log.attached = false;
        log.detach_count += 1;
    }

    fn is_attached(&self) -> bool {
        self.log().attached
    }
}
