//! A [`SpriteHandle`] backed by an absolutely positioned `<div>`.
//!
//! Frames are shown by moving `background-position`; slides and fades are
//! CSS transitions whose `transitionend` is posted to a shared inbox that the
//! frame loop hands back to the stage.
use crate::browser;
use crate::engine::{Facing, MotionTicket, Point, Rect, Size, SpriteHandle};
use crate::stage::EntityId;
use anyhow::{anyhow, Result};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Event, HtmlElement};

/// Finished motions waiting for the next frame.
pub type MotionInbox = Rc<RefCell<Vec<(EntityId, MotionTicket)>>>;

const TRANSITION_END: &str = "transitionend";

pub struct DomSprite {
    element: HtmlElement,
    container: HtmlElement,
    attached: bool,
    in_flight: Rc<Cell<Option<MotionTicket>>>,
    on_transition_end: Closure<dyn FnMut(Event)>,
}

impl DomSprite {
    pub fn new(container: &HtmlElement, owner: EntityId, inbox: MotionInbox) -> Result<Self> {
        let element = browser::create_div("sprite")?;
        let in_flight: Rc<Cell<Option<MotionTicket>>> = Rc::new(Cell::new(None));

        // one report per motion, however many properties were transitioning
        let pending = Rc::clone(&in_flight);
        let on_transition_end = browser::closure_wrap(Box::new(move |_event: Event| {
            if let Some(ticket) = pending.take() {
                inbox.borrow_mut().push((owner, ticket));
            }
        }) as Box<dyn FnMut(Event)>);
        element
            .add_event_listener_with_callback(
                TRANSITION_END,
                on_transition_end.as_ref().unchecked_ref(),
            )
            .map_err(|err| anyhow!("Could not listen for {TRANSITION_END} : {:#?}", err))?;

        let sprite = DomSprite {
            element,
            container: container.clone(),
            attached: false,
            in_flight,
            on_transition_end,
        };
        sprite.style("position", "absolute");
        sprite.style("background-repeat", "no-repeat");
        sprite.style("image-rendering", "pixelated");
        Ok(sprite)
    }

    fn style(&self, property: &str, value: &str) {
        if let Err(err) = self.element.style().set_property(property, value) {
            log::warn!("could not set {property}: {:#?}", err);
        }
    }

    fn place(&self, position: Point) {
        self.style("left", &format!("{}px", position.x));
        self.style("top", &format!("{}px", position.y));
    }
}

impl SpriteHandle for DomSprite {
    fn set_image(&mut self, image: &str, sheet_size: Size) {
        self.style("background-image", &format!("url(\"{image}\")"));
        self.style(
            "background-size",
            &format!("{}px {}px", sheet_size.width, sheet_size.height),
        );
    }

    fn set_frame_size(&mut self, size: Size) {
        self.style("width", &format!("{}px", size.width));
        self.style("height", &format!("{}px", size.height));
    }

    fn set_offset(&mut self, offset: Point) {
        self.style(
            "background-position",
            &format!("{}px {}px", offset.x, offset.y),
        );
    }

    fn set_position(&mut self, position: Point) {
        self.in_flight.set(None);
        self.style("transition", "none");
        self.place(position);
    }

    fn slide_to(&mut self, position: Point, duration_ms: u32, ticket: MotionTicket) {
        self.in_flight.set(Some(ticket));
        self.style(
            "transition",
            &format!("left {duration_ms}ms linear, top {duration_ms}ms linear"),
        );
        self.place(position);
    }

    fn fade_out(&mut self, duration_ms: u32, ticket: MotionTicket) {
        self.in_flight.set(Some(ticket));
        self.style("transition", &format!("opacity {duration_ms}ms ease-out"));
        self.style("opacity", "0");
    }

    /// Sheets are drawn facing right.
    fn set_facing(&mut self, facing: Facing) {
        let transform = match facing {
            Facing::Right => "scaleX(1)",
            Facing::Left => "scaleX(-1)",
        };
        self.style("transform", transform);
    }

    /// Bounding box relative to the container.
    fn hitbox(&self) -> Rect {
        let own = self.element.get_bounding_client_rect();
        let origin = self.container.get_bounding_client_rect();
        Rect::new(
            Point {
                x: own.left() - origin.left(),
                y: own.top() - origin.top(),
            },
            Size {
                width: own.width(),
                height: own.height(),
            },
        )
    }

    fn attach(&mut self) {
        match self.container.append_child(&self.element) {
            Ok(_) => self.attached = true,
            Err(err) => log::warn!("could not attach sprite: {:#?}", err),
        }
    }

    fn detach(&mut self) {
        self.in_flight.set(None);
        self.element.remove();
        self.attached = false;
    }

    fn is_attached(&self) -> bool {
        self.attached && self.element.is_connected()
    }
}

impl Drop for DomSprite {
    fn drop(&mut self) {
        let _ = self.element.remove_event_listener_with_callback(
            TRANSITION_END,
            self.on_transition_end.as_ref().unchecked_ref(),
        );
    }
}
