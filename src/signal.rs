//! Everything the engine tells the outside world.
//!
//! Damage events, sound cues, health updates and scene hooks go out through
//! one fire-and-forget channel. Actions that take time hand back a
//! [`Completion`] instead.
use crate::sprite::AnimationName;
use crate::stage::EntityId;
use futures::channel::mpsc::{self, UnboundedReceiver, UnboundedSender};
use futures::channel::oneshot;
use serde::Serialize;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Published once per attack run, when the hit frame first shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageEvent {
    pub source: EntityId,
    pub animation: AnimationName,
    pub frame_index: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Signal {
    Damage(DamageEvent),
    Sound { source: EntityId, cue: String },
    Health { entity: EntityId, current: u32, max: u32 },
    /// The death sequence finished and the visual is gone.
    DeathComplete { entity: EntityId },
    Fled { entity: EntityId },
}

pub type SignalReceiver = UnboundedReceiver<Signal>;

#[derive(Debug, Clone)]
pub struct Signals {
    tx: UnboundedSender<Signal>,
}

impl Signals {
    pub fn channel() -> (Signals, SignalReceiver) {
        let (tx, rx) = mpsc::unbounded();
        (Signals { tx }, rx)
    }

    pub fn publish(&self, signal: Signal) {
        if let Err(err) = self.tx.unbounded_send(signal) {
            log::trace!("signal dropped, nobody listening: {:?}", err.into_inner());
        }
    }
}

/// Everything currently queued on `rx`.
pub fn drain(rx: &mut SignalReceiver) -> Vec<Signal> {
    let mut signals = Vec::new();
    while let Ok(Some(signal)) = rx.try_next() {
        signals.push(signal);
    }
    signals
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionOutcome {
    /// Played through to the end.
    Completed,
    /// Superseded by another action, or the entity was removed.
    Interrupted,
    /// Not accepted in the entity's current phase.
    Skipped,
}

impl ActionOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            ActionOutcome::Completed => "completed",
            ActionOutcome::Interrupted => "interrupted",
            ActionOutcome::Skipped => "skipped",
        }
    }
}

/// Resolves exactly once when an action ends.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<ActionOutcome>,
    outcome: Option<ActionOutcome>,
}

impl Completion {
    pub(crate) fn pending() -> (oneshot::Sender<ActionOutcome>, Completion) {
        let (tx, rx) = oneshot::channel();
        (tx, Completion { rx, outcome: None })
    }

    pub fn ready(outcome: ActionOutcome) -> Self {
        let (_, rx) = oneshot::channel();
        Completion {
            rx,
            outcome: Some(outcome),
        }
    }

    /// The outcome if the action has ended, without waiting.
    pub fn try_outcome(&mut self) -> Option<ActionOutcome> {
        if self.outcome.is_none() {
            self.outcome = match self.rx.try_recv() {
                Ok(outcome) => outcome,
                Err(oneshot::Canceled) => Some(ActionOutcome::Interrupted),
            };
        }
        self.outcome
    }
}

impl Future for Completion {
    type Output = ActionOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.outcome {
            return Poll::Ready(outcome);
        }
        let polled = Pin::new(&mut self.rx).poll(cx);
        polled.map(|result| {
            let outcome = result.unwrap_or(ActionOutcome::Interrupted);
            self.outcome = Some(outcome);
            outcome
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    #[test]
    fn completion_resolves_once_and_remembers() {
        let (tx, mut completion) = Completion::pending();
        assert_eq!(completion.try_outcome(), None);
        tx.send(ActionOutcome::Completed).unwrap();
        assert_eq!(completion.try_outcome(), Some(ActionOutcome::Completed));
        assert_eq!(completion.try_outcome(), Some(ActionOutcome::Completed));
        assert_eq!(block_on(completion), ActionOutcome::Completed);
    }

    #[test]
    fn dropped_sender_reads_as_interrupted() {
        let (tx, completion) = Completion::pending();
        drop(tx);
        assert_eq!(block_on(completion), ActionOutcome::Interrupted);
    }

    #[test]
    fn ready_completion_needs_no_sender() {
        let mut completion = Completion::ready(ActionOutcome::Skipped);
        assert_eq!(completion.try_outcome(), Some(ActionOutcome::Skipped));
        assert_eq!(block_on(completion), ActionOutcome::Skipped);
    }

    #[test]
    fn publish_without_listener_is_silent() {
        let (signals, rx) = Signals::channel();
        drop(rx);
        signals.publish(Signal::Fled {
            entity: EntityId(1),
        });
    }

    #[test]
    fn drain_collects_in_order() {
        let (signals, mut rx) = Signals::channel();
        signals.publish(Signal::DeathComplete {
            entity: EntityId(1),
        });
        signals.publish(Signal::Fled {
            entity: EntityId(2),
        });
        assert_eq!(
            drain(&mut rx),
            vec![
                Signal::DeathComplete {
                    entity: EntityId(1)
                },
                Signal::Fled {
                    entity: EntityId(2)
                },
            ]
        );
        assert!(drain(&mut rx).is_empty());
    }
}
