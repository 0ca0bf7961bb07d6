//! State-scoped single-shot timers.
//!
//! One relative timer and one absolute wall-clock timer per machine, matching
//! what the state handlers are allowed to arm. Expirations are not delivered
//! synchronously: each armed timer spawns a task that posts a `Wake` value to
//! the owner's input queue. Because the queue may already hold an expiration
//! when a state clears its timer on exit, every arm and clear bumps an epoch
//! and the queue owner is expected to drop fires whose epoch is stale (see
//! [`Timers::accept`]).

use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// A timer expiration as it travels through the owner's input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerFire {
    /// The relative timer expired.
    Timeout { epoch: u64 },

    /// The absolute wall-clock timer expired.
    TimeoutAt { epoch: u64 },
}

struct Slot {
    epoch: u64,
    task: Option<AbortHandle>,
}

impl Slot {
    fn new() -> Self {
        Self {
            epoch: 0,
            task: None,
        }
    }

    /// Abort any armed task and invalidate queued fires.
    fn clear(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.epoch += 1;
    }
}

/// The relative/absolute timer pair owned by a [`Machine`](crate::Machine).
///
/// Timers are single-shot: rearming is explicit and replaces the previous
/// deadline.
pub struct Timers<W> {
    tx: mpsc::UnboundedSender<W>,
    relative: Slot,
    absolute: Slot,
}

impl<W: From<TimerFire> + Send + 'static> Timers<W> {
    /// Create a timer pair posting expirations to `tx`.
    pub fn new(tx: mpsc::UnboundedSender<W>) -> Self {
        Self {
            tx,
            relative: Slot::new(),
            absolute: Slot::new(),
        }
    }

    /// Arm the relative timer to fire after `delay`.
    pub fn set_timeout(&mut self, delay: Duration) {
        self.relative.clear();
        let epoch = self.relative.epoch;
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(W::from(TimerFire::Timeout { epoch }));
        });
        self.relative.task = Some(task.abort_handle());
    }

    /// Cancel the relative timer. Already-queued fires become stale.
    pub fn clear_timeout(&mut self) {
        self.relative.clear();
    }

    /// Arm the absolute timer to fire at wall-clock time `at` plus `offset`.
    ///
    /// A deadline already in the past fires immediately (plus the offset).
    /// The deadline is converted to a runtime sleep at arm time, so the timer
    /// follows small clock jitter but not large clock jumps.
    pub fn set_timeout_at(&mut self, at: SystemTime, offset: Duration) {
        self.absolute.clear();
        let epoch = self.absolute.epoch;
        let delay = at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
            + offset;
        let tx = self.tx.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(W::from(TimerFire::TimeoutAt { epoch }));
        });
        self.absolute.task = Some(task.abort_handle());
    }

    /// Cancel the absolute timer. Already-queued fires become stale.
    pub fn clear_timeout_at(&mut self) {
        self.absolute.clear();
    }

    /// Whether a queued fire is still current. The queue owner must call
    /// this before dispatching a timeout event into the machine; a fire that
    /// raced with a `clear_*` on state exit is dropped here.
    pub fn accept(&self, fire: TimerFire) -> bool {
        match fire {
            TimerFire::Timeout { epoch } => {
                epoch == self.relative.epoch && self.relative.task.is_some()
            }
            TimerFire::TimeoutAt { epoch } => {
                epoch == self.absolute.epoch && self.absolute.task.is_some()
            }
        }
    }
}
