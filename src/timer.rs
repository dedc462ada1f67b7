//! Scheduling capability used by the heartbeat and reconnect controllers.

use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Work run by a repeating timer on every tick.
pub type RepeatingTask = Box<dyn FnMut() + Send + 'static>;

/// Work run once when a one-shot timer fires.
pub type OnceTask = Box<dyn FnOnce() + Send + 'static>;

/// Shortest period a repeating timer runs at. Zero is raised to this.
pub const MIN_REPEAT_INTERVAL: Duration = Duration::from_millis(1);

/// Runs callbacks later. Callbacks may run on any thread; the session only
/// uses them to post a message to itself.
pub trait Scheduler: Send + Sync + 'static {
    /// Run `task` every `every`, first after one full interval. A zero
    /// `every` runs at [`MIN_REPEAT_INTERVAL`].
    fn schedule_repeating(&self, every: Duration, task: RepeatingTask) -> TimerHandle;

    /// Run `task` once after `after`.
    fn schedule_once(&self, after: Duration, task: OnceTask) -> TimerHandle;
}

/// Cancels its timer when cancelled or dropped.
#[derive(Debug)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    /// Cancel the timer. Idempotent.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

/// [`Scheduler`] backed by tokio timers. Must be used from within a tokio
/// runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioScheduler;

impl Scheduler for TokioScheduler {
    fn schedule_repeating(&self, every: Duration, mut task: RepeatingTask) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        let every = every.max(MIN_REPEAT_INTERVAL);
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + every, every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => task(),
                }
            }
        });
        TimerHandle::new(token)
    }

    fn schedule_once(&self, after: Duration, task: OnceTask) -> TimerHandle {
        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = time::sleep(after) => task(),
            }
        });
        TimerHandle::new(token)
    }
}

/// Identifies one arming of a [`TimerSlot`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TimerId(u64);

/// A slot holding at most one armed timer.
///
/// Arming cancels whatever was armed before. Ticks carry the [`TimerId`] they
/// were armed with; a tick whose id is not current belongs to a cancelled
/// timer and must be ignored, even if it was already queued.
#[derive(Debug, Default)]
pub(crate) struct TimerSlot {
    armed: Option<(TimerId, TimerHandle)>,
    next_id: u64,
}

impl TimerSlot {
    pub(crate) fn arm_repeating<F>(&mut self, scheduler: &dyn Scheduler, every: Duration, on_tick: F) -> TimerId
    where
        F: Fn(TimerId) + Send + 'static,
    {
        self.disarm();
        let id = self.allocate();
        let handle = scheduler.schedule_repeating(every, Box::new(move || on_tick(id)));
        self.armed = Some((id, handle));
        id
    }

    pub(crate) fn arm_once<F>(&mut self, scheduler: &dyn Scheduler, after: Duration, on_fire: F) -> TimerId
    where
        F: FnOnce(TimerId) + Send + 'static,
    {
        self.disarm();
        let id = self.allocate();
        let handle = scheduler.schedule_once(after, Box::new(move || on_fire(id)));
        self.armed = Some((id, handle));
        id
    }

    /// Cancel the armed timer, if any. Returns whether one was armed.
    pub(crate) fn disarm(&mut self) -> bool {
        match self.armed.take() {
            Some((_, handle)) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    pub(crate) fn is_current(&self, id: TimerId) -> bool {
        matches!(&self.armed, Some((current, _)) if *current == id)
    }

    pub(crate) fn is_armed(&self) -> bool {
        self.armed.is_some()
    }

    fn allocate(&mut self) -> TimerId {
        self.next_id += 1;
        TimerId(self.next_id)
    }
}
