use std::time::Duration;

use crate::header::Headers;
use crate::timer::{Scheduler, TimerId, TimerSlot};
use crate::transport::ConnectRequest;

/// Default delay between reconnect attempts.
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(5);

/// Whether the reconnect timer keeps firing or fires once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectMode {
    #[default]
    Repeating,
    Once,
}

/// How the client retries a dropped session.
///
/// On every fire the client reopens the session if the transport is not
/// connected, or unconditionally when `force` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub interval: Duration,
    pub mode: ReconnectMode,
    pub force: bool,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECONNECT_INTERVAL,
            mode: ReconnectMode::Repeating,
            force: false,
        }
    }
}

impl ReconnectPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Fire a single time instead of repeatedly.
    pub fn once(mut self) -> Self {
        self.mode = ReconnectMode::Once;
        self
    }

    /// Reopen on every fire, even while connected.
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// A pending reopen handed back to the session when the timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ReconnectTarget {
    pub(crate) request: ConnectRequest,
    pub(crate) connection_headers: Headers,
}

/// Owns the reconnect timer of one session.
#[derive(Debug, Default)]
pub(crate) struct ReconnectController {
    timer: TimerSlot,
    policy: ReconnectPolicy,
    target: Option<ReconnectTarget>,
}

impl ReconnectController {
    /// Arm the timer for `target`, replacing any previous reconnect setup.
    pub(crate) fn start<F>(
        &mut self,
        scheduler: &dyn Scheduler,
        target: ReconnectTarget,
        policy: ReconnectPolicy,
        on_fire: F,
    ) where
        F: Fn(TimerId) + Send + 'static,
    {
        let id = match policy.mode {
            ReconnectMode::Repeating => self.timer.arm_repeating(scheduler, policy.interval, on_fire),
            ReconnectMode::Once => self.timer.arm_once(scheduler, policy.interval, on_fire),
        };
        tracing::debug!(?id, interval = ?policy.interval, mode = ?policy.mode, force = policy.force, "reconnect armed");
        self.policy = policy;
        self.target = Some(target);
    }

    /// Cancel any pending fire. Idempotent.
    pub(crate) fn stop(&mut self) {
        if self.timer.disarm() {
            tracing::debug!("reconnect stopped");
        }
        self.target = None;
    }

    /// Decide what a fire with `id` should do.
    ///
    /// Returns the request to reopen with, or `None` when the fire is stale or
    /// the session is connected and the policy is not forced. A one-shot timer
    /// is spent after its first accepted fire.
    pub(crate) fn on_fire(&mut self, id: TimerId, connected: bool) -> Option<ReconnectTarget> {
        if !self.timer.is_current(id) {
            return None;
        }
        let target = match self.policy.mode {
            ReconnectMode::Repeating => self.target.clone(),
            ReconnectMode::Once => {
                self.timer.disarm();
                self.target.take()
            }
        }?;
        if connected && !self.policy.force {
            return None;
        }
        Some(target)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.timer.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::TokioScheduler;

    fn target() -> ReconnectTarget {
        ReconnectTarget {
            request: ConnectRequest::new("ws://broker/ws"),
            connection_headers: Headers::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn skips_when_connected_unless_forced() {
        let mut rc = ReconnectController::default();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        rc.start(&TokioScheduler, target(), ReconnectPolicy::default(), move |id| {
            let _ = tx.send(id);
        });
        tokio::time::sleep(Duration::from_secs(5)).await;
        let id = rx.recv().await.expect("fire");

        assert!(rc.on_fire(id, true).is_none());
        assert_eq!(rc.on_fire(id, false), Some(target()));
        assert!(rc.is_running());

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        rc.start(&TokioScheduler, target(), ReconnectPolicy::default().forced(), move |id| {
            let _ = tx.send(id);
        });
        let forced_id = rx.recv().await.expect("fire");
        assert!(rc.on_fire(id, false).is_none(), "old timer id is stale");
        assert_eq!(rc.on_fire(forced_id, true), Some(target()));
    }

    #[tokio::test(start_paused = true)]
    async fn once_mode_fires_a_single_time() {
        let mut rc = ReconnectController::default();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        rc.start(&TokioScheduler, target(), ReconnectPolicy::default().once(), move |id| {
            let _ = tx.send(id);
        });
        let id = rx.recv().await.expect("fire");
        assert!(rc.on_fire(id, false).is_some());
        assert!(!rc.is_running());
        assert!(rc.on_fire(id, false).is_none());
    }

    #[test]
    fn stop_is_idempotent() {
        let mut rc = ReconnectController::default();
        rc.stop();
        rc.stop();
        assert!(!rc.is_running());
    }
}
