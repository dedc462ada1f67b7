use std::time::Duration;

use crate::timer::{Scheduler, TimerId, TimerSlot};

/// Default interval between heartbeat pings.
pub const DEFAULT_HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Client heartbeat settings.
///
/// When enabled the session pings the transport every `interval` while it is
/// connected and emits [`StompEvent::SentPing`](crate::StompEvent::SentPing)
/// for each ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub interval: Duration,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_HEARTBEAT_INTERVAL,
        }
    }
}

impl HeartbeatConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Heartbeats switched off.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

/// Owns the repeating ping timer of one session.
#[derive(Debug, Default)]
pub(crate) struct HeartbeatController {
    config: HeartbeatConfig,
    timer: TimerSlot,
}

impl HeartbeatController {
    pub(crate) fn new(config: HeartbeatConfig) -> Self {
        Self {
            config,
            timer: TimerSlot::default(),
        }
    }

    pub(crate) fn config(&self) -> HeartbeatConfig {
        self.config
    }

    /// Replace the settings. Disabling stops a running ticker; other changes
    /// apply at the next [`HeartbeatController::on_connected`].
    pub(crate) fn configure(&mut self, config: HeartbeatConfig) {
        self.config = config;
        if !config.enabled {
            self.stop();
        }
    }

    /// (Re)start the ticker for a freshly connected transport. Any previous
    /// ticker is cancelled first; when heartbeats are disabled the controller
    /// ends up stopped.
    pub(crate) fn on_connected<F>(&mut self, scheduler: &dyn Scheduler, on_tick: F)
    where
        F: Fn(TimerId) + Send + 'static,
    {
        if self.config.enabled {
            let id = self
                .timer
                .arm_repeating(scheduler, self.config.interval, on_tick);
            tracing::debug!(interval = ?self.config.interval, ?id, "heartbeat started");
        } else {
            self.stop();
        }
    }

    /// Stop the ticker. Idempotent.
    pub(crate) fn stop(&mut self) {
        if self.timer.disarm() {
            tracing::debug!("heartbeat stopped");
        }
    }

    /// Whether a tick with `id` should still result in a ping.
    pub(crate) fn accepts(&self, id: TimerId) -> bool {
        self.timer.is_current(id)
    }

    pub(crate) fn is_running(&self) -> bool {
        self.timer.is_armed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timer::{OnceTask, RepeatingTask, TimerHandle};
    use std::sync::{Arc, Mutex};
    use tokio_util::sync::CancellationToken;

    /// Scheduler that never fires but remembers every handle it gave out.
    #[derive(Default)]
    struct CountingScheduler {
        tokens: Mutex<Vec<CancellationToken>>,
    }

    impl CountingScheduler {
        fn live(&self) -> usize {
            self.tokens
                .lock()
                .unwrap()
                .iter()
                .filter(|t| !t.is_cancelled())
                .count()
        }
    }

    impl Scheduler for CountingScheduler {
        fn schedule_repeating(&self, _every: Duration, _task: RepeatingTask) -> TimerHandle {
            let token = CancellationToken::new();
            self.tokens.lock().unwrap().push(token.clone());
            TimerHandle::new(token)
        }

        fn schedule_once(&self, _after: Duration, _task: OnceTask) -> TimerHandle {
            let token = CancellationToken::new();
            self.tokens.lock().unwrap().push(token.clone());
            TimerHandle::new(token)
        }
    }

    #[test]
    fn restart_keeps_a_single_live_ticker() {
        let scheduler = Arc::new(CountingScheduler::default());
        let mut hb = HeartbeatController::new(HeartbeatConfig::default());

        hb.on_connected(scheduler.as_ref(), |_| {});
        hb.on_connected(scheduler.as_ref(), |_| {});
        hb.on_connected(scheduler.as_ref(), |_| {});

        assert_eq!(scheduler.tokens.lock().unwrap().len(), 3);
        assert_eq!(scheduler.live(), 1);
        assert!(hb.is_running());

        hb.stop();
        hb.stop();
        assert_eq!(scheduler.live(), 0);
        assert!(!hb.is_running());
    }

    #[test]
    fn disabled_heartbeat_never_schedules() {
        let scheduler = CountingScheduler::default();
        let mut hb = HeartbeatController::new(HeartbeatConfig::disabled());
        hb.on_connected(&scheduler, |_| {});
        assert!(scheduler.tokens.lock().unwrap().is_empty());
        assert!(!hb.is_running());
    }

    #[test]
    fn disabling_stops_running_ticker() {
        let scheduler = CountingScheduler::default();
        let mut hb = HeartbeatController::new(HeartbeatConfig::default());
        hb.on_connected(&scheduler, |_| {});
        hb.configure(HeartbeatConfig::disabled());
        assert_eq!(scheduler.live(), 0);
        assert!(!hb.config().enabled);
    }

    #[test]
    fn default_interval_is_ten_seconds() {
        assert_eq!(HeartbeatConfig::default().interval, Duration::from_secs(10));
        assert!(HeartbeatConfig::default().enabled);
    }
}
