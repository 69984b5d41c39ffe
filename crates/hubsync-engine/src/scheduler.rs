use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{clamp_interval, DEFAULT_DEBOUNCE};
use crate::orchestrator::SyncOrchestrator;

/// Target of the scheduler's ticks.
pub trait Refresh: Send + Sync {
    fn refresh_all(&self);
}

impl Refresh for SyncOrchestrator {
    fn refresh_all(&self) {
        SyncOrchestrator::refresh_all(self);
    }
}

#[derive(Default)]
struct TimerState {
    timer: Option<CancellationToken>,
    period: Option<Duration>,
    pending_change: Option<CancellationToken>,
}

/// Repeats `refresh_all` on a clamped interval.
///
/// Each (re)start cancels the previous timer task before arming a new one, so
/// at most one timer is ever live. Interval changes go through
/// [`PollScheduler::interval_changed`], which debounces bursts into a single
/// restart.
#[derive(Clone)]
pub struct PollScheduler {
    target: Arc<dyn Refresh>,
    debounce: Duration,
    state: Arc<Mutex<TimerState>>,
}

impl PollScheduler {
    pub fn new(target: Arc<dyn Refresh>) -> Self {
        Self::with_debounce(target, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(target: Arc<dyn Refresh>, debounce: Duration) -> Self {
        Self {
            target,
            debounce,
            state: Arc::new(Mutex::new(TimerState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arms the timer at `clamp(interval_secs, 10, 300)` and refreshes immediately.
    pub fn start(&self, interval_secs: u64) {
        self.arm(interval_secs);
        self.target.refresh_all();
    }

    /// Arms the timer without the immediate refresh, for callers that have
    /// just started one themselves. The first tick comes one period later.
    pub fn arm(&self, interval_secs: u64) {
        let period = clamp_interval(interval_secs);
        self.arm_locked(&mut self.lock(), period);
    }

    fn arm_locked(&self, state: &mut TimerState, period: Duration) {
        let token = CancellationToken::new();
        if let Some(previous) = state.timer.replace(token.clone()) {
            previous.cancel();
        }
        state.period = Some(period);
        info!(interval_secs = period.as_secs(), "Polling started");

        let target = self.target.clone();
        tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        debug!("Polling tick");
                        target.refresh_all();
                    }
                }
            }
        });
    }

    /// Cancels the timer and any pending interval change.
    pub fn stop(&self) {
        let mut state = self.lock();
        if let Some(pending) = state.pending_change.take() {
            pending.cancel();
        }
        if let Some(timer) = state.timer.take() {
            timer.cancel();
            info!("Polling stopped");
        }
        state.period = None;
    }

    /// Reacts to a changed interval setting.
    ///
    /// Changes within the debounce window replace each other; once the window
    /// passes quietly the scheduler restarts with the latest value, unless it
    /// was stopped meanwhile.
    pub fn interval_changed(&self, interval_secs: u64) {
        let token = CancellationToken::new();
        if let Some(previous) = self.lock().pending_change.replace(token.clone()) {
            previous.cancel();
        }

        let scheduler = self.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {}
                _ = sleep(debounce) => {
                    {
                        // Checked and re-armed under one lock so a concurrent
                        // stop() either wins outright or cancels the new timer.
                        let mut state = scheduler.lock();
                        if token.is_cancelled() || state.timer.is_none() {
                            return;
                        }
                        state.pending_change = None;
                        debug!(interval_secs, "Applying interval change");
                        scheduler.arm_locked(&mut state, clamp_interval(interval_secs));
                    }
                    scheduler.target.refresh_all();
                }
            }
        });
    }

    pub fn is_running(&self) -> bool {
        self.lock().timer.is_some()
    }

    /// The clamped period of the live timer.
    pub fn interval(&self) -> Option<Duration> {
        self.lock().period
    }
}
