use std::future::Future;
use std::time::Duration;

use jobtrack_core::PollPlan;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::janitor::Disposable;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl From<PollPlan> for PollSettings {
    fn from(plan: PollPlan) -> Self {
        Self {
            interval: plan.interval,
            max_attempts: plan.max_attempts,
        }
    }
}

/// Interval-driven re-reads of a job's state.
pub struct PollingFallback;

impl PollingFallback {
    /// Calls `poll(attempt)` once per tick, `attempt` counting from 1, until
    /// `max_attempts` ticks ran or the handle is stopped.
    ///
    /// A tick that comes due while the previous call is still running is
    /// skipped, so calls never overlap.
    pub fn start<F, Fut>(settings: PollSettings, mut poll: F) -> PollHandle
    where
        F: FnMut(u32) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            for attempt in 1..=settings.max_attempts {
                tokio::select! {
                    biased;
                    () = token.cancelled() => return,
                    _ = ticker.tick() => {}
                }
                tokio::select! {
                    biased;
                    () = token.cancelled() => return,
                    () = poll(attempt) => {}
                }
            }
        });
        PollHandle {
            cancel,
            task: Some(task),
        }
    }
}

pub struct PollHandle {
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stops ticking. Idempotent.
    pub fn stop(&mut self) {
        self.cancel.cancel();
        self.task.take();
    }

    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

impl Disposable for PollHandle {
    fn dispose(&mut self) {
        self.stop();
    }

    fn is_live(&self) -> bool {
        !self.is_stopped()
    }
}
