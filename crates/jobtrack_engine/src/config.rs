use std::time::Duration;

use jobtrack_core::{JobKind, Policies};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:8000/api/";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Root of the job runner API; resource ids are appended as path segments.
    pub base_url: String,
    pub connect_timeout: Duration,
    /// Bounds start calls and snapshot reads. Push channels are bounded by
    /// their own ceiling instead.
    pub request_timeout: Duration,
    pub policies: Policies,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            policies: Policies::default(),
        }
    }
}

impl EngineConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Applies `interval` to every poll plan of every kind.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        for kind in JobKind::ALL {
            let policy = self.policies.get_mut(kind);
            policy.confirmation.interval = interval;
            policy.primary.interval = interval;
        }
        self
    }

    /// Disables push channels; every job is tracked by primary polling.
    pub fn polling_only(mut self) -> Self {
        for kind in JobKind::ALL {
            self.policies.get_mut(kind).push = None;
        }
        self
    }
}
