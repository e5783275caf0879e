//! Jobtrack engine: push channels, poll loops and the job runner client.
//!
//! [`Orchestrator`] owns a [`jobtrack_core::TrackerState`] and executes the
//! effects its update function asks for.
mod channel;
mod config;
mod janitor;
mod orchestrator;
mod polling;
mod runner;
mod sse;
mod types;

pub use channel::{ChannelHandle, ChannelSink, ProgressChannel};
pub use config::{EngineConfig, DEFAULT_BASE_URL};
pub use janitor::{Disposable, ResourceJanitor, Slot, TaskGuard};
pub use orchestrator::{JobOutcome, Orchestrator};
pub use polling::{PollHandle, PollSettings, PollingFallback};
pub use runner::{FrameStream, JobRunner, ReqwestJobRunner};
pub use sse::SseDecoder;
pub use types::{decode_frame, decode_snapshot, RunnerError, TrackError};
