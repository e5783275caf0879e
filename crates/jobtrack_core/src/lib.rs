//! Jobtrack core: pure job-tracking state machine and view-model helpers.
//!
//! Nothing in this crate performs I/O or reads a clock. Push frames, poll
//! results and user actions arrive as [`Msg`] values; [`update`] folds them
//! into [`TrackerState`] and answers with the [`Effect`]s the engine must run.
mod effect;
mod event;
mod job;
mod msg;
mod resources;
mod sections;
mod state;
mod update;
mod view_model;

pub use effect::{Effect, Notice, NoticeLevel};
pub use event::{
    ProgressEvent, ResourceState, ResourceStatus, SectionPayload, TargetSnapshot, TaskState,
    PROGRESS_COMPLETE, PROGRESS_FAILED,
};
pub use job::{
    IngestScope, Job, JobKind, JobPolicy, JobRequest, JobStatus, JobTicket, Policies, PollMode,
    PollPlan, PollState, ReferenceId, StreamKind, TargetId, CONFIRMATION_ATTEMPTS,
    GENERATE_CHANNEL_CEILING, POLL_INTERVAL, PRIMARY_ATTEMPTS, STATUS_CHANNEL_CEILING,
};
pub use msg::Msg;
pub use resources::ResourceBook;
pub use sections::{DocumentSections, Section};
pub use state::{Rejection, TrackerState};
pub use update::{arbitrate, update, update_turn};
pub use view_model::{JobRowView, PollRowView, SectionView, TrackerView};
