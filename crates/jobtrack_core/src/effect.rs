use std::time::Duration;

use crate::{JobKind, JobTicket, PollPlan, StreamKind};

/// Side effects requested by [`crate::update`]; executed by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    OpenChannel {
        ticket: JobTicket,
        stream: StreamKind,
        ceiling: Duration,
    },
    CloseChannel { ticket: JobTicket },
    StartPolling { ticket: JobTicket, plan: PollPlan },
    StopPolling { ticket: JobTicket },
    /// One last authoritative read after the poll budget ran out.
    FinalFetch { ticket: JobTicket },
    /// Tear down everything still registered for the job.
    Release { ticket: JobTicket },
    Notify(Notice),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    /// The job did not run or ended in failure.
    Blocking,
    /// The job probably completed but could not be confirmed.
    Soft,
}

/// A user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: JobKind,
    pub level: NoticeLevel,
    pub text: String,
}

impl Notice {
    pub(crate) fn blocking(kind: JobKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            level: NoticeLevel::Blocking,
            text: text.into(),
        }
    }

    pub(crate) fn soft(kind: JobKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            level: NoticeLevel::Soft,
            text: text.into(),
        }
    }
}
