use crate::{JobKind, JobRequest, JobTicket, ProgressEvent, TargetId, TargetSnapshot};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// User picked (or cleared) the target resource.
    TargetSelected(Option<TargetId>),
    /// Cold load of the selected target, e.g. restored from disk or fetched on open.
    SnapshotLoaded(TargetSnapshot),
    /// Caller asked to start a job.
    StartRequested(JobRequest),
    /// The job runner accepted the start call.
    StartSucceeded { ticket: JobTicket },
    /// The start call returned an error or a non-2xx status.
    StartFailed { ticket: JobTicket, reason: String },
    /// A parsed push frame.
    Push {
        ticket: JobTicket,
        event: ProgressEvent,
    },
    /// Transport failure on the push channel, including an early end of stream.
    ChannelError { ticket: JobTicket, reason: String },
    /// No terminal frame within the channel ceiling.
    ChannelTimeout { ticket: JobTicket },
    /// Result of one poll tick; `attempt` is 1-based.
    PollResult {
        ticket: JobTicket,
        attempt: u32,
        result: Result<TargetSnapshot, String>,
    },
    /// Result of the authoritative read after the poll budget ran out.
    FinalFetchResult {
        ticket: JobTicket,
        result: Result<TargetSnapshot, String>,
    },
    /// User dismissed the progress view for a job.
    CancelRequested { kind: JobKind },
    /// Owner is going away; every active job is abandoned.
    Teardown,
    SectionEditStarted { name: String },
    SectionSaved { name: String, content: String },
    SectionEditCancelled { name: String },
    SectionToggled { name: String },
    NoticesDismissed,
    /// Fallback for placeholder wiring.
    NoOp,
}
