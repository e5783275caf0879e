use std::fmt;
use std::time::Duration;

/// Opaque identifier of the server-side resource a job runs against.
pub type TargetId = String;
/// Identifier of one reference inside a target.
pub type ReferenceId = String;

/// Interval between two poll ticks.
pub const POLL_INTERVAL: Duration = Duration::from_millis(2000);
/// Poll budget used to confirm a push stream that already reported success.
pub const CONFIRMATION_ATTEMPTS: u32 = 5;
/// Poll budget used when polling is the only source of progress (about 30s).
pub const PRIMARY_ATTEMPTS: u32 = 15;
/// Push channel ceiling for identify and ingest flows.
pub const STATUS_CHANNEL_CEILING: Duration = Duration::from_secs(300);
/// Push channel ceiling for the populate (generate) flow.
pub const GENERATE_CHANNEL_CEILING: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JobKind {
    Identify,
    Ingest,
    Populate,
}

impl JobKind {
    pub const ALL: [JobKind; 3] = [JobKind::Identify, JobKind::Ingest, JobKind::Populate];

    pub fn label(self) -> &'static str {
        match self {
            JobKind::Identify => "identify",
            JobKind::Ingest => "ingest",
            JobKind::Populate => "populate",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobStatus {
    #[default]
    Idle,
    Starting,
    Streaming,
    Polling,
    Succeeded,
    Failed,
    TimedOut,
}

impl JobStatus {
    /// Succeeded, Failed and TimedOut are final for a ticket.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::TimedOut
        )
    }

    /// A job in one of these states owns (or is about to own) live resources.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            JobStatus::Starting | JobStatus::Streaming | JobStatus::Polling
        )
    }
}

/// Identity of one started job. Every asynchronous completion carries the
/// ticket it was issued for; completions for a stale ticket are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobTicket {
    pub kind: JobKind,
    pub epoch: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestScope {
    /// Every pending reference of the target.
    All,
    /// Reingest a single reference.
    Single(ReferenceId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobRequest {
    Identify,
    Ingest { scope: IngestScope },
    /// Generate the document section by section; `sections` are the labels
    /// to generate, empty meaning "let the server decide".
    Populate { sections: Vec<String> },
}

impl JobRequest {
    pub fn kind(&self) -> JobKind {
        match self {
            JobRequest::Identify => JobKind::Identify,
            JobRequest::Ingest { .. } => JobKind::Ingest,
            JobRequest::Populate { .. } => JobKind::Populate,
        }
    }
}

/// Which push endpoint a job listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `GET /{resource}/status`: progress frames with optional section content.
    Status,
    /// `GET /{resource}/ingest-status`: one frame per reference status change.
    IngestStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollMode {
    Confirmation,
    Primary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPlan {
    pub mode: PollMode,
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPlan {
    pub fn confirmation() -> Self {
        Self {
            mode: PollMode::Confirmation,
            interval: POLL_INTERVAL,
            max_attempts: CONFIRMATION_ATTEMPTS,
        }
    }

    pub fn primary() -> Self {
        Self {
            mode: PollMode::Primary,
            interval: POLL_INTERVAL,
            max_attempts: PRIMARY_ATTEMPTS,
        }
    }
}

/// Per-kind tracking strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPolicy {
    /// `None` makes polling the sole strategy.
    pub push: Option<StreamKind>,
    /// Whether a terminal push frame must be confirmed by polling.
    pub requires_confirmation: bool,
    pub channel_ceiling: Duration,
    pub confirmation: PollPlan,
    pub primary: PollPlan,
}

impl JobPolicy {
    pub fn for_kind(kind: JobKind) -> Self {
        let (push, requires_confirmation, channel_ceiling) = match kind {
            JobKind::Identify => (StreamKind::Status, true, STATUS_CHANNEL_CEILING),
            JobKind::Ingest => (StreamKind::IngestStatus, true, STATUS_CHANNEL_CEILING),
            JobKind::Populate => (StreamKind::Status, false, GENERATE_CHANNEL_CEILING),
        };
        Self {
            push: Some(push),
            requires_confirmation,
            channel_ceiling,
            confirmation: PollPlan::confirmation(),
            primary: PollPlan::primary(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Policies {
    pub identify: JobPolicy,
    pub ingest: JobPolicy,
    pub populate: JobPolicy,
}

impl Policies {
    pub fn get(&self, kind: JobKind) -> &JobPolicy {
        match kind {
            JobKind::Identify => &self.identify,
            JobKind::Ingest => &self.ingest,
            JobKind::Populate => &self.populate,
        }
    }

    pub fn get_mut(&mut self, kind: JobKind) -> &mut JobPolicy {
        match kind {
            JobKind::Identify => &mut self.identify,
            JobKind::Ingest => &mut self.ingest,
            JobKind::Populate => &mut self.populate,
        }
    }
}

impl Default for Policies {
    fn default() -> Self {
        Self {
            identify: JobPolicy::for_kind(JobKind::Identify),
            ingest: JobPolicy::for_kind(JobKind::Ingest),
            populate: JobPolicy::for_kind(JobKind::Populate),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollState {
    pub plan: PollPlan,
    pub attempts: u32,
    /// Ticks whose fetch returned a snapshot.
    pub answered: u32,
}

impl PollState {
    pub(crate) fn new(plan: PollPlan) -> Self {
        Self {
            plan,
            attempts: 0,
            answered: 0,
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.plan.max_attempts
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    ticket: JobTicket,
    request: JobRequest,
    target: TargetId,
    pub(crate) status: JobStatus,
    pub(crate) progress: i32,
    pub(crate) message: String,
    pub(crate) channel_open: bool,
    pub(crate) poll: Option<PollState>,
    pub(crate) final_fetch_pending: bool,
}

impl Job {
    pub(crate) fn new(ticket: JobTicket, request: JobRequest, target: TargetId) -> Self {
        Self {
            ticket,
            request,
            target,
            status: JobStatus::Starting,
            progress: 0,
            message: String::new(),
            channel_open: false,
            poll: None,
            final_fetch_pending: false,
        }
    }

    pub fn ticket(&self) -> JobTicket {
        self.ticket
    }

    pub fn kind(&self) -> JobKind {
        self.ticket.kind
    }

    pub fn request(&self) -> &JobRequest {
        &self.request
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    pub fn progress(&self) -> i32 {
        self.progress
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn channel_open(&self) -> bool {
        self.channel_open
    }

    pub fn poll(&self) -> Option<&PollState> {
        self.poll.as_ref()
    }

    /// Moves to a terminal status and forgets every live resource.
    pub(crate) fn settle(&mut self, status: JobStatus) {
        self.status = status;
        self.channel_open = false;
        self.poll = None;
        self.final_fetch_pending = false;
    }
}
