use std::collections::BTreeMap;
use std::fmt;

use crate::view_model::{JobRowView, PollRowView, SectionView, TrackerView};
use crate::{
    DocumentSections, IngestScope, Job, JobKind, JobRequest, JobStatus, JobTicket, Notice,
    Policies, ResourceBook, TargetId,
};

/// Why a start request was refused before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    NoTarget,
    AlreadyActive(JobKind),
    NothingToIngest,
    UnknownReference(String),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NoTarget => write!(f, "no target selected"),
            Rejection::AlreadyActive(kind) => write!(f, "a {kind} job is already running"),
            Rejection::NothingToIngest => write!(f, "no pending references to ingest"),
            Rejection::UnknownReference(id) => write!(f, "unknown reference {id}"),
        }
    }
}

impl std::error::Error for Rejection {}

/// Everything the orchestrator knows; mutated only through [`crate::update`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackerState {
    policies: Policies,
    target: Option<TargetId>,
    jobs: BTreeMap<JobKind, Job>,
    next_epoch: u64,
    pub(crate) sections: DocumentSections,
    pub(crate) resources: ResourceBook,
    pub(crate) notices: Vec<Notice>,
    dirty: bool,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_policies(policies: Policies) -> Self {
        Self {
            policies,
            ..Self::default()
        }
    }

    pub fn policies(&self) -> &Policies {
        &self.policies
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn job(&self, kind: JobKind) -> Option<&Job> {
        self.jobs.get(&kind)
    }

    pub fn status(&self, kind: JobKind) -> JobStatus {
        self.jobs.get(&kind).map_or(JobStatus::Idle, Job::status)
    }

    pub fn sections(&self) -> &DocumentSections {
        &self.sections
    }

    pub fn resources(&self) -> &ResourceBook {
        &self.resources
    }

    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    /// Prerequisites of [`crate::Msg::StartRequested`].
    pub fn check_start(&self, request: &JobRequest) -> Result<(), Rejection> {
        if self.target.is_none() {
            return Err(Rejection::NoTarget);
        }
        let kind = request.kind();
        if self.status(kind).is_active() {
            return Err(Rejection::AlreadyActive(kind));
        }
        match request {
            JobRequest::Ingest {
                scope: IngestScope::All,
            } if !self.resources.is_empty() && !self.resources.has_pending() => {
                Err(Rejection::NothingToIngest)
            }
            JobRequest::Ingest {
                scope: IngestScope::Single(id),
            } if self.resources.get(id).is_none() => Err(Rejection::UnknownReference(id.clone())),
            _ => Ok(()),
        }
    }

    pub fn view(&self) -> TrackerView {
        TrackerView {
            target: self.target.clone(),
            jobs: self
                .jobs
                .values()
                .map(|job| JobRowView {
                    kind: job.kind(),
                    status: job.status(),
                    progress: job.progress(),
                    message: job.message().to_owned(),
                    poll: job.poll().map(|poll| PollRowView {
                        mode: poll.plan.mode,
                        attempts: poll.attempts,
                        max_attempts: poll.plan.max_attempts,
                    }),
                })
                .collect(),
            sections: self
                .sections
                .iter()
                .map(|(name, section)| SectionView {
                    name: name.to_owned(),
                    content: section.content.clone(),
                    open: section.open,
                    editing: section.is_editing(),
                })
                .collect(),
            resources: self.resources.iter().cloned().collect(),
            notices: self.notices.clone(),
            dirty: self.dirty,
        }
    }

    pub fn consume_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn set_target(&mut self, target: Option<TargetId>) {
        self.target = target;
    }

    pub(crate) fn open_job(&mut self, request: JobRequest, target: TargetId) -> JobTicket {
        self.next_epoch += 1;
        let ticket = JobTicket {
            kind: request.kind(),
            epoch: self.next_epoch,
        };
        self.jobs
            .insert(ticket.kind, Job::new(ticket, request, target));
        ticket
    }

    /// The job behind `ticket`, if it is still the live one for its kind.
    pub(crate) fn job_for(&self, ticket: JobTicket) -> Option<&Job> {
        self.jobs
            .get(&ticket.kind)
            .filter(|job| job.ticket() == ticket)
    }

    pub(crate) fn job_for_mut(&mut self, ticket: JobTicket) -> Option<&mut Job> {
        self.jobs
            .get_mut(&ticket.kind)
            .filter(|job| job.ticket() == ticket)
    }

    pub(crate) fn active_tickets(&self) -> Vec<JobTicket> {
        self.jobs
            .values()
            .filter(|job| job.status().is_active())
            .map(Job::ticket)
            .collect()
    }
}
