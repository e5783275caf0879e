use std::collections::BTreeMap;

use crate::{JobKind, ReferenceId, TargetId};

/// Progress value of a successful terminal frame.
pub const PROGRESS_COMPLETE: i32 = 100;
/// Progress sentinel of a failed terminal frame.
pub const PROGRESS_FAILED: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResourceStatus {
    #[default]
    Pending,
    Processing,
    Ingested,
    Error,
    Skipped,
}

impl ResourceStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ResourceStatus::Ingested | ResourceStatus::Error | ResourceStatus::Skipped
        )
    }
}

/// One reference among many being ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceState {
    pub id: ReferenceId,
    pub status: ResourceStatus,
    pub status_message: String,
}

impl ResourceState {
    pub fn new(id: impl Into<ReferenceId>, status: ResourceStatus) -> Self {
        Self {
            id: id.into(),
            status,
            status_message: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionPayload {
    pub name: String,
    pub content: String,
}

/// A parsed push frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressEvent {
    /// 0..=100, or [`PROGRESS_FAILED`]. Ingest frames carry none.
    pub progress: Option<i32>,
    pub message: String,
    pub section: Option<SectionPayload>,
    pub resource: Option<ResourceState>,
}

impl ProgressEvent {
    pub fn progress(progress: i32, message: impl Into<String>) -> Self {
        Self {
            progress: Some(progress),
            message: message.into(),
            ..Self::default()
        }
    }

    pub fn with_section(mut self, name: impl Into<String>, content: impl Into<String>) -> Self {
        self.section = Some(SectionPayload {
            name: name.into(),
            content: content.into(),
        });
        self
    }

    pub fn resource(resource: ResourceState, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            resource: Some(resource),
            ..Self::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.progress == Some(PROGRESS_FAILED)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.progress, Some(p) if p == PROGRESS_FAILED || p >= PROGRESS_COMPLETE)
    }
}

/// Server-side state of one job kind as seen in a target snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TaskState {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

/// Full, authoritative view of a target (`GET /{resource}`).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TargetSnapshot {
    pub id: TargetId,
    pub references: Vec<ResourceState>,
    /// Section name and content, in document order.
    pub sections: Vec<(String, String)>,
    pub tasks: BTreeMap<JobKind, TaskState>,
}

impl TargetSnapshot {
    pub fn new(id: impl Into<TargetId>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn task(&self, kind: JobKind) -> TaskState {
        self.tasks.get(&kind).copied().unwrap_or_default()
    }
}
