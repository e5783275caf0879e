use crate::{JobKind, JobStatus, Notice, PollMode, ResourceState};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TrackerView {
    pub target: Option<String>,
    pub jobs: Vec<JobRowView>,
    pub sections: Vec<SectionView>,
    pub resources: Vec<ResourceState>,
    pub notices: Vec<Notice>,
    pub dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRowView {
    pub kind: JobKind,
    pub status: JobStatus,
    pub progress: i32,
    pub message: String,
    pub poll: Option<PollRowView>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollRowView {
    pub mode: PollMode,
    pub attempts: u32,
    pub max_attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionView {
    pub name: String,
    pub content: String,
    pub open: bool,
    pub editing: bool,
}
