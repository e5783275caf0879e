use std::collections::BTreeMap;
use std::time::Duration;

use jobtrack_core::{
    JobKind, ProgressEvent, Rejection, ResourceState, ResourceStatus, SectionPayload, StreamKind,
    TargetSnapshot, TaskState, PROGRESS_COMPLETE, PROGRESS_FAILED,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level failure talking to the job runner.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RunnerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("timeout: {0}")]
    Timeout(String),
    #[error("http status {0}")]
    HttpStatus(u16),
    #[error("rejected by server: {0}")]
    Rejected(String),
    #[error("could not decode response: {0}")]
    Decode(String),
}

/// Failure taxonomy of a tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    /// Precondition not met; no network call was made.
    #[error("start rejected: {0}")]
    StartRejected(#[from] Rejection),
    /// The start call failed.
    #[error("start failed: {0}")]
    StartFailed(RunnerError),
    #[error("push channel error: {0}")]
    ChannelError(String),
    #[error("no terminal frame within {0:?}")]
    ChannelTimeout(Duration),
    #[error("poll budget of {0} attempts exhausted without confirmation")]
    PollExhausted(u32),
    #[error("malformed frame: {0}")]
    MalformedFrame(String),
}

#[derive(Debug, Deserialize)]
struct StatusFrame {
    progress: i32,
    #[serde(default)]
    message: String,
    #[serde(default)]
    section_name: Option<String>,
    #[serde(default)]
    section_content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IngestFrame {
    reference_id: String,
    status: WireResourceStatus,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Clone, Copy, Deserialize)]
enum WireResourceStatus {
    #[serde(alias = "pending")]
    Pending,
    #[serde(alias = "processing")]
    Processing,
    #[serde(alias = "ingested")]
    Ingested,
    #[serde(alias = "error")]
    Error,
    #[serde(alias = "skipped")]
    Skipped,
}

impl From<WireResourceStatus> for ResourceStatus {
    fn from(status: WireResourceStatus) -> Self {
        match status {
            WireResourceStatus::Pending => ResourceStatus::Pending,
            WireResourceStatus::Processing => ResourceStatus::Processing,
            WireResourceStatus::Ingested => ResourceStatus::Ingested,
            WireResourceStatus::Error => ResourceStatus::Error,
            WireResourceStatus::Skipped => ResourceStatus::Skipped,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "lowercase")]
enum WireTaskState {
    Idle,
    Running,
    Completed,
    Failed,
}

impl From<WireTaskState> for TaskState {
    fn from(state: WireTaskState) -> Self {
        match state {
            WireTaskState::Idle => TaskState::Idle,
            WireTaskState::Running => TaskState::Running,
            WireTaskState::Completed => TaskState::Completed,
            WireTaskState::Failed => TaskState::Failed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ReferenceBody {
    id: String,
    status: WireResourceStatus,
    #[serde(default)]
    status_message: String,
}

#[derive(Debug, Deserialize)]
struct SectionBody {
    name: String,
    #[serde(default)]
    content: String,
}

/// Body of `GET /{resource}`.
#[derive(Debug, Deserialize)]
pub(crate) struct SnapshotBody {
    id: String,
    #[serde(default)]
    references: Vec<ReferenceBody>,
    #[serde(default)]
    sections: Vec<SectionBody>,
    #[serde(default)]
    tasks: BTreeMap<String, WireTaskState>,
}

impl From<SnapshotBody> for TargetSnapshot {
    fn from(body: SnapshotBody) -> Self {
        let tasks = body
            .tasks
            .into_iter()
            .filter_map(|(name, state)| job_kind_from_wire(&name).map(|kind| (kind, state.into())))
            .collect();
        TargetSnapshot {
            id: body.id,
            references: body
                .references
                .into_iter()
                .map(|reference| ResourceState {
                    id: reference.id,
                    status: reference.status.into(),
                    status_message: reference.status_message,
                })
                .collect(),
            sections: body
                .sections
                .into_iter()
                .map(|section| (section.name, section.content))
                .collect(),
            tasks,
        }
    }
}

fn job_kind_from_wire(name: &str) -> Option<JobKind> {
    match name {
        "identify" => Some(JobKind::Identify),
        "ingest" => Some(JobKind::Ingest),
        "populate" | "generate" => Some(JobKind::Populate),
        _ => None,
    }
}

/// Body of a `{ok}` / `{error}` start response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct StartBody {
    #[serde(default)]
    pub error: Option<String>,
}

/// Body of `POST /{resource}/generate`.
#[derive(Debug, Serialize)]
pub(crate) struct GenerateBody<'a> {
    pub sections: &'a [String],
}

/// Parses one push frame payload for the given stream.
pub fn decode_frame(stream: StreamKind, data: &str) -> Result<ProgressEvent, TrackError> {
    match stream {
        StreamKind::Status => {
            let frame: StatusFrame = serde_json::from_str(data)
                .map_err(|err| TrackError::MalformedFrame(err.to_string()))?;
            if !(PROGRESS_FAILED..=PROGRESS_COMPLETE).contains(&frame.progress) {
                return Err(TrackError::MalformedFrame(format!(
                    "progress {} out of range",
                    frame.progress
                )));
            }
            let section = match (frame.section_name, frame.section_content) {
                (Some(name), Some(content)) => Some(SectionPayload { name, content }),
                _ => None,
            };
            Ok(ProgressEvent {
                progress: Some(frame.progress),
                message: frame.message,
                section,
                resource: None,
            })
        }
        StreamKind::IngestStatus => {
            let frame: IngestFrame = serde_json::from_str(data)
                .map_err(|err| TrackError::MalformedFrame(err.to_string()))?;
            Ok(ProgressEvent {
                progress: None,
                message: frame.message.clone(),
                section: None,
                resource: Some(ResourceState {
                    id: frame.reference_id,
                    status: frame.status.into(),
                    status_message: frame.message,
                }),
            })
        }
    }
}

/// Parses a `GET /{resource}` body.
pub fn decode_snapshot(data: &[u8]) -> Result<TargetSnapshot, RunnerError> {
    serde_json::from_slice::<SnapshotBody>(data)
        .map(TargetSnapshot::from)
        .map_err(|err| RunnerError::Decode(err.to_string()))
}
