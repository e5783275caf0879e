use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use jobtrack_core::{ResourceState, ResourceStatus, TargetSnapshot, TrackerView};
use jobtrack_logging::{track_info, track_warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

const STATE_FILENAME: &str = ".jobtrack_state.ron";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
enum PersistedStatus {
    Pending,
    Processing,
    Ingested,
    Error,
    Skipped,
}

impl From<ResourceStatus> for PersistedStatus {
    fn from(status: ResourceStatus) -> Self {
        match status {
            ResourceStatus::Pending => Self::Pending,
            ResourceStatus::Processing => Self::Processing,
            ResourceStatus::Ingested => Self::Ingested,
            ResourceStatus::Error => Self::Error,
            ResourceStatus::Skipped => Self::Skipped,
        }
    }
}

impl From<PersistedStatus> for ResourceStatus {
    fn from(status: PersistedStatus) -> Self {
        match status {
            PersistedStatus::Pending => Self::Pending,
            PersistedStatus::Processing => Self::Processing,
            PersistedStatus::Ingested => Self::Ingested,
            PersistedStatus::Error => Self::Error,
            PersistedStatus::Skipped => Self::Skipped,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedReference {
    id: String,
    status: PersistedStatus,
    #[serde(default)]
    status_message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedSection {
    name: String,
    content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PersistedState {
    target: String,
    saved_at: String,
    sections: Vec<PersistedSection>,
    references: Vec<PersistedReference>,
}

/// Restores the last saved document for `target`, if that is what was saved.
pub(crate) fn load_snapshot(state_dir: &Path, target: &str) -> Option<TargetSnapshot> {
    let path = state_dir.join(STATE_FILENAME);
    let content = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            track_warn!("Failed to read persisted state from {:?}: {}", path, err);
            return None;
        }
    };

    let state: PersistedState = match ron::from_str(&content) {
        Ok(state) => state,
        Err(err) => {
            track_warn!("Failed to parse persisted state from {:?}: {}", path, err);
            return None;
        }
    };
    if state.target != target {
        return None;
    }

    track_info!("Restored {} from {:?} (saved {})", target, path, state.saved_at);
    let mut snapshot = TargetSnapshot::new(target);
    snapshot.sections = state
        .sections
        .into_iter()
        .map(|section| (section.name, section.content))
        .collect();
    snapshot.references = state
        .references
        .into_iter()
        .map(|reference| ResourceState {
            id: reference.id,
            status: reference.status.into(),
            status_message: reference.status_message,
        })
        .collect();
    Some(snapshot)
}

/// Writes the document of `view` to `{state_dir}/.jobtrack_state.ron`.
pub(crate) fn save_snapshot(state_dir: &Path, view: &TrackerView) -> anyhow::Result<PathBuf> {
    let Some(target) = view.target.clone() else {
        anyhow::bail!("no target selected");
    };
    let state = PersistedState {
        target,
        saved_at: Utc::now().to_rfc3339(),
        sections: view
            .sections
            .iter()
            .map(|section| PersistedSection {
                name: section.name.clone(),
                content: section.content.clone(),
            })
            .collect(),
        references: view
            .resources
            .iter()
            .map(|reference| PersistedReference {
                id: reference.id.clone(),
                status: reference.status.into(),
                status_message: reference.status_message.clone(),
            })
            .collect(),
    };
    let content = ron::ser::to_string_pretty(&state, ron::ser::PrettyConfig::new())?;

    fs::create_dir_all(state_dir)?;
    let path = state_dir.join(STATE_FILENAME);
    let mut tmp = NamedTempFile::new_in(state_dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.flush()?;
    tmp.as_file_mut().sync_all()?;
    tmp.persist(&path).map_err(|err| err.error)?;
    Ok(path)
}
