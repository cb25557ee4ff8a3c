use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::state::ProjectState;

/// Progress of the background job running for the current family.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskInfo {
    pub progression: Option<u8>,
    pub detail: Option<String>,
}

impl TaskInfo {
    pub fn new(progression: Option<u8>, detail: Option<&str>) -> Self {
        Self {
            progression,
            detail: detail.map(str::to_string),
        }
    }
}

/// One poll's view of the project. Created fresh per poll and never diffed.
///
/// `state` is kept as the raw wire string: resolving it against the closed
/// vocabulary is the projector's job, so an unknown value fails the projection
/// instead of the decode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub project_id: Option<String>,
    pub iteration_id: u32,
    pub state: String,
    pub task: Option<TaskInfo>,
}

impl StatusSnapshot {
    pub fn new(iteration_id: u32, state: ProjectState, task: Option<TaskInfo>) -> Self {
        Self {
            project_id: None,
            iteration_id,
            state: state.as_str().to_string(),
            task,
        }
    }

    pub fn with_raw_state(iteration_id: u32, state: &str, task: Option<TaskInfo>) -> Self {
        Self {
            project_id: None,
            iteration_id,
            state: state.to_string(),
            task,
        }
    }

    pub fn project_state(&self) -> Result<ProjectState> {
        ProjectState::parse(&self.state)
    }

    /// Decode the status endpoint body.
    pub fn from_json(body: &str) -> Result<Self> {
        let envelope: StatusEnvelope = serde_json::from_str(body)?;
        envelope.into_snapshot()
    }
}

#[derive(Debug, Deserialize)]
struct StatusEnvelope {
    #[serde(default)]
    project_id: Option<String>,
    #[serde(default)]
    status: Option<WireStatus>,
}

#[derive(Debug, Deserialize)]
struct WireStatus {
    #[serde(default)]
    iteration_id: Option<i64>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    task: Option<WireTask>,
}

#[derive(Debug, Deserialize)]
struct WireTask {
    #[serde(default)]
    progression: Option<i64>,
    #[serde(default)]
    detail: Option<String>,
}

impl StatusEnvelope {
    fn into_snapshot(self) -> Result<StatusSnapshot> {
        let Some(status) = self.status else {
            return Err(Error::protocol("status envelope has no 'status' object"));
        };
        let iteration_id = status
            .iteration_id
            .ok_or_else(|| Error::protocol("status has no 'iteration_id'"))?;
        let iteration_id = u32::try_from(iteration_id)
            .map_err(|_| Error::protocol(format!("invalid iteration_id {iteration_id}")))?;
        let state = status
            .state
            .ok_or_else(|| Error::protocol("status has no 'state'"))?;

        let task = match status.task {
            None => None,
            Some(t) => {
                let progression = match t.progression {
                    None => None,
                    Some(p) if (0..=100).contains(&p) => Some(p as u8),
                    Some(p) => {
                        return Err(Error::protocol(format!(
                            "task progression {p} is outside 0..=100"
                        )));
                    }
                };
                Some(TaskInfo {
                    progression,
                    detail: t.detail,
                })
            }
        };

        Ok(StatusSnapshot {
            project_id: self.project_id,
            iteration_id,
            state,
            task,
        })
    }
}

/// Pull the `detail` field out of an error body, if the body is JSON.
pub fn error_detail(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::Object(map)) => match map.get("detail") {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        },
        _ => body.trim().chars().take(200).collect(),
    }
}
