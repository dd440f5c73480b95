use serde::{Deserialize, Serialize};

/// Status of a run as recorded on its log row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RunStatus {
    /// Body admitted and executing.
    Running,
    /// Body completed without error.
    Finish,
    /// Body completed with an error (including timeouts and handler panics).
    Failure,
    /// Run denied at admission or stopped manually.
    Cancel,
}

impl RunStatus {
    /// Returns `true` if the run will not transition further.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Finish => "finish",
            RunStatus::Failure => "failure",
            RunStatus::Cancel => "cancel",
        }
    }
}
