use serde::{Deserialize, Serialize};
use std::time::SystemTime;

use crate::{Protocol, RunId, RunStatus, Task, TaskId, TimeoutSecs};

/// Log row created synchronously at admission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTaskLog {
    pub task_id: TaskId,
    pub name: String,
    pub spec: String,
    pub protocol: Protocol,
    pub command: String,
    pub timeout: TimeoutSecs,
    /// Host list label for remote-exec runs.
    pub hostname: Option<String>,
    pub start_time: SystemTime,
    /// [`RunStatus::Running`] for admitted runs, [`RunStatus::Cancel`] for denied ones.
    pub status: RunStatus,
}

impl NewTaskLog {
    pub fn for_task(task: &Task, status: RunStatus) -> Self {
        Self {
            task_id: task.id,
            name: task.name.clone(),
            spec: task.spec.clone(),
            protocol: task.protocol,
            command: task.command.clone(),
            timeout: task.timeout,
            hostname: task.host_label(),
            start_time: SystemTime::now(),
            status,
        }
    }
}

/// Final mutation applied once after the body finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogCompletion {
    pub status: RunStatus,
    pub result: String,
    /// Retries actually consumed (0 when the first attempt settled it).
    pub retry_times: u8,
    pub end_time: SystemTime,
}

/// A stored log row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLog {
    pub id: RunId,
    pub task_id: TaskId,
    pub name: String,
    pub spec: String,
    pub protocol: Protocol,
    pub command: String,
    pub timeout: TimeoutSecs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub result: String,
    #[serde(default)]
    pub retry_times: u8,
    #[serde(with = "time_serde")]
    pub start_time: SystemTime,
    #[serde(default, with = "opt_time_serde", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<SystemTime>,
}

impl TaskLog {
    pub fn from_new(id: RunId, log: NewTaskLog) -> Self {
        Self {
            id,
            task_id: log.task_id,
            name: log.name,
            spec: log.spec,
            protocol: log.protocol,
            command: log.command,
            timeout: log.timeout,
            hostname: log.hostname,
            status: log.status,
            result: String::new(),
            retry_times: 0,
            start_time: log.start_time,
            end_time: None,
        }
    }

    pub fn apply(&mut self, done: LogCompletion) {
        self.status = done.status;
        self.result = done.result;
        self.retry_times = done.retry_times;
        self.end_time = Some(done.end_time);
    }
}

mod time_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &SystemTime, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let since_epoch = time
            .duration_since(UNIX_EPOCH)
            .map_err(serde::ser::Error::custom)?;
        since_epoch.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SystemTime, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(UNIX_EPOCH + std::time::Duration::from_secs(secs))
    }
}

mod opt_time_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn serialize<S>(time: &Option<SystemTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match time {
            Some(t) => super::time_serde::serialize(t, serializer),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<SystemTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(|s| UNIX_EPOCH + std::time::Duration::from_secs(s)))
    }
}
