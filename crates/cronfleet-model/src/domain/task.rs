use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ModelError, NotifySettings, TaskHost, TaskId, TimeoutSecs};

/// Position of a task in the dependency graph.
///
/// Only parent tasks own a cron trigger; child tasks run exclusively when cascaded from a parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskLevel {
    #[default]
    Parent,
    Child,
}

/// How the task body is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Protocol {
    /// Direct HTTP call issued by the scheduler itself.
    Http,
    /// Shell command executed on every associated host through the agent RPC.
    RemoteExec,
}

impl Protocol {
    /// Short symbolic identifier, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Http => "http",
            Protocol::RemoteExec => "remote-exec",
        }
    }
}

impl FromStr for Protocol {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" => Ok(Protocol::Http),
            "remote-exec" | "rpc" | "shell" => Ok(Protocol::RemoteExec),
            _ => Err(ModelError::UnknownProtocol(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
}

/// Gate applied to the dependency cascade when the parent run fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DependencyMode {
    /// Children run only when the parent succeeded.
    #[default]
    Strong,
    /// Children run regardless of the parent outcome.
    Weak,
}

/// A persisted task row as consumed by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub level: TaskLevel,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    /// Cron expression (seconds first). Only meaningful for parent tasks.
    ///
    /// Cascaded runs overwrite it with a label naming the triggering parent.
    #[serde(default)]
    pub spec: String,
    pub protocol: Protocol,
    pub command: String,
    #[serde(default)]
    pub http_method: HttpMethod,
    /// Per-run timeout in seconds; `<= 0` selects the handler default.
    #[serde(default)]
    pub timeout: TimeoutSecs,
    /// `false`: at most one run may execute at a time. `true`: concurrent runs are allowed.
    #[serde(default = "enabled_by_default")]
    pub multi: bool,
    #[serde(default)]
    pub retry_times: u8,
    /// Fixed delay between attempts in seconds; `0` selects an increasing per-attempt delay.
    #[serde(default)]
    pub retry_interval: u16,
    #[serde(default)]
    pub notify: NotifySettings,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependency_task_ids: Vec<TaskId>,
    #[serde(default)]
    pub dependency_mode: DependencyMode,
    /// Target hosts; only used by [`Protocol::RemoteExec`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hosts: Vec<TaskHost>,
    #[serde(default)]
    pub remark: String,
}

fn enabled_by_default() -> bool {
    true
}

impl Task {
    /// Minimal task with defaults for every optional field.
    pub fn new(id: TaskId, name: impl Into<String>, protocol: Protocol, command: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            level: TaskLevel::Parent,
            enabled: true,
            spec: String::new(),
            protocol,
            command: command.into(),
            http_method: HttpMethod::Get,
            timeout: 0,
            multi: true,
            retry_times: 0,
            retry_interval: 0,
            notify: NotifySettings::default(),
            dependency_task_ids: Vec::new(),
            dependency_mode: DependencyMode::Strong,
            hosts: Vec::new(),
            remark: String::new(),
        }
    }

    #[inline]
    pub fn is_parent(&self) -> bool {
        self.level == TaskLevel::Parent
    }

    /// Name under which the task trigger is registered with the cron engine.
    #[inline]
    pub fn trigger_name(&self) -> String {
        self.id.to_string()
    }

    /// `true` if a run must hold the single-instance presence entry.
    #[inline]
    pub fn is_single_instance(&self) -> bool {
        !self.multi
    }

    /// Host label stored on log rows of remote-exec runs (`alias - name` per host).
    pub fn host_label(&self) -> Option<String> {
        if self.protocol != Protocol::RemoteExec {
            return None;
        }
        Some(
            self.hosts
                .iter()
                .map(|h| format!("{} - {}", h.alias, h.name))
                .collect::<Vec<_>>()
                .join("\n"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_applies_defaults() {
        let json = r#"{"id":7,"name":"backup","protocol":"remoteExec","command":"tar czf /tmp/x.tgz /etc"}"#;
        let task: Task = serde_json::from_str(json).unwrap();

        assert_eq!(task.id, 7);
        assert_eq!(task.level, TaskLevel::Parent);
        assert!(task.enabled);
        assert!(task.multi);
        assert_eq!(task.dependency_mode, DependencyMode::Strong);
        assert!(task.hosts.is_empty());
    }

    #[test]
    fn protocol_from_str() {
        assert_eq!("HTTP".parse::<Protocol>().unwrap(), Protocol::Http);
        assert_eq!("rpc".parse::<Protocol>().unwrap(), Protocol::RemoteExec);
        assert!(matches!(
            "ftp".parse::<Protocol>(),
            Err(ModelError::UnknownProtocol(_))
        ));
    }

    #[test]
    fn host_label_only_for_remote_exec() {
        let mut task = Task::new(1, "t", Protocol::Http, "http://localhost");
        assert_eq!(task.host_label(), None);

        task.protocol = Protocol::RemoteExec;
        task.hosts = vec![
            TaskHost::new(1, "10.0.0.1", 5921).with_alias("web-1"),
            TaskHost::new(2, "10.0.0.2", 5921).with_alias("web-2"),
        ];
        assert_eq!(
            task.host_label().as_deref(),
            Some("web-1 - 10.0.0.1\nweb-2 - 10.0.0.2")
        );
    }

    #[test]
    fn single_instance_follows_multi_flag() {
        let mut task = Task::new(1, "t", Protocol::Http, "http://localhost");
        assert!(!task.is_single_instance());
        task.multi = false;
        assert!(task.is_single_instance());
        assert_eq!(task.trigger_name(), "1");
    }
}
