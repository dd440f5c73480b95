use serde::{Deserialize, Serialize};

/// A remote agent a task is dispatched to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskHost {
    pub id: i64,
    /// Hostname or IP address of the agent.
    pub name: String,
    pub port: u16,
    /// Human-readable label shown in aggregated output.
    #[serde(default)]
    pub alias: String,
}

impl TaskHost {
    pub fn new(id: i64, name: impl Into<String>, port: u16) -> Self {
        Self {
            id,
            name: name.into(),
            port,
            alias: String::new(),
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    /// `name:port`, the connection pool key.
    #[inline]
    pub fn addr(&self) -> String {
        format!("{}:{}", self.name, self.port)
    }
}
