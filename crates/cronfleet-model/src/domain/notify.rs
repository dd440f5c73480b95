use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ModelError, TaskId};

/// When a finished run produces a notification.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NotifyPolicy {
    #[default]
    Off,
    OnFailure,
    Always,
    /// Only when the run output contains [`NotifySettings::keyword`].
    Keyword,
}

impl FromStr for NotifyPolicy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(NotifyPolicy::Off),
            "on-failure" | "failure" => Ok(NotifyPolicy::OnFailure),
            "always" => Ok(NotifyPolicy::Always),
            "keyword" => Ok(NotifyPolicy::Keyword),
            _ => Err(ModelError::UnknownNotifyPolicy(s.to_string())),
        }
    }
}

/// Bitmask of delivery channels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotifyChannels(pub u8);

impl NotifyChannels {
    pub const NONE: Self = Self(0);
    pub const MAIL: Self = Self(1);
    pub const SLACK: Self = Self(1 << 1);
    pub const WEBHOOK: Self = Self(1 << 2);

    #[inline]
    pub fn contains(&self, other: Self) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }
}

impl std::ops::BitOr for NotifyChannels {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Notification configuration carried on a task row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifySettings {
    #[serde(default)]
    pub policy: NotifyPolicy,
    #[serde(default)]
    pub channels: NotifyChannels,
    /// Receiver identifier(s) for channels that address someone (mail, slack).
    #[serde(default)]
    pub receiver_id: String,
    #[serde(default)]
    pub keyword: String,
}

/// Run facts shared by every notification kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub task_id: TaskId,
    pub name: String,
    pub output: String,
    pub success: bool,
    pub remark: String,
}

impl RunSummary {
    pub fn status_label(&self) -> &'static str {
        if self.success { "Success" } else { "Failure" }
    }
}

/// A notification handed to the external notifier, one case per channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Notification {
    Mail { receivers: String, summary: RunSummary },
    Slack { channels: String, summary: RunSummary },
    Webhook { summary: RunSummary },
}

impl Notification {
    pub fn summary(&self) -> &RunSummary {
        match self {
            Notification::Mail { summary, .. }
            | Notification::Slack { summary, .. }
            | Notification::Webhook { summary } => summary,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Notification::Mail { .. } => "mail",
            Notification::Slack { .. } => "slack",
            Notification::Webhook { .. } => "webhook",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_mask_contains() {
        let mask = NotifyChannels::MAIL | NotifyChannels::WEBHOOK;
        assert!(mask.contains(NotifyChannels::MAIL));
        assert!(mask.contains(NotifyChannels::WEBHOOK));
        assert!(!mask.contains(NotifyChannels::SLACK));
        assert!(!mask.contains(NotifyChannels::NONE));
        assert!(NotifyChannels::default().is_empty());
    }

    #[test]
    fn notification_serializes_with_kind_tag() {
        let n = Notification::Webhook {
            summary: RunSummary {
                task_id: 1,
                name: "ping".into(),
                output: "pong".into(),
                success: true,
                remark: String::new(),
            },
        };
        let json = serde_json::to_string(&n).unwrap();
        assert!(json.contains(r#""kind":"webhook""#));
        assert_eq!(n.summary().status_label(), "Success");
    }

    #[test]
    fn policy_from_str() {
        assert_eq!("Always".parse::<NotifyPolicy>().unwrap(), NotifyPolicy::Always);
        assert_eq!("on-failure".parse::<NotifyPolicy>().unwrap(), NotifyPolicy::OnFailure);
        assert!("sometimes".parse::<NotifyPolicy>().is_err());
    }
}
