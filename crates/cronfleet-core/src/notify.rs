use async_trait::async_trait;
use tracing::info;

use cronfleet_model::{Notification, NotifyChannels, NotifyPolicy, RunSummary, Task};

use crate::RunOutcome;

/// Delivers notifications; channel formatting and transport live behind this trait.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn push(&self, notification: Notification);
}

/// Notifier that only logs what would have been sent.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn push(&self, n: Notification) {
        let summary = n.summary();
        info!(
            kind = n.kind(),
            task_id = summary.task_id,
            status = summary.status_label(),
            "notification"
        );
    }
}

/// Notifications due for a finished run, one per enabled channel.
///
/// Empty when the policy suppresses the run, or when no channel qualifies.
/// Mail and slack need a receiver id; webhook does not.
pub fn notifications_for(task: &Task, outcome: &RunOutcome) -> Vec<Notification> {
    let settings = &task.notify;
    let success = outcome.is_success();

    let due = match settings.policy {
        NotifyPolicy::Off => false,
        NotifyPolicy::OnFailure => !success,
        NotifyPolicy::Always => true,
        NotifyPolicy::Keyword => outcome.output.contains(&settings.keyword),
    };
    if !due {
        return Vec::new();
    }

    let summary = RunSummary {
        task_id: task.id,
        name: task.name.clone(),
        output: outcome.output.clone(),
        success,
        remark: task.remark.clone(),
    };
    let receiver = settings.receiver_id.trim();

    let mut out = Vec::new();
    if settings.channels.contains(NotifyChannels::MAIL) && !receiver.is_empty() {
        out.push(Notification::Mail {
            receivers: receiver.to_string(),
            summary: summary.clone(),
        });
    }
    if settings.channels.contains(NotifyChannels::SLACK) && !receiver.is_empty() {
        out.push(Notification::Slack {
            channels: receiver.to_string(),
            summary: summary.clone(),
        });
    }
    if settings.channels.contains(NotifyChannels::WEBHOOK) {
        out.push(Notification::Webhook { summary });
    }
    out
}
