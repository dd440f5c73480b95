use serde::Serialize;

use super::Scheduler;

/// Point-in-time view of the scheduler, served by the health endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchedulerStatus {
    pub running: bool,
    /// Registered trigger names, including the log-cleanup trigger.
    pub triggers: Vec<String>,
    pub concurrency_used: usize,
    pub concurrency_capacity: usize,
    pub single_instance_running: usize,
    /// Tracked run bodies plus their pending cascade tasks.
    pub in_flight: usize,
}

impl Scheduler {
    pub fn status(&self) -> SchedulerStatus {
        let mut triggers: Vec<String> = self
            .inner
            .cron
            .entries()
            .into_iter()
            .map(|e| e.name)
            .collect();
        triggers.sort();

        SchedulerStatus {
            running: self.inner.cron.is_running(),
            triggers,
            concurrency_used: self.inner.slots.used(),
            concurrency_capacity: self.inner.slots.capacity(),
            single_instance_running: self.inner.presence.len(),
            in_flight: self.inner.in_flight.len(),
        }
    }
}
