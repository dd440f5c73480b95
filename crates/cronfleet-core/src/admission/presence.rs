use std::sync::Arc;

use dashmap::DashSet;

use cronfleet_model::TaskId;

/// Task ids with a single-instance run currently admitted.
#[derive(Clone, Default)]
pub struct PresenceSet {
    inner: Arc<DashSet<TaskId>>,
}

impl PresenceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `id` if absent, as one indivisible step.
    ///
    /// Returns `None` when another run of the task already holds the entry.
    /// The entry is released when the returned guard drops.
    pub fn try_insert(&self, id: TaskId) -> Option<PresenceGuard> {
        self.inner.insert(id).then(|| PresenceGuard {
            set: self.clone(),
            id,
        })
    }

    pub fn has(&self, id: TaskId) -> bool {
        self.inner.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

/// Holds a task's presence entry; removes it on drop.
pub struct PresenceGuard {
    set: PresenceSet,
    id: TaskId,
}

impl PresenceGuard {
    pub fn task_id(&self) -> TaskId {
        self.id
    }
}

impl Drop for PresenceGuard {
    fn drop(&mut self) {
        self.set.inner.remove(&self.id);
    }
}

impl std::fmt::Debug for PresenceGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PresenceGuard").field("id", &self.id).finish()
    }
}
