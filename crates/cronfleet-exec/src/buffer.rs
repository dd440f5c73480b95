use std::sync::{Arc, Mutex, PoisonError};

use crate::util::decode_console;

/// Shared, append-only capture of a run's combined stdout/stderr.
///
/// Cloning is cheap and every clone sees the same bytes, so a tail request can read
/// what a still-running command has printed so far.
#[derive(Clone, Default)]
pub struct OutputBuffer {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&self, chunk: &[u8]) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(chunk);
    }

    /// Decoded copy of everything captured so far.
    pub fn snapshot(&self) -> String {
        let bytes = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        decode_console(&bytes)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if both handles share the same underlying storage.
    pub fn ptr_eq(&self, other: &OutputBuffer) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for OutputBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutputBuffer").field("len", &self.len()).finish()
    }
}
