use std::fmt;

use crate::RunId;

/// Identifies one in-flight remote execution: `(host:port, run id)`.
///
/// A later stop or tail call for the same key is routed to the same cancellation handle or output buffer.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RunKey {
    pub addr: String,
    pub run_id: RunId,
}

impl RunKey {
    pub fn new(addr: impl Into<String>, run_id: RunId) -> Self {
        Self {
            addr: addr.into(),
            run_id,
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.addr, self.run_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_addr_and_id() {
        let key = RunKey::new("10.0.0.5:5921", 42);
        assert_eq!(key.to_string(), "10.0.0.5:5921:42");
    }

    #[test]
    fn keys_differ_by_id_on_same_host() {
        let a = RunKey::new("h:1", 1);
        let b = RunKey::new("h:1", 2);
        assert_ne!(a, b);
    }
}
