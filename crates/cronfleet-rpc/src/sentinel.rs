use std::time::Duration;

use cronfleet_model::TimeoutSecs;

/// Control command: stop the run with the request's id.
pub const STOP_COMMAND: &str = "__STOP__";
/// Control command: return the buffered output of the run with the request's id.
pub const TAIL_COMMAND: &str = "__TAIL__";
/// Error text reported for a run ended by [`STOP_COMMAND`].
pub const MANUAL_STOP: &str = "manual stop";

pub const MAX_TIMEOUT_SECS: TimeoutSecs = 86_400;
pub const TAIL_TIMEOUT_SECS: TimeoutSecs = 5;

/// Extra time the client waits past the run timeout so the agent can kill and flush.
pub const CLIENT_GRACE: Duration = Duration::from_secs(5);

/// Clamps a requested timeout into `(0, MAX_TIMEOUT_SECS]`; out-of-range values mean the maximum.
pub fn clamp_timeout(secs: TimeoutSecs) -> TimeoutSecs {
    if secs <= 0 || secs > MAX_TIMEOUT_SECS {
        MAX_TIMEOUT_SECS
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_bounds() {
        assert_eq!(clamp_timeout(0), MAX_TIMEOUT_SECS);
        assert_eq!(clamp_timeout(-3), MAX_TIMEOUT_SECS);
        assert_eq!(clamp_timeout(86_401), MAX_TIMEOUT_SECS);
        assert_eq!(clamp_timeout(1), 1);
        assert_eq!(clamp_timeout(MAX_TIMEOUT_SECS), MAX_TIMEOUT_SECS);
    }
}
