//! Per-run admission state shared by every concurrently executing run body.

mod presence;
pub use presence::{PresenceGuard, PresenceSet};

mod slots;
pub use slots::AdmissionSlots;
