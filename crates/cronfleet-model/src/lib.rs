//! Domain types shared by the cronfleet scheduler, transport and agents.
//!
//! Everything here is plain data: persisted task rows as the scheduler reads them,
//! log rows it writes back, notification payloads and the RPC run key.

mod domain;
pub use domain::*;
