//! Webhook intake, manual/bulk ingest entry points, and the HTTP surface
//! that fronts them (§4.1).

mod handler;
mod http;

pub use handler::{IntakeHandler, IntakeOutcome};
pub use http::{router, IntakeState};
