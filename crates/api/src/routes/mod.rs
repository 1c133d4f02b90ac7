//! API Routes

pub mod heartbeat;
pub mod reports;
