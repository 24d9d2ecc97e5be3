pub mod chat;
pub mod health;
pub mod metrics;
pub mod sessions;

pub use health::{health_check, readiness_check};
