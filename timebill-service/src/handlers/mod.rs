mod health;

pub use health::{health_check, metrics_endpoint, readiness_check};
