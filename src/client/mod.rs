//! Resilient access to the remote analysis service.

pub mod auth;
pub mod breaker;
pub mod remote;
pub mod retry;

pub use auth::{EnvToken, StaticToken, TokenProvider};
pub use breaker::{CircuitBreaker, CircuitState};
pub use remote::{HealthResponse, ResilientClient};
pub use retry::RetryPolicy;
