//! Circuit breaker for remote analysis calls.
//!
//! Stops calling a failing endpoint until it is likely healthy again.
//!
//! ```text
//! CLOSED --(failures >= threshold)--> OPEN
//! OPEN --(reset timeout elapsed)--> HALF_OPEN (one trial call)
//! HALF_OPEN --success--> CLOSED
//! HALF_OPEN --failure--> OPEN
//! ```
//!
//! Only errors for which [`AppError::trips_breaker`] holds are counted;
//! local failures such as a missing bearer token pass through untouched.

use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::error::{AppError, Result};
use crate::models::CircuitBreakerConfig;

/// Breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    /// A half-open trial call is running
    trial_in_flight: bool,
}

/// Three-state circuit breaker guarding one endpoint.
#[derive(Debug)]
pub struct CircuitBreaker {
    endpoint: String,
    failure_threshold: u32,
    reset_timeout: Duration,
    inner: Mutex<BreakerState>,
}

impl CircuitBreaker {
    pub fn new(endpoint: impl Into<String>, config: &CircuitBreakerConfig) -> Self {
        Self {
            endpoint: endpoint.into(),
            failure_threshold: config.failure_threshold.max(1),
            reset_timeout: config.reset_timeout(),
            inner: Mutex::new(BreakerState {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                trial_in_flight: false,
            }),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    fn lock(&self) -> MutexGuard<'_, BreakerState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Run `operation` through the breaker.
    ///
    /// Fails with [`AppError::CircuitOpen`] without invoking the operation
    /// while the circuit is open.
    pub async fn execute<T, F, Fut>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut permit = self.admit()?;
        let outcome = operation().await;

        match &outcome {
            Ok(_) => self.on_success(),
            Err(err) if err.trips_breaker() => self.on_failure(err),
            Err(_) => {}
        }
        permit.settled = true;
        if permit.trial {
            self.lock().trial_in_flight = false;
        }

        outcome
    }

    fn admit(&self) -> Result<Permit<'_>> {
        let mut inner = self.lock();
        let trial = match inner.state {
            CircuitState::Closed => false,
            CircuitState::Open => {
                let cooled_down = inner
                    .last_failure
                    .is_some_and(|at| at.elapsed() > self.reset_timeout);
                if !cooled_down {
                    return Err(self.open_error());
                }
                inner.state = CircuitState::HalfOpen;
                log::info!("Circuit breaker for {} moved to HALF_OPEN", self.endpoint);
                true
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    return Err(self.open_error());
                }
                true
            }
        };
        if trial {
            inner.trial_in_flight = true;
        }

        Ok(Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        inner.failure_count = 0;
        if inner.state == CircuitState::HalfOpen {
            inner.state = CircuitState::Closed;
            log::info!("Circuit breaker for {} moved to CLOSED", self.endpoint);
        }
    }

    fn on_failure(&self, err: &AppError) {
        let mut inner = self.lock();
        inner.failure_count += 1;
        inner.last_failure = Some(Instant::now());

        let reopen = inner.state == CircuitState::HalfOpen;
        if (reopen || inner.failure_count >= self.failure_threshold)
            && inner.state != CircuitState::Open
        {
            inner.state = CircuitState::Open;
            log::warn!(
                "Circuit breaker for {} moved to OPEN after {} failures (last: {})",
                self.endpoint,
                inner.failure_count,
                err
            );
        } else {
            log::debug!(
                "Circuit breaker for {}: failure {}/{}",
                self.endpoint,
                inner.failure_count,
                self.failure_threshold
            );
        }
    }

    fn open_error(&self) -> AppError {
        AppError::CircuitOpen {
            endpoint: self.endpoint.clone(),
        }
    }
}

/// Admission ticket for one call. Releases an abandoned half-open trial
/// when the calling future is dropped mid-flight.
struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if self.trial && !self.settled {
            let mut inner = self.breaker.lock();
            inner.trial_in_flight = false;
            log::debug!(
                "Circuit breaker for {}: trial call abandoned",
                self.breaker.endpoint
            );
        }
    }
}
