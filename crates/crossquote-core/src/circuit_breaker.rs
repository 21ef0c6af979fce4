//! Per-provider circuit breaker for the reference HTTP collectors.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::ProviderId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    /// One probe call is let through after the cooldown.
    HalfOpen,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub cooldown: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            cooldown: Duration::from_secs(30),
        }
    }
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    failures: u32,
    opened_at: Option<Instant>,
}

/// Refuses calls to a provider that keeps failing.
///
/// After `failure_threshold` consecutive failures the circuit opens and
/// [`admit`](Self::admit) reports the remaining cooldown instead of letting the
/// call through. Once the cooldown has passed a single probe is admitted; its
/// result closes or re-opens the circuit.
#[derive(Debug)]
pub struct CircuitBreaker {
    provider: ProviderId,
    config: CircuitBreakerConfig,
    circuit: Mutex<Circuit>,
}

impl CircuitBreaker {
    pub fn new(provider: ProviderId, config: CircuitBreakerConfig) -> Self {
        Self {
            provider,
            config,
            circuit: Mutex::new(Circuit {
                state: CircuitState::Closed,
                failures: 0,
                opened_at: None,
            }),
        }
    }

    pub fn for_provider(provider: ProviderId) -> Self {
        Self::new(provider, CircuitBreakerConfig::default())
    }

    // The circuit is plain data, valid even if a holder panicked.
    fn circuit(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `Ok` when a call may go out, otherwise the cooldown still to wait.
    pub fn admit(&self) -> Result<(), Duration> {
        let mut circuit = self.circuit();
        if circuit.state != CircuitState::Open {
            return Ok(());
        }

        let elapsed = circuit
            .opened_at
            .map_or(Duration::ZERO, |opened_at| opened_at.elapsed());
        if elapsed < self.config.cooldown {
            return Err(self.config.cooldown - elapsed);
        }
        circuit.state = CircuitState::HalfOpen;
        circuit.opened_at = None;
        Ok(())
    }

    pub fn record_success(&self) {
        let mut circuit = self.circuit();
        if circuit.state != CircuitState::Closed {
            info!(provider = %self.provider, "circuit closed");
        }
        circuit.state = CircuitState::Closed;
        circuit.failures = 0;
        circuit.opened_at = None;
    }

    pub fn record_failure(&self) {
        let mut circuit = self.circuit();
        circuit.failures = circuit.failures.saturating_add(1);

        let trips = circuit.state == CircuitState::HalfOpen
            || (circuit.state == CircuitState::Closed
                && circuit.failures >= self.config.failure_threshold);
        if trips {
            warn!(
                provider = %self.provider,
                failures = circuit.failures,
                cooldown_ms = self.config.cooldown.as_millis() as u64,
                "circuit opened"
            );
            circuit.state = CircuitState::Open;
            circuit.opened_at = Some(Instant::now());
        }
    }

    pub fn state(&self) -> CircuitState {
        self.circuit().state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.circuit().failures
    }
}
