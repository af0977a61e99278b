//! Failure Recovery
//!
//! Retry loop around the narrative service:
//! - Retry transient failures with linear backoff
//! - Propagate fatal failures after a single attempt
//! - Fall back to a fixed text once attempts run out

use crate::config::RetrySettings;
use crate::error::{PulseError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Returned in place of a narrative when the service never answered.
pub const NARRATIVE_FALLBACK: &str = "analysis unavailable";

/// Text generation backend. One call is one attempt.
#[async_trait]
pub trait NarrativeService: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Injected wait between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_retries: usize,
    /// Wait after the first failed attempt; grows linearly.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetrySettings::default())
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: settings.base_delay(),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `base_delay × attempt`.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        self.base_delay.saturating_mul(attempt as u32)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallState {
    Idle,
    Attempting(usize),
    Success,
    ExhaustedFallback,
    FatalError,
    Cancelled,
}

impl CallState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, CallState::Idle | CallState::Attempting(_))
    }
}

/// Trace of one resilient call.
#[derive(Debug)]
pub struct CallOutcome {
    pub state: CallState,
    pub attempts: usize,
    pub waits: Vec<Duration>,
    pub last_error: Option<String>,
    /// Service text on success, fallback text on exhaustion or cancel.
    pub response: Option<String>,
    error: Option<PulseError>,
}

impl CallOutcome {
    fn new() -> Self {
        Self {
            state: CallState::Idle,
            attempts: 0,
            waits: Vec::new(),
            last_error: None,
            response: None,
            error: None,
        }
    }

    pub fn used_fallback(&self) -> bool {
        matches!(self.state, CallState::ExhaustedFallback | CallState::Cancelled)
    }

    /// Collapse into the plain `invoke` result.
    pub fn into_result(self) -> Result<String> {
        match self.state {
            CallState::FatalError => Err(self
                .error
                .unwrap_or_else(|| PulseError::Llm(self.last_error.unwrap_or_default()))),
            _ => Ok(self.response.unwrap_or_else(|| NARRATIVE_FALLBACK.to_string())),
        }
    }
}

/// Narrative service wrapped in the retry state machine.
pub struct ResilientClient {
    service: Arc<dyn NarrativeService>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    cancel: Arc<AtomicBool>,
}

impl ResilientClient {
    pub fn new(service: Arc<dyn NarrativeService>, policy: RetryPolicy) -> Self {
        Self {
            service,
            policy,
            sleeper: Arc::new(TokioSleeper),
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    /// Shared flag; raising it stops the loop before the next attempt.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub async fn invoke(&self, prompt: &str) -> Result<String> {
        self.invoke_traced(prompt, &self.policy).await.into_result()
    }

    pub async fn invoke_with(&self, prompt: &str, policy: &RetryPolicy) -> Result<String> {
        self.invoke_traced(prompt, policy).await.into_result()
    }

    pub async fn invoke_traced(&self, prompt: &str, policy: &RetryPolicy) -> CallOutcome {
        let mut outcome = CallOutcome::new();

        for attempt in 1..=policy.max_retries {
            if self.cancel.load(Ordering::SeqCst) {
                info!("Narrative call cancelled before attempt {}", attempt);
                outcome.state = CallState::Cancelled;
                break;
            }

            outcome.state = CallState::Attempting(attempt);
            outcome.attempts = attempt;

            match self.service.generate(prompt).await {
                Ok(text) => {
                    info!("Narrative call succeeded on attempt {}", attempt);
                    outcome.state = CallState::Success;
                    outcome.response = Some(text);
                    return outcome;
                }
                Err(e) if e.is_transient() => {
                    warn!(
                        "Narrative call failed (attempt {}/{}): {}",
                        attempt, policy.max_retries, e
                    );
                    outcome.last_error = Some(e.to_string());
                    if attempt < policy.max_retries {
                        let delay = policy.delay_for_attempt(attempt);
                        info!("Retrying in {:?}", delay);
                        outcome.waits.push(delay);
                        self.sleeper.sleep(delay).await;
                    }
                }
                Err(e) => {
                    warn!("Narrative call failed with non-retryable error: {}", e);
                    outcome.state = CallState::FatalError;
                    outcome.last_error = Some(e.to_string());
                    outcome.error = Some(e);
                    return outcome;
                }
            }
        }

        if outcome.state != CallState::Cancelled {
            warn!("Max retries reached, using fallback narrative");
            outcome.state = CallState::ExhaustedFallback;
        }
        outcome.response = Some(NARRATIVE_FALLBACK.to_string());
        outcome
    }
}
