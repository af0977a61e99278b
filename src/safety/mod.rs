//! Safety & Guardrails Module
//!
//! Keeps the narrative call from taking the run down with it: bounded
//! retries with linear backoff, a cancel flag checked between attempts and a
//! fixed fallback text when every attempt fails.

pub mod failure_recovery;

pub use failure_recovery::{
    CallOutcome, CallState, NarrativeService, ResilientClient, RetryPolicy, Sleeper, TokioSleeper,
    NARRATIVE_FALLBACK,
};
