//! End-to-end run: scan every timeframe, ask for a narrative, assemble the
//! brief. Anomaly data survives any narrative failure.

use crate::brief::generate_daily_brief;
use crate::error::Result;
use crate::model::{RunSummary, Timeframe};
use crate::prompt::build_prioritization_prompt;
use crate::safety::{CallOutcome, CallState, ResilientClient, NARRATIVE_FALLBACK};
use crate::scan::ScanOrchestrator;
use chrono::{DateTime, Local};
use polars::prelude::DataFrame;
use tracing::{info, warn};

pub struct BriefOutput {
    pub summary: RunSummary,
    /// Service text, or the fallback text.
    pub narrative: String,
    /// `None` when there was nothing to narrate.
    pub outcome: Option<CallOutcome>,
    pub report: String,
}

pub struct BriefPipeline {
    orchestrator: ScanOrchestrator,
    client: ResilientClient,
}

impl BriefPipeline {
    pub fn new(orchestrator: ScanOrchestrator, client: ResilientClient) -> Self {
        Self { orchestrator, client }
    }

    pub async fn run(&self, inputs: Vec<(Timeframe, Result<DataFrame>)>) -> Result<BriefOutput> {
        self.run_at(inputs, Local::now()).await
    }

    pub async fn run_at(
        &self,
        inputs: Vec<(Timeframe, Result<DataFrame>)>,
        generated_at: DateTime<Local>,
    ) -> Result<BriefOutput> {
        let summary = self.orchestrator.scan_all(inputs)?;
        let anomalies = summary.anomalies();
        info!("Total anomalies flagged: {}", anomalies.len());

        let mut notes = Vec::new();
        let (narrative, outcome) = if anomalies.is_empty() {
            info!("Nothing to narrate, skipping narrative call");
            ("No anomalies passed the volume threshold.".to_string(), None)
        } else {
            let prompt = build_prioritization_prompt(&anomalies);
            let outcome = self.client.invoke_traced(&prompt, self.client.policy()).await;
            let narrative = match outcome.state {
                CallState::FatalError => {
                    let reason = outcome.last_error.clone().unwrap_or_default();
                    warn!("Narrative generation failed: {}", reason);
                    notes.push(format!("Narrative generation failed: {}", reason));
                    NARRATIVE_FALLBACK.to_string()
                }
                _ => outcome
                    .response
                    .clone()
                    .unwrap_or_else(|| NARRATIVE_FALLBACK.to_string()),
            };
            if outcome.used_fallback() {
                notes.push(format!(
                    "Narrative unavailable after {} attempt(s)",
                    outcome.attempts
                ));
            }
            (narrative, Some(outcome))
        };

        let mut report = generate_daily_brief(&summary, &narrative, &generated_at);
        if !notes.is_empty() {
            report.push_str("\n**Warnings:**\n");
            for note in &notes {
                report.push_str(&format!("- {}\n", note));
            }
        }

        Ok(BriefOutput {
            summary,
            narrative,
            outcome,
            report,
        })
    }
}
