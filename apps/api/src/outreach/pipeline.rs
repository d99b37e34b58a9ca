//! Batch Pipeline: turns one `CompanyBatch` into one delivered `OutreachResult`
//! per employee.
//!
//! Flow (scripted strategy): research (once) → score all → select top-N ≥ 70 →
//!       per selected employee: generate variants → select best → deliver all,
//!       in caller order, with a short pause between deliveries.
//!
//! The strategy that builds the results is pluggable (`OutreachStrategy`); delivery
//! is shared. Nothing in here returns an error: failures end up in `OutreachResult.error`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, info_span, warn, Instrument};

use crate::models::{CompanyBatch, OutreachResult};
use crate::outreach::delivery::ResultSink;
use crate::outreach::selection::select_targets;
use crate::outreach::steps::OutreachSteps;
use crate::queue::BatchRunner;

// ────────────────────────────────────────────────────────────────────────────
// Strategy trait
// ────────────────────────────────────────────────────────────────────────────

/// Builds the results for one batch. Implementations must return exactly one
/// result per input employee, in input order.
#[async_trait]
pub trait OutreachStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    async fn build_results(&self, batch: &CompanyBatch) -> Vec<OutreachResult>;
}

/// One result per employee, all carrying the same error.
pub fn failed_results(batch: &CompanyBatch, error: &str) -> Vec<OutreachResult> {
    batch
        .employees
        .iter()
        .map(|e| OutreachResult::failed(e, error))
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// ScriptedStrategy: canonical fixed sequence
// ────────────────────────────────────────────────────────────────────────────

pub struct ScriptedStrategy {
    steps: Arc<OutreachSteps>,
    top_n: usize,
}

impl ScriptedStrategy {
    pub fn new(steps: Arc<OutreachSteps>, top_n: usize) -> Self {
        Self { steps, top_n }
    }
}

#[async_trait]
impl OutreachStrategy for ScriptedStrategy {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn build_results(&self, batch: &CompanyBatch) -> Vec<OutreachResult> {
        let company = batch.company_name.as_str();

        // Step 1: Research (once per batch)
        info!("Researching {company}");
        let research = match self.steps.research(company, None, None).await {
            Ok(text) => text,
            Err(e) => {
                warn!("Research failed for {company}: {e}");
                return failed_results(batch, &format!("Research error: {e}"));
            }
        };

        // Step 2: Score everyone in one call
        let outcome = self.steps.score(company, &batch.employees, &research).await;
        info!(
            "Scored {} of {} employees ({:?} backend)",
            outcome.scores.len(),
            batch.employees.len(),
            outcome.backend
        );

        // Step 3: Top-N above threshold
        let selection = select_targets(&outcome.scores, self.top_n);
        info!(
            "Selected {} target(s) at {company} (top {})",
            selection.selected_count(),
            self.top_n
        );

        // Step 4: Messages for selected employees, in caller order
        let mut results = Vec::with_capacity(batch.employees.len());
        for (index, employee) in batch.employees.iter().enumerate() {
            let reasoning = selection.reasoning_for(index);
            if !selection.is_selected(index) {
                results.push(OutreachResult::unselected(employee, reasoning));
                continue;
            }

            let composed = self.steps.compose_message(employee, &research).await;
            results.push(OutreachResult {
                selected: true,
                message: composed.message,
                message_score: composed.score,
                error: composed.error.unwrap_or_default(),
                ..OutreachResult::unselected(employee, reasoning)
            });
        }

        results
    }
}

// ────────────────────────────────────────────────────────────────────────────
// BatchPipeline: strategy + delivery
// ────────────────────────────────────────────────────────────────────────────

pub struct BatchPipeline {
    strategy: Arc<dyn OutreachStrategy>,
    sink: Arc<dyn ResultSink>,
    message_delay: Duration,
}

impl BatchPipeline {
    pub fn new(
        strategy: Arc<dyn OutreachStrategy>,
        sink: Arc<dyn ResultSink>,
        message_delay: Duration,
    ) -> Self {
        Self {
            strategy,
            sink,
            message_delay,
        }
    }

    async fn process(&self, batch: CompanyBatch) {
        let waited = Utc::now().signed_duration_since(batch.queued_at);
        info!(
            "Processing {} ({} employees, {} strategy, waited {}s in queue)",
            batch.company_name,
            batch.employees.len(),
            self.strategy.name(),
            waited.num_seconds()
        );

        let results = self.strategy.build_results(&batch).await;
        if results.len() != batch.employees.len() {
            warn!(
                "Strategy returned {} results for {} employees",
                results.len(),
                batch.employees.len()
            );
        }

        let mut delivered = 0usize;
        for (i, result) in results.iter().enumerate() {
            if i > 0 && !self.message_delay.is_zero() {
                tokio::time::sleep(self.message_delay).await;
            }
            match self.sink.deliver(&batch.callback_url, result).await {
                Ok(()) => {
                    delivered += 1;
                    info!("Sent to webhook: {}", result.full_name);
                }
                Err(e) => warn!("Webhook failed for {}: {e}", result.full_name),
            }
        }

        let selected = results.iter().filter(|r| r.selected).count();
        let errors = results.iter().filter(|r| !r.error.is_empty()).count();
        info!(
            "Completed {}: {} results, {} selected, {} with errors, {} delivered",
            batch.company_name,
            results.len(),
            selected,
            errors,
            delivered
        );
    }
}

#[async_trait]
impl BatchRunner for BatchPipeline {
    async fn run(&self, batch: CompanyBatch) {
        let span = info_span!(
            "batch",
            batch_id = %batch.batch_id,
            company = %batch.company_name
        );
        self.process(batch).instrument(span).await;
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
