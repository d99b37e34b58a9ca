//! The four LLM-backed steps, bundled with the models, prompts and rules they need.
//! Both batch strategies call into this one implementation.

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{MessageRules, Settings};
use crate::errors::AppError;
use crate::llm_client::ChatModel;
use crate::models::{EmployeeProfile, MessageVariant, SelectedMessage};
use crate::outreach::messages::{format_variants, generate_variants, select_best_message};
use crate::outreach::prompts::PromptSet;
use crate::outreach::research::research_company;
use crate::outreach::scoring::{EmployeeScorer, LlmEmployeeScorer, ScoringOutcome};

/// Chat models per step.
#[derive(Clone)]
pub struct StepModels {
    pub research: Arc<dyn ChatModel>,
    pub scorer: Arc<dyn ChatModel>,
    pub generator: Arc<dyn ChatModel>,
    pub selector: Arc<dyn ChatModel>,
}

/// Outcome of generate-then-select for one employee. A failure leaves an empty
/// message, a zero score and the error text.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposedMessage {
    pub message: String,
    pub score: u8,
    pub error: Option<String>,
}

pub struct OutreachSteps {
    models: StepModels,
    scorer: Arc<dyn EmployeeScorer>,
    prompts: PromptSet,
    rules: MessageRules,
    show_all_variants: bool,
}

impl OutreachSteps {
    pub fn new(models: StepModels, prompts: PromptSet, settings: &Settings) -> Self {
        let scorer = Arc::new(LlmEmployeeScorer::new(
            Arc::clone(&models.scorer),
            prompts.tools.score_employees.clone(),
        ));
        Self {
            models,
            scorer,
            prompts,
            rules: settings.message_rules.clone(),
            show_all_variants: settings.output.show_all_variants,
        }
    }

    pub fn prompts(&self) -> &PromptSet {
        &self.prompts
    }

    pub async fn research(
        &self,
        company: &str,
        title: Option<&str>,
        context: Option<&str>,
    ) -> Result<String, AppError> {
        research_company(
            self.models.research.as_ref(),
            &self.prompts.tools.research_company,
            company,
            title,
            context,
        )
        .await
    }

    pub async fn score(
        &self,
        company: &str,
        employees: &[EmployeeProfile],
        research: &str,
    ) -> ScoringOutcome {
        self.scorer.score(company, employees, research).await
    }

    pub async fn generate_variants(
        &self,
        profile_data: &str,
        research: &str,
    ) -> Result<Vec<MessageVariant>, AppError> {
        let variants = generate_variants(
            self.models.generator.as_ref(),
            &self.prompts.tools.generate_message_variants,
            profile_data,
            research,
            &self.rules,
        )
        .await?;

        if self.show_all_variants {
            for (i, v) in variants.iter().enumerate() {
                info!(
                    "Variant {} [{} p={:.2}]: {}",
                    i + 1,
                    v.hook_type,
                    v.probability,
                    v.message
                );
            }
        }

        Ok(variants)
    }

    pub async fn select_message(
        &self,
        variants: &str,
        profile_data: &str,
        research: &str,
    ) -> Result<SelectedMessage, AppError> {
        select_best_message(
            self.models.selector.as_ref(),
            &self.prompts.tools.select_best_message,
            variants,
            profile_data,
            research,
        )
        .await
    }

    /// Generate variants, then pick one. Never fails; errors are carried in the result.
    pub async fn compose_message(&self, profile: &EmployeeProfile, research: &str) -> ComposedMessage {
        let profile_data = profile.profile_text();

        let outcome = async {
            let variants = self.generate_variants(&profile_data, research).await?;
            self.select_message(&format_variants(&variants), &profile_data, research)
                .await
        }
        .await;

        match outcome {
            Ok(selected) => {
                info!(
                    "Selected message for {} (score {}/10): {}",
                    profile.full_name, selected.score, selected.reason
                );
                ComposedMessage {
                    message: selected.message,
                    score: selected.score,
                    error: None,
                }
            }
            Err(e) => {
                warn!("Message generation failed for {}: {e}", profile.full_name);
                ComposedMessage {
                    message: String::new(),
                    score: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}
