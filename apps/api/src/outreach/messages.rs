//! Message generation and selection.
//!
//! Generation asks for a spread of candidate messages with self-reported
//! probabilities (verbalized sampling) instead of one greedy "best" draft.
//! Selection is a separate call that judges the candidates. The two are never
//! merged into one prompt.

use serde::Deserialize;
use tracing::info;

use crate::config::MessageRules;
use crate::errors::AppError;
use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{parse_json_object, ChatModel};
use crate::models::{MessageVariant, SelectedMessage};
use crate::outreach::prompts::render;

/// Number of variants requested per employee.
pub const VARIANT_COUNT: usize = 5;

#[derive(Debug, Deserialize)]
struct VariantsEnvelope {
    variants: Vec<MessageVariant>,
}

/// Generates candidate messages for one profile. Blank candidates are discarded.
pub async fn generate_variants(
    llm: &dyn ChatModel,
    template: &str,
    profile_data: &str,
    research: &str,
    rules: &MessageRules,
) -> Result<Vec<MessageVariant>, AppError> {
    let max_words = rules.max_words.to_string();
    let prompt = render(
        template,
        &[
            ("profile_data", profile_data),
            ("research_data", research),
            ("max_words", max_words.as_str()),
            ("tone", rules.tone.as_str()),
            ("cta_style", rules.cta_style.as_str()),
        ],
    );

    let reply = llm
        .complete(&prompt, Some(JSON_ONLY_SYSTEM))
        .await
        .map_err(|e| AppError::Llm(format!("Variant generation failed: {e}")))?;

    let envelope: VariantsEnvelope = parse_json_object(&reply)
        .map_err(|e| AppError::Llm(format!("Variant generation returned unusable output: {e}")))?;

    let variants: Vec<MessageVariant> = envelope
        .variants
        .into_iter()
        .filter(|v| !v.message.trim().is_empty())
        .collect();

    if variants.is_empty() {
        return Err(AppError::Llm(
            "Variant generation returned no usable messages".to_string(),
        ));
    }
    if variants.len() != VARIANT_COUNT {
        info!(
            "Expected {VARIANT_COUNT} variants, got {}; continuing",
            variants.len()
        );
    }

    Ok(variants)
}

/// Renders variants as a numbered block for the selection prompt.
pub fn format_variants(variants: &[MessageVariant]) -> String {
    variants
        .iter()
        .enumerate()
        .map(|(i, v)| {
            let hook = if v.hook_type.is_empty() { "unspecified" } else { v.hook_type.as_str() };
            format!(
                "VARIANT {} (hook: {hook}, probability: {:.2}):\n{}",
                i + 1,
                v.probability,
                v.message.trim()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Asks the judge model to pick one variant. The 1-10 score is enforced here.
pub async fn select_best_message(
    llm: &dyn ChatModel,
    template: &str,
    variants: &str,
    profile_data: &str,
    research: &str,
) -> Result<SelectedMessage, AppError> {
    let prompt = render(
        template,
        &[
            ("variants", variants),
            ("profile_data", profile_data),
            ("research_data", research),
        ],
    );

    let reply = llm
        .complete(&prompt, Some(JSON_ONLY_SYSTEM))
        .await
        .map_err(|e| AppError::Llm(format!("Message selection failed: {e}")))?;

    let selected: SelectedMessage = parse_json_object(&reply)
        .map_err(|e| AppError::Llm(format!("Message selection returned unusable output: {e}")))?;

    if !(1..=10).contains(&selected.score) {
        return Err(AppError::Llm(format!(
            "Message selection score {} is outside 1-10",
            selected.score
        )));
    }
    if selected.message.trim().is_empty() {
        return Err(AppError::Llm("Message selection returned an empty message".to_string()));
    }

    Ok(selected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedModel;
    use crate::outreach::prompts::{GENERATE_VARIANTS_TEMPLATE, SELECT_BEST_MESSAGE_TEMPLATE};

    const VARIANTS_REPLY: &str = r#"{"variants": [
        {"message": "Saw the Series C news...", "probability": 0.3, "profile_details_used": ["VP Eng"], "research_insights_used": ["Series C"], "hook_type": "recent_news"},
        {"message": "   ", "probability": 0.1, "hook_type": "question"},
        {"message": "Scaling vector DBs is hard...", "probability": 0.08, "hook_type": "shared_challenge"}
    ]}"#;

    #[tokio::test]
    async fn test_generate_variants_fills_rules_and_drops_blank() {
        let llm = ScriptedModel::new("gen").reply(VARIANTS_REPLY);
        let rules = MessageRules {
            max_words: 60,
            tone: "casual".to_string(),
            cta_style: "question".to_string(),
        };

        let variants = generate_variants(&llm, GENERATE_VARIANTS_TEMPLATE, "NAME: Sarah", "Series C", &rules)
            .await
            .unwrap();

        assert_eq!(variants.len(), 2);
        assert_eq!(variants[0].hook_type, "recent_news");
        let calls = llm.calls();
        let prompt = &calls[0].last().unwrap().content;
        assert!(prompt.contains("At most 60 words"));
        assert!(prompt.contains("Tone: casual"));
        assert!(prompt.contains("Call to action: question"));
        assert!(prompt.contains("NAME: Sarah"));
    }

    #[tokio::test]
    async fn test_generate_variants_rejects_garbage() {
        let llm = ScriptedModel::new("gen").reply("Here are some ideas: be nice.");
        let err = generate_variants(&llm, GENERATE_VARIANTS_TEMPLATE, "", "", &MessageRules::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("unusable output"));
    }

    #[tokio::test]
    async fn test_generate_variants_rejects_empty_list() {
        let llm = ScriptedModel::new("gen").reply(r#"{"variants": []}"#);
        let err = generate_variants(&llm, GENERATE_VARIANTS_TEMPLATE, "", "", &MessageRules::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no usable messages"));
    }

    #[test]
    fn test_format_variants_numbers_each_candidate() {
        let variants: Vec<MessageVariant> =
            serde_json::from_str::<VariantsEnvelope>(VARIANTS_REPLY).unwrap().variants;
        let text = format_variants(&variants);
        assert!(text.starts_with("VARIANT 1 (hook: recent_news, probability: 0.30):"));
        assert!(text.contains("VARIANT 3 (hook: shared_challenge"));
    }

    #[tokio::test]
    async fn test_select_best_message_parses_choice() {
        let llm = ScriptedModel::new("judge").reply(
            r#"{"message": "Saw the Series C news...", "score": 8, "reason": "timely", "rejected_reasons": "others generic"}"#,
        );
        let selected = select_best_message(&llm, SELECT_BEST_MESSAGE_TEMPLATE, "VARIANT 1", "NAME: Sarah", "Series C")
            .await
            .unwrap();
        assert_eq!(selected.score, 8);
        assert_eq!(selected.reason, "timely");
    }

    #[tokio::test]
    async fn test_select_best_message_rejects_out_of_range_score() {
        for bad in [0, 11] {
            let llm = ScriptedModel::new("judge")
                .reply(format!(r#"{{"message": "Hi", "score": {bad}, "reason": "x"}}"#));
            let err = select_best_message(&llm, SELECT_BEST_MESSAGE_TEMPLATE, "", "", "")
                .await
                .unwrap_err();
            assert!(err.to_string().contains("outside 1-10"));
        }
    }
}
