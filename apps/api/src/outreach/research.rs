//! Company research: one call to the research provider per batch.

use crate::errors::AppError;
use crate::llm_client::prompts::RESEARCH_SYSTEM;
use crate::llm_client::ChatModel;
use crate::outreach::prompts::render;

/// Produces a free-text research summary for `company`.
///
/// `title` narrows the research toward what matters to that role; `context`
/// carries any extra caller hint.
pub async fn research_company(
    llm: &dyn ChatModel,
    template: &str,
    company: &str,
    title: Option<&str>,
    context: Option<&str>,
) -> Result<String, AppError> {
    let title = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!(" (the reader is their {t})"))
        .unwrap_or_default();
    let context = context
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(|c| format!("Context: {c}"))
        .unwrap_or_default();

    let prompt = render(
        template,
        &[("company", company), ("title", title.as_str()), ("context", context.as_str())],
    );

    llm.complete(&prompt, Some(RESEARCH_SYSTEM))
        .await
        .map_err(|e| AppError::Llm(format!("Research failed for {company}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedModel;
    use crate::outreach::prompts::RESEARCH_COMPANY_TEMPLATE;

    #[tokio::test]
    async fn test_research_fills_template() {
        let llm = ScriptedModel::new("sonar").reply("Acme raised a Series C.");
        let text = research_company(
            &llm,
            RESEARCH_COMPANY_TEMPLATE,
            "Acme",
            Some("CTO"),
            Some("selling data tooling"),
        )
        .await
        .unwrap();

        assert_eq!(text, "Acme raised a Series C.");
        let calls = llm.calls();
        let prompt = &calls[0].last().unwrap().content;
        assert!(prompt.starts_with("Research Acme for a personalized B2B outreach message (the reader is their CTO)."));
        assert!(prompt.contains("Context: selling data tooling"));
    }

    #[tokio::test]
    async fn test_research_without_optional_parts() {
        let llm = ScriptedModel::new("sonar").reply("ok");
        research_company(&llm, "{company}|{title}|{context}", "Acme", None, Some("  "))
            .await
            .unwrap();
        assert_eq!(llm.calls()[0].last().unwrap().content, "Acme||");
    }

    #[tokio::test]
    async fn test_research_error_is_llm_error() {
        let llm = ScriptedModel::new("sonar").fail("down");
        let err = research_company(&llm, RESEARCH_COMPANY_TEMPLATE, "Acme", None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Llm(msg) if msg.contains("Acme")));
    }
}
