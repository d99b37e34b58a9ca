//! Prompt templates for every outreach step.
//!
//! Each template has a compiled-in default and can be overridden from the prompts
//! YAML file (`supervisor.system`, `tools.<name>`). Placeholders use `{name}` syntax
//! and are filled by [`render`].

use serde::Deserialize;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PromptSet {
    pub supervisor: SupervisorPrompts,
    pub tools: ToolPrompts,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SupervisorPrompts {
    pub system: String,
}

impl Default for SupervisorPrompts {
    fn default() -> Self {
        Self {
            system: SUPERVISOR_SYSTEM.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolPrompts {
    pub research_company: String,
    pub score_employees: String,
    pub generate_message_variants: String,
    pub select_best_message: String,
    pub batch_agent_task: String,
}

impl Default for ToolPrompts {
    fn default() -> Self {
        Self {
            research_company: RESEARCH_COMPANY_TEMPLATE.to_string(),
            score_employees: SCORE_EMPLOYEES_TEMPLATE.to_string(),
            generate_message_variants: GENERATE_VARIANTS_TEMPLATE.to_string(),
            select_best_message: SELECT_BEST_MESSAGE_TEMPLATE.to_string(),
            batch_agent_task: BATCH_AGENT_TASK_TEMPLATE.to_string(),
        }
    }
}

/// Replaces every `{key}` in `template` with its value. Unknown placeholders are left as-is.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |acc, (key, value)| {
        acc.replace(&format!("{{{key}}}"), value)
    })
}

/// Research prompt. Replace: {company}, {title}, {context}
pub const RESEARCH_COMPANY_TEMPLATE: &str = r#"Research {company} for a personalized B2B outreach message{title}.
{context}

Cover, with dates where possible:
1. What the company does and who it sells to
2. Recent news from the last 6 months: launches, funding, partnerships, leadership changes
3. Strategic initiatives, especially digital or technology transformation
4. Likely challenges or priorities a senior leader there is dealing with

Be concise and factual. Bullet points are fine."#;

/// Batch scoring prompt. Replace: {company}, {research}, {employees_json}
pub const SCORE_EMPLOYEES_TEMPLATE: &str = r#"You are selecting the best outreach targets at {company}.

COMPANY RESEARCH:
{research}

EMPLOYEES:
{employees_json}

Score EVERY employee from 0 to 100 as an outreach target, weighing:
- Seniority and decision-making power
- Relevance of the role to technology / digital transformation buying decisions
- Profile completeness (enough detail to personalize a message)
- Likely responsiveness

Return a JSON ARRAY with one object per employee, in any order:
[
  {"name": "exact full name from the list", "score": 85, "reasoning": "one or two sentences"}
]"#;

/// Variant generation prompt (verbalized sampling).
/// Replace: {profile_data}, {research_data}, {max_words}, {tone}, {cta_style}
pub const GENERATE_VARIANTS_TEMPLATE: &str = r#"Write LinkedIn outreach messages for this person.

PROFILE:
{profile_data}

COMPANY RESEARCH:
{research_data}

RULES:
- At most {max_words} words
- Tone: {tone}
- Call to action: {cta_style}
- Reference at least one concrete profile detail and one research insight
- No flattery, no buzzwords, no "I hope this finds you well"

Do not write the single most likely message. Instead, sample 5 DIFFERENT messages from the
full distribution of good messages, each with its estimated probability (0.0 to 1.0) of being
generated. Include unusual but strong options from the tails of the distribution, and use a
different hook type for each (e.g. "recent_news", "shared_challenge", "role_insight",
"contrarian_take", "question").

Return a JSON object:
{
  "variants": [
    {
      "message": "the full message text",
      "probability": 0.12,
      "profile_details_used": ["..."],
      "research_insights_used": ["..."],
      "hook_type": "recent_news"
    }
  ]
}"#;

/// Variant selection prompt. Replace: {variants}, {profile_data}, {research_data}
pub const SELECT_BEST_MESSAGE_TEMPLATE: &str = r#"You are a demanding sales director reviewing candidate outreach messages.

PROFILE:
{profile_data}

COMPANY RESEARCH:
{research_data}

CANDIDATES:
{variants}

Pick the ONE message most likely to get a reply from this specific person. Prefer specificity,
relevance to their role and brevity. You may lightly edit the chosen message for grammar only.

Return a JSON object:
{
  "message": "the selected message text",
  "score": 8,
  "reason": "why this one wins",
  "rejected_reasons": "why each other candidate lost"
}
`score` is an integer quality rating from 1 to 10."#;

/// Agent task prompt. Replace: {company}, {employee_count}, {employees_json}, {top_n}, {threshold}
pub const BATCH_AGENT_TASK_TEMPLATE: &str = r#"Process these employees from {company}.

EMPLOYEES DATA:
{employees_json}

YOUR TASK:
1. Research {company} (once)
2. Score all {employee_count} employees and select at most the top {top_n}
3. Generate personalized messages only for selected employees (score >= {threshold})
4. Finish with results for ALL employees in this JSON format:
[
  {
    "id": "...",
    "fullName": "...",
    "title": "...",
    "selected": true,
    "selection_reasoning": "Score: X/100. Reason...",
    "message": "personalized message (only if selected)",
    "message_score": 8,
    "error": ""
  }
]

Research the company ONCE, not per employee. Be efficient."#;

/// Agent system prompt, including the action protocol the agent loop understands.
pub const SUPERVISOR_SYSTEM: &str = r#"You are an outreach supervisor. You complete tasks by calling tools, one at a time.

AVAILABLE TOOLS:
- research_company: {"company": "...", "title": "optional", "context": "optional"} → research text
- score_employees: {"research": "..."} → scores (0-100) for every employee in the task
- generate_message_variants: {"employee_id": "...", "research": "..."} → 5 candidate messages
- select_best_message: {"employee_id": "...", "variants": "...", "research": "..."} → best message with a 1-10 score

Reply with EXACTLY ONE JSON object per turn and nothing else:
- To call a tool: {"tool": "<tool name>", "input": {...}}
- To finish: {"final": [ ...results array... ]}"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render(
            BATCH_AGENT_TASK_TEMPLATE,
            &[
                ("company", "Acme"),
                ("employee_count", "4"),
                ("employees_json", "[]"),
                ("top_n", "3"),
                ("threshold", "70"),
            ],
        );
        assert!(out.contains("Process these employees from Acme."));
        assert!(out.contains("1. Research Acme (once)"));
        assert!(out.contains("top 3"));
        assert!(!out.contains("{company}"));
    }

    #[test]
    fn test_render_leaves_unknown_placeholders() {
        assert_eq!(render("{a} and {b}", &[("a", "x")]), "x and {b}");
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let prompts: PromptSet =
            serde_yaml::from_str("tools:\n  select_best_message: \"pick one\"\n").unwrap();
        assert_eq!(prompts.tools.select_best_message, "pick one");
        assert_eq!(prompts.tools.research_company, RESEARCH_COMPANY_TEMPLATE);
        assert_eq!(prompts.supervisor.system, SUPERVISOR_SYSTEM);
    }
}
