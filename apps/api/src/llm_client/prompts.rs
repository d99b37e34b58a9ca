// Shared prompt constants.
// Step-specific templates live in outreach::prompts and can be overridden from YAML.
// This file contains cross-cutting system prompt fragments.

/// System prompt fragment that enforces JSON-only output.
pub const JSON_ONLY_SYSTEM: &str = "You are a precise, structured assistant. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// System prompt for the research provider.
pub const RESEARCH_SYSTEM: &str = "You are a B2B sales researcher. \
    Report concrete, recent, verifiable facts. Prefer specifics (products, launches, \
    hires, funding, initiatives) over generic descriptions. Say so when you are unsure.";
