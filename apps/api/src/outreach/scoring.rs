//! Employee Scoring: pluggable, trait-based scorer that ranks a company's employees
//! as outreach targets.
//!
//! Default: `LlmEmployeeScorer` (one LLM call for the whole batch) which falls back to
//! `KeywordEmployeeScorer` (pure-Rust title heuristic, deterministic, never fails)
//! whenever the call errors or its reply cannot be parsed.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm_client::prompts::JSON_ONLY_SYSTEM;
use crate::llm_client::{parse_json_array, ChatModel, LlmError};
use crate::models::{EmployeeProfile, EmployeeScore};
use crate::outreach::prompts::render;

// ────────────────────────────────────────────────────────────────────────────
// Output
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringBackend {
    Llm,
    Keyword,
}

#[derive(Debug, Clone)]
pub struct ScoringOutcome {
    /// Sorted by score, highest first. Ties keep caller order.
    pub scores: Vec<EmployeeScore>,
    pub backend: ScoringBackend,
}

impl ScoringOutcome {
    fn sorted(mut scores: Vec<EmployeeScore>, backend: ScoringBackend) -> Self {
        scores.sort_by(|a, b| b.score.cmp(&a.score));
        Self { scores, backend }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Trait definition
// ────────────────────────────────────────────────────────────────────────────

/// Implement this to swap scoring backends without touching the pipeline.
#[async_trait]
pub trait EmployeeScorer: Send + Sync {
    async fn score(
        &self,
        company: &str,
        employees: &[EmployeeProfile],
        research: &str,
    ) -> ScoringOutcome;
}

// ────────────────────────────────────────────────────────────────────────────
// KeywordEmployeeScorer
// ────────────────────────────────────────────────────────────────────────────

/// Title-keyword heuristic. Scores every employee; never fails.
pub struct KeywordEmployeeScorer;

#[async_trait]
impl EmployeeScorer for KeywordEmployeeScorer {
    async fn score(
        &self,
        _company: &str,
        employees: &[EmployeeProfile],
        _research: &str,
    ) -> ScoringOutcome {
        keyword_scores(employees)
    }
}

const BASE_SCORE: u32 = 50;
const TECH_BONUS: u32 = 10;
const TECH_KEYWORDS: &[&str] = &["digital", "technology", "tech", "innovation", "transformation"];

/// Seniority tiers, checked in order; the first hit wins.
/// Acronyms match whole words only ("cto" must not fire on "director").
const SENIORITY_TIERS: &[(&[&str], &[&str], u32, &str)] = &[
    (&["cto"], &["chief technology"], 95, "CTO"),
    (&["vp", "svp", "evp"], &["vice president"], 90, "VP"),
    (&["chief"], &[], 85, "C-level"),
    (&[], &["head of"], 80, "head of"),
    (&[], &["director"], 75, "director"),
    (&[], &["manager"], 60, "manager"),
];

/// Deterministic title score: seniority tier (or base 50), +10 for a tech keyword,
/// capped at 100 after the bonus.
pub fn keyword_score(title: &str) -> u8 {
    keyword_score_explained(title).0
}

fn keyword_score_explained(title: &str) -> (u8, String) {
    let lower = title.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    let normalized = words.join(" ");

    let tier = SENIORITY_TIERS.iter().find(|(tokens, phrases, _, _)| {
        tokens.iter().any(|t| words.contains(t)) || phrases.iter().any(|p| normalized.contains(p))
    });

    let (mut score, mut reasoning) = match tier {
        Some((_, _, score, label)) => (*score, format!("{label} title ({score})")),
        None => (BASE_SCORE, format!("no seniority keyword ({BASE_SCORE})")),
    };

    if TECH_KEYWORDS.iter().any(|k| lower.contains(k)) {
        score += TECH_BONUS;
        reasoning.push_str(&format!(" + technology focus ({TECH_BONUS})"));
    }

    let score = score.min(100) as u8;
    (score, format!("Keyword fallback: {reasoning}."))
}

fn keyword_scores(employees: &[EmployeeProfile]) -> ScoringOutcome {
    let scores = employees
        .iter()
        .enumerate()
        .map(|(index, e)| {
            let (score, reasoning) = keyword_score_explained(&e.title);
            EmployeeScore {
                index,
                id: e.id.clone(),
                full_name: e.full_name.clone(),
                title: e.title.clone(),
                score,
                reasoning,
            }
        })
        .collect();
    ScoringOutcome::sorted(scores, ScoringBackend::Keyword)
}

// ────────────────────────────────────────────────────────────────────────────
// Name matching
// ────────────────────────────────────────────────────────────────────────────

/// How LLM-returned names are tied back to employees: the returned name must
/// contain the employee's full name, ignoring case and surrounding whitespace.
/// Employees whose name no entry contains are left unscored.
#[derive(Debug, Clone, Copy, Default)]
pub struct LenientNameMatch;

impl LenientNameMatch {
    pub fn matches(&self, returned_name: &str, full_name: &str) -> bool {
        let full_name = full_name.trim().to_lowercase();
        !full_name.is_empty() && returned_name.to_lowercase().contains(&full_name)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmEmployeeScorer
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawScore {
    #[serde(alias = "fullName", alias = "full_name")]
    name: String,
    score: f64,
    #[serde(default, alias = "reason")]
    reasoning: String,
}

/// Scores the whole batch with one LLM call.
pub struct LlmEmployeeScorer {
    llm: Arc<dyn ChatModel>,
    template: String,
    matcher: LenientNameMatch,
    fallback: KeywordEmployeeScorer,
}

impl LlmEmployeeScorer {
    pub fn new(llm: Arc<dyn ChatModel>, template: String) -> Self {
        Self {
            llm,
            template,
            matcher: LenientNameMatch,
            fallback: KeywordEmployeeScorer,
        }
    }

    async fn score_with_llm(
        &self,
        company: &str,
        employees: &[EmployeeProfile],
        research: &str,
    ) -> Result<Vec<EmployeeScore>, LlmError> {
        let roster: Vec<serde_json::Value> = employees
            .iter()
            .map(|e| {
                serde_json::json!({
                    "name": e.full_name,
                    "title": e.title,
                    "title_description": e.title_description,
                    "summary": e.summary,
                })
            })
            .collect();
        let employees_json = serde_json::to_string_pretty(&roster)?;

        let prompt = render(
            &self.template,
            &[
                ("company", company),
                ("research", research),
                ("employees_json", employees_json.as_str()),
            ],
        );

        let reply = self.llm.complete(&prompt, Some(JSON_ONLY_SYSTEM)).await?;
        let raw: Vec<RawScore> = parse_json_array(&reply)?;
        Ok(self.match_scores(employees, &raw))
    }

    /// Ties returned entries back to employees. First matching entry wins.
    fn match_scores(&self, employees: &[EmployeeProfile], raw: &[RawScore]) -> Vec<EmployeeScore> {
        employees
            .iter()
            .enumerate()
            .filter_map(|(index, employee)| {
                let Some(entry) = raw
                    .iter()
                    .find(|r| self.matcher.matches(&r.name, &employee.full_name))
                else {
                    warn!("No score returned for {}; leaving unscored", employee.full_name);
                    return None;
                };
                Some(EmployeeScore {
                    index,
                    id: employee.id.clone(),
                    full_name: employee.full_name.clone(),
                    title: employee.title.clone(),
                    score: entry.score.round().clamp(0.0, 100.0) as u8,
                    reasoning: entry.reasoning.clone(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl EmployeeScorer for LlmEmployeeScorer {
    async fn score(
        &self,
        company: &str,
        employees: &[EmployeeProfile],
        research: &str,
    ) -> ScoringOutcome {
        match self.score_with_llm(company, employees, research).await {
            Ok(scores) => {
                info!(
                    "Scored {}/{} employees at {company} via {}",
                    scores.len(),
                    employees.len(),
                    self.llm.model_name()
                );
                ScoringOutcome::sorted(scores, ScoringBackend::Llm)
            }
            Err(e) => {
                warn!("LLM scoring failed for {company} ({e}); using keyword fallback");
                self.fallback.score(company, employees, research).await
            }
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::testing::ScriptedModel;
    use crate::outreach::prompts::SCORE_EMPLOYEES_TEMPLATE;
    use serde_json::json;

    fn employee(id: &str, name: &str, title: &str) -> EmployeeProfile {
        serde_json::from_value(json!({"id": id, "fullName": name, "title": title})).unwrap()
    }

    #[test]
    fn test_keyword_table() {
        assert_eq!(keyword_score("CTO"), 95);
        assert_eq!(keyword_score("Chief Technology Officer"), 100);
        assert_eq!(keyword_score("VP Sales"), 90);
        assert_eq!(keyword_score("Vice President, Operations"), 90);
        assert_eq!(keyword_score("Chief Financial Officer"), 85);
        assert_eq!(keyword_score("Head of Marketing"), 80);
        assert_eq!(keyword_score("Director"), 75);
        assert_eq!(keyword_score("Manager"), 60);
        assert_eq!(keyword_score("Intern"), 50);
    }

    #[test]
    fn test_director_is_not_mistaken_for_cto() {
        assert_eq!(keyword_score("Director of Sales"), 75);
        assert_eq!(keyword_score("Managing Director"), 75);
    }

    #[test]
    fn test_tech_bonus_applies_and_caps_at_100() {
        assert_eq!(keyword_score("Director of Digital"), 85);
        assert_eq!(keyword_score("Innovation Analyst"), 60);
        assert_eq!(keyword_score("CTO, Digital Transformation"), 100);
        assert_eq!(keyword_score("VP Technology"), 100);
    }

    #[test]
    fn test_keyword_score_is_case_insensitive_and_stable() {
        for _ in 0..3 {
            assert_eq!(keyword_score("head OF engineering"), 80);
            assert_eq!(keyword_score("HEAD of Engineering"), 80);
        }
        assert_eq!(keyword_score(""), 50);
    }

    #[test]
    fn test_lenient_name_match() {
        let m = LenientNameMatch;
        assert!(m.matches("Dr. Sarah Chen (VP Eng)", "sarah chen"));
        assert!(m.matches("SARAH CHEN", " Sarah Chen "));
        assert!(!m.matches("Sarah", "Sarah Chen"));
        assert!(!m.matches("anyone", "   "));
    }

    #[tokio::test]
    async fn test_keyword_scorer_sorts_descending_with_stable_ties() {
        let employees = vec![
            employee("1", "A", "Manager"),
            employee("2", "B", "CTO"),
            employee("3", "C", "Manager"),
        ];
        let outcome = KeywordEmployeeScorer.score("Acme", &employees, "").await;
        let ids: Vec<&str> = outcome.scores.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["2", "1", "3"]);
        assert_eq!(outcome.backend, ScoringBackend::Keyword);
    }

    #[tokio::test]
    async fn test_llm_scores_matched_by_substring_and_unmatched_dropped() {
        let llm = Arc::new(ScriptedModel::new("scorer").reply(
            r#"Sure! [
                {"name": "Ada Park (CTO)", "score": 92, "reasoning": "Owns tech budget"},
                {"name": "bo lee", "score": 64.6, "reasoning": "Mid-level"},
                {"name": "Somebody Else", "score": 99, "reasoning": "Not in list"}
            ]"#,
        ));
        let scorer = LlmEmployeeScorer::new(llm.clone(), SCORE_EMPLOYEES_TEMPLATE.to_string());
        let employees = vec![
            employee("1", "Bo Lee", "Manager"),
            employee("2", "Ada Park", "CTO"),
            employee("3", "Cy Diaz", "Intern"),
        ];

        let outcome = scorer.score("Acme", &employees, "Acme builds rockets").await;

        assert_eq!(outcome.backend, ScoringBackend::Llm);
        assert_eq!(outcome.scores.len(), 2);
        assert_eq!(outcome.scores[0].id, "2");
        assert_eq!(outcome.scores[0].score, 92);
        assert_eq!(outcome.scores[1].id, "1");
        assert_eq!(outcome.scores[1].score, 65);
        assert_eq!(llm.call_count(), 1);

        let calls = llm.calls();
        let prompt = &calls[0].last().unwrap().content;
        assert!(prompt.contains("Acme builds rockets"));
        assert!(prompt.contains("Cy Diaz"));
    }

    #[tokio::test]
    async fn test_llm_scores_are_clamped() {
        let llm = Arc::new(
            ScriptedModel::new("scorer").reply(r#"[{"name": "Ada Park", "score": 140}]"#),
        );
        let scorer = LlmEmployeeScorer::new(llm, SCORE_EMPLOYEES_TEMPLATE.to_string());
        let outcome = scorer
            .score("Acme", &[employee("1", "Ada Park", "CTO")], "")
            .await;
        assert_eq!(outcome.scores[0].score, 100);
    }

    #[tokio::test]
    async fn test_unparsable_reply_falls_back_to_keywords() {
        let llm = Arc::new(ScriptedModel::new("scorer").reply("I cannot help with that."));
        let scorer = LlmEmployeeScorer::new(llm, SCORE_EMPLOYEES_TEMPLATE.to_string());
        let employees = vec![employee("1", "Ada Park", "CTO"), employee("2", "Bo Lee", "Intern")];

        let outcome = scorer.score("Acme", &employees, "").await;

        assert_eq!(outcome.backend, ScoringBackend::Keyword);
        assert_eq!(outcome.scores.len(), 2);
        assert_eq!(outcome.scores[0].score, 95);
        assert!(outcome.scores[0].reasoning.starts_with("Keyword fallback"));
    }

    #[tokio::test]
    async fn test_provider_error_falls_back_to_keywords() {
        let llm = Arc::new(ScriptedModel::new("scorer").fail("unavailable"));
        let scorer = LlmEmployeeScorer::new(llm, SCORE_EMPLOYEES_TEMPLATE.to_string());
        let outcome = scorer
            .score("Acme", &[employee("1", "Ada Park", "Head of Data")], "")
            .await;
        assert_eq!(outcome.backend, ScoringBackend::Keyword);
        assert_eq!(outcome.scores[0].score, 80);
    }
}
