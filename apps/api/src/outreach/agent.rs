//! Agent strategy: a supervisor model drives the outreach steps as tools.
//!
//! Each turn the agent answers with one JSON action, either
//! `{"tool": "<name>", "input": {...}}` or `{"final": [...]}`. Tool results are
//! fed back as the next user message. Whatever the agent returns, the final
//! answer is reconciled against the batch so delivery still sees exactly one
//! result per employee in input order.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::llm_client::{parse_json_array, parse_json_object, truncate_chars, ChatMessage, ChatModel};
use crate::models::{CompanyBatch, EmployeeProfile, EmployeeScore, MessageVariant, OutreachResult};
use crate::models::outreach::SELECTION_THRESHOLD;
use crate::outreach::messages::format_variants;
use crate::outreach::pipeline::{failed_results, OutreachStrategy};
use crate::outreach::prompts::render;
use crate::outreach::selection::select_targets;
use crate::outreach::steps::OutreachSteps;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AgentAction {
    Final {
        #[serde(rename = "final")]
        results: Vec<Value>,
    },
    Tool {
        tool: String,
        #[serde(default)]
        input: Value,
    },
}

/// Tool outputs kept across turns. Research and variants are reused when the
/// agent omits them; scores gate the final selection.
#[derive(Default)]
struct AgentMemory {
    research: Option<String>,
    variants: HashMap<String, String>,
    scores: Option<Vec<EmployeeScore>>,
}

pub struct AgentStrategy {
    steps: Arc<OutreachSteps>,
    agent: Arc<dyn ChatModel>,
    top_n: usize,
    max_steps: usize,
    show_tool_calls: bool,
}

impl AgentStrategy {
    pub fn new(
        steps: Arc<OutreachSteps>,
        agent: Arc<dyn ChatModel>,
        top_n: usize,
        max_steps: usize,
        show_tool_calls: bool,
    ) -> Self {
        Self {
            steps,
            agent,
            top_n,
            max_steps,
            show_tool_calls,
        }
    }

    fn task_prompt(&self, batch: &CompanyBatch) -> Result<String, String> {
        let employees_json = serde_json::to_string_pretty(&batch.employees)
            .map_err(|e| format!("Could not serialize employees: {e}"))?;
        let count = batch.employees.len().to_string();
        let top_n = self.top_n.to_string();
        let threshold = SELECTION_THRESHOLD.to_string();
        Ok(render(
            &self.steps.prompts().tools.batch_agent_task,
            &[
                ("company", batch.company_name.as_str()),
                ("employees_json", employees_json.as_str()),
                ("employee_count", count.as_str()),
                ("top_n", top_n.as_str()),
                ("threshold", threshold.as_str()),
            ],
        ))
    }

    async fn run_agent(&self, batch: &CompanyBatch) -> Result<Vec<OutreachResult>, String> {
        let mut messages = vec![
            ChatMessage::system(self.steps.prompts().supervisor.system.clone()),
            ChatMessage::user(self.task_prompt(batch)?),
        ];
        let mut memory = AgentMemory::default();

        for step in 1..=self.max_steps {
            let reply = self
                .agent
                .chat(&messages)
                .await
                .map_err(|e| format!("Agent error: {e}"))?;

            match parse_action(&reply)? {
                AgentAction::Final { results } => {
                    info!("Agent finished after {step} step(s)");
                    return Ok(reconcile(batch, &results, self.top_n, memory.scores.as_deref()));
                }
                AgentAction::Tool { tool, input } => {
                    if self.show_tool_calls {
                        info!(
                            "Tool call {step}: {tool} {}",
                            truncate_chars(&input.to_string(), 300)
                        );
                    }
                    let observation = match self.call_tool(batch, &mut memory, &tool, &input).await {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("Tool {tool} failed: {e}");
                            format!("ERROR: {e}")
                        }
                    };
                    if self.show_tool_calls {
                        info!("Tool result: {}", truncate_chars(&observation, 300));
                    }
                    messages.push(ChatMessage::assistant(reply));
                    messages.push(ChatMessage::user(format!(
                        "TOOL RESULT ({tool}):\n{observation}"
                    )));
                }
            }
        }

        Err(format!(
            "Agent did not finish within {} steps",
            self.max_steps
        ))
    }

    async fn call_tool(
        &self,
        batch: &CompanyBatch,
        memory: &mut AgentMemory,
        tool: &str,
        input: &Value,
    ) -> Result<String, String> {
        match tool {
            "research_company" => {
                let company = str_field(input, "company").unwrap_or(batch.company_name.as_str());
                let research = self
                    .steps
                    .research(company, str_field(input, "title"), str_field(input, "context"))
                    .await
                    .map_err(|e| e.to_string())?;
                memory.research = Some(research.clone());
                Ok(research)
            }
            "score_employees" => {
                let research = research_input(input, memory);
                let outcome = self
                    .steps
                    .score(&batch.company_name, &batch.employees, &research)
                    .await;
                let reply = json!({
                    "backend": outcome.backend,
                    "threshold": SELECTION_THRESHOLD,
                    "top_n": self.top_n,
                    "scores": outcome.scores,
                })
                .to_string();
                memory.scores = Some(outcome.scores);
                Ok(reply)
            }
            "generate_message_variants" => {
                let employee = find_employee(batch, input)?;
                let research = research_input(input, memory);
                let variants = self
                    .steps
                    .generate_variants(&employee.profile_text(), &research)
                    .await
                    .map_err(|e| e.to_string())?;
                memory
                    .variants
                    .insert(employee.id.clone(), format_variants(&variants));
                serde_json::to_string(&json!({ "variants": variants })).map_err(|e| e.to_string())
            }
            "select_best_message" => {
                let employee = find_employee(batch, input)?;
                let research = research_input(input, memory);
                let variants = variants_input(input)
                    .or_else(|| memory.variants.get(&employee.id).cloned())
                    .ok_or_else(|| {
                        format!("No variants for employee {}; generate them first", employee.id)
                    })?;
                let selected = self
                    .steps
                    .select_message(&variants, &employee.profile_text(), &research)
                    .await
                    .map_err(|e| e.to_string())?;
                serde_json::to_string(&selected).map_err(|e| e.to_string())
            }
            other => Err(format!(
                "Unknown tool: {other}. Use research_company, score_employees, generate_message_variants or select_best_message"
            )),
        }
    }
}

#[async_trait]
impl OutreachStrategy for AgentStrategy {
    fn name(&self) -> &'static str {
        "agent"
    }

    async fn build_results(&self, batch: &CompanyBatch) -> Vec<OutreachResult> {
        match self.run_agent(batch).await {
            Ok(results) => results,
            Err(e) => {
                warn!("Agent run failed for {}: {e}", batch.company_name);
                failed_results(batch, &e)
            }
        }
    }
}

/// An action object, or a bare results array taken as the final answer.
fn parse_action(reply: &str) -> Result<AgentAction, String> {
    parse_json_object::<AgentAction>(reply)
        .or_else(|object_err| {
            parse_json_array::<Value>(reply)
                .map(|results| AgentAction::Final { results })
                .map_err(|_| object_err)
        })
        .map_err(|e| {
            format!(
                "Agent returned unparsable output: {e}: {}",
                truncate_chars(reply, 200)
            )
        })
}

/// Exactly one result per employee, in input order.
///
/// Entries are matched by id; the first entry per id wins, unknown ids are
/// dropped and employees without an entry get an error result. Name and title
/// always come from the input record. A selection stands only if the recorded
/// tool scores rank that employee among the `top_n` highest at or above the
/// threshold, the same rule the scripted strategy applies.
fn reconcile(
    batch: &CompanyBatch,
    entries: &[Value],
    top_n: usize,
    scores: Option<&[EmployeeScore]>,
) -> Vec<OutreachResult> {
    let known: HashSet<&str> = batch.employees.iter().map(|e| e.id.as_str()).collect();
    let mut by_id: HashMap<String, &Value> = HashMap::new();
    for entry in entries {
        match entry_id(entry) {
            Some(id) if known.contains(id.as_str()) => {
                by_id.entry(id).or_insert(entry);
            }
            Some(id) => warn!("Agent returned a result for unknown employee {id}"),
            None => warn!("Agent returned a result without an id"),
        }
    }

    let eligible = scores.map(|s| select_targets(s, top_n));
    batch
        .employees
        .iter()
        .enumerate()
        .map(|(index, employee)| {
            let Some(entry) = by_id.get(&employee.id) else {
                return OutreachResult::failed(employee, "Agent returned no result for this employee");
            };

            let mut result = OutreachResult::unselected(
                employee,
                str_field(entry, "selection_reasoning").unwrap_or_default().to_string(),
            );
            result.error = str_field(entry, "error").unwrap_or_default().to_string();

            let wants_selection = entry.get("selected").and_then(Value::as_bool).unwrap_or(false);
            if !wants_selection {
                return result;
            }

            let score = eligible
                .as_ref()
                .and_then(|e| e.score_for(index))
                .map(|s| s.score);
            let rejection = match score {
                None => Some("Not selected: no score was recorded for this employee.".to_string()),
                Some(s) if s < SELECTION_THRESHOLD => Some(format!(
                    "Not selected: score {s} is below the {SELECTION_THRESHOLD}/100 threshold."
                )),
                Some(_) if !eligible.as_ref().is_some_and(|e| e.is_selected(index)) => Some(
                    format!("Not selected: outside the top {top_n} for this company."),
                ),
                Some(_) => None,
            };

            if let Some(rejection) = rejection {
                result.selection_reasoning = format!("{} {rejection}", result.selection_reasoning)
                    .trim_start()
                    .to_string();
            } else {
                result.selected = true;
                result.message = str_field(entry, "message").unwrap_or_default().to_string();
                result.message_score = entry
                    .get("message_score")
                    .and_then(Value::as_f64)
                    .map(|s| s.round().clamp(0.0, 10.0) as u8)
                    .unwrap_or(0);
            }
            result
        })
        .collect()
}

fn entry_id(entry: &Value) -> Option<String> {
    entry.get("id").or_else(|| entry.get("vmid")).and_then(id_text)
}

fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn research_input(input: &Value, memory: &AgentMemory) -> String {
    str_field(input, "research")
        .map(str::to_string)
        .or_else(|| memory.research.clone())
        .unwrap_or_default()
}

/// Variants may arrive as the formatted text block or as the raw variant list.
fn variants_input(input: &Value) -> Option<String> {
    match input.get("variants")? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let variants: Vec<MessageVariant> = items
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect();
            (!variants.is_empty()).then(|| format_variants(&variants))
        }
        _ => None,
    }
}

fn find_employee<'a>(batch: &'a CompanyBatch, input: &Value) -> Result<&'a EmployeeProfile, String> {
    let id = input
        .get("employee_id")
        .or_else(|| input.get("id"))
        .and_then(id_text)
        .ok_or_else(|| "Missing employee_id".to_string())?;
    batch
        .employees
        .iter()
        .find(|e| e.id == id)
        .ok_or_else(|| format!("Unknown employee_id: {id}"))
}
