use serde::{Deserialize, Deserializer, Serialize};

use crate::models::employee::EmployeeProfile;

/// Minimum score an employee needs to be eligible for outreach.
pub const SELECTION_THRESHOLD: u8 = 70;

/// Fit score for one employee within one batch run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployeeScore {
    /// Position of the employee in its batch. Ids are caller-supplied and may repeat.
    #[serde(skip)]
    pub index: usize,
    pub id: String,
    pub full_name: String,
    pub title: String,
    /// 0 to 100 inclusive.
    pub score: u8,
    pub reasoning: String,
}

/// One candidate message. `probability` is the model's own estimate and is not verified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageVariant {
    pub message: String,
    #[serde(default)]
    pub probability: f64,
    #[serde(default)]
    pub profile_details_used: Vec<String>,
    #[serde(default)]
    pub research_insights_used: Vec<String>,
    #[serde(default)]
    pub hook_type: String,
}

/// The judge's pick among the variants of one employee.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedMessage {
    pub message: String,
    /// 1 to 10 inclusive; checked after parsing.
    pub score: u8,
    #[serde(default)]
    pub reason: String,
    #[serde(default, deserialize_with = "text_or_list")]
    pub rejected_reasons: String,
}

/// Per-employee record posted to the callback URL. Always produced, even on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutreachResult {
    #[serde(alias = "vmid")]
    pub id: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
    pub title: String,
    pub selected: bool,
    #[serde(default)]
    pub selection_reasoning: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub message_score: u8,
    #[serde(default)]
    pub error: String,
}

impl OutreachResult {
    /// An unselected result with no message.
    pub fn unselected(profile: &EmployeeProfile, selection_reasoning: String) -> Self {
        Self {
            id: profile.id.clone(),
            full_name: profile.full_name.clone(),
            title: profile.title.clone(),
            selected: false,
            selection_reasoning,
            message: String::new(),
            message_score: 0,
            error: String::new(),
        }
    }

    /// An error-flagged result; never selected.
    pub fn failed(profile: &EmployeeProfile, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::unselected(profile, String::new())
        }
    }
}

/// Models sometimes answer a prose field with a list of sentences.
fn text_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrList {
        Text(String),
        List(Vec<String>),
    }

    Ok(match TextOrList::deserialize(deserializer)? {
        TextOrList::Text(s) => s,
        TextOrList::List(items) => items.join("; "),
    })
}
