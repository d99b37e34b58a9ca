use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// One employee record as supplied by the caller. Immutable once received.
///
/// Callers historically send the identifier as `vmid` (sometimes numeric);
/// both spellings and both JSON types are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeProfile {
    #[serde(alias = "vmid", deserialize_with = "string_or_number")]
    pub id: String,
    pub title: String,
    pub full_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linked_in_profile_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

impl EmployeeProfile {
    /// Plain-text profile block used inside prompts.
    pub fn profile_text(&self) -> String {
        let mut lines = vec![
            format!("NAME: {}", self.full_name),
            format!("TITLE: {}", self.title),
        ];
        let optional = [
            ("COMPANY", &self.company_name),
            ("TITLE DESCRIPTION", &self.title_description),
            ("SUMMARY", &self.summary),
            ("LINKEDIN", &self.linked_in_profile_url),
        ];
        for (label, value) in optional {
            if let Some(value) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                lines.push(format!("{label}: {value}"));
            }
        }
        lines.join("\n")
    }
}

/// All employees of one company submitted together, plus where to send results.
/// Consumed exactly once by the work queue.
#[derive(Debug, Clone)]
pub struct CompanyBatch {
    pub batch_id: Uuid,
    pub company_name: String,
    pub employees: Vec<EmployeeProfile>,
    pub callback_url: String,
    pub queued_at: DateTime<Utc>,
}

impl CompanyBatch {
    pub fn new(company_name: String, employees: Vec<EmployeeProfile>, callback_url: String) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            company_name,
            employees,
            callback_url,
            queued_at: Utc::now(),
        }
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Int(n) => n.to_string(),
        Id::Float(n) => n.to_string(),
    })
}
