use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::errors::AppError;
use crate::models::{CompanyBatch, EmployeeProfile};
use crate::state::AppState;

const CALLBACK_HEADERS: [&str; 2] = ["X-Webhook-URL", "Webhook-URL"];
const CALLBACK_FIELDS: [&str; 2] = ["webhook_url", "callback_url"];

#[derive(Debug, Serialize)]
pub struct QueuedResponse {
    pub status: &'static str,
    pub company: String,
    pub employees: usize,
    pub queue_position: usize,
    pub message: String,
}

/// POST /process
///
/// The body is read as JSON whatever the declared content type. Returns 202 as
/// soon as the batch is queued; results arrive later at the callback URL.
pub async fn handle_process(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<QueuedResponse>), AppError> {
    let data: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::Validation(format!("No JSON data received: {e}")))?;

    let callback_url = callback_url(&headers, &data).ok_or_else(|| {
        AppError::Validation(
            "X-Webhook-URL header (or webhook_url body field) is required".to_string(),
        )
    })?;

    let records = data
        .get("records")
        .and_then(Value::as_array)
        .filter(|r| !r.is_empty())
        .ok_or_else(|| AppError::Validation("No records provided".to_string()))?;

    let employees = records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            serde_json::from_value::<EmployeeProfile>(record.clone())
                .map_err(|e| AppError::Validation(format!("Invalid record at index {i}: {e}")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let company = company_name(&data, &employees);
    let count = employees.len();
    let batch = CompanyBatch::new(company.clone(), employees, callback_url);
    let batch_id = batch.batch_id;

    let queue_position = state
        .queue
        .enqueue(batch)
        .map_err(|e| AppError::Internal(e.into()))?;

    info!("Added {company} to queue ({count} employees, position: {queue_position}, batch {batch_id})");

    Ok((
        StatusCode::ACCEPTED,
        Json(QueuedResponse {
            status: "queued",
            message: format!(
                "Processing {count} employees from {company}. Results will be sent to webhook."
            ),
            company,
            employees: count,
            queue_position,
        }),
    ))
}

/// Header first, then body field.
fn callback_url(headers: &HeaderMap, data: &Value) -> Option<String> {
    let from_header = CALLBACK_HEADERS
        .iter()
        .filter_map(|name| headers.get(*name))
        .filter_map(|value| value.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty());

    let from_body = || {
        CALLBACK_FIELDS
            .iter()
            .filter_map(|field| data.get(*field).and_then(Value::as_str))
            .map(str::trim)
            .find(|value| !value.is_empty())
    };

    from_header.or_else(from_body).map(str::to_string)
}

fn company_name(data: &Value, employees: &[EmployeeProfile]) -> String {
    data.get("company")
        .and_then(Value::as_str)
        .or_else(|| employees.first().and_then(|e| e.company_name.as_deref()))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown")
        .to_string()
}
