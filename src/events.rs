//! Lifecycle events pushed by the backend.
//!
//! Events travel as a name plus a loosely shaped JSON payload and are decoded
//! into typed [`BackendEvent`]s here, so nothing past this point sees raw JSON.

use serde_json::{json, Value};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use crate::model::TaskStatus;

pub const TASK_PROGRESS: &str = "task_progress";
pub const TASK_STARTED: &str = "task_started";
pub const TASK_COMPLETE: &str = "task_complete";
pub const TASK_ERROR: &str = "task_error";

pub type EventSender = UnboundedSender<RawEvent>;
pub type EventReceiver = UnboundedReceiver<RawEvent>;

/// An event exactly as emitted by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub name: String,
    pub payload: Value,
}

impl RawEvent {
    pub fn new(name: &str, payload: Value) -> Self {
        Self {
            name: name.to_string(),
            payload,
        }
    }

    pub fn progress(id: &str, percent: &str, speed: &str, eta: &str) -> Self {
        Self::new(
            TASK_PROGRESS,
            json!({
                "id": id,
                "percent": percent,
                "speed": speed,
                "eta": eta,
                "status": "Downloading",
            }),
        )
    }

    pub fn started(id: &str) -> Self {
        Self::new(TASK_STARTED, json!(id))
    }

    pub fn complete(id: &str) -> Self {
        Self::new(TASK_COMPLETE, json!(id))
    }

    pub fn error(id: &str) -> Self {
        Self::new(TASK_ERROR, json!({ "id": id }))
    }
}

/// Progress report for one task. `None` fields were absent or unreadable.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub id: String,
    pub percent: Option<f32>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub status: Option<TaskStatus>,
}

impl ProgressUpdate {
    fn from_payload(payload: &Value) -> Option<Self> {
        let map = payload.as_object()?;
        Some(Self {
            id: map.get("id").and_then(scalar_string)?,
            percent: map.get("percent").and_then(percent_value),
            speed: map.get("speed").and_then(non_empty_str),
            eta: map.get("eta").and_then(non_empty_str),
            status: map
                .get("status")
                .and_then(Value::as_str)
                .and_then(TaskStatus::parse),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    Progress(ProgressUpdate),
    Started(String),
    Complete(String),
    Error(String),
}

impl BackendEvent {
    /// Decodes a raw event. Unknown names and payloads without a usable id yield `None`.
    pub fn decode(raw: &RawEvent) -> Option<Self> {
        match raw.name.as_str() {
            TASK_PROGRESS => ProgressUpdate::from_payload(&raw.payload).map(Self::Progress),
            TASK_STARTED => task_id(&raw.payload).map(Self::Started),
            TASK_COMPLETE => task_id(&raw.payload).map(Self::Complete),
            TASK_ERROR => task_id(&raw.payload).map(Self::Error),
            _ => None,
        }
    }

    pub fn task_id(&self) -> &str {
        match self {
            Self::Progress(update) => &update.id,
            Self::Started(id) | Self::Complete(id) | Self::Error(id) => id,
        }
    }
}

// Ids arrive either bare or wrapped as `{ "id": ... }`.
fn task_id(payload: &Value) -> Option<String> {
    match payload {
        Value::Object(map) => map.get("id").and_then(scalar_string),
        other => scalar_string(other),
    }
}

fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}

fn non_empty_str(value: &Value) -> Option<String> {
    value
        .as_str()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn percent_value(value: &Value) -> Option<f32> {
    let parsed = match value {
        Value::Number(n) => n.as_f64().map(|v| v as f32),
        Value::String(s) => s.trim().trim_end_matches('%').trim().parse::<f32>().ok(),
        _ => None,
    }?;
    parsed.is_finite().then_some(parsed)
}
