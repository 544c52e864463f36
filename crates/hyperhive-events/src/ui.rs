use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use serde_json::Value;

use crate::fields;

/// Shown when an error event arrives with no usable message text.
const UNKNOWN_ERROR: &str = "Unknown error";

/// Default title for notification events without one.
const DEFAULT_NOTIFICATION_TITLE: &str = "Notification";

/// A decoded message classified into one of the UI-facing categories.
///
/// Mirrors the wire discriminator but with every field normalized: consumers
/// never look at raw JSON again after this point.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "category")]
pub enum UiEvent {
    Error(ErrorEvent),
    Notification(NotificationEvent),
    VmProgress(VmProgressEvent),
}

/// Backend-reported operation failure, surfaced to the user as a blocking
/// modal rather than recovered from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEvent {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    pub title: String,
    pub body: String,
}

/// Long-running VM operation the feed reports progress for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VmOp {
    Migrate,
    Backup,
}

impl VmOp {
    /// Human-readable operation label used in progress titles.
    pub fn label(self) -> &'static str {
        match self {
            Self::Migrate => "Migrate VM",
            Self::Backup => "Copy VM",
        }
    }

    fn wire_name(self) -> &'static str {
        match self {
            Self::Migrate => "migratevm",
            Self::Backup => "backupvm",
        }
    }
}

/// One progress update for an in-flight VM operation.
///
/// `key` is stable across every update for the same logical operation, so the
/// aggregator can merge updates in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VmProgressEvent {
    pub op: VmOp,
    pub key: String,
    pub subject: Option<String>,
    pub title: String,
    pub description: String,
}

/// Classify one decoded message into a UI event category.
///
/// Returns `None` for anything without a recognizable string discriminator
/// under `type`/`Type` and for VM-progress messages with empty `data`.
pub fn classify(message: &Value) -> Option<UiEvent> {
    let discriminator = fields::get(message, "type")?.as_str()?.to_lowercase();
    match discriminator.as_str() {
        "error" => Some(UiEvent::Error(classify_error(message))),
        "notification" => Some(UiEvent::Notification(classify_notification(message))),
        "migratevm" => classify_vm_progress(message, VmOp::Migrate).map(UiEvent::VmProgress),
        "backupvm" => classify_vm_progress(message, VmOp::Backup).map(UiEvent::VmProgress),
        _ => None,
    }
}

fn classify_error(message: &Value) -> ErrorEvent {
    let text = match fields::get(message, "data") {
        Some(Value::String(text)) => text.trim().to_string(),
        other => fields::stringify(other),
    };
    let message = if text.is_empty() {
        UNKNOWN_ERROR.to_string()
    } else {
        text
    };
    ErrorEvent { message }
}

fn classify_notification(message: &Value) -> NotificationEvent {
    let title = fields::stringify(fields::get(message, "extra"));
    let title = if title.trim().is_empty() {
        DEFAULT_NOTIFICATION_TITLE.to_string()
    } else {
        title
    };
    let body = fields::stringify(fields::get(message, "data"));
    NotificationEvent { title, body }
}

fn classify_vm_progress(message: &Value, op: VmOp) -> Option<VmProgressEvent> {
    let description = fields::stringify(fields::get(message, "data"));
    if description.trim().is_empty() {
        return None;
    }

    let extra = fields::get(message, "extra")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|text| !text.is_empty());

    // A subject (VM name) is only derived when `extra` splits on exactly one
    // interior hyphen with non-empty halves; any other shape keeps the whole
    // value as the correlation key. VM names that themselves contain hyphens
    // therefore never yield a subject. Kept as-is for wire compatibility.
    let (key, subject) = match extra {
        Some(extra) => {
            let mut halves = extra.splitn(3, '-');
            match (halves.next(), halves.next(), halves.next()) {
                (Some(left), Some(right), None) if !left.is_empty() && !right.is_empty() => {
                    (extra.to_string(), Some(left.to_string()))
                }
                _ => (extra.to_string(), None),
            }
        }
        None => (synthesized_key(op), None),
    };

    let title = match &subject {
        Some(subject) => format!("{subject} — {}", op.label()),
        None => op.label().to_string(),
    };

    Some(VmProgressEvent {
        op,
        key,
        subject,
        title,
        description,
    })
}

/// Fallback identity for progress messages without an `extra` field. The
/// sequence component guarantees two calls never collide even within one
/// millisecond.
fn synthesized_key(op: VmOp) -> String {
    static SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = SEQ.fetch_add(1, Ordering::Relaxed);
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis())
        .unwrap_or_default();
    format!("{}-{millis}-{seq}", op.wire_name())
}
