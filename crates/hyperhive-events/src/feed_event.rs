use serde::Serialize;
use serde_json::Value;

use crate::fields;

/// Field names whose array values hold batched event objects. The walk in
/// [`expand_batches`] only ever descends into these.
const BATCH_KEYS: [&str; 4] = ["events", "messages", "items", "packages"];

/// How many object levels [`expand_batches`] descends before giving up.
/// Bounds recursion on adversarial payloads.
const MAX_BATCH_DEPTH: usize = 4;

/// Numeric event categories consumed by the lower-level feed hook.
///
/// The wire carries these as a number, a string holding a number, or a
/// case-insensitive name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    DownloadIso,
    MigrateVm,
    BackupVm,
    ContainerLogs,
    Logs,
    DockerCompose,
}

impl EventKind {
    /// Wire code for this kind.
    pub fn code(self) -> u64 {
        match self {
            Self::DownloadIso => 0,
            Self::MigrateVm => 1,
            Self::BackupVm => 2,
            Self::ContainerLogs => 3,
            Self::Logs => 4,
            Self::DockerCompose => 5,
        }
    }

    fn from_code(code: u64) -> Option<Self> {
        match code {
            0 => Some(Self::DownloadIso),
            1 => Some(Self::MigrateVm),
            2 => Some(Self::BackupVm),
            3 => Some(Self::ContainerLogs),
            4 => Some(Self::Logs),
            5 => Some(Self::DockerCompose),
            _ => None,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "downloadiso" => Some(Self::DownloadIso),
            "migratevm" => Some(Self::MigrateVm),
            "backupvm" => Some(Self::BackupVm),
            "containerlogs" => Some(Self::ContainerLogs),
            "logs" => Some(Self::Logs),
            "dockercompose" => Some(Self::DockerCompose),
            _ => None,
        }
    }

    /// Resolve a raw `type` field to a known kind, accepting any of the three
    /// wire representations.
    pub fn resolve(value: &Value) -> Option<Self> {
        match value {
            Value::Number(number) => number.as_u64().and_then(Self::from_code),
            Value::String(text) => {
                let text = text.trim();
                match text.parse::<u64>() {
                    Ok(code) => Self::from_code(code),
                    Err(_) => Self::from_name(&text.to_lowercase()),
                }
            }
            _ => None,
        }
    }
}

/// One normalized low-level feed event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub kind: EventKind,
    pub data: String,
    pub extra: Option<String>,
}

/// Classify one decoded message as a low-level feed event. Messages whose
/// `type` does not resolve to a known kind yield `None`.
pub fn classify(message: &Value) -> Option<FeedEvent> {
    let kind = EventKind::resolve(fields::get(message, "type")?)?;
    let data = fields::stringify(fields::get(message, "data"));
    let extra = fields::get(message, "extra")
        .filter(|value| !value.is_null())
        .map(|value| fields::stringify(Some(value)));
    Some(FeedEvent { kind, data, extra })
}

/// Expand a message that wraps batched events into its individual candidates.
///
/// Walks nested objects to [`MAX_BATCH_DEPTH`], collecting the elements of
/// every array stored under one of [`BATCH_KEYS`] (matched case-insensitively)
/// in textual appearance order. A message with no such arrays is its own sole
/// candidate.
pub fn expand_batches(message: &Value) -> Vec<&Value> {
    let mut found = Vec::new();
    collect_batches(message, 0, &mut found);
    if found.is_empty() {
        vec![message]
    } else {
        found
    }
}

fn collect_batches<'a>(value: &'a Value, depth: usize, out: &mut Vec<&'a Value>) {
    if depth >= MAX_BATCH_DEPTH {
        return;
    }
    let Some(object) = value.as_object() else {
        return;
    };
    for (key, field) in object {
        let is_batch_key = BATCH_KEYS
            .iter()
            .any(|known| known.eq_ignore_ascii_case(key));
        match field {
            Value::Array(items) if is_batch_key => out.extend(items.iter()),
            Value::Object(_) => collect_batches(field, depth + 1, out),
            _ => {}
        }
    }
}

/// Classify every event contained in one decoded message, expanding batch
/// wrappers first. Candidates that resolve to no known kind are discarded.
pub fn classify_all(message: &Value) -> Vec<FeedEvent> {
    expand_batches(message)
        .into_iter()
        .filter_map(classify)
        .collect()
}
