use bytes::Bytes;
use serde_json::Value;

/// One payload as delivered by the transport.
///
/// The backend feed is nominally text, but depending on the proxy path a
/// frame can arrive as binary (blob, array buffer, or a typed view over one);
/// those all surface here as contiguous bytes.
#[derive(Debug, Clone)]
pub enum RawFrame {
    Text(String),
    Binary(Bytes),
}

/// Extract every JSON message contained in one transport frame.
///
/// Binary frames are decoded as UTF-8 first; a frame that is not valid UTF-8
/// is dropped. Never panics, never errors — any failure just means fewer
/// messages extracted.
pub fn decode_frame(frame: &RawFrame) -> Vec<Value> {
    match frame {
        RawFrame::Text(text) => decode_text(text),
        RawFrame::Binary(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => decode_text(text),
            Err(error) => {
                tracing::trace!(%error, len = bytes.len(), "dropping non-UTF-8 binary frame");
                Vec::new()
            }
        },
    }
}

/// Extract every JSON object from one text frame.
///
/// The backend sometimes emits several JSON objects back-to-back in a single
/// frame with no delimiter, so parsing proceeds in three stages:
///
/// 1. parse the trimmed text as one JSON value (array elements and a single
///    object are the candidates),
/// 2. repair concatenated objects by inserting a comma at each `}`/`{`
///    boundary and parsing the result as an array,
/// 3. split the text at each `}{` boundary and parse the chunks
///    independently, discarding the ones that fail.
///
/// Non-object candidates are discarded; empty input yields an empty list.
///
/// Known limitation, kept for wire compatibility: stage 2 can corrupt a
/// legitimate frame whose string content contains a literal `}{`.
pub fn decode_text(text: &str) -> Vec<Value> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }

    if let Ok(value) = serde_json::from_str(trimmed) {
        return candidates(value);
    }

    let repaired = format!("[{}]", join_adjacent_objects(trimmed));
    if let Ok(Value::Array(items)) = serde_json::from_str(&repaired) {
        return items.into_iter().filter(Value::is_object).collect();
    }

    let mut out = Vec::new();
    for chunk in split_concatenated(trimmed) {
        match serde_json::from_str(chunk) {
            Ok(value) => out.extend(candidates(value)),
            Err(error) => tracing::trace!(%error, "dropping unparseable chunk"),
        }
    }
    out
}

/// Candidate messages from one parsed JSON value: a single object, or the
/// object elements of a top-level array. Anything else is discarded.
fn candidates(value: Value) -> Vec<Value> {
    match value {
        Value::Object(_) => vec![value],
        Value::Array(items) => items.into_iter().filter(Value::is_object).collect(),
        _ => Vec::new(),
    }
}

/// Insert a `,` after every `}` that is followed (whitespace permitted) by a
/// `{`, so `{..}{..}` becomes `{..},{..}` and parses as array content.
fn join_adjacent_objects(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for (i, ch) in text.char_indices() {
        out.push(ch);
        if ch == '}' && text[i + ch.len_utf8()..].trim_start().starts_with('{') {
            out.push(',');
        }
    }
    out
}

/// Split at each zero-width `}{` boundary, keeping both braces.
fn split_concatenated(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    for (pos, _) in text.match_indices("}{") {
        chunks.push(&text[start..=pos]);
        start = pos + 1;
    }
    chunks.push(&text[start..]);
    chunks
}
