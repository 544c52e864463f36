use serde_json::Value;

/// Read a field under both wire spellings (`data` and `Data`).
///
/// The backend capitalizes field names inconsistently between event
/// categories, so every classifier goes through this lookup.
pub(crate) fn get<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let obj = value.as_object()?;
    if let Some(found) = obj.get(key) {
        return Some(found);
    }
    let mut capitalized = String::with_capacity(key.len());
    let mut chars = key.chars();
    if let Some(first) = chars.next() {
        capitalized.extend(first.to_uppercase());
        capitalized.push_str(chars.as_str());
    }
    obj.get(&capitalized)
}

/// Generic display coercion for payload fields: strings pass through,
/// structured values are pretty-printed, null and absent become empty.
pub(crate) fn stringify(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other @ (Value::Object(_) | Value::Array(_))) => {
            serde_json::to_string_pretty(other).unwrap_or_default()
        }
        Some(other) => other.to_string(),
    }
}
