//! Model reply decoding.
//!
//! The reply is untrusted: every field is checked against its closed
//! vocabulary and anything missing or unknown becomes the `N/A` default.
//! Only a reply without any JSON object counts as a failed call.

use joblens_shared::{Classification, Industry, Level, RemoteMode, SalaryBand, canonical_stack};
use serde_json::{Map, Value};

/// Decode a raw model reply into a validated [`Classification`].
pub fn decode_reply(raw: &str) -> Result<Classification, String> {
    let body = json_body(raw).ok_or_else(|| "reply contains no JSON object".to_string())?;
    let value: Value =
        serde_json::from_str(body).map_err(|e| format!("reply is not valid JSON: {e}"))?;
    let Value::Object(record) = value else {
        return Err("reply is not a JSON object".into());
    };
    Ok(coerce(&record))
}

/// Per-field validation. Keys are accepted in camelCase or snake_case.
pub fn coerce(record: &Map<String, Value>) -> Classification {
    let text = |camel: &str, snake: &str| -> String {
        field(record, camel, snake)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let mut all_possible_stacks: Vec<&'static str> = Vec::new();
    for stack in strings(field(record, "allPossibleStacks", "all_possible_stacks")) {
        if let Some(canonical) = canonical_stack(&stack) {
            if !all_possible_stacks.contains(&canonical) {
                all_possible_stacks.push(canonical);
            }
        }
    }

    let mut matched_special_phrases: Vec<String> = Vec::new();
    for phrase in strings(field(record, "matchedSpecialPhrases", "matched_special_phrases")) {
        let phrase = phrase.trim();
        if !phrase.is_empty() && !matched_special_phrases.iter().any(|p| p == phrase) {
            matched_special_phrases.push(phrase.to_string());
        }
    }

    Classification {
        remote: RemoteMode::from_label(&text("remote", "remote")),
        best_stack: canonical_stack(&text("bestStack", "best_stack")),
        all_possible_stacks,
        has_special_phrase: truthy(field(record, "hasSpecialPhrase", "has_special_phrase")),
        matched_special_phrases,
        industry: Industry::from_label(&text("industry", "industry")),
        annual_salary: SalaryBand::from_label(&text("annualSalary", "annual_salary")),
        level: Level::from_label(&text("level", "level")),
    }
}

/// Strip code fences, falling back to the outermost `{ ... }` span.
fn json_body(raw: &str) -> Option<&str> {
    let trimmed = raw.trim();
    let unfenced = trimmed
        .strip_prefix("```")
        .map(|rest| {
            let rest = rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric());
            rest.strip_suffix("```").unwrap_or(rest).trim()
        })
        .unwrap_or(trimmed);

    if unfenced.starts_with('{') && unfenced.ends_with('}') {
        return Some(unfenced);
    }

    let start = unfenced.find('{')?;
    let end = unfenced.rfind('}')?;
    (start < end).then(|| &unfenced[start..=end])
}

fn field<'a>(record: &'a Map<String, Value>, camel: &str, snake: &str) -> Option<&'a Value> {
    record.get(camel).or_else(|| record.get(snake))
}

/// A list of strings, or a single delimited string.
fn strings(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        Some(Value::String(s)) => s.split([',', ';']).map(str::to_string).collect(),
        _ => Vec::new(),
    }
}

fn truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes"),
        _ => false,
    }
}
