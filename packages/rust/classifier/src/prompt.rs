//! Classification prompt.

use std::sync::LazyLock;

use joblens_shared::{NOT_APPLICABLE, SPECIAL_PHRASES, STACK_VOCABULARY};

static SYSTEM_PROMPT: LazyLock<String> = LazyLock::new(|| {
    let stacks = quoted(STACK_VOCABULARY);
    let phrases = quoted(SPECIAL_PHRASES);
    let na = NOT_APPLICABLE;

    format!(
        r#"You classify software job postings. Read the job title and the posting text and reply with a single JSON object and nothing else, using exactly these keys:

{{
  "remote": one of "Remote", "Hybrid", "On-site", "{na}",
  "bestStack": the single best-fitting stack from the stack list, or "{na}",
  "allPossibleStacks": array of every fitting stack from the stack list (may be empty),
  "hasSpecialPhrase": true or false,
  "matchedSpecialPhrases": array of the special phrases, or close variants, that appear in the posting,
  "industry": one of "finance", "healthcare", "{na}",
  "annualSalary": one of "30K <", "60K <", "100K <", "160K <", "200K <", "{na}" (the highest threshold the stated yearly salary exceeds, in USD),
  "level": one of "Middle", "Senior", "Staff", "Principal", "Lead", "Architect", "{na}"
}}

Stack list: {stacks}.
Special phrases (security clearance, governance and compliance requirements): {phrases}.

Rules:
- Use only the listed values. Do not invent new labels.
- If the posting does not state something, or you are not sure, emit "{na}" rather than guess.
- "hasSpecialPhrase" is true only when "matchedSpecialPhrases" is not empty.
- Do not wrap the JSON in code fences or add commentary."#
    )
});

/// Fixed system instruction: reply schema, closed vocabularies, and the
/// "N/A rather than guess" rule.
pub fn system_prompt() -> &'static str {
    &SYSTEM_PROMPT
}

/// User message for one posting. `text` is expected to be truncated already.
pub fn user_message(title: &str, text: &str) -> String {
    let title = if title.trim().is_empty() {
        NOT_APPLICABLE
    } else {
        title.trim()
    };
    let text = if text.trim().is_empty() {
        "(the posting page could not be loaded)"
    } else {
        text
    };
    format!("Job title: {title}\n\nPosting text:\n{text}")
}

fn quoted(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_lists_vocabularies() {
        let prompt = system_prompt();
        assert!(prompt.contains("\"Machine Learning\""));
        assert!(prompt.contains("\"TS/SCI\""));
        assert!(prompt.contains("emit \"N/A\" rather than guess"));
        assert!(prompt.contains("\"annualSalary\""));
    }

    #[test]
    fn user_message_carries_title_and_text() {
        let msg = user_message("Backend Engineer", "Remote, Rust");
        assert_eq!(msg, "Job title: Backend Engineer\n\nPosting text:\nRemote, Rust");
    }

    #[test]
    fn empty_text_is_flagged() {
        let msg = user_message("", "  ");
        assert!(msg.starts_with("Job title: N/A"));
        assert!(msg.contains("could not be loaded"));
    }
}
