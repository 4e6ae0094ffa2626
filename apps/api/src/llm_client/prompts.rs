// Shared prompt fragments.
// Each feature that needs LLM calls defines its own prompts.rs alongside it.

/// Appended to every system instruction. Grounded calls in particular tend to wrap
/// their answer in prose or fences unless told not to.
pub const JSON_ONLY_SYSTEM: &str = "\
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON value. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Joins a feature-specific system instruction with the JSON-only fragment.
pub fn with_json_only(system: &str) -> String {
    format!("{}\n\n{}", system.trim_end(), JSON_ONLY_SYSTEM)
}
