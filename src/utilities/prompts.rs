//! Default prompt templates and rendering.
//!
//! Templates live in [`PromptSettings`] so deployments can override them
//! through configuration; the constants here are only the defaults.
//! Placeholders use `{name}` syntax and are filled by
//! [`interpolate_only`](super::string_utils::interpolate_only).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::string_utils::interpolate_only;

/// System instructions for drafting the mirrorback.
pub const MIRROR_SYSTEM: &str = "You are a reflective mirror, not an advisor. \
Reflect what the writer expressed, name tensions without resolving them, \
never give advice or instructions, never judge, and close with one open question.";

/// User prompt for drafting the mirrorback.
pub const MIRROR_PROMPT: &str = "Reflection:\n{reflection}\n\n\
Response plan:\n{plan}\n\n\
Tone: {tone} (intensity {intensity}, focus {focus}).\n\
Write a short mirrorback of at most four sentences.";

/// System instructions for response planning.
pub const SYNTHESIS_SYSTEM: &str = "You compress analysis into a response plan. \
Answer with a single JSON object and nothing else.";

/// User prompt for response planning.
pub const SYNTHESIS_PROMPT: &str = "Analysis bundle:\n{bundle}\n\n\
Return JSON with keys key_beliefs (array of strings), relevant_tensions (array of strings), \
contradictions (array of strings), question_types (array drawn from clarifying, reflective, \
pattern_naming, paradox, grounding, curiosity) and tone_notes (string).";

/// System instructions for strict guardrail rewrites.
pub const REWRITE_SYSTEM: &str = "You rewrite reflective replies so they follow policy strictly: \
no advice, no prescriptive steps, no resolving tensions for the writer, no judgment. \
Keep the meaning, keep it brief, end with an open question.";

/// User prompt for strict guardrail rewrites.
pub const REWRITE_PROMPT: &str = "The reply below violated these rules:\n{violations}\n\n\
Reply:\n{draft}\n\nReturn only the rewritten reply.";

/// Overridable prompt templates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSettings {
    #[serde(default = "default_mirror_system")]
    pub mirror_system: String,
    #[serde(default = "default_mirror_prompt")]
    pub mirror_prompt: String,
    #[serde(default = "default_synthesis_system")]
    pub synthesis_system: String,
    #[serde(default = "default_synthesis_prompt")]
    pub synthesis_prompt: String,
    #[serde(default = "default_rewrite_system")]
    pub rewrite_system: String,
    #[serde(default = "default_rewrite_prompt")]
    pub rewrite_prompt: String,
}

fn default_mirror_system() -> String { MIRROR_SYSTEM.to_string() }
fn default_mirror_prompt() -> String { MIRROR_PROMPT.to_string() }
fn default_synthesis_system() -> String { SYNTHESIS_SYSTEM.to_string() }
fn default_synthesis_prompt() -> String { SYNTHESIS_PROMPT.to_string() }
fn default_rewrite_system() -> String { REWRITE_SYSTEM.to_string() }
fn default_rewrite_prompt() -> String { REWRITE_PROMPT.to_string() }

impl Default for PromptSettings {
    fn default() -> Self {
        Self {
            mirror_system: default_mirror_system(),
            mirror_prompt: default_mirror_prompt(),
            synthesis_system: default_synthesis_system(),
            synthesis_prompt: default_synthesis_prompt(),
            rewrite_system: default_rewrite_system(),
            rewrite_prompt: default_rewrite_prompt(),
        }
    }
}

/// Fill a template, falling back to appending the raw values when the
/// template references an unknown placeholder.
pub fn render(template: &str, inputs: &[(&str, String)]) -> String {
    let map: HashMap<&str, String> = inputs.iter().cloned().collect();
    match interpolate_only(template, &map) {
        Ok(rendered) => rendered,
        Err(e) => {
            log::warn!("prompt template could not be rendered ({}); using raw inputs", e);
            let mut out = template.to_string();
            for (key, value) in inputs {
                out.push_str(&format!("\n\n{}:\n{}", key, value));
            }
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_default_mirror_prompt() {
        let out = render(
            MIRROR_PROMPT,
            &[
                ("reflection", "I feel stuck".to_string()),
                ("plan", "{}".to_string()),
                ("tone", "soft".to_string()),
                ("intensity", "low".to_string()),
                ("focus", "emotion".to_string()),
            ],
        );
        assert!(out.contains("I feel stuck"));
        assert!(out.contains("Tone: soft"));
        assert!(!out.contains("{reflection}"));
    }

    #[test]
    fn test_render_unknown_placeholder_appends_inputs() {
        let out = render("Hello {who}", &[("name", "x".to_string())]);
        assert!(out.starts_with("Hello {who}"));
        assert!(out.contains("name:\nx"));
    }
}
