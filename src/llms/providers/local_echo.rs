//! Terminal backend of the fallback chain. Never fails.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::llms::GenerationBackend;
use crate::utilities::string_utils::truncate_chars;

pub const LOCAL_ECHO_NAME: &str = "local_echo";

/// Reflects a truncated copy of the writer's own words back with an open
/// question.
#[derive(Debug, Clone)]
pub struct LocalEchoBackend {
    max_chars: usize,
}

impl Default for LocalEchoBackend {
    fn default() -> Self {
        Self::new(140)
    }
}

impl LocalEchoBackend {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars: max_chars.max(1) }
    }

    pub fn reflect(&self, source: &str) -> String {
        let quoted = truncate_chars(&source.replace('"', "'"), self.max_chars);
        if quoted.is_empty() {
            return "I'm here with what you wrote. What stands out to you as you read it back?"
                .to_string();
        }
        format!(
            "You wrote: \"{}\". What do you notice as you read that back?",
            quoted
        )
    }
}

#[async_trait]
impl GenerationBackend for LocalEchoBackend {
    fn name(&self) -> &str {
        LOCAL_ECHO_NAME
    }

    async fn generate(&self, prompt: &str, _system: &str) -> Result<String, ProviderError> {
        Ok(self.reflect(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reflect_truncates() {
        let echo = LocalEchoBackend::new(10);
        let out = echo.reflect("I keep going back and forth about the move");
        assert!(out.starts_with("You wrote: \"I keep goi…\""));
        assert!(out.ends_with('?'));
    }

    #[test]
    fn test_reflect_empty_source() {
        assert!(LocalEchoBackend::default().reflect("   ").ends_with('?'));
    }

    #[tokio::test]
    async fn test_generate_never_fails() {
        let echo = LocalEchoBackend::default();
        assert!(echo.generate("anything", "").await.is_ok());
    }
}
