//! Content policy linting for generated mirrorbacks.
//!
//! A draft fails when it gives advice, prescribes steps, resolves a tension
//! for the writer, judges, or asks nothing. Failing drafts are first sent
//! back to a remote backend for a strict rewrite (bounded), and otherwise
//! repaired locally with deterministic text transforms.

pub mod rules;

use serde::{Deserialize, Serialize};

use crate::config::MirrorConfig;
use crate::llms::ProviderChain;
use crate::utilities::prompts::render;

pub use rules::{GuardrailRule, ViolationSeverity, CLOSING_QUESTION, DEFAULT_RULES};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardrailViolation {
    pub rule: String,
    /// The offending text as found in the draft.
    pub pattern: String,
    pub reason: String,
    pub severity: ViolationSeverity,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintReport {
    pub passed: bool,
    pub violations: Vec<GuardrailViolation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairMethod {
    StrictRewrite,
    LocalRepair,
}

/// Result of [`GuardrailLinter::enforce`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LintOutcome {
    pub text: String,
    /// Whether `text` passes lint.
    pub passed: bool,
    /// Every violation seen along the way, draft first.
    pub violations: Vec<GuardrailViolation>,
    pub repair: Option<RepairMethod>,
}

#[derive(Debug, Clone)]
pub struct GuardrailLinter {
    rules: Vec<GuardrailRule>,
    max_retries: u32,
    rewrite_system: String,
    rewrite_template: String,
}

impl Default for GuardrailLinter {
    fn default() -> Self {
        Self::from_config(&MirrorConfig::default())
    }
}

impl GuardrailLinter {
    pub fn from_config(config: &MirrorConfig) -> Self {
        Self {
            rules: DEFAULT_RULES.to_vec(),
            // Never more than one strict rewrite per draft.
            max_retries: config.lint_max_retries.min(1),
            rewrite_system: config.prompts.rewrite_system.clone(),
            rewrite_template: config.prompts.rewrite_prompt.clone(),
        }
    }

    pub fn with_rules(mut self, rules: Vec<GuardrailRule>) -> Self {
        self.rules = rules;
        self
    }

    pub fn rules(&self) -> &[GuardrailRule] {
        &self.rules
    }

    pub fn lint(&self, text: &str) -> LintReport {
        let violations: Vec<GuardrailViolation> = self
            .rules
            .iter()
            .flat_map(|rule| {
                (rule.detect)(text).into_iter().map(|pattern| GuardrailViolation {
                    rule: rule.name.to_string(),
                    pattern,
                    reason: rule.reason.to_string(),
                    severity: rule.severity,
                })
            })
            .collect();
        LintReport {
            passed: violations.is_empty(),
            violations,
        }
    }

    /// Apply every failing rule's repair in table order. Text that already
    /// passes is returned unchanged.
    pub fn repair_locally(&self, text: &str) -> String {
        if self.lint(text).passed {
            return text.to_string();
        }
        let mut repaired = text.to_string();
        for rule in &self.rules {
            if !(rule.detect)(&repaired).is_empty() {
                repaired = (rule.repair)(&repaired);
            }
        }
        rules::ensure_question(&rules::tidy(&repaired))
    }

    /// Lint a draft and, on failure, escalate: strict rewrite through the
    /// remote backends if any are configured, then local repair.
    pub async fn enforce(&self, draft: &str, chain: &ProviderChain) -> LintOutcome {
        let report = self.lint(draft);
        if report.passed {
            return LintOutcome {
                text: draft.to_string(),
                passed: true,
                violations: Vec::new(),
                repair: None,
            };
        }

        let mut violations = report.violations;
        let mut current = draft.to_string();

        if chain.has_remote() {
            for attempt in 1..=self.max_retries {
                let outstanding = self.lint(&current).violations;
                let prompt = render(
                    &self.rewrite_template,
                    &[
                        ("violations", describe(&outstanding)),
                        ("draft", current.clone()),
                    ],
                );
                match chain.generate_remote(&prompt, &self.rewrite_system).await {
                    Ok((rewritten, served)) => {
                        let check = self.lint(&rewritten);
                        if check.passed {
                            log::debug!("strict rewrite {} by {} passed lint", attempt, served.name);
                            return LintOutcome {
                                text: rewritten,
                                passed: true,
                                violations,
                                repair: Some(RepairMethod::StrictRewrite),
                            };
                        }
                        log::warn!(
                            "strict rewrite {} still has {} violation(s)",
                            attempt,
                            check.violations.len()
                        );
                        violations.extend(check.violations);
                        current = rewritten;
                    }
                    Err(e) => {
                        log::warn!("strict rewrite unavailable: {}", e);
                        break;
                    }
                }
            }
        }

        let repaired = self.repair_locally(&current);
        let passed = self.lint(&repaired).passed;
        if !passed {
            log::warn!("local repair left violations in place");
        }
        LintOutcome {
            text: repaired,
            passed,
            violations,
            repair: Some(RepairMethod::LocalRepair),
        }
    }
}

fn describe(violations: &[GuardrailViolation]) -> String {
    violations
        .iter()
        .map(|v| format!("- {} (\"{}\"): {}", v.rule, v.pattern, v.reason))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;
    use crate::llms::GenerationBackend;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    const PROHIBITED: &[&str] = &["you should", "you need to", "you must", "the answer is"];

    #[derive(Debug, Default)]
    struct Rewriter {
        reply: &'static str,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationBackend for Rewriter {
        fn name(&self) -> &str {
            "rewriter"
        }
        async fn generate(&self, prompt: &str, _: &str) -> Result<String, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            assert!(prompt.contains("advice"));
            Ok(self.reply.to_string())
        }
    }

    #[test]
    fn test_advice_fails_lint() {
        let report = GuardrailLinter::default().lint("You should leave your job.");
        assert!(!report.passed);
        assert!(report.violations.iter().any(|v| v.rule == "advice"));
        assert!(report.violations.iter().any(|v| v.rule == "missing_reflection"));
    }

    #[test]
    fn test_curly_apostrophes_are_caught() {
        let report = GuardrailLinter::default().lint("You\u{2019}re overreacting. What do you notice?");
        assert!(report.violations.iter().any(|v| v.rule == "judgment"));
    }

    #[test]
    fn test_local_repair_removes_advice_and_ends_with_question() {
        let linter = GuardrailLinter::default();
        let repaired = linter.repair_locally("You should leave your job.");
        let lowered = repaired.to_lowercase();
        assert!(PROHIBITED.iter().all(|p| !lowered.contains(p)));
        assert!(repaired.ends_with('?'));
        assert!(linter.lint(&repaired).passed);
    }

    #[test]
    fn test_repair_is_idempotent_on_compliant_text() {
        let linter = GuardrailLinter::default();
        let text = "It sounds like you are holding two things at once. What feels truest right now?";
        let once = linter.repair_locally(text);
        let twice = linter.repair_locally(&once);
        assert_eq!(once, text);
        assert_eq!(twice, text);
    }

    #[tokio::test]
    async fn test_enforce_passes_compliant_text_unchanged() {
        let text = "You keep returning to the same doorway. What is on the other side?";
        let outcome = GuardrailLinter::default().enforce(text, &ProviderChain::default()).await;
        assert_eq!(outcome.text, text);
        assert!(outcome.passed);
        assert!(outcome.repair.is_none());
    }

    #[tokio::test]
    async fn test_enforce_local_repair_without_remote() {
        let outcome = GuardrailLinter::default()
            .enforce("You should leave your job.", &ProviderChain::default())
            .await;
        assert_eq!(outcome.repair, Some(RepairMethod::LocalRepair));
        assert!(outcome.passed);
        assert!(outcome.text.ends_with('?'));
        assert!(!outcome.violations.is_empty());
    }

    #[tokio::test]
    async fn test_enforce_uses_strict_rewrite() {
        let rewriter = Arc::new(Rewriter {
            reply: "Leaving is on your mind. What would staying cost you?",
            ..Rewriter::default()
        });
        let chain = ProviderChain::default().with_backend(rewriter.clone(), Duration::from_secs(1));
        let outcome = GuardrailLinter::default()
            .enforce("You should leave your job.", &chain)
            .await;
        assert_eq!(outcome.repair, Some(RepairMethod::StrictRewrite));
        assert_eq!(outcome.text, "Leaving is on your mind. What would staying cost you?");
        assert_eq!(rewriter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_enforce_bounded_to_one_rewrite() {
        let rewriter = Arc::new(Rewriter {
            reply: "You must quit.",
            ..Rewriter::default()
        });
        let chain = ProviderChain::default().with_backend(rewriter.clone(), Duration::from_secs(1));
        let mut config = MirrorConfig::default();
        config.lint_max_retries = 5;
        let outcome = GuardrailLinter::from_config(&config)
            .enforce("You should leave your job.", &chain)
            .await;
        assert_eq!(rewriter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.repair, Some(RepairMethod::LocalRepair));
        assert!(!outcome.text.to_lowercase().contains("you must"));
        assert!(outcome.text.ends_with('?'));
    }
}
