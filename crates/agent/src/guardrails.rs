#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailIntent {
    Question { question: String },
    ExecutiveSummary,
    SnippetExecution { language: Option<String>, code: String },
}

impl GuardrailIntent {
    pub fn action_key(&self) -> &'static str {
        match self {
            Self::Question { .. } => "agent.question",
            Self::ExecutiveSummary => "agent.executive_summary",
            Self::SnippetExecution { .. } => "agent.snippet_execution",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String, fallback_path: &'static str },
    Degrade { reason_code: &'static str, user_message: String, fallback_path: &'static str },
}

impl GuardrailDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allow)
    }

    pub fn user_message(&self) -> Option<&str> {
        match self {
            Self::Allow => None,
            Self::Deny { user_message, .. } | Self::Degrade { user_message, .. } => {
                Some(user_message)
            }
        }
    }

    pub fn reason_code(&self) -> Option<&'static str> {
        match self {
            Self::Allow => None,
            Self::Deny { reason_code, .. } | Self::Degrade { reason_code, .. } => {
                Some(reason_code)
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    /// Model-generated code is never run in-process; with this set the
    /// denial names the missing sandbox instead.
    pub snippet_execution_enabled: bool,
    pub max_question_chars: usize,
    pub require_loaded_data: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { snippet_execution_enabled: false, max_question_chars: 2000, require_loaded_data: true }
    }
}

impl GuardrailPolicy {
    pub fn evaluate(&self, intent: &GuardrailIntent, data_loaded: bool) -> GuardrailDecision {
        match intent {
            GuardrailIntent::Question { question } if question.trim().is_empty() => {
                GuardrailDecision::Deny {
                    reason_code: "empty_question",
                    user_message: "Please type a question about your deals or work orders."
                        .to_string(),
                    fallback_path: "request_question",
                }
            }
            GuardrailIntent::Question { question }
                if question.chars().count() > self.max_question_chars =>
            {
                GuardrailDecision::Deny {
                    reason_code: "question_too_long",
                    user_message: format!(
                        "That question is too long. Please keep it under {} characters.",
                        self.max_question_chars
                    ),
                    fallback_path: "request_shorter_question",
                }
            }
            GuardrailIntent::Question { .. } | GuardrailIntent::ExecutiveSummary
                if self.require_loaded_data && !data_loaded =>
            {
                GuardrailDecision::Degrade {
                    reason_code: "data_not_loaded",
                    user_message: "Board data is not loaded yet. Please sync with monday.com first."
                        .to_string(),
                    fallback_path: "sync_boards",
                }
            }
            GuardrailIntent::Question { .. } | GuardrailIntent::ExecutiveSummary => {
                GuardrailDecision::Allow
            }
            GuardrailIntent::SnippetExecution { .. } => GuardrailDecision::Deny {
                reason_code: if self.snippet_execution_enabled {
                    "snippet_sandbox_unavailable"
                } else {
                    "snippet_execution_disabled"
                },
                user_message:
                    "Generated code is shown for review only and was not executed against your data."
                        .to_string(),
                fallback_path: "show_snippet_for_review",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};

    fn question(text: &str) -> GuardrailIntent {
        GuardrailIntent::Question { question: text.to_string() }
    }

    #[test]
    fn loaded_question_is_allowed() {
        let policy = GuardrailPolicy::default();
        assert_eq!(
            policy.evaluate(&question("What's the total value of all deals?"), true),
            GuardrailDecision::Allow
        );
        assert_eq!(policy.evaluate(&GuardrailIntent::ExecutiveSummary, true), GuardrailDecision::Allow);
    }

    #[test]
    fn unloaded_data_degrades_to_sync() {
        let policy = GuardrailPolicy::default();
        let decision = policy.evaluate(&GuardrailIntent::ExecutiveSummary, false);

        let (reason_code, user_message, fallback_path) = match decision {
            GuardrailDecision::Degrade { reason_code, user_message, fallback_path } => {
                (reason_code, user_message, fallback_path)
            }
            _ => ("", String::new(), ""),
        };

        assert_eq!(reason_code, "data_not_loaded");
        assert!(user_message.contains("sync"));
        assert_eq!(fallback_path, "sync_boards");
    }

    #[test]
    fn blank_and_oversized_questions_are_denied() {
        let policy = GuardrailPolicy { max_question_chars: 10, ..GuardrailPolicy::default() };

        assert_eq!(policy.evaluate(&question("   "), true).reason_code(), Some("empty_question"));
        assert_eq!(
            policy.evaluate(&question("far too long a question"), true).reason_code(),
            Some("question_too_long")
        );
    }

    #[test]
    fn snippet_execution_is_always_denied() {
        let snippet = GuardrailIntent::SnippetExecution {
            language: Some("python".to_string()),
            code: "import os; os.remove('x')".to_string(),
        };

        let default_decision = GuardrailPolicy::default().evaluate(&snippet, true);
        assert_eq!(default_decision.reason_code(), Some("snippet_execution_disabled"));
        assert!(!default_decision.is_allowed());

        let enabled = GuardrailPolicy { snippet_execution_enabled: true, ..Default::default() };
        let decision = enabled.evaluate(&snippet, true);
        assert_eq!(decision.reason_code(), Some("snippet_sandbox_unavailable"));
        assert!(decision.user_message().is_some_and(|m| m.contains("not executed")));
    }
}
