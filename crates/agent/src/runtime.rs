use boardsight_core::config::AgentConfig;
use boardsight_core::{ApplicationError, Role, SessionContext};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};
use crate::llm::LlmClient;
use crate::prompt::{PromptError, PromptRenderer};
use crate::reply::{parse_reply, ModelReply};

const SUMMARY_REQUEST: &str = "Generate an executive summary of the current boards.";

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReplyOutcome {
    Answered,
    /// The model replied with code; it is shown, never run.
    SnippetWithheld { language: Option<String>, code: String },
    Declined { reason_code: &'static str, fallback_path: &'static str },
    Failed { error_class: &'static str },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentReply {
    pub correlation_id: String,
    #[serde(flatten)]
    pub outcome: ReplyOutcome,
    pub message: String,
}

impl AgentReply {
    pub fn is_answered(&self) -> bool {
        matches!(self.outcome, ReplyOutcome::Answered | ReplyOutcome::SnippetWithheld { .. })
    }
}

/// Drives one conversational turn: guardrails, prompt, model call, reply
/// formatting. Both turns are appended to the session history.
pub struct AgentRuntime<L> {
    llm: L,
    guardrails: GuardrailPolicy,
    prompts: PromptRenderer,
}

impl<L> AgentRuntime<L>
where
    L: LlmClient,
{
    pub fn new(llm: L, guardrails: GuardrailPolicy, prompts: PromptRenderer) -> Self {
        Self { llm, guardrails, prompts }
    }

    pub fn from_config(llm: L, config: &AgentConfig) -> Result<Self, PromptError> {
        let guardrails = GuardrailPolicy {
            max_question_chars: config.max_question_chars,
            ..GuardrailPolicy::default()
        };
        Ok(Self::new(llm, guardrails, PromptRenderer::new(config.sample_rows)?))
    }

    pub fn model(&self) -> &str {
        self.llm.model()
    }

    pub async fn ask(
        &self,
        session: &mut SessionContext,
        question: &str,
        now: DateTime<Utc>,
    ) -> AgentReply {
        let correlation_id = Uuid::new_v4().to_string();
        session.push(Role::User, question.trim(), now);

        let intent = GuardrailIntent::Question { question: question.to_string() };
        let reply = match self.guardrails.evaluate(&intent, session.is_loaded()) {
            GuardrailDecision::Allow => {
                info!(
                    event_name = "boardsight.agent.question.received",
                    correlation_id = %correlation_id,
                    chars = question.chars().count(),
                    "answering question"
                );
                let prompt = self.prompts.question(session, question);
                self.complete(prompt, &correlation_id, intent.action_key(), "Answer").await
            }
            decision => declined(decision, &correlation_id, intent.action_key()),
        };

        session.push(Role::Assistant, reply.message.clone(), now);
        reply
    }

    pub async fn executive_summary(
        &self,
        session: &mut SessionContext,
        now: DateTime<Utc>,
    ) -> AgentReply {
        let correlation_id = Uuid::new_v4().to_string();
        session.push(Role::User, SUMMARY_REQUEST, now);

        let intent = GuardrailIntent::ExecutiveSummary;
        let reply = match self.guardrails.evaluate(&intent, session.is_loaded()) {
            GuardrailDecision::Allow => {
                info!(
                    event_name = "boardsight.agent.summary.requested",
                    correlation_id = %correlation_id,
                    "building executive summary"
                );
                let prompt = self.prompts.executive_summary(session);
                self.complete(prompt, &correlation_id, intent.action_key(), "Executive summary")
                    .await
            }
            decision => declined(decision, &correlation_id, intent.action_key()),
        };

        session.push(Role::Assistant, reply.message.clone(), now);
        reply
    }

    async fn complete(
        &self,
        prompt: Result<String, PromptError>,
        correlation_id: &str,
        action_key: &'static str,
        heading: &str,
    ) -> AgentReply {
        let result = match prompt {
            Ok(prompt) => self
                .llm
                .complete(&prompt)
                .await
                .map_err(|error| ApplicationError::Integration(format!("{error:#}"))),
            Err(error) => Err(ApplicationError::Configuration(error.to_string())),
        };

        let text = match result {
            Ok(text) => text,
            Err(error) => return failed(error, correlation_id, action_key),
        };

        let signature = format!("*Analysis by {}*", model_label(self.llm.model()));
        match parse_reply(&text) {
            ModelReply::Answer(answer) => {
                info!(
                    event_name = "boardsight.agent.answered",
                    correlation_id = %correlation_id,
                    action = action_key,
                    "model answered"
                );
                AgentReply {
                    correlation_id: correlation_id.to_string(),
                    outcome: ReplyOutcome::Answered,
                    message: format!("**{heading}:** {answer}\n\n{signature}"),
                }
            }
            ModelReply::Snippet { language, code, commentary } => {
                self.withhold_snippet(language, code, commentary, correlation_id, &signature)
            }
        }
    }

    fn withhold_snippet(
        &self,
        language: Option<String>,
        code: String,
        commentary: String,
        correlation_id: &str,
        signature: &str,
    ) -> AgentReply {
        let intent =
            GuardrailIntent::SnippetExecution { language: language.clone(), code: code.clone() };
        let decision = self.guardrails.evaluate(&intent, true);
        warn!(
            event_name = "boardsight.agent.snippet_withheld",
            correlation_id = %correlation_id,
            reason_code = decision.reason_code().unwrap_or("allowed"),
            "model replied with code; returning it for review"
        );

        let mut sections = Vec::new();
        if !commentary.is_empty() {
            sections.push(commentary);
        }
        sections.push(format!("```{}\n{}\n```", language.as_deref().unwrap_or(""), code));
        if let Some(notice) = decision.user_message() {
            sections.push(format!("> {notice}"));
        }
        sections.push(signature.to_string());

        AgentReply {
            correlation_id: correlation_id.to_string(),
            outcome: ReplyOutcome::SnippetWithheld { language, code },
            message: sections.join("\n\n"),
        }
    }
}

fn declined(decision: GuardrailDecision, correlation_id: &str, action_key: &str) -> AgentReply {
    let (reason_code, user_message, fallback_path) = match decision {
        GuardrailDecision::Deny { reason_code, user_message, fallback_path }
        | GuardrailDecision::Degrade { reason_code, user_message, fallback_path } => {
            (reason_code, user_message, fallback_path)
        }
        GuardrailDecision::Allow => ("allowed", String::new(), "none"),
    };

    info!(
        event_name = "boardsight.agent.declined",
        correlation_id = %correlation_id,
        action = action_key,
        reason_code,
        fallback_path,
        "guardrail declined request"
    );

    AgentReply {
        correlation_id: correlation_id.to_string(),
        outcome: ReplyOutcome::Declined { reason_code, fallback_path },
        message: user_message,
    }
}

fn failed(error: ApplicationError, correlation_id: &str, action_key: &str) -> AgentReply {
    warn!(
        event_name = "boardsight.agent.failed",
        correlation_id = %correlation_id,
        action = action_key,
        error = %error,
        "agent turn failed"
    );

    let error_class = match &error {
        ApplicationError::Integration(_) => "integration",
        ApplicationError::Configuration(_) => "configuration",
        ApplicationError::Domain(_) | ApplicationError::DataNotLoaded => "bad_request",
    };
    let interface = error.into_interface(correlation_id);

    AgentReply {
        correlation_id: correlation_id.to_string(),
        outcome: ReplyOutcome::Failed { error_class },
        message: format!("{} (reference: {})", interface.user_message(), interface.correlation_id()),
    }
}

/// Provider-qualified ids like `openai/gpt-oss-120b` are shown without the
/// provider prefix.
fn model_label(model: &str) -> &str {
    model.rsplit('/').next().unwrap_or(model)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use boardsight_core::config::AgentConfig;
    use boardsight_core::{Board, BoardSchema, Normalizer, RawRecord, Role, SessionContext};
    use chrono::{DateTime, TimeZone, Utc};

    use crate::llm::LlmClient;

    use super::{model_label, AgentRuntime, ReplyOutcome};

    struct ScriptedLlm {
        reply: Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn answering(text: &str) -> Self {
            Self { reply: Ok(text.to_string()), prompts: Mutex::new(Vec::new()) }
        }

        fn failing(message: &str) -> Self {
            Self { reply: Err(message.to_string()), prompts: Mutex::new(Vec::new()) }
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().expect("prompt log").clone()
        }
    }

    #[async_trait]
    impl LlmClient for ScriptedLlm {
        fn model(&self) -> &str {
            "openai/gpt-oss-120b"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().expect("prompt log").push(prompt.to_string());
            self.reply.clone().map_err(|message| anyhow!(message))
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 14, 5, 0).single().expect("timestamp")
    }

    fn runtime(llm: ScriptedLlm) -> AgentRuntime<ScriptedLlm> {
        AgentRuntime::from_config(llm, &AgentConfig { sample_rows: 3, max_question_chars: 200 })
            .expect("templates")
    }

    fn loaded_session() -> SessionContext {
        let normalizer = Normalizer::default();
        let deals = normalizer.normalize(
            &BoardSchema::default_for(Board::Deals),
            &[
                RawRecord::new().with("Item Name", "Acme").with("Deal Value", "$500"),
                RawRecord::new().with("Item Name", "Globex").with("Deal Value", "$250"),
            ],
        );
        let orders = normalizer.normalize(&BoardSchema::default_for(Board::WorkOrders), &[]);
        let mut session = SessionContext::new();
        session.load_tables(vec![deals, orders], now());
        session
    }

    #[tokio::test]
    async fn answer_is_signed_and_recorded() {
        let runtime = runtime(ScriptedLlm::answering("The deals total 750."));
        let mut session = loaded_session();

        let reply = runtime.ask(&mut session, "What's the total value of all deals?", now()).await;

        assert_eq!(reply.outcome, ReplyOutcome::Answered);
        assert_eq!(reply.message, "**Answer:** The deals total 750.\n\n*Analysis by gpt-oss-120b*");
        assert_eq!(session.history().len(), 2);
        assert_eq!(session.history()[0].role, Role::User);
        assert_eq!(session.history()[1].content, reply.message);

        let prompts = runtime.llm.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Deal Value: total 750"));
    }

    #[tokio::test]
    async fn unsynced_session_is_declined_without_calling_the_model() {
        let runtime = runtime(ScriptedLlm::answering("unused"));
        let mut session = SessionContext::new();

        let reply = runtime.ask(&mut session, "How many work orders are pending?", now()).await;

        assert_eq!(
            reply.outcome,
            ReplyOutcome::Declined { reason_code: "data_not_loaded", fallback_path: "sync_boards" }
        );
        assert!(runtime.llm.prompts().is_empty());
        assert_eq!(session.history().len(), 2);
        assert!(!reply.is_answered());
    }

    #[tokio::test]
    async fn code_replies_are_shown_but_not_executed() {
        let runtime = runtime(ScriptedLlm::answering(
            "```python\nresult = df_deals['Deal Value'].sum()\n```",
        ));
        let mut session = loaded_session();

        let reply = runtime.ask(&mut session, "Sum the deals", now()).await;

        assert!(matches!(
            reply.outcome,
            ReplyOutcome::SnippetWithheld { ref language, ref code }
                if language.as_deref() == Some("python") && code.contains("df_deals")
        ));
        assert!(reply.message.starts_with("```python\nresult = df_deals"));
        assert!(reply.message.contains("not executed"));
        assert!(reply.message.ends_with("*Analysis by gpt-oss-120b*"));
        assert!(reply.is_answered());
    }

    #[tokio::test]
    async fn model_failure_becomes_user_safe_message() {
        let runtime = runtime(ScriptedLlm::failing("model endpoint returned 502: upstream down"));
        let mut session = loaded_session();

        let reply = runtime.executive_summary(&mut session, now()).await;

        assert_eq!(reply.outcome, ReplyOutcome::Failed { error_class: "integration" });
        assert!(reply.message.starts_with("A remote service is temporarily unavailable."));
        assert!(reply.message.contains(&reply.correlation_id));
        assert!(!reply.message.contains("upstream down"));
        assert_eq!(session.history().len(), 2);
    }

    #[tokio::test]
    async fn summary_uses_summary_prompt() {
        let runtime = runtime(ScriptedLlm::answering("Pipeline is healthy."));
        let mut session = loaded_session();

        let reply = runtime.executive_summary(&mut session, now()).await;

        assert!(reply.message.starts_with("**Executive summary:** Pipeline is healthy."));
        assert!(runtime.llm.prompts()[0].contains("Pipeline overview"));
    }

    #[test]
    fn model_label_strips_provider() {
        assert_eq!(model_label("openai/gpt-oss-120b"), "gpt-oss-120b");
        assert_eq!(model_label("llama3.1"), "llama3.1");
    }
}
