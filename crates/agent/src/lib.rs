//! Query router for Boardsight.
//!
//! Turns a question plus the session's cleaned tables into a model prompt,
//! calls an OpenAI-compatible chat-completions endpoint and formats the reply.
//!
//! # Flow
//!
//! 1. **Guardrails** (`guardrails`) - reject empty/oversized questions and
//!    degrade to a sync request when no board data is loaded
//! 2. **Prompt** (`prompt`) - markdown samples plus precomputed metrics
//! 3. **Model call** (`llm`) - `LlmClient` seam with bounded retry
//! 4. **Reply** (`reply`, `runtime`) - answers are signed with the model name;
//!    code blocks are returned for review and never executed
//!
//! The model never does the arithmetic: totals, averages and ranges come from
//! `boardsight_core::metrics` and are handed to it as facts.

pub mod guardrails;
pub mod llm;
pub mod prompt;
pub mod reply;
pub mod runtime;

pub use guardrails::{GuardrailDecision, GuardrailIntent, GuardrailPolicy};
pub use llm::{ChatCompletionsClient, LlmClient, LlmError};
pub use prompt::{PromptError, PromptRenderer};
pub use reply::{parse_reply, ModelReply};
pub use runtime::{AgentReply, AgentRuntime, ReplyOutcome};
