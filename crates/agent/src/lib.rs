//! Conversational runtime for the send-money agent.
//!
//! Each turn renders the current transfer state and recent transcript into a prompt,
//! asks the model for a JSON reply, validates that reply strictly, re-checks its
//! proposal with deterministic guardrails and commits the result to the session store.
//!
//! - `prompt`: system instruction template and per-turn prompt rendering
//! - `llm`: `LlmClient` trait with Gemini, OpenAI-compatible and Ollama adapters
//! - `reply`: strict parsing of the model reply
//! - `guardrails`: `GuardrailPolicy` over model proposals
//! - `runtime`: `AgentRuntime`, the per-turn orchestrator
//!
//! The model proposes; it never marks a transfer complete or emits a promo unless the
//! merged state passes the completion gate.

pub mod guardrails;
pub mod llm;
pub mod prompt;
pub mod reply;
pub mod runtime;

pub use runtime::{resolve_session_id, AgentRuntime, RuntimeSettings, TurnOutcome, FALLBACK_REPLY};
