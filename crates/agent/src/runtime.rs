use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};
use uuid::Uuid;

use sendmoney_core::catalog::validate_transfer;
use sendmoney_core::config::AppConfig;
use sendmoney_core::domain::chat::{AgentResponse, ChatRequest};
use sendmoney_core::domain::session::{SessionSnapshot, PROMO_KEY};
use sendmoney_core::domain::transfer::TransferState;
use sendmoney_core::errors::{ApplicationError, DomainError};
use sendmoney_core::flows::{FlowEngine, SendMoneyFlow, TransferStage, TurnContext};
use sendmoney_db::{FieldChange, SessionRepository};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompt::{render_system_instruction, PromptContext, DEFAULT_HISTORY_LIMIT};
use crate::reply::parse_reply;

pub const FALLBACK_REPLY: &str = "Sorry, I couldn't process that. Could you please rephrase?";

#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub history_limit: usize,
    pub temperature: f32,
    pub fallback_on_malformed_reply: bool,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self { history_limit: DEFAULT_HISTORY_LIMIT, temperature: 0.1, fallback_on_malformed_reply: true }
    }
}

impl RuntimeSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            history_limit: config.agent.history_limit,
            temperature: config.llm.temperature,
            fallback_on_malformed_reply: config.agent.fallback_on_malformed_reply,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnOutcome {
    pub session_id: String,
    pub response: AgentResponse,
}

pub struct AgentRuntime {
    store: Arc<dyn SessionRepository>,
    llm: Arc<dyn LlmClient>,
    guardrails: GuardrailPolicy,
    flow: FlowEngine<SendMoneyFlow>,
    settings: RuntimeSettings,
    system_instruction: String,
}

impl AgentRuntime {
    pub fn new(
        store: Arc<dyn SessionRepository>,
        llm: Arc<dyn LlmClient>,
        settings: RuntimeSettings,
    ) -> Result<Self, ApplicationError> {
        let system_instruction = render_system_instruction()
            .map_err(|error| ApplicationError::Configuration(error.to_string()))?;
        Ok(Self {
            store,
            llm,
            guardrails: GuardrailPolicy::default(),
            flow: FlowEngine::default(),
            settings,
            system_instruction,
        })
    }

    pub fn store(&self) -> &Arc<dyn SessionRepository> {
        &self.store
    }

    /// Runs one conversational turn. A turn either commits the merged state (and the
    /// promo decision) in a single store write, or leaves the session untouched.
    pub async fn handle_turn(
        &self,
        request: &ChatRequest,
        session_id: Option<String>,
    ) -> Result<TurnOutcome, ApplicationError> {
        request.validate()?;

        let session_id = resolve_session_id(session_id);
        let started_at = Instant::now();

        let fields = self.store.load_or_create(&session_id).await.map_err(|error| {
            warn!(
                event_name = "agent.session.load_failed",
                correlation_id = %session_id,
                error = %error,
                "session could not be loaded or created"
            );
            ApplicationError::SessionCreation(error.to_string())
        })?;
        let snapshot = SessionSnapshot::from_fields(&fields)?;

        let previous = match request.current_state.as_ref() {
            Some(seed) if !SessionSnapshot::has_transfer_fields(&fields) => {
                let mut seed = seed.clone();
                seed.is_complete = seed.is_complete && validate_transfer(&seed).is_empty();
                seed
            }
            _ => snapshot.state,
        };
        let from = TransferStage::of(&previous, snapshot.promo.is_some());

        let prompt = PromptContext::new(&request.user_message, &previous, &request.message_history)
            .with_history_limit(self.settings.history_limit)
            .render()
            .map_err(|error| DomainError::InvariantViolation(error.to_string()))?;

        let completion = CompletionRequest {
            system_instruction: self.system_instruction.clone(),
            prompt,
            temperature: self.settings.temperature,
        };
        let raw = self.llm.complete(&completion).await.map_err(|error| {
            warn!(
                event_name = "agent.model.failed",
                correlation_id = %session_id,
                model = self.llm.model(),
                error = %error,
                "model invocation failed"
            );
            ApplicationError::from(error)
        })?;

        let reply = match parse_reply(&raw) {
            Ok(reply) => reply,
            Err(error) => {
                let excerpt: String = raw.chars().take(500).collect();
                warn!(
                    event_name = "agent.reply.malformed",
                    correlation_id = %session_id,
                    error = %error,
                    excerpt = %excerpt,
                    fallback = self.settings.fallback_on_malformed_reply,
                    "model reply could not be parsed; session left unchanged"
                );
                if self.settings.fallback_on_malformed_reply {
                    return Ok(TurnOutcome {
                        session_id,
                        response: AgentResponse {
                            agent_response: FALLBACK_REPLY.to_string(),
                            updated_state: previous,
                            promo: None,
                        },
                    });
                }
                return Err(ApplicationError::MalformedModelResponse(error.to_string()));
            }
        };

        let guarded = self.guardrails.evaluate(&previous, reply.updated_state, reply.promo);
        for decision in &guarded.decisions {
            log_decision(&session_id, decision);
        }

        let outcome = self
            .flow
            .apply(
                from,
                &previous,
                &guarded.state,
                &TurnContext { promo_emitted: guarded.promo.is_some() },
            )
            .map_err(DomainError::from)?;

        self.commit(&session_id, &guarded.state, guarded.promo.as_ref()).await?;

        let changed_fields =
            outcome.changed_fields.iter().map(|field| field.key()).collect::<Vec<_>>().join(",");
        info!(
            event_name = "agent.turn.transition",
            correlation_id = %session_id,
            from = outcome.from.as_str(),
            to = outcome.to.as_str(),
            turn_event = outcome.event.as_str(),
            changed_fields = %changed_fields,
            "transfer stage evaluated"
        );
        info!(
            event_name = "agent.turn.completed",
            correlation_id = %session_id,
            model = self.llm.model(),
            is_complete = guarded.state.is_complete,
            promo = guarded.promo.is_some(),
            latency_ms = started_at.elapsed().as_millis() as u64,
            "turn committed"
        );

        Ok(TurnOutcome {
            session_id,
            response: AgentResponse {
                agent_response: reply.agent_response,
                updated_state: guarded.state,
                promo: guarded.promo,
            },
        })
    }

    async fn commit(
        &self,
        session_id: &str,
        state: &TransferState,
        promo: Option<&sendmoney_core::domain::transfer::PromoData>,
    ) -> Result<(), ApplicationError> {
        let mut changes = SessionSnapshot::state_entries(state)
            .into_iter()
            .map(|(key, value)| FieldChange::set(key, value))
            .collect::<Vec<_>>();
        changes.push(match promo {
            Some(promo) => FieldChange::set(PROMO_KEY, SessionSnapshot::promo_entry(promo)?),
            None => FieldChange::delete(PROMO_KEY),
        });

        self.store.write_fields(session_id, &changes).await.map_err(|error| {
            warn!(
                event_name = "agent.session.commit_failed",
                correlation_id = %session_id,
                error = %error,
                "turn could not be committed"
            );
            ApplicationError::SessionStore(error.to_string())
        })
    }
}

/// Trims a caller-supplied session id, minting a UUID v4 when it is absent or blank.
/// Resolving an already resolved id returns it unchanged.
pub fn resolve_session_id(session_id: Option<String>) -> String {
    session_id
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

fn log_decision(session_id: &str, decision: &GuardrailDecision) {
    match decision {
        GuardrailDecision::Deny { reason_code, field, detail } => warn!(
            event_name = "agent.guardrail.denied",
            correlation_id = %session_id,
            reason_code = *reason_code,
            field = field.map(|field| field.key()).unwrap_or("none"),
            detail = %detail,
            "model proposal denied"
        ),
        GuardrailDecision::Degrade { reason_code, detail } => warn!(
            event_name = "agent.guardrail.degraded",
            correlation_id = %session_id,
            reason_code = *reason_code,
            detail = %detail,
            "model proposal degraded"
        ),
        GuardrailDecision::Flag { reason_code, detail } => info!(
            event_name = "agent.guardrail.flagged",
            correlation_id = %session_id,
            reason_code = *reason_code,
            detail = %detail,
            "model proposal flagged"
        ),
    }
}
