use thiserror::Error;

use crate::domain::transfer::{TransferField, TransferState};
use crate::flows::states::{TransferStage, TransitionOutcome, TurnContext, TurnEvent};

pub trait FlowDefinition {
    fn initial_stage(&self) -> TransferStage;
    fn transition(
        &self,
        from: TransferStage,
        previous: &TransferState,
        next: &TransferState,
        context: &TurnContext,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

#[derive(Clone, Debug, Default)]
pub struct SendMoneyFlow;

impl FlowDefinition for SendMoneyFlow {
    fn initial_stage(&self) -> TransferStage {
        TransferStage::New
    }

    fn transition(
        &self,
        from: TransferStage,
        previous: &TransferState,
        next: &TransferState,
        context: &TurnContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_send_money(from, previous, next, context)
    }
}

pub struct FlowEngine<F> {
    flow: F,
}

impl<F> FlowEngine<F>
where
    F: FlowDefinition,
{
    pub fn new(flow: F) -> Self {
        Self { flow }
    }

    pub fn initial_stage(&self) -> TransferStage {
        self.flow.initial_stage()
    }

    pub fn apply(
        &self,
        from: TransferStage,
        previous: &TransferState,
        next: &TransferState,
        context: &TurnContext,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(from, previous, next, context)
    }
}

impl Default for FlowEngine<SendMoneyFlow> {
    fn default() -> Self {
        Self::new(SendMoneyFlow)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("state marked complete from {from:?} while fields are missing: {missing_fields:?}")]
    CompletionWithMissingFields { from: TransferStage, missing_fields: Vec<TransferField> },
    #[error("confirmation from {from:?} requires a complete transfer")]
    ConfirmationWithoutCompletion { from: TransferStage },
}

fn transition_send_money(
    from: TransferStage,
    previous: &TransferState,
    next: &TransferState,
    context: &TurnContext,
) -> Result<TransitionOutcome, FlowTransitionError> {
    if next.is_complete && !next.has_all_fields() {
        return Err(FlowTransitionError::CompletionWithMissingFields {
            from,
            missing_fields: next.missing_fields(),
        });
    }
    if context.promo_emitted && !next.is_complete {
        return Err(FlowTransitionError::ConfirmationWithoutCompletion { from });
    }

    let changed_fields = previous.changed_fields(next);
    let event = if context.promo_emitted {
        TurnEvent::ConfirmationReceived
    } else if next.is_empty() && !previous.is_empty() {
        TurnEvent::ResetRequested
    } else if next.is_complete && !previous.is_complete {
        TurnEvent::RequiredFieldsCollected
    } else if changed_fields.is_empty() {
        TurnEvent::NoChange
    } else if changed_fields.iter().any(|field| previous.field(*field).is_some()) {
        TurnEvent::FieldsCorrected
    } else {
        TurnEvent::FieldsCaptured
    };

    Ok(TransitionOutcome {
        from,
        to: TransferStage::of(next, context.promo_emitted),
        event,
        changed_fields,
    })
}
