use serde::{Deserialize, Serialize};

use crate::domain::transfer::{TransferField, TransferState};

/// Where a conversation stands with respect to the transfer request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransferStage {
    New,
    InProgress,
    Complete,
    Confirmed,
}

impl TransferStage {
    /// Stage implied by a committed state. `Confirmed` only exists on the turn that
    /// emitted the promo.
    pub fn of(state: &TransferState, promo_emitted: bool) -> Self {
        match (state.is_complete, promo_emitted) {
            (true, true) => Self::Confirmed,
            (true, false) => Self::Complete,
            _ if state.is_empty() => Self::New,
            _ => Self::InProgress,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Confirmed => "confirmed",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnEvent {
    FieldsCaptured,
    FieldsCorrected,
    RequiredFieldsCollected,
    ConfirmationReceived,
    ResetRequested,
    NoChange,
}

impl TurnEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FieldsCaptured => "fields_captured",
            Self::FieldsCorrected => "fields_corrected",
            Self::RequiredFieldsCollected => "required_fields_collected",
            Self::ConfirmationReceived => "confirmation_received",
            Self::ResetRequested => "reset_requested",
            Self::NoChange => "no_change",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TurnContext {
    pub promo_emitted: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: TransferStage,
    pub to: TransferStage,
    pub event: TurnEvent,
    pub changed_fields: Vec<TransferField>,
}
