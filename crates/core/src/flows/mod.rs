pub mod engine;
pub mod states;

pub use engine::{FlowDefinition, FlowEngine, FlowTransitionError, SendMoneyFlow};
pub use states::{TransferStage, TransitionOutcome, TurnContext, TurnEvent};
