pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod flows;

pub use domain::chat::{AgentResponse, ChatRequest, Message, Role};
pub use domain::session::{SessionFields, SessionSnapshot};
pub use domain::transfer::{PromoData, StateUpdate, TransferField, TransferState};
pub use errors::{ApplicationError, DomainError, InterfaceError};
pub use flows::{FlowEngine, SendMoneyFlow, TransferStage, TurnEvent};
