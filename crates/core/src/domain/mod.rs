pub mod chat;
pub mod session;
pub mod transfer;

pub use chat::{AgentResponse, ChatRequest, Message, Role};
pub use session::{SessionFields, SessionSnapshot};
pub use transfer::{PromoData, StateUpdate, TransferField, TransferState};
