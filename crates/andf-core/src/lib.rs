pub mod backend;
pub mod config;
pub mod error;
pub mod exchange;
pub mod format;
pub mod health;
pub mod message;
pub mod session;
pub mod suggestions;

// Re-export main types for convenience
pub use backend::{Backend, ChatReply, ChatRequest, HttpBackend, SourceRef};
pub use config::Config;
pub use error::BackendError;
pub use exchange::{ExchangeState, Rejection, RequestId, SendOutcome, Settlement};
pub use format::{MessageView, StatusColor};
pub use health::{ConnectivityStatus, HealthMonitor};
pub use message::{ChatMessage, ChatRole, MessageId, MessageStore};
pub use session::Session;
