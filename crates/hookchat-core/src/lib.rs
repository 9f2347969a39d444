pub mod config;
pub mod error;
pub mod exchange;
pub mod model;
pub mod projector;
pub mod repository;
pub mod session;
pub mod store;

// Re-export key types
pub use config::Settings;
pub use error::ChatError;
pub use exchange::{ExchangeResult, ReplyService, WebhookClient};
pub use model::{Conversation, Message, Sender};
pub use projector::HistoryEntry;
pub use repository::ConversationRepository;
pub use session::{ChatSession, ConfirmDialog, ExchangePolicy, HistoryView, TranscriptView};
pub use store::{FileStore, KeyValueStore, MemoryStore, StateStore};
