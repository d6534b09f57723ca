pub mod config;
pub mod normalize;
pub mod orchestrator;
pub mod service;
pub mod state;
pub mod storage;
pub mod store;

// Re-export main types for convenience
pub use config::Config;
pub use normalize::normalize;
pub use orchestrator::{Composer, ExchangeOutcome, ExchangePhase, Orchestrator, PendingExchange};
pub use service::{AnswerClient, AnswerService, ChatRequest, ChatResponse, ServiceError};
pub use state::{CandidateSummary, ChatMessage, ChatRole, Session, SessionPatch};
pub use storage::{KeyValueStore, MemoryStore, SqliteStore, StorageError};
pub use store::SessionStore;
