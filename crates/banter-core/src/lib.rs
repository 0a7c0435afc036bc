pub mod ai;
pub mod config;
pub mod controller;
pub mod instructions;
pub mod relay;
pub mod state;
pub mod wire;

// Re-export main types for convenience
pub use ai::{Completion, CompletionClient};
pub use config::Config;
pub use controller::{ActionSink, Controller, ExchangeOutcome, Submission, ERROR_REPLY};
pub use instructions::InstructionTable;
pub use relay::{HttpRelay, Relay};
pub use state::{Action, ChatRole, ConversationEntry, SessionState, Store};
pub use wire::{ChatTurn, ErrorReply, HistoryReply, RelayReply, RelayRequest, TurnRole};
