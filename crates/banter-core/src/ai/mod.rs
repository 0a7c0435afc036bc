pub mod openai;

pub use openai::{Completion, CompletionClient};
