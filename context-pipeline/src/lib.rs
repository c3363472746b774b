pub mod completion;
pub mod prompt;
pub mod retriever;

pub use completion::CompletionProvider;
pub use prompt::{compose, HistoryRole, HistoryTurn, PromptMessage, PromptRole};
pub use retriever::{retrieve_context, RetrievalParams, RetrievedContextItem};
