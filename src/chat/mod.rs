//! The conversational pipeline: rewrite the question, retrieve documents,
//! answer, and record the exchange.

mod answerer;
mod orchestrator;
mod rewriter;
mod sessions;

#[cfg(test)]
pub(crate) mod testing;

pub use answerer::{format_context, Answerer};
pub use orchestrator::{ChainOutput, ChatOptions, ChatOrchestrator};
pub use rewriter::QueryRewriter;
pub use sessions::ChatSessions;
