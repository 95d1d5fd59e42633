//! Prompt assembly for grounded answers.

use crate::llm::types::ChatMessage;
use crate::rag::QueryResult;

pub const SYSTEM_PROMPT: &str =
    "You are an AI assistant. Use the following context to answer the question:";

/// Joins result contents in ranked order as `Document {rank}: {content}` lines.
pub fn build_context(results: &[QueryResult]) -> String {
    results
        .iter()
        .enumerate()
        .map(|(idx, result)| format!("Document {}: {}", idx + 1, result.content))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn build_user_prompt(context: &str, query: &str) -> String {
    format!(
        "\nContext:\n{}\n\nQuestion:\n{}\n\nAnswer:\n",
        context, query
    )
}

/// The two-message conversation sent to the generator.
pub fn build_messages(results: &[QueryResult], query: &str) -> Vec<ChatMessage> {
    let context = build_context(results);
    vec![
        ChatMessage::system(SYSTEM_PROMPT),
        ChatMessage::user(build_user_prompt(&context, query)),
    ]
}
