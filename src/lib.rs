pub mod core;
pub mod corpus;
pub mod embedding;
pub mod llm;
pub mod pipeline;
pub mod rag;
pub mod vector_math;

#[cfg(test)]
mod test_support;
