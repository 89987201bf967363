//! Retrieval-augmented question answering over a Paperless-NGX archive.
//!
//! A question goes through semantic retrieval (pgvector), relevance
//! ranking and grounded generation (Gemini), producing a cited answer and
//! the ranked list of source documents.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod generation;
pub mod llm;
pub mod paperless;
pub mod pipeline;
pub mod prompts;
pub mod relevance;
pub mod retriever;
pub mod utils;
pub mod vector_db;

#[cfg(test)]
mod testing;

pub use config::{Config, load_config};
pub use error::{ConfigError, GatewayError, QuestionError};
pub use llm::{GeminiClient, LanguageModel};
pub use paperless::{DocumentStore, PaperlessClient};
pub use pipeline::{CandidateDocument, PipelineState, Question, RagPipeline, RunOutcome};
pub use vector_db::{PgVectorIndex, VectorIndex};
