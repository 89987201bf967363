//! The question-answering pipeline: retrieval, relevance ranking, generation.
//!
//! A [`PipelineState`] is created per question and threaded through the
//! three stages in a fixed order. Stages absorb their own failures, so a
//! run always ends with a generation.

use std::sync::Arc;

use tracing::{Instrument, info, info_span};
use unicode_normalization::UnicodeNormalization;
use uuid::Uuid;

use crate::config::PipelineConfig;
use crate::error::QuestionError;
use crate::generation::Generator;
use crate::llm::LanguageModel;
use crate::paperless::{DocumentId, DocumentStore};
use crate::relevance::RelevanceRanker;
use crate::retriever::Retriever;
use crate::vector_db::VectorIndex;

/// A user question that passed the caller-side length check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Trims and NFC-normalizes `raw`; fewer than `min_chars` characters is rejected.
    pub fn parse(raw: &str, min_chars: usize) -> Result<Self, QuestionError> {
        let normalized: String = raw.trim().nfc().collect();
        let actual = normalized.chars().count();
        if actual < min_chars {
            return Err(QuestionError::TooShort {
                min: min_chars,
                actual,
            });
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One retrieved document, enriched with its similarity and preview link.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateDocument {
    pub id: DocumentId,
    pub title: String,
    pub link: String,
    pub content: String,
    pub highlights: String,
    /// Similarity in [0.0, 1.0]; informational only.
    pub score: f64,
}

impl CandidateDocument {
    /// Text shown to the relevance ranker: highlights first.
    pub fn preview_text(&self) -> &str {
        if self.highlights.is_empty() {
            &self.content
        } else {
            &self.highlights
        }
    }

    /// Text given to the generator: full content first.
    pub fn full_text(&self) -> &str {
        if self.content.is_empty() {
            &self.highlights
        } else {
            &self.content
        }
    }
}

/// State owned by a single run.
///
/// `question` is fixed at construction; the stages own `documents`,
/// `generation` and `error`.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineState {
    question: String,
    pub documents: Vec<CandidateDocument>,
    pub generation: Option<String>,
    /// Advisory diagnostic; never a reason to discard the generation.
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(question: &Question) -> Self {
        Self {
            question: question.as_str().to_string(),
            documents: Vec::new(),
            generation: None,
            error: None,
        }
    }

    pub fn question(&self) -> &str {
        &self.question
    }

    pub fn into_outcome(self) -> RunOutcome {
        RunOutcome {
            generation: self.generation.unwrap_or_default(),
            documents: self.documents,
            error: self.error,
        }
    }
}

/// What a caller gets back from [`RagPipeline::run`].
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub generation: String,
    pub documents: Vec<CandidateDocument>,
    pub error: Option<String>,
}

/// Retrieval -> relevance -> generation, with no branches or retries.
pub struct RagPipeline {
    retriever: Retriever,
    ranker: RelevanceRanker,
    generator: Generator,
}

impl RagPipeline {
    pub fn new(
        index: Arc<dyn VectorIndex>,
        store: Arc<dyn DocumentStore>,
        llm: Arc<dyn LanguageModel>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            retriever: Retriever::new(index, store, config.top_k),
            ranker: RelevanceRanker::new(llm.clone(), config.preview_chars),
            generator: Generator::new(llm),
        }
    }

    pub async fn run(&self, question: &Question) -> RunOutcome {
        let span = info_span!("rag_run", run_id = %Uuid::new_v4());
        async {
            info!(question = question.as_str(), "pipeline started");
            let mut state = PipelineState::new(question);

            self.retriever.retrieve(&mut state).await;
            self.ranker.rank(&mut state).await;
            self.generator.generate(&mut state).await;

            info!(
                documents = state.documents.len(),
                has_error = state.error.is_some(),
                "pipeline finished"
            );
            state.into_outcome()
        }
        .instrument(span)
        .await
    }
}
