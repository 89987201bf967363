//! In-memory gateway doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rustc_hash::FxHashMap;

use crate::error::{GatewayError, GatewayResult};
use crate::llm::LanguageModel;
use crate::paperless::{DocumentId, DocumentMetadata, DocumentStore, SearchHit, preview_link};
use crate::pipeline::CandidateDocument;
use crate::prompts::{PromptTemplate, PromptVariables};
use crate::vector_db::{SimilarityHit, VectorIndex};

pub fn hit(id: DocumentId, similarity: f64, link: &str) -> SimilarityHit {
    SimilarityHit {
        external_id: id,
        title: None,
        similarity,
        preview_link: link.to_string(),
    }
}

pub fn metadata(id: DocumentId, title: &str, content: &str) -> DocumentMetadata {
    DocumentMetadata {
        id,
        title: Some(title.to_string()),
        content: Some(content.to_string()),
        tags: Vec::new(),
        original_file_name: None,
    }
}

pub fn candidate(id: DocumentId, title: &str, content: &str) -> CandidateDocument {
    CandidateDocument {
        id,
        title: title.to_string(),
        link: format!("link-{id}"),
        content: content.to_string(),
        highlights: String::new(),
        score: 0.0,
    }
}

pub struct FakeIndex {
    hits: Vec<SimilarityHit>,
    failure: Option<String>,
    calls: Mutex<Vec<(String, usize)>>,
}

impl FakeIndex {
    pub fn with_hits(hits: Vec<SimilarityHit>) -> Self {
        Self {
            hits,
            failure: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            hits: Vec::new(),
            failure: Some(message.to_string()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, usize)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl VectorIndex for FakeIndex {
    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
    ) -> GatewayResult<Vec<SimilarityHit>> {
        self.calls.lock().unwrap().push((query.to_string(), limit));
        match &self.failure {
            Some(message) => Err(GatewayError::Embedding(message.clone())),
            None => Ok(self.hits.iter().take(limit).cloned().collect()),
        }
    }
}

pub struct FakeStore {
    documents: HashMap<DocumentId, DocumentMetadata>,
    failing: Vec<DocumentId>,
}

impl FakeStore {
    pub fn new(documents: Vec<DocumentMetadata>) -> Self {
        Self {
            documents: documents.into_iter().map(|doc| (doc.id, doc)).collect(),
            failing: Vec::new(),
        }
    }

    /// Makes metadata lookups for `id` fail with an HTTP 500.
    pub fn failing_on(mut self, id: DocumentId) -> Self {
        self.failing.push(id);
        self
    }
}

#[async_trait]
impl DocumentStore for FakeStore {
    async fn fetch_metadata(&self, id: DocumentId) -> GatewayResult<Option<DocumentMetadata>> {
        if self.failing.contains(&id) {
            return Err(GatewayError::Http {
                status: 500,
                body: "server error".to_string(),
            });
        }
        Ok(self.documents.get(&id).cloned())
    }

    async fn search(&self, query: &str, limit: usize) -> GatewayResult<Vec<SearchHit>> {
        let needle = query.to_lowercase();
        let mut ids: Vec<_> = self.documents.keys().copied().collect();
        ids.sort_unstable();

        Ok(ids
            .into_iter()
            .filter_map(|id| self.documents.get(&id))
            .filter(|doc| {
                doc.content
                    .as_deref()
                    .unwrap_or("")
                    .to_lowercase()
                    .contains(&needle)
            })
            .take(limit)
            .map(|doc| SearchHit {
                document: doc.clone(),
                link: preview_link("fake", doc.id),
                highlights: String::new(),
                score: None,
            })
            .collect())
    }

    async fn enumerate_all_ids(&self) -> GatewayResult<Vec<DocumentId>> {
        let mut ids: Vec<_> = self.documents.keys().copied().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn enumerate_all_tags(&self) -> GatewayResult<FxHashMap<DocumentId, String>> {
        Ok(FxHashMap::default())
    }

    async fn download_binary(&self, id: DocumentId) -> GatewayResult<Option<Vec<u8>>> {
        Ok(self
            .documents
            .get(&id)
            .map(|doc| doc.content.clone().unwrap_or_default().into_bytes()))
    }
}

type Responder =
    Box<dyn Fn(PromptTemplate, &PromptVariables) -> GatewayResult<String> + Send + Sync>;

/// Scripted language model that records every call.
pub struct FakeLlm {
    responder: Responder,
    calls: Mutex<Vec<(PromptTemplate, PromptVariables)>>,
}

impl FakeLlm {
    pub fn new(
        responder: impl Fn(PromptTemplate, &PromptVariables) -> GatewayResult<String>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Answers the ranking prompt with `ranking` and the generation prompt
    /// with a cited answer quoting the first context document.
    pub fn grounded(ranking: &str) -> Self {
        let ranking = ranking.to_string();
        Self::new(move |template, variables| match template {
            PromptTemplate::RelevanceRanking => Ok(ranking.clone()),
            PromptTemplate::Generation => Ok(grounded_answer(variables)),
            PromptTemplate::QueryTransform => Ok("search terms".to_string()),
        })
    }

    pub fn calls(&self) -> Vec<(PromptTemplate, PromptVariables)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn grounded_answer(variables: &PromptVariables) -> String {
    let citation = variables["preview_links"]
        .lines()
        .next()
        .unwrap_or_default()
        .trim_start_matches("- ")
        .to_string();
    let excerpt = variables["context"]
        .split("Conteúdo COMPLETO:\n")
        .nth(1)
        .and_then(|rest| rest.lines().next())
        .unwrap_or_default();

    format!("**Answer** {citation}\n\n> \"{excerpt}\" {citation}")
}

#[async_trait]
impl LanguageModel for FakeLlm {
    async fn complete(
        &self,
        template: PromptTemplate,
        variables: &PromptVariables,
    ) -> GatewayResult<String> {
        template.render(variables)?;
        self.calls
            .lock()
            .unwrap()
            .push((template, variables.clone()));
        (self.responder)(template, variables)
    }
}
