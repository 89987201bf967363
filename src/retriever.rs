use std::sync::Arc;

use tracing::{info, warn};

use crate::paperless::{DocumentMetadata, DocumentStore};
use crate::pipeline::{CandidateDocument, PipelineState};
use crate::vector_db::{SimilarityHit, VectorIndex};

/// Title shown for documents stored without one.
pub const UNTITLED: &str = "Sem título";

/// Semantic retrieval: nearest neighbours from the vector index, full text
/// from the document store.
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    store: Arc<dyn DocumentStore>,
    top_k: usize,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, store: Arc<dyn DocumentStore>, top_k: usize) -> Self {
        Retriever {
            index,
            store,
            top_k,
        }
    }

    /// Fills `state.documents`. Only a failed similarity search sets `state.error`;
    /// documents whose metadata cannot be fetched are skipped.
    pub async fn retrieve(&self, state: &mut PipelineState) {
        info!("retrieving documents (semantic search)");

        let hits = match self.index.similarity_search(state.question(), self.top_k).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(error = %e, "similarity search failed");
                state.documents = Vec::new();
                state.error = Some(e.to_string());
                return;
            }
        };

        if hits.is_empty() {
            info!("no documents found in semantic search");
            state.documents = Vec::new();
            return;
        }

        let mut documents = Vec::with_capacity(hits.len());
        for hit in &hits {
            match self.store.fetch_metadata(hit.external_id).await {
                Ok(Some(metadata)) => {
                    let document = enrich(metadata, hit);
                    info!(id = document.id, title = %document.title, "full content fetched");
                    documents.push(document);
                }
                Ok(None) => {
                    warn!(id = hit.external_id, "document not found in store, skipping");
                }
                Err(e) => {
                    warn!(id = hit.external_id, error = %e, "failed to fetch document, skipping");
                }
            }
        }

        info!(hits = hits.len(), kept = documents.len(), "retrieval finished");
        state.documents = documents;
    }
}

/// Merges store metadata with the index hit. The index's preview link and
/// similarity always win.
fn enrich(metadata: DocumentMetadata, hit: &SimilarityHit) -> CandidateDocument {
    let title = metadata
        .title
        .filter(|title| !title.trim().is_empty())
        .or_else(|| hit.title.clone().filter(|title| !title.trim().is_empty()))
        .unwrap_or_else(|| UNTITLED.to_string());

    CandidateDocument {
        id: hit.external_id,
        title,
        link: hit.preview_link.clone(),
        content: metadata.content.unwrap_or_default(),
        highlights: String::new(),
        score: hit.similarity,
    }
}
