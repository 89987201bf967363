use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::{debug, info};

use crate::config::DatabaseConfig;
use crate::embeddings::{Embedder, to_vector_literal};
use crate::error::GatewayResult;
use crate::paperless::{DocumentId, preview_link};

/// Cosine similarity over the summary embeddings written by the ingestion job.
const SIMILARITY_SQL: &str = r#"
    SELECT paperless_id, title, preview_link, 1 - (embedding <=> $1::text::vector) AS similarity
    FROM documents
    ORDER BY similarity DESC
    LIMIT $2
"#;

/// One nearest neighbour returned by the index.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityHit {
    pub external_id: DocumentId,
    pub title: Option<String>,
    /// Similarity in [0.0, 1.0].
    pub similarity: f64,
    pub preview_link: String,
}

/// Similarity search over stored document embeddings.
///
/// Hits come back ordered by descending similarity; no match is an empty
/// list, while embedding or backend failures are errors.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    async fn similarity_search(&self, query: &str, limit: usize)
    -> GatewayResult<Vec<SimilarityHit>>;
}

#[derive(Debug, sqlx::FromRow)]
struct SimilarityRow {
    paperless_id: i32,
    title: Option<String>,
    preview_link: Option<String>,
    similarity: Option<f64>,
}

impl SimilarityRow {
    fn into_hit(self, api_url: &str) -> SimilarityHit {
        let external_id = DocumentId::from(self.paperless_id);
        let preview_link = match self.preview_link {
            Some(link) if !link.trim().is_empty() => link,
            _ => preview_link(api_url, external_id),
        };

        SimilarityHit {
            external_id,
            title: self.title,
            similarity: self.similarity.unwrap_or(0.0).clamp(0.0, 1.0),
            preview_link,
        }
    }
}

/// Postgres + pgvector backed index.
pub struct PgVectorIndex {
    pool: PgPool,
    embedder: Arc<dyn Embedder>,
    api_url: String,
}

impl PgVectorIndex {
    /// Builds the pool lazily; connection failures surface on the first search.
    pub fn connect_lazy(
        config: &DatabaseConfig,
        embedder: Arc<dyn Embedder>,
        api_url: &str,
    ) -> GatewayResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy_with(config.connect_options()?);

        Ok(Self {
            pool,
            embedder,
            api_url: api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl VectorIndex for PgVectorIndex {
    async fn similarity_search(
        &self,
        query: &str,
        limit: usize,
    ) -> GatewayResult<Vec<SimilarityHit>> {
        info!(query, limit, "semantic search");

        let embedding = self.embedder.embed_query(query).await?;
        debug!(model = self.embedder.model(), "query embedding generated");

        let rows: Vec<SimilarityRow> = sqlx::query_as(SIMILARITY_SQL)
            .bind(to_vector_literal(&embedding))
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;

        info!(hits = rows.len(), "documents found in vector index");
        Ok(rows
            .into_iter()
            .map(|row| row.into_hit(&self.api_url))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_keeps_stored_preview_link() {
        let row = SimilarityRow {
            paperless_id: 12,
            title: Some("Zero Fare Act".to_string()),
            preview_link: Some("https://docs/api/documents/12/preview/".to_string()),
            similarity: Some(0.91),
        };
        let hit = row.into_hit("https://other/api");
        assert_eq!(hit.external_id, 12);
        assert_eq!(hit.preview_link, "https://docs/api/documents/12/preview/");
        assert_eq!(hit.similarity, 0.91);
    }

    #[test]
    fn test_row_derives_missing_preview_link() {
        let row = SimilarityRow {
            paperless_id: 3,
            title: None,
            preview_link: None,
            similarity: None,
        };
        let hit = row.into_hit("https://docs/api");
        assert_eq!(hit.preview_link, "https://docs/api/documents/3/preview/");
        assert_eq!(hit.similarity, 0.0);
    }

    #[test]
    fn test_similarity_is_clamped() {
        let row = SimilarityRow {
            paperless_id: 1,
            title: None,
            preview_link: Some("link".to_string()),
            similarity: Some(-0.2),
        };
        assert_eq!(row.into_hit("x").similarity, 0.0);
    }
}
