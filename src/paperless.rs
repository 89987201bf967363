//! Typed client for the Paperless-NGX REST API.
//!
//! Covers the calls the assistant needs: metadata lookup by id, full-text
//! search, tag and id enumeration (following `next` pagination links) and
//! binary download.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use rustc_hash::FxHashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::PaperlessConfig;
use crate::error::{GatewayError, GatewayResult};
use crate::utils::clean_highlights;

/// Paperless document and tag identifier.
pub type DocumentId = i64;

/// Document record as served by `/documents/{id}/`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub id: DocumentId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Vec<DocumentId>,
    #[serde(default)]
    pub original_file_name: Option<String>,
}

/// A full-text search result with its cleaned highlight excerpt.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document: DocumentMetadata,
    pub link: String,
    pub highlights: String,
    pub score: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    #[serde(default)]
    next: Option<String>,
    #[serde(default = "Vec::new")]
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: DocumentId,
}

#[derive(Debug, Deserialize)]
struct Tag {
    id: DocumentId,
    name: String,
}

#[derive(Debug, Deserialize)]
struct RawSearchResult {
    #[serde(flatten)]
    document: DocumentMetadata,
    #[serde(rename = "__search_hit__", default)]
    search_hit: Option<RawSearchHit>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSearchHit {
    #[serde(default)]
    score: Option<f64>,
    #[serde(default)]
    highlights: Option<String>,
}

pub fn preview_link(api_url: &str, id: DocumentId) -> String {
    format!("{}/documents/{}/preview/", api_url.trim_end_matches('/'), id)
}

pub fn download_link(api_url: &str, id: DocumentId) -> String {
    format!("{}/documents/{}/download/", api_url.trim_end_matches('/'), id)
}

/// Document store operations used by the pipeline and the front-end.
///
/// `None` marks a document that does not exist; every other failure is an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch_metadata(&self, id: DocumentId) -> GatewayResult<Option<DocumentMetadata>>;

    async fn search(&self, query: &str, limit: usize) -> GatewayResult<Vec<SearchHit>>;

    async fn enumerate_all_ids(&self) -> GatewayResult<Vec<DocumentId>>;

    async fn enumerate_all_tags(&self) -> GatewayResult<FxHashMap<DocumentId, String>>;

    async fn download_binary(&self, id: DocumentId) -> GatewayResult<Option<Vec<u8>>>;
}

pub struct PaperlessClient {
    client: reqwest::Client,
    api_url: String,
    username: String,
    password: String,
    page_size: usize,
    download_timeout: Duration,
}

impl PaperlessClient {
    pub fn new(config: &PaperlessConfig) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_url: config.api_url().to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            page_size: config.page_size,
            download_timeout: Duration::from_secs(config.download_timeout_secs),
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    fn request(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
    }

    /// GETs and decodes a JSON body; a 404 yields `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> GatewayResult<Option<T>> {
        let response = self.request(url).query(query).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url, status = status.as_u16(), "paperless request failed");
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(Some(response.json::<T>().await?))
    }

    /// Walks every page of a list endpoint.
    async fn collect_pages<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: Vec<(&str, String)>,
    ) -> GatewayResult<Vec<T>> {
        let mut url = format!("{}{}", self.api_url, endpoint);
        let mut params = query;
        let mut items = Vec::new();

        loop {
            let page: Option<Page<T>> = self.get_json(&url, &params).await?;
            let Some(page) = page else { break };
            if page.results.is_empty() {
                break;
            }
            items.extend(page.results);

            match page.next {
                Some(next) if !next.trim().is_empty() => {
                    url = resolve_next(&self.api_url, &next);
                    // the next link already carries the query string
                    params = Vec::new();
                    debug!(loaded = items.len(), endpoint, "loading next page");
                }
                _ => break,
            }
        }

        Ok(items)
    }
}

/// Resolves a pagination link, which Paperless may send absolute or relative.
fn resolve_next(api_url: &str, next: &str) -> String {
    if next.starts_with("http://") || next.starts_with("https://") {
        next.to_string()
    } else {
        format!("{}/{}", api_url.trim_end_matches('/'), next.trim_start_matches('/'))
    }
}

fn into_search_hit(api_url: &str, raw: RawSearchResult) -> SearchHit {
    let hit = raw.search_hit.unwrap_or_default();
    let highlights = clean_highlights(hit.highlights.as_deref().unwrap_or(""));
    SearchHit {
        link: preview_link(api_url, raw.document.id),
        document: raw.document,
        highlights,
        score: hit.score,
    }
}

#[async_trait]
impl DocumentStore for PaperlessClient {
    async fn fetch_metadata(&self, id: DocumentId) -> GatewayResult<Option<DocumentMetadata>> {
        let url = format!("{}/documents/{}/", self.api_url, id);
        self.get_json(&url, &[]).await
    }

    async fn search(&self, query: &str, limit: usize) -> GatewayResult<Vec<SearchHit>> {
        info!(query, limit, "searching paperless");
        let url = format!("{}/documents/", self.api_url);
        let params = [
            ("query", query.to_string()),
            ("page_size", limit.to_string()),
            ("ordering", "-score".to_string()),
        ];

        let page: Option<Page<RawSearchResult>> = self.get_json(&url, &params).await?;
        let hits: Vec<SearchHit> = page
            .map(|page| page.results)
            .unwrap_or_default()
            .into_iter()
            .take(limit)
            .map(|raw| into_search_hit(&self.api_url, raw))
            .collect();

        info!(found = hits.len(), "paperless search finished");
        Ok(hits)
    }

    async fn enumerate_all_ids(&self) -> GatewayResult<Vec<DocumentId>> {
        let params = vec![
            ("page_size", self.page_size.to_string()),
            ("fields", "id".to_string()),
        ];
        let ids: Vec<IdOnly> = self.collect_pages("/documents/", params).await?;
        Ok(ids.into_iter().map(|doc| doc.id).collect())
    }

    async fn enumerate_all_tags(&self) -> GatewayResult<FxHashMap<DocumentId, String>> {
        let params = vec![("page_size", self.page_size.to_string())];
        let tags: Vec<Tag> = self.collect_pages("/tags/", params).await?;
        info!(count = tags.len(), "tags mapped");
        Ok(tags.into_iter().map(|tag| (tag.id, tag.name)).collect())
    }

    async fn download_binary(&self, id: DocumentId) -> GatewayResult<Option<Vec<u8>>> {
        let url = download_link(&self.api_url, id);
        info!(id, "downloading document");

        let response = self.request(&url).timeout(self.download_timeout).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        info!(id, size = bytes.len(), "download finished");
        Ok(Some(bytes.to_vec()))
    }
}
