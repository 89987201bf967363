//! Relevance stage: the model picks and orders the useful candidates.

use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::value::RawValue;
use tracing::{info, warn};

use crate::llm::LanguageModel;
use crate::pipeline::{CandidateDocument, PipelineState};
use crate::prompts::{PromptTemplate, PromptVariables};
use crate::utils::truncate_chars;

lazy_static! {
    static ref CODE_FENCE: Regex = Regex::new(r"(?s)^```[a-zA-Z]*\s*(.*?)\s*```$").unwrap();
}

/// Parses a ranking answer such as `[3, 1]`.
///
/// The text must be a JSON array of integers, optionally wrapped in a code
/// fence or backticks. `None` means the ranking is unusable.
pub fn parse_ranking(raw: &str) -> Option<Vec<i64>> {
    let trimmed = raw.trim();
    let unfenced = match CODE_FENCE.captures(trimmed) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()),
        None => trimmed,
    };
    let candidate = unfenced.trim().trim_matches('`').trim();

    let items: Vec<&RawValue> = serde_json::from_str(candidate).ok()?;
    items.iter().map(|item| integer_literal(item.get())).collect()
}

/// Reads a JSON integer literal. Integers beyond `i64` saturate, which puts
/// them out of range for any document list.
fn integer_literal(literal: &str) -> Option<i64> {
    let literal = literal.trim();
    let negative = literal.starts_with('-');
    let digits = literal.strip_prefix('-').unwrap_or(literal);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    Some(literal.parse::<i64>().unwrap_or(if negative { i64::MIN } else { i64::MAX }))
}

/// Maps 1-based positions onto `documents`; out-of-range positions are
/// dropped and repeated positions repeat the document.
pub fn apply_ranking(documents: &[CandidateDocument], ranking: &[i64]) -> Vec<CandidateDocument> {
    ranking
        .iter()
        .filter_map(|&position| {
            let index = usize::try_from(position).ok()?.checked_sub(1)?;
            documents.get(index).cloned()
        })
        .collect()
}

/// Numbered preview block, one entry per document with usable text.
pub fn build_preview(documents: &[CandidateDocument], max_chars: usize) -> String {
    let mut preview = String::new();
    for (i, doc) in documents.iter().enumerate() {
        let text = doc.preview_text();
        if text.is_empty() {
            continue;
        }
        preview.push_str(&format!(
            "--- DOCUMENTO {} ---\nTítulo: {}\nConteúdo: {}...\n\n",
            i + 1,
            doc.title,
            truncate_chars(text, max_chars)
        ));
    }
    preview
}

pub struct RelevanceRanker {
    llm: Arc<dyn LanguageModel>,
    preview_chars: usize,
}

impl RelevanceRanker {
    pub fn new(llm: Arc<dyn LanguageModel>, preview_chars: usize) -> Self {
        Self { llm, preview_chars }
    }

    /// Filters and reorders `state.documents`. Never sets `state.error`: a
    /// failed or unparsable ranking keeps the documents as they are.
    pub async fn rank(&self, state: &mut PipelineState) {
        info!("checking relevance");
        if state.documents.is_empty() {
            return;
        }

        let mut variables = PromptVariables::new();
        variables.insert("question", state.question().to_string());
        variables.insert(
            "context",
            build_preview(&state.documents, self.preview_chars),
        );

        let answer = match self
            .llm
            .complete(PromptTemplate::RelevanceRanking, &variables)
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!(error = %e, "relevance check failed, keeping documents");
                return;
            }
        };
        info!(ranking = %answer.trim(), "relevance analysis returned");

        let Some(ranking) = parse_ranking(&answer) else {
            warn!("could not decode ranking, keeping original order");
            return;
        };

        if ranking.is_empty() {
            info!("no document considered relevant, discarding all");
            state.documents.clear();
            return;
        }

        let ranked = apply_ranking(&state.documents, &ranking);
        info!(kept = ranked.len(), "documents filtered and reordered");
        state.documents = ranked;
    }
}
