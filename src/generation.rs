use std::sync::Arc;

use tracing::{error, info};

use crate::llm::LanguageModel;
use crate::pipeline::{CandidateDocument, PipelineState};
use crate::prompts::{PromptTemplate, PromptVariables};
use crate::utils::format_percentage;

/// Answer given when no document survives retrieval and ranking.
pub const NO_DOCUMENTS_MESSAGE: &str = "❌ **Não encontrei documentos relevantes no sistema para responder sua pergunta.**\n\n\
💡 **Sugestões:**\n\
- Tente usar termos diferentes ou mais específicos\n\
- Verifique se há documentos sobre esse assunto no Paperless\n\
- Reformule a pergunta de forma mais direta";

/// Answer given when the model call fails.
pub const GENERATION_FAILED_MESSAGE: &str =
    "Desculpe, ocorreu um erro ao processar os documentos.";

/// Prompt material built from the ranked documents.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GenerationContext {
    /// One block per usable document, full text included.
    pub context: String,
    /// `- [title](link)` lines for the same documents.
    pub preview_links: String,
    /// Documents that contributed a block to `context`.
    pub documents_used: usize,
}

/// Builds the context blocks in rank order. Documents without any text are skipped.
pub fn build_context(documents: &[CandidateDocument]) -> GenerationContext {
    let mut context_parts = Vec::new();
    let mut preview_parts = Vec::new();

    for (i, doc) in documents.iter().enumerate() {
        let text = doc.full_text();
        if text.is_empty() {
            continue;
        }

        let score_info = if doc.score > 0.0 {
            format!("Relevância: {}", format_percentage(doc.score))
        } else {
            String::new()
        };

        context_parts.push(format!(
            "=== DOCUMENTO {} ===\nTítulo: {}\nLink: {}\n{}\nConteúdo COMPLETO:\n{}\n",
            i + 1,
            doc.title,
            doc.link,
            score_info,
            text
        ));
        info!(
            position = i + 1,
            title = %doc.title,
            chars = text.chars().count(),
            "document added to context"
        );

        preview_parts.push(format!("- [{}]({})", doc.title, doc.link));
    }

    GenerationContext {
        documents_used: context_parts.len(),
        context: context_parts.join("\n\n"),
        preview_links: preview_parts.join("\n"),
    }
}

pub struct Generator {
    llm: Arc<dyn LanguageModel>,
}

impl Generator {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    /// Sets `state.generation`, and `state.error` when the model call fails.
    pub async fn generate(&self, state: &mut PipelineState) {
        info!("generating answer");

        if state.documents.is_empty() {
            state.generation = Some(NO_DOCUMENTS_MESSAGE.to_string());
            return;
        }

        let built = build_context(&state.documents);
        let total_chars = built.context.chars().count();
        info!(
            total_chars,
            documents = state.documents.len(),
            documents_used = built.documents_used,
            avg_chars_per_document = total_chars / state.documents.len(),
            estimated_tokens = total_chars / 4,
            "context statistics"
        );

        let mut variables = PromptVariables::new();
        variables.insert("context", built.context);
        variables.insert("question", state.question().to_string());
        variables.insert("preview_links", built.preview_links);

        match self.llm.complete(PromptTemplate::Generation, &variables).await {
            Ok(answer) => {
                info!(chars = answer.chars().count(), "answer generated");
                state.generation = Some(answer);
            }
            Err(e) => {
                error!(error = %e, "generation failed");
                state.generation = Some(GENERATION_FAILED_MESSAGE.to_string());
                state.error = Some(e.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::pipeline::Question;
    use crate::testing::{FakeLlm, candidate};

    fn state_with(documents: Vec<CandidateDocument>) -> PipelineState {
        let question = Question::parse("What are the penalties?", 3).unwrap();
        let mut state = PipelineState::new(&question);
        state.documents = documents;
        state
    }

    #[test]
    fn test_build_context_blocks() {
        let mut first = candidate(7, "Código Tributário", "Art. 1º O imposto é anual.");
        first.link = "https://docs/api/documents/7/preview/".to_string();
        first.score = 0.91;
        let mut second = candidate(8, "Decreto", "");
        second.highlights = "apenas trecho".to_string();

        let built = build_context(&[first, second]);

        assert_eq!(built.documents_used, 2);
        assert_eq!(
            built.context,
            "=== DOCUMENTO 1 ===\nTítulo: Código Tributário\nLink: https://docs/api/documents/7/preview/\n\
             Relevância: 91.00%\nConteúdo COMPLETO:\nArt. 1º O imposto é anual.\n\n\n\
             === DOCUMENTO 2 ===\nTítulo: Decreto\nLink: link-8\n\nConteúdo COMPLETO:\napenas trecho\n"
        );
        assert_eq!(
            built.preview_links,
            "- [Código Tributário](https://docs/api/documents/7/preview/)\n- [Decreto](link-8)"
        );
    }

    #[test]
    fn test_build_context_skips_empty_documents() {
        let built = build_context(&[candidate(1, "Empty", ""), candidate(2, "Full", "text")]);
        assert_eq!(built.documents_used, 1);
        assert!(built.context.starts_with("=== DOCUMENTO 2 ==="));
        assert_eq!(built.preview_links, "- [Full](link-2)");
    }

    #[tokio::test]
    async fn test_no_documents_message_without_model_call() {
        let llm = Arc::new(FakeLlm::grounded("[1]"));
        let generator = Generator::new(llm.clone());
        let mut state = state_with(Vec::new());

        generator.generate(&mut state).await;

        assert_eq!(state.generation.as_deref(), Some(NO_DOCUMENTS_MESSAGE));
        assert!(NO_DOCUMENTS_MESSAGE.starts_with("❌ **Não encontrei documentos relevantes"));
        assert_eq!(state.error, None);
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_full_content_is_forwarded() {
        let llm = Arc::new(FakeLlm::grounded("[1]"));
        let generator = Generator::new(llm.clone());
        let body = "a".repeat(50_000);
        let mut state = state_with(vec![candidate(1, "Long Law", &body)]);

        generator.generate(&mut state).await;

        let calls = llm.calls();
        assert_eq!(calls.len(), 1);
        let (template, variables) = &calls[0];
        assert_eq!(*template, PromptTemplate::Generation);
        assert!(variables["context"].contains(&body));
        assert_eq!(variables["question"], "What are the penalties?");
        assert_eq!(variables["preview_links"], "- [Long Law](link-1)");
    }

    #[tokio::test]
    async fn test_answer_is_returned_verbatim() {
        let raw = "  **Answer** with <b>markup</b>\n\n> \"quote\"  ";
        let generator = Generator::new(Arc::new(FakeLlm::new(move |_, _| Ok(raw.to_string()))));
        let mut state = state_with(vec![candidate(1, "Doc", "text")]);

        generator.generate(&mut state).await;

        assert_eq!(state.generation.as_deref(), Some(raw));
        assert_eq!(state.error, None);
    }

    #[tokio::test]
    async fn test_failure_sets_apology_and_error() {
        let generator = Generator::new(Arc::new(FakeLlm::new(|_, _| {
            Err(GatewayError::EmptyResponse)
        })));
        let mut state = state_with(vec![candidate(1, "Doc", "text")]);

        generator.generate(&mut state).await;

        assert_eq!(state.generation.as_deref(), Some(GENERATION_FAILED_MESSAGE));
        assert_eq!(state.error.as_deref(), Some("model returned no text"));
        assert_eq!(state.documents.len(), 1);
    }
}
