//! Prompt templates sent to the language model.
//!
//! Templates use `{name}` placeholders. Rendering is a single pass, so text
//! substituted into a placeholder is never expanded again.

use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use crate::error::{GatewayError, GatewayResult};

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([a-z_]+)\}").unwrap();
}

pub type PromptVariables = BTreeMap<&'static str, String>;

const QUERY_TRANSFORM: &str = r#"Você é um especialista em otimização de buscas. Sua tarefa é extrair APENAS os 3-5 TERMOS MAIS IMPORTANTES de uma pergunta para busca em documentos.

REGRAS CRÍTICAS:
1. Extraia APENAS 3-5 termos essenciais (no máximo 5!)
2. Priorize: nomes próprios, conceitos-chave, termos técnicos
3. REMOVA: palavras comuns, artigos, preposições, verbos auxiliares
4. Se houver expressão técnica/nome próprio, mantenha completa (ex: "Tarifa Zero", "IPTU")
5. Prefira termos que REALMENTE aparecem em documentos formais

ESTRATÉGIA:
- Identifique o CONCEITO PRINCIPAL da pergunta
- Adicione 1-2 sinônimos OU termos de contexto direto
- PARE! Não adicione mais nada

EXEMPLOS:

Pergunta: "O que é a Tarifa Zero?"
Query: Tarifa Zero transporte gratuito

Pergunta: "Quais são os procedimentos do regime jurídico das parcerias?"
Query: regime jurídico parcerias procedimentos

Pergunta: "Como funciona a cobrança de IPTU?"
Query: IPTU cobrança imposto predial

Pergunta: "Quais os tributos de competência municipal?"
Query: tributos municipais competência

Pergunta: "O que diz a lei sobre licitações?"
Query: licitações lei processo licitatório

AGORA É SUA VEZ:
Pergunta: "{question}"

Query otimizada (APENAS 3-5 termos essenciais, separados por espaço):"#;

const RELEVANCE_RANKING: &str = r#"Você é um especialista em análise de relevância. Sua tarefa é analisar uma lista de documentos, determinar quais são relevantes para responder a uma pergunta e rankeá-los.

PERGUNTA DO USUÁRIO:
{question}

DOCUMENTOS DISPONÍVEIS:
{context}

INSTRUÇÕES:
1. Leia a pergunta e o conteúdo de cada documento.
2. Determine quais documentos são **realmente úteis** para formular uma resposta completa.
3. Retorne uma lista JSON com os **números** dos documentos relevantes, ordenados do **mais importante para o menos importante**.

REGRAS DE SAÍDA:
- Sua resposta deve ser APENAS a lista de números. Exemplo: `[3, 1]`
- Se o Documento 3 for o mais relevante e o Documento 1 o segundo mais relevante, sua resposta será `[3, 1]`.
- Se nenhum documento for relevante, retorne uma lista vazia: `[]`

LISTA DE RELEVÂNCIA (APENAS NÚMEROS):"#;

const GENERATION: &str = r#"Você é um assistente jurídico especializado em legislação e documentos administrativos brasileiros.
Sua missão é fornecer respostas COMPLETAS, DETALHADAS e BEM FUNDAMENTADAS usando EXCLUSIVAMENTE os documentos fornecidos.

INSTRUÇÕES CRÍTICAS:

1. **LEIA TODO O CONTEÚDO DOS DOCUMENTOS** antes de responder
   - Não resuma demais, use todas as informações relevantes disponíveis
   - Extraia TODOS os detalhes pertinentes à pergunta

2. **ESTRUTURE A RESPOSTA DE FORMA COMPLETA:**
   - Comece com uma introdução clara do que foi encontrado
   - Desenvolva todos os pontos importantes com detalhes
   - Se houver artigos, incisos, parágrafos: CITE-OS NA ÍNTEGRA ou resuma seu conteúdo
   - Se houver listas, procedimentos, requisitos: ENUMERE TODOS
   - Se houver definições: TRANSCREVA ou parafraseie completamente

3. **CITAÇÕES OBRIGATÓRIAS:**
   - Cite a fonte após CADA informação importante: [Nome do Documento](link)
   - Use citações diretas quando o texto legal for relevante

4. **CITAÇÃO DA BASE TEXTUAL:**
   - Ao final de cada parágrafo ou seção que resume uma informação, inclua um bloco de citação com o trecho exato do documento que serviu de base.
   - Formate assim:
     > "Trecho literal do documento que comprova a informação..." [Nome do Documento](link)

5. **FORMATAÇÃO PARA MÁXIMA CLAREZA:**
   - Use **negrito** para termos-chave e títulos de seções
   - Use listas numeradas para procedimentos/etapas
   - Use bullet points para requisitos/características
   - Use blocos de citação (>) para transcrições literais importantes

6. **COMPLETUDE É ESSENCIAL:**
   - Se o documento tem 10 procedimentos, liste os 10
   - Se há requisitos, prazos, penalidades: inclua TODOS
   - Não diga apenas "o documento menciona X", EXPLIQUE o que o documento diz sobre X

7. **SE NÃO HOUVER INFORMAÇÃO SUFICIENTE:**
   - Seja explícito: "Os documentos mencionam [X], mas não detalham [Y]"
   - Indique o que foi encontrado e o que está ausente

---
DOCUMENTOS PARA VISUALIZAÇÃO (PREVIEW):
{preview_links}
---

DOCUMENTOS DISPONÍVEIS (CONTEÚDO COMPLETO PARA SUA ANÁLISE):
{context}

---
PERGUNTA DO USUÁRIO:
{question}

RESPOSTA DETALHADA E COMPLETA (com todas as citações necessárias):"#;

/// The three prompts the assistant sends to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptTemplate {
    /// Reduces a question to a handful of search terms.
    QueryTransform,
    /// Selects and orders the useful candidates; answers with a list of numbers.
    RelevanceRanking,
    /// Grounded, cited answer over the full document bodies.
    Generation,
}

impl PromptTemplate {
    pub fn id(&self) -> &'static str {
        match self {
            PromptTemplate::QueryTransform => "query_transform",
            PromptTemplate::RelevanceRanking => "relevance_ranking",
            PromptTemplate::Generation => "generation",
        }
    }

    pub fn text(&self) -> &'static str {
        match self {
            PromptTemplate::QueryTransform => QUERY_TRANSFORM,
            PromptTemplate::RelevanceRanking => RELEVANCE_RANKING,
            PromptTemplate::Generation => GENERATION,
        }
    }

    /// JSON schema the model output must follow, for templates whose answer is machine-read.
    pub fn response_schema(&self) -> Option<serde_json::Value> {
        match self {
            PromptTemplate::RelevanceRanking => Some(serde_json::json!({
                "type": "ARRAY",
                "items": { "type": "INTEGER" }
            })),
            _ => None,
        }
    }

    /// Fills every placeholder; a placeholder without a value is an error.
    pub fn render(&self, variables: &PromptVariables) -> GatewayResult<String> {
        let mut missing = Vec::new();
        let rendered = PLACEHOLDER.replace_all(self.text(), |caps: &Captures| {
            let name = &caps[1];
            match variables.get(name) {
                Some(value) => value.clone(),
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            }
        });

        if missing.is_empty() {
            Ok(rendered.into_owned())
        } else {
            Err(GatewayError::Prompt(format!(
                "template '{}' is missing variables: {}",
                self.id(),
                missing.join(", ")
            )))
        }
    }
}
