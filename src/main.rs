use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use paperless_rag::embeddings::OllamaEmbedder;
use paperless_rag::paperless::{DocumentId, download_link};
use paperless_rag::prompts::{PromptTemplate, PromptVariables};
use paperless_rag::retriever::UNTITLED;
use paperless_rag::utils::format_percentage;
use paperless_rag::{
    DocumentStore, GeminiClient, LanguageModel, PaperlessClient, PgVectorIndex, Question,
    RagPipeline, RunOutcome, load_config,
};

const SEARCH_LIMIT: usize = 5;

#[derive(Debug, PartialEq)]
enum Command {
    Ask(String),
    Search(String),
    Terms(String),
    Tags,
    Count,
    Download { id: DocumentId, path: PathBuf },
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Result<Command> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(Command::Ask(line.to_string()));
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match name {
            "search" if !args.is_empty() => Ok(Command::Search(args.to_string())),
            "terms" if !args.is_empty() => Ok(Command::Terms(args.to_string())),
            "tags" => Ok(Command::Tags),
            "count" => Ok(Command::Count),
            "download" => {
                let mut parts = args.split_whitespace();
                let id = parts
                    .next()
                    .ok_or_else(|| anyhow!("uso: /download <id> <caminho>"))?
                    .parse::<DocumentId>()
                    .context("o id do documento deve ser um número")?;
                let path = parts
                    .next()
                    .ok_or_else(|| anyhow!("uso: /download <id> <caminho>"))?;
                Ok(Command::Download {
                    id,
                    path: PathBuf::from(path),
                })
            }
            "help" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            _ => Err(anyhow!("comando desconhecido '/{}', tente /help", name)),
        }
    }
}

struct App {
    config: paperless_rag::Config,
    store: Arc<PaperlessClient>,
    llm: Arc<GeminiClient>,
    pipeline: RagPipeline,
}

impl App {
    async fn handle(&self, command: Command) -> Result<()> {
        match command {
            Command::Ask(text) => {
                let question = match Question::parse(&text, self.config.pipeline.min_question_chars)
                {
                    Ok(question) => question,
                    Err(e) => {
                        println!("⚠️ Por favor, faça uma pergunta mais específica ({e}).\n");
                        return Ok(());
                    }
                };

                print!("\n🔍 Buscando nos documentos e preparando resposta...");
                std::io::stdout().flush()?;
                let outcome = self.pipeline.run(&question).await;
                println!("\r{}", render_outcome(&outcome, self.store.api_url()));
            }
            Command::Search(terms) => {
                let hits = self.store.search(&terms, SEARCH_LIMIT).await?;
                if hits.is_empty() {
                    println!("Nenhum documento encontrado para '{terms}'.\n");
                }
                for (i, hit) in hits.iter().enumerate() {
                    let title = hit.document.title.as_deref().unwrap_or(UNTITLED);
                    println!("{}. {}\n   {}", i + 1, title, hit.link);
                    for line in hit.highlights.lines().take(3) {
                        println!("   | {line}");
                    }
                }
                println!();
            }
            Command::Terms(text) => {
                let mut variables = PromptVariables::new();
                variables.insert("question", text);
                let terms = self
                    .llm
                    .complete(PromptTemplate::QueryTransform, &variables)
                    .await?;
                println!("{}\n", terms.trim());
            }
            Command::Tags => {
                let tags = self.store.enumerate_all_tags().await?;
                let mut tags: Vec<_> = tags.into_iter().collect();
                tags.sort_by(|a, b| a.1.cmp(&b.1));
                for (id, name) in &tags {
                    println!("{id:>5}  {name}");
                }
                println!("{} tags\n", tags.len());
            }
            Command::Count => {
                let ids = self.store.enumerate_all_ids().await?;
                println!("{} documentos no acervo\n", ids.len());
            }
            Command::Download { id, path } => match self.store.download_binary(id).await? {
                Some(bytes) => {
                    tokio::fs::write(&path, &bytes)
                        .await
                        .with_context(|| format!("falha ao gravar {}", path.display()))?;
                    println!("{} bytes salvos em {}\n", bytes.len(), path.display());
                }
                None => println!("Documento {id} não encontrado.\n"),
            },
            Command::Help => print_help(),
            Command::Quit => {}
        }
        Ok(())
    }
}

fn render_outcome(outcome: &RunOutcome, api_url: &str) -> String {
    let mut out = format!("{}\n", outcome.generation);

    if !outcome.documents.is_empty() {
        out.push_str("\nFontes:\n");
        for (i, doc) in outcome.documents.iter().enumerate() {
            out.push_str(&format!(
                "{}. [{}]({}) - Relevância: {}\n   📄 Baixar: {}\n",
                i + 1,
                doc.title,
                doc.link,
                format_percentage(doc.score),
                download_link(api_url, doc.id)
            ));
        }
    }

    if let Some(error) = &outcome.error {
        out.push_str(&format!("\n⚠️ Aviso: {error}\n"));
    }
    out
}

fn print_help() {
    println!(
        "Faça uma pergunta, ou use:\n  \
         /search <termos>         busca textual no acervo\n  \
         /terms <pergunta>        mostra os termos de busca otimizados\n  \
         /tags                    lista as tags\n  \
         /count                   conta os documentos\n  \
         /download <id> <caminho> salva um documento\n  \
         /quit                    sair\n"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("paperless_rag=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Optional explicit config file
    let config_path = env::args().nth(1).map(PathBuf::from);
    let config = load_config(config_path.as_deref())?;
    config.validate()?;

    let store = Arc::new(PaperlessClient::new(&config.paperless)?);
    let embedder = Arc::new(OllamaEmbedder::new(&config.embeddings)?);
    let index = Arc::new(PgVectorIndex::connect_lazy(
        &config.database,
        embedder,
        store.api_url(),
    )?);
    let llm = Arc::new(GeminiClient::new(config.llm.clone())?);
    let pipeline = RagPipeline::new(index, store.clone(), llm.clone(), &config.pipeline);

    let app = App {
        config,
        store,
        llm,
        pipeline,
    };

    println!(
        "⚖️ Assistente de Documentos Legais pronto! Pergunte sobre os documentos (/help para comandos, Ctrl+D para sair)"
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break; // EOF (Ctrl+D)
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                eprintln!("Erro: {e}\n");
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }

        if let Err(e) = app.handle(command).await {
            eprintln!("\rErro: {e:#}\n");
        }
    }

    Ok(())
}
