//! `ragchat chat`: Interactive or single-message chat over loaded documents.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ragchat_agent::{
    ChatSession, DeterministicSummarizer, LlmSummarizer, ReplyKind, Summarizer, TurnReply,
};
use ragchat_config::AppConfig;
use ragchat_core::retriever::Retriever;
use ragchat_providers::{ProviderDispatch, ProviderKind};
use ragchat_retrieval::{DocumentStore, Embedder, HashingEmbedder, ProviderEmbedder};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};

pub async fn run(
    message: Option<String>,
    provider: Option<String>,
    docs: Vec<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let provider = provider.unwrap_or_else(|| config.default_provider.clone());
    let dispatch = Arc::new(ProviderDispatch::new(config.clone()));

    // Fail fast on an unknown provider or a missing key
    let resolved = dispatch.resolve(&provider).map_err(|e| e.to_string())?;

    let store = DocumentStore::from_config(&config.retrieval, embedder_for(&config, &dispatch));
    for path in &docs {
        load_document(&store, path).await;
    }

    let summarizer = summarizer_for(&config, &dispatch, &provider);
    let retriever: Arc<dyn Retriever> = Arc::new(store.clone());
    let mut session = ChatSession::from_config(&config, retriever, dispatch, summarizer)?;

    if let Some(msg) = message {
        // Single message mode
        let reply = session.ask(&msg, &provider).await;
        print!("{}", render_reply(&reply));
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        RagChat — Chat With Your Documents    ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:   {}", resolved.kind);
    println!("  Model:      {}", resolved.model);
    println!("  Embedder:   {}", store.embedder_name());
    println!(
        "  Documents:  {} ({} chunks)",
        store.list_documents().await.len(),
        store.chunk_count().await
    );
    println!();
    println!("  Commands: /add <file>, /remove <id>, /docs, /clear, exit");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"  You > ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match ChatCommand::parse(&line) {
            ChatCommand::Empty => continue,
            ChatCommand::Exit => break,
            ChatCommand::Clear => {
                session.clear();
                println!("  History cleared.\n");
            }
            ChatCommand::Docs => {
                let documents = store.list_documents().await;
                if documents.is_empty() {
                    println!("  No documents loaded.\n");
                }
                for doc in documents {
                    println!(
                        "  {}  {}  ({} chunks, added {})",
                        doc.id,
                        doc.name,
                        doc.chunk_count,
                        doc.added_at.format("%Y-%m-%d %H:%M")
                    );
                }
                println!();
            }
            ChatCommand::Add(path) => {
                load_document(&store, Path::new(&path)).await;
                println!();
            }
            ChatCommand::Remove(id) => {
                match store.delete_document(&id).await {
                    Ok(doc) => println!("  Removed {} ({} chunks).\n", doc.name, doc.chunk_count),
                    Err(e) => println!("  {e}\n"),
                }
            }
            ChatCommand::Ask(question) => {
                eprint!("  ...");
                let reply = session.ask(&question, &provider).await;
                eprint!("\r     \r");
                println!();
                print!("{}", render_reply(&reply));
                println!();
            }
        }
    }

    println!("  Goodbye!");
    Ok(())
}

/// One line of interactive input.
#[derive(Debug, PartialEq)]
enum ChatCommand {
    Empty,
    Exit,
    Clear,
    Docs,
    Add(String),
    Remove(String),
    Ask(String),
}

impl ChatCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        match line.to_lowercase().as_str() {
            "exit" | "quit" | "/exit" | "/quit" => return Self::Exit,
            "/clear" => return Self::Clear,
            "/docs" => return Self::Docs,
            _ => {}
        }
        if let Some(path) = line.strip_prefix("/add ") {
            return Self::Add(path.trim().to_string());
        }
        if let Some(id) = line.strip_prefix("/remove ") {
            return Self::Remove(id.trim().to_string());
        }
        Self::Ask(line.to_string())
    }
}

async fn load_document(store: &DocumentStore, path: &Path) {
    match store.add_file(path).await {
        Ok(doc) => {
            info!(id = %doc.id, chunks = doc.chunk_count, "Document loaded");
            println!("  📄 Loaded {} ({} chunks, id {})", doc.name, doc.chunk_count, doc.id);
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Document load failed");
            eprintln!("  ❌ {}: {e}", path.display());
        }
    }
}

/// OpenAI embeddings when an OpenAI key is available, otherwise offline hashing.
fn embedder_for(config: &AppConfig, dispatch: &ProviderDispatch) -> Arc<dyn Embedder> {
    if dispatch.is_configured(ProviderKind::OpenAi) {
        match dispatch.resolve(ProviderKind::OpenAi.id()) {
            Ok(resolved) => {
                return Arc::new(ProviderEmbedder::new(
                    resolved.provider,
                    config.retrieval.embedding_model.clone(),
                ));
            }
            Err(e) => warn!(error = %e, "OpenAI embeddings unavailable"),
        }
    }
    Arc::new(HashingEmbedder::default())
}

/// LLM summaries from the configured (or chat) provider, else the deterministic digest.
fn summarizer_for(
    config: &AppConfig,
    dispatch: &ProviderDispatch,
    chat_provider: &str,
) -> Arc<dyn Summarizer> {
    if !config.summarizer.enabled {
        return Arc::new(DeterministicSummarizer);
    }
    let name = config
        .summarizer
        .provider
        .as_deref()
        .unwrap_or(chat_provider);
    match dispatch.resolve(name) {
        Ok(mut resolved) => {
            if let Some(model) = &config.summarizer.model {
                resolved.model = model.clone();
            }
            Arc::new(LlmSummarizer::new(resolved))
        }
        Err(e) => {
            warn!(error = %e, "Summarization provider unavailable");
            Arc::new(LlmSummarizer::unavailable())
        }
    }
}

fn render_reply(reply: &TurnReply) -> String {
    let mut out = String::new();
    let prefix = match reply.kind {
        ReplyKind::Answer | ReplyKind::Refused => "  Assistant > ",
        ReplyKind::Failed => "  ⚠️  ",
    };
    for (i, line) in reply.text.lines().enumerate() {
        if i == 0 {
            out.push_str(prefix);
        } else {
            out.push_str("  ");
        }
        out.push_str(line);
        out.push('\n');
    }

    if reply.kind == ReplyKind::Answer && !reply.sources.is_empty() {
        let mut sources = reply.sources.clone();
        sources.dedup();
        out.push_str(&format!("  Sources: {}\n", sources.join(", ")));
    }
    if let Some(meta) = reply.metadata.as_ref().filter(|m| !m.steps.is_empty()) {
        out.push_str(&format!(
            "  (context trimmed to fit: {}/{} tokens, {} step(s))\n",
            meta.total_tokens,
            meta.budget,
            meta.steps.len()
        ));
    }
    out
}
