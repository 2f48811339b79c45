//! End-to-end tests for the RagChat pipeline.
//!
//! These exercise the full path from a question to a reply: document
//! ingestion, retrieval, context assembly, provider dispatch, and history.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use ragchat_agent::{
    BudgetConfig, ChatSession, ContextAssembler, DeterministicSummarizer, NOT_ENOUGH_INFORMATION,
    ReplyKind, SessionSettings, TokenCounter,
};
use ragchat_config::{AppConfig, ProviderConfig};
use ragchat_core::error::ProviderError;
use ragchat_core::message::{Role, Turn};
use ragchat_core::provider::{Provider, ProviderRequest, ProviderResponse};
use ragchat_providers::{ProviderDispatch, ProviderKind};
use ragchat_retrieval::{DocumentStore, HashingEmbedder};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWNERSHIP_DOC: &str = "Rust ownership: every value has exactly one owner.";
const OWNERSHIP_QUESTION: &str = "Rust ownership, every value has exactly one owner?";

// ── Mock Provider ────────────────────────────────────────────────────────

/// Answers every request with a numbered reply and records the prompts.
struct EchoProvider {
    calls: AtomicUsize,
    answer_len: usize,
    requests: Mutex<Vec<ProviderRequest>>,
}

impl EchoProvider {
    fn new(answer_len: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            answer_len,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Provider for EchoProvider {
    fn name(&self) -> &str {
        "e2e_echo"
    }

    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        Ok(ProviderResponse {
            message: Turn::assistant(format!("Answer {n}: {}", "x".repeat(self.answer_len))),
            usage: None,
            model,
        })
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────

async fn store_with_docs() -> DocumentStore {
    let store = DocumentStore::new(Arc::new(HashingEmbedder::default()), 1000, 100);
    store.add_document("rust.md", OWNERSHIP_DOC).await.unwrap();
    store
        .add_document("france.md", "Paris is the capital city of France.")
        .await
        .unwrap();
    store
}

fn session(store: DocumentStore, provider: Arc<EchoProvider>, budget: BudgetConfig) -> ChatSession {
    let mut dispatch = ProviderDispatch::new(AppConfig::default());
    dispatch.register(ProviderKind::Groq, provider);
    let assembler = ContextAssembler::new(
        budget,
        TokenCounter::heuristic(),
        Arc::new(DeterministicSummarizer),
    );
    ChatSession::new(
        assembler,
        Arc::new(store),
        Arc::new(dispatch),
        SessionSettings {
            n_results: 2,
            max_distance: 0.7,
            system_prompt: ragchat_agent::DEFAULT_SYSTEM_PROMPT.into(),
        },
    )
}

// ── Tests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn question_is_answered_from_documents() {
    let provider = Arc::new(EchoProvider::new(10));
    let mut chat = session(store_with_docs().await, provider.clone(), BudgetConfig::default());

    let reply = chat.ask(OWNERSHIP_QUESTION, "groq").await;
    assert_eq!(reply.kind, ReplyKind::Answer);
    assert!(reply.text.starts_with("Answer 0:"));
    assert_eq!(reply.sources.first().map(String::as_str), Some("rust.md"));

    let requests = provider.requests.lock().unwrap();
    let prompt = &requests[0].messages;
    assert_eq!(prompt[0].role, Role::System);
    let user = &prompt.last().unwrap().content;
    assert!(user.contains(&format!("[Source: rust.md] {OWNERSHIP_DOC}")));
    assert!(user.contains(&format!("Question: {OWNERSHIP_QUESTION}")));
    assert_eq!(chat.history().len(), 2);
}

#[tokio::test]
async fn empty_store_refuses_without_llm() {
    let provider = Arc::new(EchoProvider::new(10));
    let store = DocumentStore::new(Arc::new(HashingEmbedder::default()), 1000, 100);
    let mut chat = session(store, provider.clone(), BudgetConfig::default());

    let reply = chat.ask("What is ownership?", "groq").await;
    assert_eq!(reply.kind, ReplyKind::Refused);
    assert_eq!(reply.text, NOT_ENOUGH_INFORMATION);
    assert_eq!(provider.calls(), 0);
    assert!(chat.history().is_empty());
}

#[tokio::test]
async fn deleted_document_is_no_longer_retrieved() {
    let provider = Arc::new(EchoProvider::new(10));
    let store = store_with_docs().await;
    let rust_id = store
        .list_documents()
        .await
        .into_iter()
        .find(|d| d.name == "rust.md")
        .unwrap()
        .id;
    store.delete_document(&rust_id).await.unwrap();

    let mut chat = session(store, provider.clone(), BudgetConfig::default());
    let reply = chat.ask(OWNERSHIP_QUESTION, "groq").await;
    assert_eq!(reply.text, NOT_ENOUGH_INFORMATION);
    assert_eq!(provider.calls(), 0);
}

#[tokio::test]
async fn long_conversation_stays_within_budget() {
    let provider = Arc::new(EchoProvider::new(200));
    let budget = BudgetConfig::new(1500, 3, 0.7, 0.2).unwrap();
    let mut chat = session(store_with_docs().await, provider.clone(), budget);

    let mut answered = 0;
    for _ in 0..12 {
        let reply = chat.ask(OWNERSHIP_QUESTION, "groq").await;
        assert_ne!(reply.kind, ReplyKind::Failed);
        if let Some(meta) = &reply.metadata {
            assert!(meta.total_tokens <= meta.budget);
        }
        if reply.kind == ReplyKind::Answer {
            answered += 1;
        }
    }

    assert!(answered > 0);
    assert_eq!(chat.history().len(), answered * 2);
    assert_eq!(provider.calls(), answered);

    // Once the history is long, prompts carry exactly one summary.
    let requests = provider.requests.lock().unwrap();
    let last = &requests.last().unwrap().messages;
    assert!(last.iter().filter(|t| t.is_summary()).count() <= 1);
}

#[tokio::test]
async fn clear_starts_a_fresh_conversation() {
    let provider = Arc::new(EchoProvider::new(10));
    let mut chat = session(store_with_docs().await, provider.clone(), BudgetConfig::default());

    chat.ask(OWNERSHIP_QUESTION, "groq").await;
    chat.clear();
    chat.ask(OWNERSHIP_QUESTION, "groq").await;

    let requests = provider.requests.lock().unwrap();
    assert_eq!(requests[1].messages.len(), 2);
    assert_eq!(chat.history().len(), 2);
}

#[tokio::test]
async fn configured_provider_over_http() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": "llama-3.1-8b-instant",
            "choices": [{"message": {"role": "assistant", "content": "Each value has one owner."}}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = AppConfig::default();
    config.providers.insert(
        "groq".into(),
        ProviderConfig {
            api_key: Some("gsk-test".into()),
            api_url: Some(server.uri()),
            model: None,
        },
    );

    let store = store_with_docs().await;
    let dispatch = Arc::new(ProviderDispatch::new(config.clone()));
    let mut chat = ChatSession::from_config(
        &config,
        Arc::new(store),
        dispatch,
        Arc::new(DeterministicSummarizer),
    )
    .unwrap();

    let reply = chat.ask(OWNERSHIP_QUESTION, "Groq").await;
    assert_eq!(reply.kind, ReplyKind::Answer);
    assert_eq!(reply.text, "Each value has one owner.");

    let received = server.received_requests().await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(body["model"], "llama-3.1-8b-instant");
    assert_eq!(body["messages"][0]["role"], "system");
    assert!(body["messages"][1]["content"]
        .as_str()
        .unwrap()
        .contains("[Source: rust.md]"));
}

#[tokio::test]
async fn provider_error_is_shown_and_history_untouched() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let mut config = AppConfig::default();
    config.providers.insert(
        "deepseek".into(),
        ProviderConfig {
            api_key: Some("sk-test".into()),
            api_url: Some(server.uri()),
            model: None,
        },
    );

    let mut chat = ChatSession::from_config(
        &config,
        Arc::new(store_with_docs().await),
        Arc::new(ProviderDispatch::new(config.clone())),
        Arc::new(DeterministicSummarizer),
    )
    .unwrap();

    let reply = chat.ask(OWNERSHIP_QUESTION, "deepseek").await;
    assert_eq!(reply.kind, ReplyKind::Failed);
    assert!(reply.text.starts_with("Error: Failed to get response from"));
    assert!(chat.history().is_empty());
}
