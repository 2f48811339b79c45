//! `ragchat doctor`: Diagnose configuration and API keys.

use ragchat_agent::TokenCounter;
use ragchat_config::AppConfig;
use ragchat_providers::{ProviderDispatch, ProviderKind};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 RagChat Doctor — System Diagnostics");
    println!("======================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    let config = if config_path.exists() {
        match AppConfig::load() {
            Ok(config) => {
                println!("  ✅ Config file valid");
                config
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                return Ok(());
            }
        }
    } else {
        println!("  ⚠️  No config file, using defaults — run `ragchat onboard`");
        issues += 1;
        AppConfig::default()
    };

    let dispatch = ProviderDispatch::new(config);
    let default = dispatch.config().default_provider.clone();
    match dispatch.resolve(&default) {
        Ok(resolved) => println!(
            "  ✅ Default provider {} ready (model {})",
            resolved.kind, resolved.model
        ),
        Err(e) => {
            println!("  ❌ Default provider: {e}");
            issues += 1;
        }
    }

    let configured: Vec<&str> = ProviderKind::ALL
        .iter()
        .filter(|k| dispatch.is_configured(**k))
        .map(|k| k.id())
        .collect();
    if configured.is_empty() {
        println!("  ❌ No provider has an API key");
        issues += 1;
    } else {
        println!("  ✅ API keys found for: {}", configured.join(", "));
    }

    if dispatch.is_configured(ProviderKind::OpenAi) {
        println!(
            "  ✅ Embeddings: {} via OpenAI",
            dispatch.config().retrieval.embedding_model
        );
    } else {
        println!("  ⚠️  Embeddings: offline hashing (set OPENAI_API_KEY for semantic search)");
    }

    if TokenCounter::cl100k().is_exact() {
        println!("  ✅ Token counting: cl100k_base");
    } else {
        println!("  ⚠️  Token counting: character heuristic");
        issues += 1;
    }

    let memory = &dispatch.config().memory;
    println!(
        "  ℹ️  Budget: {} tokens, {} recent turns, summarize at {:.0}%, question limit {:.0}%",
        memory.token_limit,
        memory.recent_messages_limit,
        memory.summarize_threshold * 100.0,
        memory.question_threshold * 100.0
    );

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
