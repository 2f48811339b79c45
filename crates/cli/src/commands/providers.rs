//! `ragchat providers`: List supported LLM providers.

use ragchat_config::AppConfig;
use ragchat_providers::{ProviderDispatch, ProviderKind};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let dispatch = ProviderDispatch::new(config);

    println!("🤖 Supported LLM Providers");
    println!("==========================\n");
    print!("{}", render_table(&dispatch));
    println!();
    println!("  Override the model per provider in config.toml:");
    println!("    [providers.groq]");
    println!("    model = \"llama-3.1-70b-versatile\"");
    println!();
    println!("  Environment variables:");
    println!("    RAGCHAT_PROVIDER, RAGCHAT_MODEL");

    Ok(())
}

fn render_table(dispatch: &ProviderDispatch) -> String {
    let default = dispatch.config().default_provider.to_lowercase();
    let mut out = format!(
        "  {:<10} {:<26} {:<18} {}\n",
        "ID", "MODEL", "KEY", "STATUS"
    );
    for kind in ProviderKind::ALL {
        let status = if dispatch.is_configured(kind) {
            "ready"
        } else {
            "no key"
        };
        let marker = if kind.id() == default { " (default)" } else { "" };
        out.push_str(&format!(
            "  {:<10} {:<26} {:<18} {}{}\n",
            kind.id(),
            dispatch.model_for(kind),
            kind.api_key_env(),
            status,
            marker
        ));
    }
    out
}
