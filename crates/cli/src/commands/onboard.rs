//! `ragchat onboard`: First-time setup.

use ragchat_config::AppConfig;
use ragchat_providers::ProviderKind;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("📚 RagChat — First-Time Setup");
    println!("=============================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Set an API key for at least one provider:");
    for kind in ProviderKind::ALL {
        println!("        {:<18} ({})", kind.api_key_env(), kind.display_name());
    }
    println!("   2. Run: ragchat chat -d notes.md");
    println!("   3. Ask questions about your documents.\n");

    Ok(())
}
