use anyhow::Context;

use matchmate::bot::Bot;
use matchmate::config::BotConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = BotConfig::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        eprintln!("  export OPENAI_API_KEY=sk-...");
        std::process::exit(1);
    });

    eprintln!("💘 Matchmate v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.llm.model);
    eprintln!("   Resources: {}", config.resources_dir.display());
    eprintln!("   Type a message and press Enter. @<button> presses a button.\n");

    let bot = Bot::from_config(&config)
        .await
        .with_context(|| format!("assembling bot from {}", config.resources_dir.display()))?;
    eprintln!("   Channels: {}\n", bot.channel_names().join(", "));

    bot.run().await?;

    Ok(())
}
