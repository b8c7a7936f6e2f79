//! `policybot serve` — Start the HTTP chat server.

use std::path::Path;

use policybot_config::AppConfig;

pub async fn run(
    config_path: Option<&Path>,
    port_override: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config =
        AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;

    if let Some(port) = port_override {
        config.gateway.port = port;
    }
    tracing::debug!(config = ?config, "Configuration loaded");

    println!("📜 policybot gateway");
    println!("   Listening: {}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:     {}", config.llm.model);
    println!(
        "   Retrieval: {} ({}, top {})",
        config.retrieval.endpoint,
        config.retrieval.mode.as_str(),
        config.retrieval.chunk_top_k
    );

    policybot_gateway::start(config).await?;

    Ok(())
}
