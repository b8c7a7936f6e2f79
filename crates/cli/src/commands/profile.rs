//! `policybot profile` — Show the user profile the assistant will see.

use std::path::Path;

use policybot_agent::context::{extract_profile, format_profile};
use policybot_config::AppConfig;

pub async fn run(config_path: Option<&Path>, raw: bool) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let memory = policybot_memory::build_from_config(&config.memory);

    let document = memory
        .fetch_profile()
        .await
        .map_err(|e| format!("Failed to fetch profile from {}: {e}", memory.name()))?;

    if raw {
        println!("{}", serde_json::to_string_pretty(&document)?);
        return Ok(());
    }

    let profile = extract_profile(&document);
    println!("{}", format_profile(&profile));

    Ok(())
}
