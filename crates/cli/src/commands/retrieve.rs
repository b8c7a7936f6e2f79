//! `policybot retrieve` — Print the knowledge context for a question.

use std::path::Path;

use policybot_config::AppConfig;

pub async fn run(
    config_path: Option<&Path>,
    query: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let retriever = policybot_retrieval::build_from_config(&config.retrieval);

    println!("{}", retriever.retrieve(query).await);

    Ok(())
}
