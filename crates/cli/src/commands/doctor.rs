//! `policybot doctor` — Diagnose configuration and service reachability.

use std::path::Path;

use policybot_agent::PromptTemplates;
use policybot_config::{AppConfig, MissingTemplatePolicy};
use policybot_retrieval::CONNECTION_FAILED;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 policybot doctor");
    println!("===================\n");

    let mut issues = 0;

    let config = match AppConfig::load(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            return Ok(());
        }
    };

    // LLM
    match policybot_providers::build_from_config(&config.llm) {
        Ok(provider) => {
            println!("  ✅ LLM API key configured ({})", provider.name());
            match provider.health_check().await {
                Ok(true) => println!("  ✅ LLM endpoint reachable at {}", config.llm.base_url),
                Ok(false) => {
                    println!(
                        "  ⚠️  LLM endpoint rejected the health check at {}",
                        config.llm.base_url
                    );
                    issues += 1;
                }
                Err(e) => {
                    println!("  ❌ LLM endpoint unreachable: {e}");
                    issues += 1;
                }
            }
        }
        Err(e) => {
            println!("  ❌ {e}");
            issues += 1;
        }
    }

    // Templates
    for path in [&config.templates.system_path, &config.templates.user_path] {
        if path.exists() {
            println!("  ✅ Template found: {}", path.display());
        } else {
            println!("  ⚠️  Template missing: {}", path.display());
            issues += 1;
        }
    }
    let mut templates_config = config.templates.clone();
    templates_config.on_missing = MissingTemplatePolicy::Abort;
    if let Err(e) = PromptTemplates::load(&templates_config) {
        match config.templates.on_missing {
            MissingTemplatePolicy::Fallback => {
                println!("     built-in templates will be used ({e})")
            }
            MissingTemplatePolicy::Abort => println!("     serve will refuse to start ({e})"),
        }
    }

    // Memory
    let memory = policybot_memory::build_from_config(&config.memory);
    match memory.ping().await {
        Ok(true) => println!("  ✅ Memory backend reachable ({})", memory.name()),
        Ok(false) => {
            println!("  ⚠️  Memory backend unhealthy ({})", memory.name());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Memory backend unreachable ({}): {e}", memory.name());
            issues += 1;
        }
    }
    if memory.name() == "none" && config.memory.backend == "memobase" {
        println!("     set MEMOBASE_API_KEY and MEMOBASE_USER_ID to enable Memobase");
    }

    // Retrieval
    let retriever = policybot_retrieval::build_from_config(&config.retrieval);
    if retriever.retrieve("健康检查").await == CONNECTION_FAILED {
        println!("  ❌ Knowledge base unreachable at {}", config.retrieval.endpoint);
        issues += 1;
    } else {
        println!("  ✅ Knowledge base reachable at {}", config.retrieval.endpoint);
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
