//! Backend and candidate model status

use anyhow::Result;
use tally_core::model_router::ConfigSource;
use tally_core::{CandidateConfig, ModelInvoker, TaskType};

/// Show the active backend, candidate lists and which candidates the backend advertises
pub async fn cmd_models<I: ModelInvoker>(config: &CandidateConfig, invoker: &I) -> Result<()> {
    let info = invoker.info();

    println!();
    println!("🤖 Model Backend");
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   Backend:    {}", info.backend);
    println!("   Host:       {}", info.host);
    println!(
        "   Credential: {}",
        if info.has_credential { "✓ set" } else { "✗ missing" }
    );

    let healthy = invoker.health_check().await;
    if healthy {
        println!("   Status:     ✅ reachable");
    } else {
        println!("   Status:     ❌ unreachable");
    }

    let advertised = if healthy {
        match invoker.list_models().await {
            Ok(models) => Some(models),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list models");
                None
            }
        }
    } else {
        None
    };

    println!();
    match &config.source {
        ConfigSource::Embedded => println!("   Config: built-in defaults"),
        ConfigSource::File(path) => println!("   Config: {}", path.display()),
    }
    if config.env_override.is_some() {
        println!("   (candidate lists overridden by TALLY_MODELS)");
    }

    for task in TaskType::all() {
        println!();
        println!(
            "   {} (timeout {}s)",
            task.as_str(),
            config.timeout_for(*task).as_secs()
        );
        for (i, model) in config.candidates_for(*task).iter().enumerate() {
            let mark = match &advertised {
                Some(models) if models.iter().any(|m| m == model) => "✓",
                Some(_) => "✗",
                None => "?",
            };
            println!("     {}. {} {}", i + 1, mark, model);
        }
    }

    if !healthy {
        println!();
        println!("   Check your credentials and host settings (GEMINI_API_KEY, OPENAI_COMPATIBLE_HOST).");
    }

    Ok(())
}
