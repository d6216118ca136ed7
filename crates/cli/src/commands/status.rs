//! `evoweb status` — Show configuration, engine and visit state.

use evoweb_config::AppConfig;
use evoweb_storage::{ContentCache, VisitTracker};

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let engine = &config.engine;

    println!("EvoWeb Status");
    println!("=============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Backend:      {}", engine.backend);
    println!("  Model:        {}", engine.model_id);
    if engine.backend == "http" {
        println!("  API URL:      {}", engine.api_url);
    }
    println!("  Temperature:  {}", engine.temperature);
    println!("  Max tokens:   {}", engine.max_tokens);
    println!("  Timeouts:     {}s generate, {}s init", engine.timeout_secs, engine.init_timeout_secs);
    println!("  Storage:      {} ({})", config.storage.backend, config.storage.path.display());
    println!(
        "  Profile:      {}",
        config.profile.explicit_profile_id.as_deref().unwrap_or("rotate by visit")
    );
    println!("  Gateway:      {}:{}", config.gateway.host, config.gateway.port);

    let store = evoweb_storage::build_from_config(&config.storage).await?;
    let visits = VisitTracker::new(store.clone()).current().await?;
    let cached = ContentCache::new(store).load_latest().await?;
    println!("\n  Visits:       {}", visits.visit_count);
    println!("  Last visit:   {}", visits.last_visit_iso());
    match cached {
        Some(content) => println!("  Cached page:  {} bytes, {}", content.html.len(), content.generated_at.to_rfc3339()),
        None => println!("  Cached page:  none"),
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `evoweb onboard` first");
    }

    Ok(())
}
