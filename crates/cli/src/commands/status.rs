//! `rolematch status`: Show effective configuration.

use rolematch_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let oracle = &config.oracle;
    let executor = &config.executor;

    println!("🧩 RoleMatch Status");
    println!("===================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Provider:      {}", oracle.provider);
    println!("  API URL:       {}", oracle.api_url.as_deref().unwrap_or("(provider default)"));
    println!("  API key:       {}", if config.has_api_key() { "set" } else { "not set" });
    println!("  Model:         {}", oracle.model);
    println!(
        "  Temperature:   scoring {} / explanation {}",
        oracle.scoring_temperature, oracle.explanation_temperature
    );
    println!("  Timeout:       {}s", oracle.timeout_secs);
    println!(
        "  Executor:      {} concurrent, {} retries, {}ms base delay",
        executor.concurrency, executor.max_retries, executor.base_delay_ms
    );
    println!("  Second pass:   {}", if executor.second_pass { "enabled" } else { "disabled" });
    println!(
        "  Limits:        {} rosters/batch, {} members/bulk",
        config.limits.max_batch_rosters, config.limits.max_bulk_members
    );

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file — run `rolematch onboard` first");
    }

    Ok(())
}
