//! `rolematch doctor`: Diagnose configuration and oracle health.

use rolematch_config::AppConfig;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 RoleMatch Doctor — Diagnostics");
    println!("=================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  ⚠️  No config file — defaults in use (run `rolematch onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  ✅ Configuration valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  1 blocking issue found.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  ✅ API key configured");
    } else {
        println!("  ⚠️  No API key — set api_key or ROLEMATCH_API_KEY");
        issues += 1;
    }

    let provider = rolematch_providers::build_from_config(&config);
    match provider.health_check().await {
        Ok(true) => println!("  ✅ Oracle reachable ({})", provider.name()),
        Ok(false) => {
            println!("  ❌ Oracle responded with an error ({})", provider.name());
            issues += 1;
        }
        Err(e) => {
            println!("  ❌ Oracle unreachable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
