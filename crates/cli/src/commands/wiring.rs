//! Shared setup for the pipeline commands: config preflight, store and orchestrator.

use std::sync::Arc;

use rolematch_config::AppConfig;
use rolematch_core::EventBus;
use rolematch_engine::{Orchestrator, Stores};
use rolematch_store::InMemoryStore;

/// Load config and fail early when the oracle needs a key that is missing.
pub fn load_config() -> Result<AppConfig, Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    if !config.has_api_key() && config.oracle.provider != "ollama" {
        return Err(
            "No API key configured. Set api_key in ~/.rolematch/config.toml or export ROLEMATCH_API_KEY"
                .into(),
        );
    }
    Ok(config)
}

/// An empty store honoring `[limits].max_bulk_members`.
pub fn build_store(config: &AppConfig) -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::new().with_bulk_limit(config.limits.max_bulk_members))
}

/// Build an orchestrator over `store` with the configured oracle.
pub fn build_orchestrator(config: &AppConfig, store: Arc<InMemoryStore>) -> Orchestrator {
    let provider = rolematch_providers::build_from_config(config);
    Orchestrator::from_config(
        Stores::from_shared(store),
        provider,
        config,
        Arc::new(EventBus::default()),
    )
}
