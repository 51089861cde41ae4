//! Provider construction from configuration.

use std::sync::Arc;
use std::time::Duration;
use rolematch_core::provider::Provider;
use crate::openai_compat::OpenAiCompatProvider;

/// Build the oracle provider described by `[oracle]`.
pub fn build_from_config(config: &rolematch_config::AppConfig) -> Arc<dyn Provider> {
    let oracle = &config.oracle;
    let api_key = config.api_key.clone().unwrap_or_default();
    let base_url = oracle
        .api_url
        .clone()
        .unwrap_or_else(|| default_base_url(&oracle.provider));

    tracing::debug!(provider = %oracle.provider, base_url = %base_url, "Building oracle provider");

    Arc::new(OpenAiCompatProvider::with_timeout(
        &oracle.provider,
        base_url,
        api_key,
        Duration::from_secs(oracle.timeout_secs),
    ))
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "openai" => "https://api.openai.com/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "deepseek" => "https://api.deepseek.com/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "together" => "https://api.together.xyz/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => format!("https://{provider_name}.api.example.com/v1"),
    }
}
