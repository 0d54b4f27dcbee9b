//! Injected configuration. Core logic never reads the environment on its
//! own; `from_env` exists for the process entry points that want it.

use serde::{Deserialize, Serialize};

fn env_str(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|s| s.parse::<T>().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        Err(_) => default,
    }
}

/// Settings for the optional external-model refinement pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    pub enabled: bool,
    /// OpenAI-compatible chat-completions endpoint.
    pub endpoint: String,
    pub api_key: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".into(),
            api_key: None,
            model: "gpt-4.1-mini".into(),
            timeout_secs: 20,
        }
    }
}

/// Read-only configuration injected into the orchestrator and cluster
/// client at construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Kubernetes API base URL (e.g. the tunnel's public endpoint).
    pub api_base_url: String,
    pub namespace: String,
    pub verify_tls: bool,
    /// Bearer token; absent means anonymous.
    pub bearer_token: Option<String>,
    pub request_timeout_secs: u64,
    /// Attempt ceiling for transient-failure retries (first try included).
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    /// Image used when the instruction names none.
    pub default_image: String,
    pub refine: RefineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8001".into(),
            namespace: "default".into(),
            verify_tls: false,
            bearer_token: None,
            request_timeout_secs: 30,
            max_attempts: 3,
            backoff_base_ms: 250,
            default_image: "busybox:1.36".into(),
            refine: RefineConfig::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let d = Config::default();
        let rd = RefineConfig::default();
        Self {
            api_base_url: env_str("MANIFESTO_API_BASE_URL").unwrap_or(d.api_base_url),
            namespace: env_str("MANIFESTO_NAMESPACE").unwrap_or(d.namespace),
            verify_tls: env_bool("MANIFESTO_VERIFY_TLS", d.verify_tls),
            bearer_token: env_str("MANIFESTO_BEARER_TOKEN"),
            request_timeout_secs: env_parse("MANIFESTO_TIMEOUT_SECS", d.request_timeout_secs),
            max_attempts: env_parse("MANIFESTO_MAX_ATTEMPTS", d.max_attempts),
            backoff_base_ms: env_parse("MANIFESTO_BACKOFF_BASE_MS", d.backoff_base_ms),
            default_image: env_str("MANIFESTO_DEFAULT_IMAGE").unwrap_or(d.default_image),
            refine: RefineConfig {
                enabled: env_bool("MANIFESTO_REFINE", rd.enabled),
                endpoint: env_str("MANIFESTO_REFINE_ENDPOINT").unwrap_or(rd.endpoint),
                api_key: env_str("MANIFESTO_REFINE_API_KEY").or_else(|| env_str("OPENAI_API_KEY")),
                model: env_str("MANIFESTO_REFINE_MODEL").unwrap_or(rd.model),
                timeout_secs: env_parse("MANIFESTO_REFINE_TIMEOUT_SECS", rd.timeout_secs),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let c = Config::default();
        assert_eq!(c.namespace, "default");
        assert!(c.max_attempts >= 1);
        assert!(!c.refine.enabled);
        assert!(!c.default_image.is_empty());
    }
}
