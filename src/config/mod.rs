//! Environment configuration.

pub mod error;


pub use error::ConfigError;

use std::env;
use std::net::IpAddr;

/// Default chat-completions endpoint for the primary provider.
pub const DEFAULT_PROVIDER_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Default vector index endpoint.
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6334";

/// Process-wide configuration, immutable after start.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,

    pub bind_addr: IpAddr,

    /// CORS allowlist value returned on preflight.
    pub allowed_origin: String,

    /// Upstream JSON-RPC host (`https://<shop_domain>/api/mcp`).
    pub shop_domain: Option<String>,

    /// HMAC key for signed-proxy verification. Absence forces a 500 on the
    /// chat route unless the dev bypass is engaged.
    pub proxy_secret: Option<String>,

    /// Bearer credential for the primary provider. When absent, only the
    /// local fallback backend is used.
    pub llm_provider_key: Option<String>,

    pub llm_provider_url: String,

    pub llm_model: String,

    /// Model id handed to the local inference binding.
    pub local_model: String,

    /// First half of the dev bypass; the second half is the per-request
    /// `x-dev-bypass` header.
    pub dev_bypass: bool,

    /// Deterministic provider fragments instead of any upstream call.
    pub mock_provider: bool,

    pub max_history: usize,

    pub top_k: usize,

    pub rate_limit_window_ms: i64,

    pub rate_limit_max: u32,

    pub history_tail_for_prompt: usize,

    pub database_url: String,

    pub qdrant_url: String,

    /// Remote embedding endpoint; the embedder runs in stub mode when unset.
    pub embedding_url: Option<String>,

    pub embedding_model: String,

    pub embedding_dim: usize,

    pub semantic_score_threshold: f32,

    pub context_char_budget: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_addr: IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
            allowed_origin: "*".to_string(),
            shop_domain: None,
            proxy_secret: None,
            llm_provider_key: None,
            llm_provider_url: DEFAULT_PROVIDER_URL.to_string(),
            llm_model: "gpt-4o-mini".to_string(),
            local_model: "llama3.2:3b".to_string(),
            dev_bypass: false,
            mock_provider: false,
            max_history: 200,
            top_k: 3,
            rate_limit_window_ms: 60_000,
            rate_limit_max: 20,
            history_tail_for_prompt: 10,
            database_url: "sqlite::memory:".to_string(),
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            embedding_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dim: 384,
            semantic_score_threshold: 0.7,
            context_char_budget: 4000,
        }
    }
}

impl Config {
    const ENV_PORT: &'static str = "PORT";
    const ENV_BIND_ADDR: &'static str = "BIND_ADDR";
    const ENV_ALLOWED_ORIGIN: &'static str = "ALLOWED_ORIGIN";
    const ENV_SHOP_DOMAIN: &'static str = "SHOP_DOMAIN";
    const ENV_PROXY_SECRET: &'static str = "PROXY_SECRET";
    const ENV_LLM_PROVIDER_KEY: &'static str = "LLM_PROVIDER_KEY";
    const ENV_LLM_PROVIDER_URL: &'static str = "LLM_PROVIDER_URL";
    const ENV_LLM_MODEL: &'static str = "LLM_MODEL";
    const ENV_LOCAL_MODEL: &'static str = "LOCAL_MODEL";
    const ENV_DEV_BYPASS: &'static str = "DEV_BYPASS";
    const ENV_MOCK_PROVIDER: &'static str = "MOCK_PROVIDER";
    const ENV_MAX_HISTORY: &'static str = "MAX_HISTORY";
    const ENV_TOP_K: &'static str = "TOP_K";
    const ENV_RATE_LIMIT_WINDOW_MS: &'static str = "RATE_LIMIT_WINDOW_MS";
    const ENV_RATE_LIMIT_MAX: &'static str = "RATE_LIMIT_MAX";
    const ENV_HISTORY_TAIL_FOR_PROMPT: &'static str = "HISTORY_TAIL_FOR_PROMPT";
    const ENV_DATABASE_URL: &'static str = "DATABASE_URL";
    const ENV_QDRANT_URL: &'static str = "QDRANT_URL";
    const ENV_EMBEDDING_URL: &'static str = "EMBEDDING_URL";
    const ENV_EMBEDDING_MODEL: &'static str = "EMBEDDING_MODEL";
    const ENV_EMBEDDING_DIM: &'static str = "EMBEDDING_DIM";
    const ENV_SEMANTIC_SCORE_THRESHOLD: &'static str = "SEMANTIC_SCORE_THRESHOLD";
    const ENV_CONTEXT_CHAR_BUDGET: &'static str = "CONTEXT_CHAR_BUDGET";

    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            port: Self::parse_port_from_env(defaults.port)?,
            bind_addr: Self::parse_bind_addr_from_env(defaults.bind_addr)?,
            allowed_origin: Self::parse_string_from_env(
                Self::ENV_ALLOWED_ORIGIN,
                defaults.allowed_origin,
            ),
            shop_domain: Self::parse_optional_string_from_env(Self::ENV_SHOP_DOMAIN),
            proxy_secret: Self::parse_optional_string_from_env(Self::ENV_PROXY_SECRET),
            llm_provider_key: Self::parse_optional_string_from_env(Self::ENV_LLM_PROVIDER_KEY),
            llm_provider_url: Self::parse_string_from_env(
                Self::ENV_LLM_PROVIDER_URL,
                defaults.llm_provider_url,
            ),
            llm_model: Self::parse_string_from_env(Self::ENV_LLM_MODEL, defaults.llm_model),
            local_model: Self::parse_string_from_env(Self::ENV_LOCAL_MODEL, defaults.local_model),
            dev_bypass: Self::parse_flag_from_env(Self::ENV_DEV_BYPASS),
            mock_provider: Self::parse_flag_from_env(Self::ENV_MOCK_PROVIDER),
            max_history: Self::parse_usize_from_env(Self::ENV_MAX_HISTORY, defaults.max_history)?,
            top_k: Self::parse_usize_from_env(Self::ENV_TOP_K, defaults.top_k)?,
            rate_limit_window_ms: Self::parse_i64_from_env(
                Self::ENV_RATE_LIMIT_WINDOW_MS,
                defaults.rate_limit_window_ms,
            )?,
            rate_limit_max: Self::parse_u32_from_env(
                Self::ENV_RATE_LIMIT_MAX,
                defaults.rate_limit_max,
            )?,
            history_tail_for_prompt: Self::parse_usize_from_env(
                Self::ENV_HISTORY_TAIL_FOR_PROMPT,
                defaults.history_tail_for_prompt,
            )?,
            database_url: Self::parse_string_from_env(
                Self::ENV_DATABASE_URL,
                defaults.database_url,
            ),
            qdrant_url: Self::parse_string_from_env(Self::ENV_QDRANT_URL, defaults.qdrant_url),
            embedding_url: Self::parse_optional_string_from_env(Self::ENV_EMBEDDING_URL),
            embedding_model: Self::parse_string_from_env(
                Self::ENV_EMBEDDING_MODEL,
                defaults.embedding_model,
            ),
            embedding_dim: Self::parse_usize_from_env(
                Self::ENV_EMBEDDING_DIM,
                defaults.embedding_dim,
            )?,
            semantic_score_threshold: Self::parse_f32_from_env(
                Self::ENV_SEMANTIC_SCORE_THRESHOLD,
                defaults.semantic_score_threshold,
            )?,
            context_char_budget: Self::parse_usize_from_env(
                Self::ENV_CONTEXT_CHAR_BUDGET,
                defaults.context_char_budget,
            )?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.rate_limit_max == 0 {
            return Err(ConfigError::InvalidNumber {
                name: Self::ENV_RATE_LIMIT_MAX,
                value: "0".to_string(),
            });
        }

        if self.rate_limit_window_ms <= 0 {
            return Err(ConfigError::InvalidNumber {
                name: Self::ENV_RATE_LIMIT_WINDOW_MS,
                value: self.rate_limit_window_ms.to_string(),
            });
        }

        if self.top_k == 0 {
            return Err(ConfigError::InvalidNumber {
                name: Self::ENV_TOP_K,
                value: "0".to_string(),
            });
        }

        if self.history_tail_for_prompt > self.max_history {
            return Err(ConfigError::InvalidNumber {
                name: Self::ENV_HISTORY_TAIL_FOR_PROMPT,
                value: self.history_tail_for_prompt.to_string(),
            });
        }

        if !(0.0..=1.0).contains(&self.semantic_score_threshold) {
            return Err(ConfigError::InvalidThreshold {
                value: self.semantic_score_threshold,
            });
        }

        Ok(())
    }

    /// Returns the HMAC key or the error the chat route maps to a 500.
    pub fn require_proxy_secret(&self) -> Result<&str, ConfigError> {
        self.proxy_secret
            .as_deref()
            .ok_or(ConfigError::MissingProxySecret)
    }

    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }

    fn parse_port_from_env(default: u16) -> Result<u16, ConfigError> {
        match env::var(Self::ENV_PORT) {
            Ok(value) => {
                let port: u16 = value.parse().map_err(|e| ConfigError::PortParseError {
                    value: value.clone(),
                    source: e,
                })?;

                if port == 0 {
                    return Err(ConfigError::InvalidPort { value });
                }

                Ok(port)
            }
            Err(_) => Ok(default),
        }
    }

    fn parse_bind_addr_from_env(default: IpAddr) -> Result<IpAddr, ConfigError> {
        match env::var(Self::ENV_BIND_ADDR) {
            Ok(value) => value
                .parse()
                .map_err(|e| ConfigError::InvalidBindAddr { value, source: e }),
            Err(_) => Ok(default),
        }
    }

    fn parse_string_from_env(var_name: &str, default: String) -> String {
        env::var(var_name).unwrap_or(default)
    }

    fn parse_optional_string_from_env(var_name: &str) -> Option<String> {
        env::var(var_name)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    /// Any non-empty value engages a flag.
    fn parse_flag_from_env(var_name: &str) -> bool {
        env::var_os(var_name).is_some_and(|v| !v.is_empty())
    }

    fn parse_usize_from_env(
        var_name: &'static str,
        default: usize,
    ) -> Result<usize, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                name: var_name,
                value,
            }),
            Err(_) => Ok(default),
        }
    }

    fn parse_u32_from_env(var_name: &'static str, default: u32) -> Result<u32, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                name: var_name,
                value,
            }),
            Err(_) => Ok(default),
        }
    }

    fn parse_i64_from_env(var_name: &'static str, default: i64) -> Result<i64, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                name: var_name,
                value,
            }),
            Err(_) => Ok(default),
        }
    }

    fn parse_f32_from_env(var_name: &'static str, default: f32) -> Result<f32, ConfigError> {
        match env::var(var_name) {
            Ok(value) => value.parse().map_err(|_| ConfigError::InvalidNumber {
                name: var_name,
                value,
            }),
            Err(_) => Ok(default),
        }
    }
}
