use serde::Deserialize;

/// Root client configuration. Loaded from an optional TOML file and from
/// environment variables with the prefix `MINI_CRM__`.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Age in milliseconds after which a cached read is treated as stale.
    #[serde(default = "default_ttl_ms")]
    pub ttl_ms: u64,
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
}

fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}
fn default_timeout_ms() -> u64 {
    10_000
}
fn default_ttl_ms() -> u64 {
    30_000
}
fn default_cache_enabled() -> bool {
    true
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: default_ttl_ms(),
            enabled: default_cache_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

impl CacheConfig {
    /// TTL actually applied by the cache. A disabled cache behaves as one
    /// whose entries are stale the moment they are written.
    pub fn effective_ttl_ms(&self) -> u64 {
        if self.enabled {
            self.ttl_ms
        } else {
            0
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables only.
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from an optional file (any format the `config`
    /// crate recognises by extension) layered under environment variables.
    pub fn load_from(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("MINI_CRM")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
