//! Configuration types for the synchronization system
//!
//! Everything the engine and the store backends need is carried in an
//! explicit [`SyncConfig`] built once per run. Nothing is read from the
//! process environment inside this crate; the daemon owns that edge.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main synchronization configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Partition store backend configuration
    pub store: StoreConfig,

    /// Partition naming and sizing
    #[serde(default)]
    pub partition: PartitionConfig,

    /// Retry policy for remote requests
    #[serde(default)]
    pub retry: RetryConfig,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a new configuration with defaults for the given store
    pub fn new(store: StoreConfig) -> Self {
        Self {
            store,
            partition: PartitionConfig::default(),
            retry: RetryConfig::default(),
            engine: EngineConfig::default(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.store.validate()?;
        self.partition.validate()?;
        self.retry.validate()?;
        Ok(())
    }
}

/// Partition store backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Cloudflare Zero Trust Gateway lists
    Cloudflare {
        /// Scoped API token (preferred)
        #[serde(default)]
        api_token: Option<String>,
        /// Legacy global API key (requires `account_email`)
        #[serde(default)]
        api_key: Option<String>,
        /// Account email, only used with the global API key
        #[serde(default)]
        account_email: Option<String>,
        /// Cloudflare account ID
        account_id: String,
    },

    /// In-memory store (not persistent; testing and embedding)
    Memory,

    /// Custom store backend
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl StoreConfig {
    /// Validate the store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            StoreConfig::Cloudflare {
                api_token,
                api_key,
                account_email,
                account_id,
            } => {
                if account_id.is_empty() {
                    return Err(crate::Error::config("Cloudflare account ID cannot be empty"));
                }
                let has_token = api_token.as_deref().is_some_and(|t| !t.is_empty());
                let has_key = api_key.as_deref().is_some_and(|k| !k.is_empty());
                if !has_token && !has_key {
                    return Err(crate::Error::config(
                        "Cloudflare credentials required: set an API token or a global API key",
                    ));
                }
                if !has_token && account_email.as_deref().is_none_or(|e| e.is_empty()) {
                    return Err(crate::Error::config(
                        "Cloudflare account email is required when using the global API key",
                    ));
                }
                Ok(())
            }
            StoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config("Custom store factory cannot be empty"));
                }
                if config.is_null() {
                    return Err(crate::Error::config("Custom store config cannot be null"));
                }
                Ok(())
            }
            StoreConfig::Memory => Ok(()),
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            StoreConfig::Cloudflare { .. } => "cloudflare",
            StoreConfig::Memory => "memory",
            StoreConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Partition naming and sizing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Name prefix shared by every managed partition.
    ///
    /// Partitions are named `"<prefix> - Chunk <ordinal>"`. Only partitions
    /// whose name starts with this prefix are ever touched.
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,

    /// Maximum number of items a single partition can hold
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Page size when listing a partition's items.
    ///
    /// When a partition truly holds more items than this, only a prefix is
    /// inspected. The store logs a warning in that case; the boundary is
    /// documented, not hidden.
    #[serde(default)]
    pub page_size: Option<usize>,
}

impl PartitionConfig {
    /// Effective page size: the configured value, or the partition capacity
    pub fn effective_page_size(&self) -> usize {
        self.page_size.unwrap_or(self.capacity)
    }

    /// Validate the partition configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.name_prefix.trim().is_empty() {
            return Err(crate::Error::config("Partition name prefix cannot be empty"));
        }
        if self.capacity == 0 {
            return Err(crate::Error::config("Partition capacity must be > 0"));
        }
        if self.page_size == Some(0) {
            return Err(crate::Error::config("Partition page size must be > 0"));
        }
        Ok(())
    }
}

impl Default for PartitionConfig {
    fn default() -> Self {
        Self {
            name_prefix: default_name_prefix(),
            capacity: default_capacity(),
            page_size: None,
        }
    }
}

/// Retry policy configuration for remote requests
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts before surfacing a terminal error
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Fixed backoff between attempts after a transient failure (in seconds)
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,

    /// Cooldown after a provider-enforced rate limit (in seconds)
    #[serde(default = "default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,

    /// HTTP status code the provider uses to signal rate limiting
    #[serde(default = "default_rate_limit_status")]
    pub rate_limit_status: u16,
}

impl RetryConfig {
    /// Backoff as a [`Duration`]
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    /// Rate-limit cooldown as a [`Duration`]
    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }

    /// Validate the retry configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.max_attempts == 0 {
            return Err(crate::Error::config("Retry max attempts must be > 0"));
        }
        Ok(())
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
            rate_limit_cooldown_secs: default_rate_limit_cooldown_secs(),
            rate_limit_status: default_rate_limit_status(),
        }
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the internal event channel.
    ///
    /// When full, new events are dropped (with a warning log). This prevents
    /// unbounded memory growth when no consumer drains the channel.
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_name_prefix() -> String {
    "Gatesync List".to_string()
}

fn default_capacity() -> usize {
    1000
}

fn default_max_attempts() -> usize {
    50
}

fn default_backoff_secs() -> u64 {
    8
}

fn default_rate_limit_cooldown_secs() -> u64 {
    2 * 60
}

fn default_rate_limit_status() -> u16 {
    429
}

fn default_event_channel_capacity() -> usize {
    1000
}
