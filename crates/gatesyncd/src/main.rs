// # gatesyncd - Partition Synchronization Daemon
//
// This is a THIN integration layer ONLY:
// - Reads configuration from environment variables
// - Registers store backends
// - Runs one engine operation and reports the summary
//
// All synchronization logic lives in gatesync-core. No reconciliation,
// retry, or partition logic may be added here.
//
// ## Usage
//
// ```bash
// gatesyncd sync <items-file>   # make the remote partitions match the file
// gatesyncd defrag              # re-pack managed partitions oldest-first
// ```
//
// The items file holds one value per line; blank lines and `#` comments are
// skipped, duplicates are dropped keeping the first occurrence. The file is
// expected to be already normalized by an upstream producer.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Store
// - `GATESYNC_STORE_TYPE`: Store backend (cloudflare, memory; default cloudflare)
// - `CLOUDFLARE_ACCOUNT_ID`: Cloudflare account ID
// - `CLOUDFLARE_API_TOKEN`: Scoped API token (preferred)
// - `CLOUDFLARE_API_KEY`: Legacy global API key
// - `CLOUDFLARE_ACCOUNT_EMAIL`: Account email (required with the global key)
//
// ### Partitions
// - `GATESYNC_LIST_PREFIX`: Managed partition name prefix
// - `GATESYNC_LIST_CAPACITY`: Items per partition
// - `GATESYNC_PAGE_SIZE`: Item listing page size
//
// ### Retry
// - `GATESYNC_MAX_ATTEMPTS`: Attempts per store call
// - `GATESYNC_BACKOFF_SECS`: Delay after a transient failure
// - `GATESYNC_COOLDOWN_SECS`: Delay after a rate limit
//
// ### Misc
// - `GATESYNC_MODE`: Set to `dry-run` to log mutations without applying them
// - `GATESYNC_LOG_LEVEL`: trace, debug, info, warn, error
//
// ## Example
//
// ```bash
// export CLOUDFLARE_ACCOUNT_ID=abc123
// export CLOUDFLARE_API_TOKEN=your_token
// gatesyncd sync /var/lib/gatesync/items.txt
// ```

use anyhow::Result;
use gatesync_core::{
    EngineEvent, PartitionConfig, RetryConfig, StoreConfig, StoreRegistry, SyncConfig, SyncEngine,
};
use std::collections::HashSet;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Exit codes for different termination scenarios
///
/// - 0: Clean run
/// - 1: Configuration or usage error
/// - 2: Runtime error (store failure, retry exhaustion)
#[derive(Debug, Clone, Copy)]
enum GatesyncExitCode {
    CleanRun = 0,
    ConfigError = 1,
    RuntimeError = 2,
}

impl From<GatesyncExitCode> for ExitCode {
    fn from(code: GatesyncExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Operation selected on the command line
#[derive(Debug, Clone)]
enum Mode {
    /// Make the remote partitions match the items file
    Sync { items_file: PathBuf },
    /// Re-pack managed partitions oldest-first
    Defrag,
}

impl Mode {
    fn from_args() -> Result<Self> {
        let mut args = env::args().skip(1);
        match args.next().as_deref() {
            Some("sync") => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("Usage: gatesyncd sync <items-file>"))?;
                Ok(Mode::Sync {
                    items_file: PathBuf::from(path),
                })
            }
            Some("defrag") => Ok(Mode::Defrag),
            Some(other) => anyhow::bail!(
                "Unknown mode '{}'. Usage: gatesyncd sync <items-file> | gatesyncd defrag",
                other
            ),
            None => anyhow::bail!("Usage: gatesyncd sync <items-file> | gatesyncd defrag"),
        }
    }
}

/// Application configuration
struct Config {
    store_type: String,
    cloudflare_account_id: Option<String>,
    cloudflare_api_token: Option<String>,
    cloudflare_api_key: Option<String>,
    cloudflare_account_email: Option<String>,
    list_prefix: Option<String>,
    list_capacity: Option<usize>,
    page_size: Option<usize>,
    max_attempts: Option<usize>,
    backoff_secs: Option<u64>,
    cooldown_secs: Option<u64>,
    log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Ok(Self {
            store_type: env::var("GATESYNC_STORE_TYPE")
                .unwrap_or_else(|_| "cloudflare".to_string()),
            cloudflare_account_id: env::var("CLOUDFLARE_ACCOUNT_ID").ok(),
            cloudflare_api_token: env::var("CLOUDFLARE_API_TOKEN").ok(),
            cloudflare_api_key: env::var("CLOUDFLARE_API_KEY").ok(),
            cloudflare_account_email: env::var("CLOUDFLARE_ACCOUNT_EMAIL").ok(),
            list_prefix: env::var("GATESYNC_LIST_PREFIX").ok(),
            list_capacity: parse_env("GATESYNC_LIST_CAPACITY")?,
            page_size: parse_env("GATESYNC_PAGE_SIZE")?,
            max_attempts: parse_env("GATESYNC_MAX_ATTEMPTS")?,
            backoff_secs: parse_env("GATESYNC_BACKOFF_SECS")?,
            cooldown_secs: parse_env("GATESYNC_COOLDOWN_SECS")?,
            log_level: env::var("GATESYNC_LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
        })
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        match self.store_type.as_str() {
            "cloudflare" => {
                if self
                    .cloudflare_account_id
                    .as_deref()
                    .is_none_or(|id| id.is_empty())
                {
                    anyhow::bail!(
                        "CLOUDFLARE_ACCOUNT_ID is required. \
                        Set it via: export CLOUDFLARE_ACCOUNT_ID=your_account_id"
                    );
                }

                let has_token = self
                    .cloudflare_api_token
                    .as_deref()
                    .is_some_and(|t| !t.is_empty());
                let has_key = self
                    .cloudflare_api_key
                    .as_deref()
                    .is_some_and(|k| !k.is_empty());
                if !has_token && !has_key {
                    anyhow::bail!(
                        "Cloudflare credentials are required. \
                        Set CLOUDFLARE_API_TOKEN (preferred) or CLOUDFLARE_API_KEY"
                    );
                }
                if !has_token
                    && self
                        .cloudflare_account_email
                        .as_deref()
                        .is_none_or(|e| e.is_empty())
                {
                    anyhow::bail!(
                        "CLOUDFLARE_ACCOUNT_EMAIL is required when using CLOUDFLARE_API_KEY"
                    );
                }

                // Catch obvious placeholder tokens (common mistake)
                if let Some(token) = &self.cloudflare_api_token {
                    let token_lower = token.to_lowercase();
                    if token_lower.contains("your_token")
                        || token_lower.contains("replace_me")
                        || token_lower.contains("example")
                    {
                        anyhow::bail!(
                            "CLOUDFLARE_API_TOKEN appears to be a placeholder. \
                            Use an actual API token."
                        );
                    }
                }
            }
            "memory" => {}
            other => anyhow::bail!(
                "GATESYNC_STORE_TYPE '{}' is not supported. \
                Supported stores: cloudflare, memory",
                other
            ),
        }

        if self.list_capacity == Some(0) {
            anyhow::bail!("GATESYNC_LIST_CAPACITY must be > 0");
        }
        if self.page_size == Some(0) {
            anyhow::bail!("GATESYNC_PAGE_SIZE must be > 0");
        }
        if self.max_attempts == Some(0) {
            anyhow::bail!("GATESYNC_MAX_ATTEMPTS must be > 0");
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "GATESYNC_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }

    /// Build the core configuration from the environment values
    fn to_sync_config(&self) -> SyncConfig {
        let store = match self.store_type.as_str() {
            "memory" => StoreConfig::Memory,
            _ => StoreConfig::Cloudflare {
                api_token: self.cloudflare_api_token.clone(),
                api_key: self.cloudflare_api_key.clone(),
                account_email: self.cloudflare_account_email.clone(),
                account_id: self.cloudflare_account_id.clone().unwrap_or_default(),
            },
        };

        let mut config = SyncConfig::new(store);

        let partition_defaults = PartitionConfig::default();
        if let Some(prefix) = &self.list_prefix {
            config.partition.name_prefix = prefix.clone();
        }
        config.partition.capacity = self.list_capacity.unwrap_or(partition_defaults.capacity);
        config.partition.page_size = self.page_size;

        let retry_defaults = RetryConfig::default();
        config.retry.max_attempts = self.max_attempts.unwrap_or(retry_defaults.max_attempts);
        config.retry.backoff_secs = self.backoff_secs.unwrap_or(retry_defaults.backoff_secs);
        config.retry.rate_limit_cooldown_secs = self
            .cooldown_secs
            .unwrap_or(retry_defaults.rate_limit_cooldown_secs);

        config
    }
}

/// Parse an optional numeric environment variable, failing on garbage
fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} is not a valid number: '{}'", name, raw)),
        Err(_) => Ok(None),
    }
}

fn main() -> ExitCode {
    let mode = match Mode::from_args() {
        Ok(mode) => mode,
        Err(e) => {
            eprintln!("{}", e);
            return GatesyncExitCode::ConfigError.into();
        }
    };

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return GatesyncExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return GatesyncExitCode::ConfigError.into();
    }

    // Initialize tracing
    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return GatesyncExitCode::ConfigError.into();
    }

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return GatesyncExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        match run(config, mode).await {
            Ok(()) => GatesyncExitCode::CleanRun,
            Err(e) => {
                error!("Run failed: {}", e);
                GatesyncExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Run one engine operation
async fn run(config: Config, mode: Mode) -> Result<()> {
    let sync_config = config.to_sync_config();

    let registry = StoreRegistry::with_builtins();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare store");
        gatesync_store_cloudflare::register(&registry);
    }

    let store = registry.create_store(&sync_config)?;
    info!("Using store backend: {}", store.store_name());

    let (engine, mut events) = SyncEngine::new(store, &sync_config)?;

    // Drain events concurrently so the channel never fills up
    let drain = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::PatchApplied {
                    partition_name,
                    appended,
                    removed,
                    ..
                } => info!("Patched \"{}\": +{} -{}", partition_name, appended, removed),
                EngineEvent::PartitionCreated { name, items } => {
                    info!("Created \"{}\" with {} items", name, items)
                }
                EngineEvent::PartitionDeleted { partition_name, .. } => {
                    info!("Deleted \"{}\"", partition_name)
                }
                EngineEvent::RetriesExhausted {
                    operation,
                    attempts,
                } => warn!(
                    "NOTIFICATION: {} gave up after {} attempts; manual attention needed",
                    operation, attempts
                ),
                EngineEvent::SyncCompleted { report } => info!(
                    "Sync summary: {} additions, {} removals, {} patches, {} partitions created",
                    report.additions, report.removals, report.patches, report.partitions_created
                ),
                EngineEvent::DefragCompleted {
                    entries_moved,
                    patches,
                } => info!(
                    "Defrag summary: {} entries moved across {} patches",
                    entries_moved, patches
                ),
            }
        }
    });

    let result = match mode {
        Mode::Sync { items_file } => {
            let desired = read_items_file(&items_file).await?;
            info!(
                "Synchronizing {} items from {}",
                desired.len(),
                items_file.display()
            );
            engine.synchronize(&desired).await.map(|report| {
                info!(
                    "Synchronize finished: {} additions, {} removals, {} patches, {} created",
                    report.additions, report.removals, report.patches, report.partitions_created
                );
            })
        }
        Mode::Defrag => match engine.defragment().await {
            Ok(report) => {
                info!(
                    "Defragment finished: {} chunks, {} entries, {} moved, {} now empty, {} non-empty",
                    report.chunks,
                    report.all_entries,
                    report.entries_to_move,
                    report.empty_lists,
                    report.non_empty_lists
                );
                // Emptied partitions are deleted right away; nothing
                // references them once defragmentation has moved their items.
                if report.empty_partitions.is_empty() {
                    Ok(())
                } else {
                    engine
                        .delete_partitions(&report.empty_partitions)
                        .await
                        .map(|deleted| {
                            info!("Deleted {} emptied partitions", deleted);
                        })
                }
            }
            Err(e) => Err(e),
        },
    };

    // Dropping the engine closes the event channel so the drain task ends.
    drop(engine);
    let _ = drain.await;

    result.map_err(Into::into)
}

/// Read the desired item list from a file.
///
/// One value per line; blank lines and `#` comments are skipped; duplicates
/// are dropped keeping the first occurrence. The file is expected to be
/// already normalized upstream.
async fn read_items_file(path: &std::path::Path) -> Result<Vec<String>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read items file {}: {}", path.display(), e))?;

    let mut seen = HashSet::new();
    let mut items = Vec::new();
    for line in raw.lines() {
        let value = line.trim();
        if value.is_empty() || value.starts_with('#') {
            continue;
        }
        if seen.insert(value.to_string()) {
            items.push(value.to_string());
        }
    }
    Ok(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> Config {
        Config {
            store_type: "memory".to_string(),
            cloudflare_account_id: None,
            cloudflare_api_token: None,
            cloudflare_api_key: None,
            cloudflare_account_email: None,
            list_prefix: None,
            list_capacity: None,
            page_size: None,
            max_attempts: None,
            backoff_secs: None,
            cooldown_secs: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn memory_store_needs_no_credentials() {
        minimal_config().validate().unwrap();
    }

    #[test]
    fn cloudflare_store_requires_account_and_credentials() {
        let mut config = minimal_config();
        config.store_type = "cloudflare".to_string();
        assert!(config.validate().is_err());

        config.cloudflare_account_id = Some("acct".to_string());
        assert!(config.validate().is_err());

        config.cloudflare_api_token = Some("real_token_value".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn global_key_requires_email() {
        let mut config = minimal_config();
        config.store_type = "cloudflare".to_string();
        config.cloudflare_account_id = Some("acct".to_string());
        config.cloudflare_api_key = Some("key".to_string());
        assert!(config.validate().is_err());

        config.cloudflare_account_email = Some("ops@example.com".to_string());
        config.validate().unwrap();
    }

    #[test]
    fn placeholder_tokens_are_rejected() {
        let mut config = minimal_config();
        config.store_type = "cloudflare".to_string();
        config.cloudflare_account_id = Some("acct".to_string());
        config.cloudflare_api_token = Some("your_token_here".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let mut config = minimal_config();
        config.list_capacity = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn env_values_flow_into_the_sync_config() {
        let mut config = minimal_config();
        config.list_prefix = Some("Custom Prefix".to_string());
        config.list_capacity = Some(500);
        config.max_attempts = Some(10);
        config.cooldown_secs = Some(30);

        let sync_config = config.to_sync_config();
        assert_eq!(sync_config.partition.name_prefix, "Custom Prefix");
        assert_eq!(sync_config.partition.capacity, 500);
        assert_eq!(sync_config.retry.max_attempts, 10);
        assert_eq!(sync_config.retry.rate_limit_cooldown_secs, 30);
        // Untouched values keep library defaults.
        assert_eq!(sync_config.retry.backoff_secs, 8);
    }

    #[tokio::test]
    async fn items_file_skips_comments_and_dedupes() {
        let dir = std::env::temp_dir();
        let path = dir.join(format!("gatesyncd-items-{}.txt", std::process::id()));
        tokio::fs::write(
            &path,
            "# header\nalpha.example.com\n\nbeta.example.com\nalpha.example.com\n  # indented comment\n",
        )
        .await
        .unwrap();

        let items = read_items_file(&path).await.unwrap();
        assert_eq!(items, vec!["alpha.example.com", "beta.example.com"]);

        let _ = tokio::fs::remove_file(&path).await;
    }
}
