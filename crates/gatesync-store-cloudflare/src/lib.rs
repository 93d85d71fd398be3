// # Cloudflare Zero Trust Partition Store
//
// This crate maps the PartitionStore trait onto Cloudflare Zero Trust
// Gateway lists: one partition is one DOMAIN list under
// `/accounts/{account_id}/gateway/lists`.
//
// ## Trust Level: Untrusted (Partition Store)
//
// Stores are single-shot, isolated components:
//
// - One HTTP request per store call, full error propagation to the engine
// - NO retry, backoff, or rate-limit handling (owned by SyncEngine)
// - NO background tasks, NO caching across calls
// - HTTP timeout configured (30 seconds)
// - Credentials NEVER appear in logs or Debug output
//
// ## Status Mapping
//
// The store stays ignorant of retry policy. It maps 404 to
// `PartitionNotFound` (the partition genuinely vanished) and every other
// non-success status to `Error::Http { status, body }`; the engine's retry
// policy decides what is a rate limit and what is merely transient.
//
// ## Timestamp Boundary
//
// Create and patch payloads carry item values only; the Gateway API assigns
// `created_at` server-side when an item lands in a list. A defragmentation
// move therefore resets the moved item's age on this backend. Timestamp
// preservation across moves is a property of the in-memory store, not of
// this one.
//
// ## Dry-Run Mode
//
// When `dry_run` is true, reads execute normally and mutations (create,
// patch, delete) are logged and skipped.
//
// ## API Reference
//
// - List lists:    GET    `/accounts/:account_id/gateway/lists`
// - List items:    GET    `/accounts/:account_id/gateway/lists/:id/items?per_page=N`
// - Create list:   POST   `/accounts/:account_id/gateway/lists`
// - Patch list:    PATCH  `/accounts/:account_id/gateway/lists/:id`
// - Delete list:   DELETE `/accounts/:account_id/gateway/lists/:id`

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatesync_core::config::{StoreConfig, SyncConfig};
use gatesync_core::traits::{Item, Partition, PartitionStore, PartitionStoreFactory, Patch};
use gatesync_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests (30 seconds)
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Authentication material for the Cloudflare API.
///
/// A scoped API token is preferred; the legacy global key needs the account
/// email alongside it and grants far more than this store requires.
#[derive(Clone)]
enum Credentials {
    /// Scoped API token, sent as `Authorization: Bearer`
    Token(String),
    /// Legacy global API key, sent as `X-Auth-Key` + `X-Auth-Email`
    GlobalKey { key: String, email: String },
}

impl Credentials {
    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Credentials::Token(token) => request.bearer_auth(token),
            Credentials::GlobalKey { key, email } => request
                .header("X-Auth-Key", key)
                .header("X-Auth-Email", email),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Credentials::Token(_) => "api_token",
            Credentials::GlobalKey { .. } => "global_key",
        }
    }
}

/// Cloudflare Zero Trust Gateway list store
///
/// # Security
///
/// The Debug implementation intentionally does NOT expose credentials.
pub struct CloudflareStore {
    /// ⚠️ NEVER log this value
    credentials: Credentials,

    /// Cloudflare account ID the gateway lists live under
    account_id: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Partition capacity, enforced before any create request is sent
    capacity: usize,

    /// `per_page` used when listing a list's items
    page_size: usize,

    /// Dry-run mode: if true, perform GET requests but skip mutations
    dry_run: bool,
}

// Custom Debug implementation that hides the credentials
impl std::fmt::Debug for CloudflareStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareStore")
            .field("credentials", &"<REDACTED>")
            .field("auth_kind", &self.credentials.kind())
            .field("account_id", &self.account_id)
            .field("capacity", &self.capacity)
            .field("page_size", &self.page_size)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

/// Wire shape of one gateway list
#[derive(Debug, Deserialize)]
struct WireList {
    id: String,
    name: String,
}

/// Wire shape of one list item
#[derive(Debug, Deserialize)]
struct WireItem {
    value: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ListsResponse {
    #[serde(default)]
    result: Option<Vec<WireList>>,
}

#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    result: Option<Vec<WireItem>>,
    #[serde(default)]
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    result: WireList,
}

/// Map a non-success gateway response to an error.
///
/// Only 404 gets a dedicated variant; rate-limit recognition is the retry
/// policy's job, not the store's.
fn map_status(status: u16, body: String) -> Error {
    if status == 404 {
        Error::partition_not_found(body)
    } else {
        Error::http(status, body)
    }
}

impl CloudflareStore {
    /// Create a new Cloudflare store
    ///
    /// # Parameters
    ///
    /// - `credentials`: API token or global key + email (already validated)
    /// - `account_id`: Cloudflare account ID
    /// - `capacity`: partition capacity, checked before creates
    /// - `page_size`: `per_page` for item listings
    /// - `dry_run`: if true, perform GET requests but skip mutations
    fn new(
        credentials: Credentials,
        account_id: impl Into<String>,
        capacity: usize,
        page_size: usize,
        dry_run: bool,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .expect("Failed to build HTTP client");

        Self {
            credentials,
            account_id: account_id.into(),
            client,
            capacity,
            page_size,
            dry_run,
        }
    }

    /// Full URL for a gateway path under this account
    fn gateway_url(&self, path: &str) -> String {
        format!(
            "{}/accounts/{}/gateway{}",
            CLOUDFLARE_API_BASE, self.account_id, path
        )
    }

    /// Send one request and surface non-success statuses as errors
    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = self
            .credentials
            .apply(request)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| Error::transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(map_status(status.as_u16(), body));
        }
        Ok(response)
    }

    async fn parse<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        response
            .json()
            .await
            .map_err(|e| Error::store("cloudflare", format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl PartitionStore for CloudflareStore {
    /// List every gateway list in the account.
    ///
    /// ```http
    /// GET /accounts/:account_id/gateway/lists
    /// ```
    async fn list_partitions(&self) -> Result<Vec<Partition>> {
        let url = self.gateway_url("/lists");
        let response = self.send(self.client.get(&url)).await?;
        let parsed: ListsResponse = Self::parse(response).await?;

        Ok(parsed
            .result
            .unwrap_or_default()
            .into_iter()
            .map(|list| Partition {
                id: list.id,
                name: list.name,
            })
            .collect())
    }

    /// List one page of a gateway list's items.
    ///
    /// ```http
    /// GET /accounts/:account_id/gateway/lists/:id/items?per_page=N
    /// ```
    ///
    /// When the list truly holds more items than one page, only the page is
    /// returned and a warning is logged; the caller works on a prefix.
    async fn list_partition_items(&self, id: &str) -> Result<Vec<Item>> {
        let url = self.gateway_url(&format!("/lists/{}/items?per_page={}", id, self.page_size));
        let response = self.send(self.client.get(&url)).await?;
        let parsed: ItemsResponse = Self::parse(response).await?;

        let items = parsed.result.unwrap_or_default();
        if let Some(total) = parsed.result_info.and_then(|info| info.total_count)
            && total > items.len() as u64
        {
            tracing::warn!(
                "List {} holds {} items but only {} were fetched; working on a prefix",
                id,
                total,
                items.len()
            );
        }

        Ok(items
            .into_iter()
            .map(|item| Item {
                value: item.value,
                added_at: item.created_at,
            })
            .collect())
    }

    /// Create a DOMAIN list with its initial items.
    ///
    /// ```http
    /// POST /accounts/:account_id/gateway/lists
    /// { "name": "...", "type": "DOMAIN", "items": [{"value": "..."}] }
    /// ```
    ///
    /// The API does not accept client timestamps; any `added_at` on the
    /// submitted items is dropped and the provider stamps `created_at`.
    async fn create_partition(&self, name: &str, items: &[Item]) -> Result<Partition> {
        if items.len() > self.capacity {
            return Err(Error::capacity_exceeded(items.len(), self.capacity));
        }

        let payload = serde_json::json!({
            "name": name,
            "type": "DOMAIN",
            "items": items
                .iter()
                .map(|item| serde_json::json!({ "value": item.value }))
                .collect::<Vec<_>>(),
        });

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would create list \"{}\" with {} items",
                name,
                items.len()
            );
            return Ok(Partition {
                id: format!("dry-run-{}", name),
                name: name.to_string(),
            });
        }

        let url = self.gateway_url("/lists");
        let response = self.send(self.client.post(&url).json(&payload)).await?;
        let parsed: CreateResponse = Self::parse(response).await?;

        tracing::info!("Created list \"{}\" with {} items", name, items.len());
        Ok(Partition {
            id: parsed.result.id,
            name: parsed.result.name,
        })
    }

    /// Append and remove items on one list.
    ///
    /// ```http
    /// PATCH /accounts/:account_id/gateway/lists/:id
    /// { "append": [{"value": "..."}], "remove": ["..."] }
    /// ```
    ///
    /// Appended items are sent value-only; the provider re-stamps
    /// `created_at`, so a moved item's age restarts here.
    async fn patch_partition(&self, id: &str, patch: &Patch) -> Result<()> {
        let payload = serde_json::json!({
            "append": patch
                .append
                .iter()
                .map(|item| serde_json::json!({ "value": item.value }))
                .collect::<Vec<_>>(),
            "remove": patch.remove,
        });

        if self.dry_run {
            tracing::info!(
                "[DRY-RUN] Would patch list {}: +{} -{}",
                id,
                patch.append.len(),
                patch.remove.len()
            );
            return Ok(());
        }

        let url = self.gateway_url(&format!("/lists/{}", id));
        self.send(self.client.patch(&url).json(&payload)).await?;
        Ok(())
    }

    /// Delete one list.
    ///
    /// ```http
    /// DELETE /accounts/:account_id/gateway/lists/:id
    /// ```
    async fn delete_partition(&self, id: &str) -> Result<()> {
        if self.dry_run {
            tracing::info!("[DRY-RUN] Would delete list {}", id);
            return Ok(());
        }

        let url = self.gateway_url(&format!("/lists/{}", id));
        self.send(self.client.delete(&url)).await?;
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare stores
pub struct CloudflareStoreFactory;

impl PartitionStoreFactory for CloudflareStoreFactory {
    fn create(&self, config: &SyncConfig) -> Result<Box<dyn PartitionStore>> {
        match &config.store {
            StoreConfig::Cloudflare {
                api_token,
                api_key,
                account_email,
                account_id,
            } => {
                let credentials = match (
                    api_token.as_deref().filter(|t| !t.is_empty()),
                    api_key.as_deref().filter(|k| !k.is_empty()),
                ) {
                    (Some(token), _) => Credentials::Token(token.to_string()),
                    (None, Some(key)) => {
                        let email = account_email
                            .as_deref()
                            .filter(|e| !e.is_empty())
                            .ok_or_else(|| {
                                Error::config(
                                    "Cloudflare account email is required with the global API key",
                                )
                            })?;
                        tracing::warn!(
                            "Using the legacy global API key; a scoped API token is recommended"
                        );
                        Credentials::GlobalKey {
                            key: key.to_string(),
                            email: email.to_string(),
                        }
                    }
                    (None, None) => {
                        return Err(Error::config("Cloudflare credentials are required"));
                    }
                };

                if account_id.is_empty() {
                    return Err(Error::config("Cloudflare account ID is required"));
                }

                // Dry-run is an operator switch, not part of the config file
                let dry_run =
                    std::env::var("GATESYNC_MODE").unwrap_or_default().to_lowercase() == "dry-run";
                if dry_run {
                    tracing::warn!(
                        "Cloudflare store running in DRY-RUN mode - no changes will be made"
                    );
                }

                Ok(Box::new(CloudflareStore::new(
                    credentials,
                    account_id.clone(),
                    config.partition.capacity,
                    config.partition.effective_page_size(),
                    dry_run,
                )))
            }
            _ => Err(Error::config("Invalid config for Cloudflare store")),
        }
    }
}

/// Register the Cloudflare store with a registry
///
/// # Example
///
/// ```rust
/// use gatesync_core::StoreRegistry;
///
/// let registry = StoreRegistry::new();
/// gatesync_store_cloudflare::register(&registry);
/// ```
pub fn register(registry: &gatesync_core::StoreRegistry) {
    registry.register_store("cloudflare", Box::new(CloudflareStoreFactory));
}
