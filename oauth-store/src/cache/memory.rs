use super::{CacheError, CacheKeys, CachedEntry, SessionCache};
use crate::request::TokenType;
use crate::store::record::StoredRequest;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use moka::future::Cache as MokaCache;
use moka::Expiry;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Maximum number of reverse-index sets kept in memory.
const MAX_INDEX_ENTRIES: u64 = 100_000;

/// A cached value with its own time to live. `ttl: None` on update keeps the
/// remaining lifetime of the previous value.
#[derive(Clone)]
struct Expiring<V> {
    value: V,
    ttl: Option<Duration>,
}

struct PerEntryExpiry;

/// Signatures issued under one request, and when the set may expire. The
/// deadline only ever moves forward so the index outlives every member.
#[derive(Clone, Debug, Default)]
struct ReverseIndex {
    members: BTreeSet<String>,
    deadline: Option<Instant>,
}

impl<V> Expiry<String, Expiring<V>> for PerEntryExpiry {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &Expiring<V>,
        _created_at: Instant,
    ) -> Option<Duration> {
        value.ttl
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Expiring<V>,
        _updated_at: Instant,
        duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.ttl.or(duration_until_expiry)
    }
}

/// Session cache held in process memory.
///
/// Entries are stored serialized, weighed by size and expire individually.
/// A write guard makes each primary + reverse-index update one critical
/// section, which is what a `MULTI/EXEC` block gives the Redis backend.
#[derive(Clone)]
pub struct InMemorySessionCache {
    entries: MokaCache<String, Expiring<String>>,
    index: MokaCache<String, Expiring<Arc<ReverseIndex>>>,
    keys: CacheKeys,
    write_guard: Arc<Mutex<()>>,
}

impl InMemorySessionCache {
    /// Initialize a new in-memory cache instance holding up to `capacity_mib` MiB of entries
    pub fn new(prefix: &str, capacity_mib: usize) -> Result<Self, String> {
        let max_capacity_bytes: u64 = capacity_mib
            .checked_mul(1024 * 1024)
            .and_then(|bytes| u64::try_from(bytes).ok())
            .ok_or_else(|| format!("Cache capacity of {capacity_mib} MiB overflows"))?;

        let entries = MokaCache::builder()
            .weigher(|_key, value: &Expiring<String>| -> u32 {
                value.value.len().try_into().unwrap_or(u32::MAX)
            })
            .max_capacity(max_capacity_bytes)
            .expire_after(PerEntryExpiry)
            .build();

        let index = MokaCache::builder()
            .max_capacity(MAX_INDEX_ENTRIES)
            .expire_after(PerEntryExpiry)
            .build();

        Ok(Self {
            entries,
            index,
            keys: CacheKeys::new(prefix),
            write_guard: Arc::new(Mutex::new(())),
        })
    }

    async fn reverse_index(&self, request_key: &str) -> ReverseIndex {
        self.index
            .get(request_key)
            .await
            .map(|index| index.value.as_ref().clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl SessionCache for InMemorySessionCache {
    async fn get(
        &self,
        token_type: TokenType,
        signature: &str,
    ) -> Result<Option<CachedEntry>, CacheError> {
        let key = self.keys.signature_key(token_type, signature);
        if let Some(cached) = self.entries.get(&key).await {
            serde_json::from_str(&cached.value)
                .map_err(|e| CacheError::Deserialization(e.to_string()))
                .map(Some)
        } else {
            Ok(None)
        }
    }

    async fn set(
        &self,
        token_type: TokenType,
        signature: &str,
        request: &StoredRequest,
        expires_at: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let entry = CachedEntry {
            request: request.clone(),
            expires_at,
        };
        let serialized = serde_json::to_string(&entry)?;
        let signature_key = self.keys.signature_key(token_type, signature);
        let request_key = self.keys.request_key(token_type, &request.request_id);

        let _guard = self.write_guard.lock().await;
        let mut reverse = self.reverse_index(&request_key).await;
        reverse.members.insert(signature.to_string());
        let now = Instant::now();
        let deadline = match (reverse.deadline, now.checked_add(ttl)) {
            (Some(current), Some(requested)) => Some(current.max(requested)),
            (current, requested) => current.or(requested),
        };
        reverse.deadline = deadline;
        let index_ttl = deadline.map_or(ttl, |deadline| deadline.saturating_duration_since(now));

        self.entries
            .insert(
                signature_key,
                Expiring {
                    value: serialized,
                    ttl: Some(ttl),
                },
            )
            .await;
        self.index
            .insert(
                request_key,
                Expiring {
                    value: Arc::new(reverse),
                    ttl: Some(index_ttl),
                },
            )
            .await;
        Ok(())
    }

    async fn delete(&self, token_type: TokenType, signature: &str) -> Result<(), CacheError> {
        let signature_key = self.keys.signature_key(token_type, signature);

        let _guard = self.write_guard.lock().await;
        let removed = self.entries.remove(&signature_key).await;

        let request_id = removed
            .and_then(|cached| serde_json::from_str::<CachedEntry>(&cached.value).ok())
            .map(|entry| entry.request.request_id);
        if let Some(request_id) = request_id {
            let request_key = self.keys.request_key(token_type, &request_id);
            let mut reverse = self.reverse_index(&request_key).await;
            if reverse.members.remove(signature) {
                if reverse.members.is_empty() {
                    self.index.remove(&request_key).await;
                } else {
                    self.index
                        .insert(
                            request_key,
                            Expiring {
                                value: Arc::new(reverse),
                                ttl: None,
                            },
                        )
                        .await;
                }
            }
        }
        Ok(())
    }

    async fn delete_by_request_id(
        &self,
        token_type: TokenType,
        request_id: &str,
    ) -> Result<(), CacheError> {
        let request_key = self.keys.request_key(token_type, request_id);

        let _guard = self.write_guard.lock().await;
        if let Some(removed) = self.index.remove(&request_key).await {
            for signature in removed.value.members.iter() {
                self.entries
                    .invalidate(&self.keys.signature_key(token_type, signature))
                    .await;
            }
        }
        Ok(())
    }

    async fn health_check(&self) -> Result<(), String> {
        Ok(())
    }
}
