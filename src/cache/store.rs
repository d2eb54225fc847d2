//! The cache store: bounded index, recency ordering, in-flight markers.

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::inflight::{FlightFailure, FlightResult, ResultWaiter};
use super::CacheConfig;
use crate::telemetry;
use crate::types::{Fingerprint, QueryType};

/// One stored answer.
struct Entry {
    payload: String,
    provider: String,
    /// Checksum of `payload` taken at insert. Verified on every read;
    /// a mismatch means the entry is corrupt and is treated as a miss.
    checksum: u64,
    expires_at: Instant,
    /// Logical access clock value at last touch. Drives LRU ordering.
    last_access: u64,
    /// Monotonic insert sequence. Breaks recency ties toward the
    /// earlier insert.
    inserted_seq: u64,
}

/// Index state guarded by one narrow mutex. No await point ever holds it.
struct Inner {
    entries: HashMap<u64, Entry>,
    /// Recency index ordered by (last_access, inserted_seq, fingerprint).
    /// The first element is always the eviction victim among live entries.
    recency: BTreeSet<(u64, u64, u64)>,
    /// Logical access clock; incremented on every touch.
    tick: u64,
    /// Insert sequence counter.
    seq: u64,
    /// One marker per fingerprint currently being computed upstream.
    inflight: HashMap<u64, watch::Sender<Option<FlightResult>>>,
}

/// Outcome of [`CacheStore::reserve`].
pub enum Reservation {
    /// Caller must perform the dispatch and publish the result.
    Leader(PublishToken),
    /// Another request is already dispatching this fingerprint; wait on
    /// its result.
    Follower(ResultWaiter),
    /// The entry appeared between the caller's miss and the reservation.
    Cached { payload: String, provider: String },
}

/// Leader's obligation to publish. Dropping the token without publishing
/// releases all followers with a failure so none of them hang.
pub struct PublishToken {
    fingerprint: Fingerprint,
    query_type: QueryType,
    inner: Arc<Mutex<Inner>>,
    published: bool,
}

impl PublishToken {
    /// Whether any follower is still waiting on this dispatch. The
    /// orchestrator checks this between fallback attempts when its own
    /// caller has gone away.
    pub fn has_followers(&self) -> bool {
        let inner = lock(&self.inner);
        inner
            .inflight
            .get(&self.fingerprint.0)
            .is_some_and(|tx| tx.receiver_count() > 0)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

impl Drop for PublishToken {
    fn drop(&mut self) {
        if self.published {
            return;
        }
        warn!(fingerprint = %self.fingerprint, "publish token dropped without result");
        let mut inner = lock(&self.inner);
        if let Some(tx) = inner.inflight.remove(&self.fingerprint.0) {
            let _ = tx.send(Some(Err(FlightFailure::abandoned())));
        }
    }
}

/// Bounded key/value store for prior answers, with TTL, LRU eviction,
/// and request coalescing. Process-lifetime singleton owned by the
/// orchestrator; see the [module docs](super) for the invariants.
pub struct CacheStore {
    inner: Arc<Mutex<Inner>>,
    config: CacheConfig,
}

impl CacheStore {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                entries: HashMap::new(),
                recency: BTreeSet::new(),
                tick: 0,
                seq: 0,
                inflight: HashMap::new(),
            })),
            config,
        }
    }

    /// Look up a fingerprint.
    ///
    /// A hit updates the entry's recency. Expired and corrupt entries are
    /// removed and reported as misses. Emits hit/miss metrics.
    pub fn get(&self, fingerprint: Fingerprint) -> Option<(String, String)> {
        enum Lookup {
            Miss,
            Expired,
            Corrupt,
            Hit(String, String),
        }

        let now = Instant::now();
        let mut inner = lock(&self.inner);

        let lookup = match inner.entries.get(&fingerprint.0) {
            None => Lookup::Miss,
            Some(e) if e.expires_at <= now => Lookup::Expired,
            Some(e) if checksum(&e.payload) != e.checksum => Lookup::Corrupt,
            Some(e) => Lookup::Hit(e.payload.clone(), e.provider.clone()),
        };

        match lookup {
            Lookup::Hit(payload, provider) => {
                touch(&mut inner, fingerprint.0);
                metrics::counter!(telemetry::CACHE_HITS_TOTAL).increment(1);
                Some((payload, provider))
            }
            Lookup::Expired => {
                remove_entry(&mut inner, fingerprint.0);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
            Lookup::Corrupt => {
                // Self-healing: drop the entry; the next successful
                // dispatch overwrites it.
                warn!(%fingerprint, "cache entry failed integrity check, discarding");
                remove_entry(&mut inner, fingerprint.0);
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
            Lookup::Miss => {
                metrics::counter!(telemetry::CACHE_MISSES_TOTAL).increment(1);
                None
            }
        }
    }

    /// Register interest in a fingerprint that just missed.
    ///
    /// The first caller becomes the leader and must dispatch upstream,
    /// then call [`publish`](Self::publish). Concurrent callers become
    /// followers of the existing marker. If the entry materialised since
    /// the caller's miss, the cached payload is returned directly.
    pub fn reserve(&self, fingerprint: Fingerprint, query_type: QueryType) -> Reservation {
        let mut inner = lock(&self.inner);

        // The leader may have published between our miss and this call.
        // The caller's preceding `get` already counted this request as a
        // miss, so no hit counter here.
        if let Some(entry) = inner.entries.get(&fingerprint.0) {
            if entry.expires_at > Instant::now() && checksum(&entry.payload) == entry.checksum {
                let payload = entry.payload.clone();
                let provider = entry.provider.clone();
                touch(&mut inner, fingerprint.0);
                return Reservation::Cached { payload, provider };
            }
            // Expired or corrupt; drop it and treat the caller as fresh.
            remove_entry(&mut inner, fingerprint.0);
        }

        if let Some(tx) = inner.inflight.get(&fingerprint.0) {
            metrics::counter!(telemetry::COALESCED_WAITERS_TOTAL).increment(1);
            return Reservation::Follower(ResultWaiter::new(tx.subscribe()));
        }

        let (tx, _rx) = watch::channel(None);
        inner.inflight.insert(fingerprint.0, tx);
        debug!(%fingerprint, "reserved in-flight marker, caller is leader");
        Reservation::Leader(PublishToken {
            fingerprint,
            query_type,
            inner: Arc::clone(&self.inner),
            published: false,
        })
    }

    /// Publish the leader's dispatch result.
    ///
    /// Releases every follower with the same result. On success the
    /// payload is inserted with the TTL configured for the token's query
    /// type, evicting least-recently-used entries first if the store is
    /// at capacity.
    pub fn publish(&self, mut token: PublishToken, result: FlightResult) {
        token.published = true;
        let fingerprint = token.fingerprint;
        let mut inner = lock(&self.inner);

        if let Ok(outcome) = &result {
            let ttl = self.config.ttl.ttl_for(token.query_type);
            insert_entry(
                &mut inner,
                self.config.capacity,
                fingerprint.0,
                outcome.payload.clone(),
                outcome.provider.clone(),
                Instant::now() + ttl,
            );
        }

        // Remove the marker and release followers inside the same
        // critical section, so no new follower can attach to a marker
        // that will never fire.
        if let Some(tx) = inner.inflight.remove(&fingerprint.0) {
            let _ = tx.send(Some(result));
        }
    }

    /// Remove every expired entry. Lazy expiry on `get` keeps the store
    /// correct without this; call it from a maintenance task to reclaim
    /// memory for entries that are never read again.
    pub fn sweep_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = lock(&self.inner);
        let expired: Vec<u64> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(fp, _)| *fp)
            .collect();
        for fp in &expired {
            remove_entry(&mut inner, *fp);
        }
        expired.len()
    }

    /// Current number of live entries (expired but unswept entries count).
    pub fn len(&self) -> usize {
        lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock helper: a poisoned cache mutex means a panic mid-mutation; the
/// index may be stale but never structurally broken, so continue.
fn lock(inner: &Arc<Mutex<Inner>>) -> std::sync::MutexGuard<'_, Inner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn checksum(payload: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.hash(&mut hasher);
    hasher.finish()
}

/// Bump the logical clock and reindex the entry's recency.
fn touch(inner: &mut Inner, fp: u64) {
    inner.tick += 1;
    let tick = inner.tick;
    if let Some(entry) = inner.entries.get_mut(&fp) {
        inner
            .recency
            .remove(&(entry.last_access, entry.inserted_seq, fp));
        entry.last_access = tick;
        let key = (tick, entry.inserted_seq, fp);
        inner.recency.insert(key);
    }
}

fn remove_entry(inner: &mut Inner, fp: u64) {
    if let Some(entry) = inner.entries.remove(&fp) {
        inner
            .recency
            .remove(&(entry.last_access, entry.inserted_seq, fp));
    }
}

fn insert_entry(
    inner: &mut Inner,
    capacity: usize,
    fp: u64,
    payload: String,
    provider: String,
    expires_at: Instant,
) {
    // Replacement keeps the one-entry-per-fingerprint invariant.
    remove_entry(inner, fp);

    // Make room before inserting so size never exceeds capacity.
    // Expired entries go first regardless of recency.
    if inner.entries.len() >= capacity {
        let now = Instant::now();
        let expired: Vec<u64> = inner
            .entries
            .iter()
            .filter(|(_, e)| e.expires_at <= now)
            .map(|(k, _)| *k)
            .collect();
        for victim in expired {
            remove_entry(inner, victim);
            metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
        }
    }
    while inner.entries.len() >= capacity {
        let Some(&(tick, seq, victim)) = inner.recency.iter().next() else {
            break;
        };
        inner.recency.remove(&(tick, seq, victim));
        inner.entries.remove(&victim);
        metrics::counter!(telemetry::CACHE_EVICTIONS_TOTAL).increment(1);
        debug!(fingerprint = %Fingerprint(victim), "evicted least-recently-used entry");
    }

    inner.tick += 1;
    inner.seq += 1;
    let (tick, seq) = (inner.tick, inner.seq);
    let checksum = checksum(&payload);
    inner.entries.insert(
        fp,
        Entry {
            payload,
            provider,
            checksum,
            expires_at,
            last_access: tick,
            inserted_seq: seq,
        },
    );
    inner.recency.insert((tick, seq, fp));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::cache::{FlightOutcome, TtlTable};

    fn store(capacity: usize) -> CacheStore {
        CacheStore::new(CacheConfig::new().capacity(capacity))
    }

    fn fp(n: u64) -> Fingerprint {
        Fingerprint(n)
    }

    fn publish_ok(store: &CacheStore, fingerprint: Fingerprint, payload: &str) {
        match store.reserve(fingerprint, QueryType::Generation) {
            Reservation::Leader(token) => store.publish(
                token,
                Ok(FlightOutcome {
                    payload: payload.to_string(),
                    provider: "test".to_string(),
                }),
            ),
            _ => panic!("expected to be leader"),
        }
    }

    #[tokio::test]
    async fn publish_then_get_returns_payload() {
        let store = store(8);
        publish_ok(&store, fp(1), "answer");
        let (payload, provider) = store.get(fp(1)).expect("hit");
        assert_eq!(payload, "answer");
        assert_eq!(provider, "test");
    }

    #[tokio::test]
    async fn get_unknown_fingerprint_is_miss() {
        let store = store(8);
        assert!(store.get(fp(42)).is_none());
    }

    #[tokio::test]
    async fn failed_publish_does_not_populate() {
        let store = store(8);
        match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Leader(token) => store.publish(
                token,
                Err(FlightFailure::new(2, "test", "boom")),
            ),
            _ => panic!("expected to be leader"),
        }
        assert!(store.get(fp(1)).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let config = CacheConfig::new().capacity(8).ttl(TtlTable {
            generation: Duration::from_secs(10),
            ..TtlTable::default()
        });
        let store = CacheStore::new(config);
        publish_ok(&store, fp(1), "answer");

        tokio::time::advance(Duration::from_secs(9)).await;
        assert!(store.get(fp(1)).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(store.get(fp(1)).is_none(), "expired entry must miss");
        assert!(store.is_empty(), "lazy expiry removes the entry");
    }

    #[tokio::test]
    async fn insert_beyond_capacity_evicts_lru() {
        let store = store(2);
        publish_ok(&store, fp(1), "one");
        publish_ok(&store, fp(2), "two");
        // Touch 1 so 2 becomes the LRU victim.
        assert!(store.get(fp(1)).is_some());

        publish_ok(&store, fp(3), "three");
        assert_eq!(store.len(), 2);
        assert!(store.get(fp(2)).is_none(), "LRU entry evicted");
        assert!(store.get(fp(1)).is_some());
        assert!(store.get(fp(3)).is_some());
    }

    #[tokio::test]
    async fn eviction_tie_breaks_toward_earlier_insert() {
        let store = store(2);
        publish_ok(&store, fp(1), "one");
        publish_ok(&store, fp(2), "two");
        // No accesses: both entries keep their insert-time recency.
        publish_ok(&store, fp(3), "three");
        assert!(store.get(fp(1)).is_none(), "earlier insert evicted first");
        assert!(store.get(fp(2)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entries_are_evicted_before_live_ones() {
        let config = CacheConfig::new().capacity(2).ttl(TtlTable {
            generation: Duration::from_secs(10),
            conversational: Duration::from_secs(1),
            ..TtlTable::default()
        });
        let store = CacheStore::new(config);

        // Conversational entry expires quickly.
        match store.reserve(fp(1), QueryType::Conversational) {
            Reservation::Leader(token) => store.publish(
                token,
                Ok(FlightOutcome {
                    payload: "volatile".into(),
                    provider: "test".into(),
                }),
            ),
            _ => panic!("expected leader"),
        }
        publish_ok(&store, fp(2), "stable");
        // Touch entry 1 so plain LRU would evict entry 2.
        assert!(store.get(fp(1)).is_some());

        tokio::time::advance(Duration::from_secs(2)).await;
        // Entry 1 is now expired; expiry precedence evicts it instead.
        publish_ok(&store, fp(3), "new");
        assert!(store.get(fp(1)).is_none());
        assert!(store.get(fp(2)).is_some(), "live entry survived");
        assert!(store.get(fp(3)).is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn republishing_after_expiry_replaces_the_entry() {
        let config = CacheConfig::new().capacity(8).ttl(TtlTable {
            generation: Duration::from_secs(10),
            ..TtlTable::default()
        });
        let store = CacheStore::new(config);
        publish_ok(&store, fp(1), "old");

        tokio::time::advance(Duration::from_secs(11)).await;
        // The stale entry is still resident; a fresh leader replaces it
        // in place rather than leaving two copies behind.
        publish_ok(&store, fp(1), "new");
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(fp(1)).unwrap().0, "new");
    }

    #[tokio::test]
    async fn reserve_on_corrupt_entry_elects_a_new_leader() {
        let store = store(8);
        publish_ok(&store, fp(1), "answer");
        {
            let mut inner = store.inner.lock().unwrap();
            inner.entries.get_mut(&1).unwrap().payload = "tampered".into();
        }
        assert!(
            matches!(
                store.reserve(fp(1), QueryType::Generation),
                Reservation::Leader(_)
            ),
            "corrupt entry must not be served"
        );
        assert!(store.is_empty(), "corrupt entry discarded");
    }

    #[tokio::test]
    async fn second_reserve_becomes_follower() {
        let store = store(8);
        let token = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Leader(token) => token,
            _ => panic!("expected leader"),
        };
        let waiter = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Follower(waiter) => waiter,
            _ => panic!("expected follower"),
        };

        store.publish(
            token,
            Ok(FlightOutcome {
                payload: "shared".into(),
                provider: "test".into(),
            }),
        );
        let outcome = waiter.wait().await.expect("success");
        assert_eq!(outcome.payload, "shared");
    }

    #[tokio::test]
    async fn follower_stays_pending_until_publish() {
        let store = store(8);
        let token = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Leader(token) => token,
            _ => panic!("expected leader"),
        };
        let waiter = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Follower(waiter) => waiter,
            _ => panic!("expected follower"),
        };

        let mut wait = tokio_test::task::spawn(waiter.wait());
        tokio_test::assert_pending!(wait.poll());

        store.publish(
            token,
            Ok(FlightOutcome {
                payload: "shared".into(),
                provider: "test".into(),
            }),
        );
        assert!(wait.is_woken(), "publish must wake the follower");
        let outcome = tokio_test::assert_ready!(wait.poll()).expect("success");
        assert_eq!(outcome.payload, "shared");
    }

    #[tokio::test]
    async fn followers_observe_leader_failure() {
        let store = store(8);
        let token = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Leader(token) => token,
            _ => panic!("expected leader"),
        };
        let waiter = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Follower(waiter) => waiter,
            _ => panic!("expected follower"),
        };

        store.publish(
            token,
            Err(FlightFailure::new(3, "last", "upstream 500")),
        );
        let failure = waiter.wait().await.expect_err("failure");
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.message, "upstream 500");
    }

    #[tokio::test]
    async fn dropped_token_releases_followers_with_failure() {
        let store = store(8);
        let token = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Leader(token) => token,
            _ => panic!("expected leader"),
        };
        let waiter = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Follower(waiter) => waiter,
            _ => panic!("expected follower"),
        };

        drop(token);
        let failure = waiter.wait().await.expect_err("abandoned");
        assert!(failure.abandoned);
        assert!(failure.message.contains("abandoned"));

        // The marker is gone; the next reserve is a fresh leader.
        assert!(matches!(
            store.reserve(fp(1), QueryType::Generation),
            Reservation::Leader(_)
        ));
    }

    #[tokio::test]
    async fn reserve_after_publish_sees_cached_entry() {
        let store = store(8);
        publish_ok(&store, fp(1), "answer");
        match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Cached { payload, .. } => assert_eq!(payload, "answer"),
            _ => panic!("expected cached"),
        }
    }

    #[tokio::test]
    async fn has_followers_tracks_waiters() {
        let store = store(8);
        let token = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Leader(token) => token,
            _ => panic!("expected leader"),
        };
        assert!(!token.has_followers());

        let waiter = match store.reserve(fp(1), QueryType::Generation) {
            Reservation::Follower(waiter) => waiter,
            _ => panic!("expected follower"),
        };
        assert!(token.has_followers());

        drop(waiter);
        assert!(!token.has_followers());
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_removes_expired_entries() {
        let config = CacheConfig::new().capacity(8).ttl(TtlTable {
            generation: Duration::from_secs(5),
            ..TtlTable::default()
        });
        let store = CacheStore::new(config);
        publish_ok(&store, fp(1), "a");
        publish_ok(&store, fp(2), "b");

        tokio::time::advance(Duration::from_secs(6)).await;
        assert_eq!(store.sweep_expired(), 2);
        assert!(store.is_empty());
    }
}
