//! Per-client limiter registry.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::{debug, trace};

use super::bucket::{Quota, TokenBucket};
use super::identity::ClientIdentity;

/// A token bucket shared between the registry and the request holding it.
pub type SharedBucket = Arc<Mutex<TokenBucket>>;

/// Rate limit state for a single client.
#[derive(Debug)]
struct ClientState {
    /// The client's token bucket
    limiter: SharedBucket,
    /// Last time a request was attributed to this client
    last_seen: Instant,
}

/// Registry mapping client identities to their token buckets.
///
/// Entries are created lazily on first sight of a client and removed only
/// by [`ClientRegistry::sweep`]. The whole map sits behind one mutex; every
/// lookup, insert and sweep holds it for the duration of the operation.
#[derive(Debug)]
pub struct ClientRegistry {
    /// Client state indexed by identity
    clients: Mutex<HashMap<ClientIdentity, ClientState>>,
    /// Quota applied to newly created buckets
    quota: Quota,
}

impl ClientRegistry {
    /// Create an empty registry using the default quota.
    pub fn new() -> Self {
        Self::with_quota(Quota::default())
    }

    /// Create an empty registry whose buckets use `quota`.
    pub fn with_quota(quota: Quota) -> Self {
        Self {
            clients: Mutex::new(HashMap::new()),
            quota,
        }
    }

    /// Get the bucket for `identity`, creating it if this is a new client.
    ///
    /// Refreshes the client's last-seen time either way.
    pub fn get_or_create(&self, identity: &ClientIdentity) -> SharedBucket {
        self.get_or_create_at(identity, Instant::now())
    }

    pub(crate) fn get_or_create_at(&self, identity: &ClientIdentity, now: Instant) -> SharedBucket {
        let mut clients = self.clients.lock();

        if let Some(state) = clients.get_mut(identity.as_str()) {
            state.last_seen = now;
            return Arc::clone(&state.limiter);
        }

        debug!(
            client = %identity,
            rate = self.quota.rate,
            burst = self.quota.burst,
            "Creating rate limiter for new client"
        );

        let limiter = Arc::new(Mutex::new(TokenBucket::with_instant(self.quota, now)));
        clients.insert(
            identity.clone(),
            ClientState {
                limiter: Arc::clone(&limiter),
                last_seen: now,
            },
        );

        limiter
    }

    /// Check whether a request from `identity` is admitted.
    ///
    /// The registry lock is released before the bucket is consumed; the
    /// bucket's own lock serializes requests from the same client.
    pub fn check(&self, identity: &ClientIdentity) -> bool {
        let limiter = self.get_or_create(identity);
        let allowed = limiter.lock().allow();

        trace!(client = %identity, allowed, "Checked rate limit");
        allowed
    }

    /// Remove every client idle for longer than `idle_threshold`.
    ///
    /// Returns the number of evicted clients.
    pub fn sweep(&self, idle_threshold: Duration) -> usize {
        self.sweep_at(Instant::now(), idle_threshold)
    }

    pub(crate) fn sweep_at(&self, now: Instant, idle_threshold: Duration) -> usize {
        let mut clients = self.clients.lock();
        let before = clients.len();

        clients.retain(|_, state| now.saturating_duration_since(state.last_seen) <= idle_threshold);

        before - clients.len()
    }

    /// Whether the registry currently tracks `identity`.
    pub fn contains(&self, identity: &str) -> bool {
        self.clients.lock().contains_key(identity)
    }

    /// Get the number of tracked clients.
    pub fn len(&self) -> usize {
        self.clients.lock().len()
    }

    /// Whether no clients are tracked.
    pub fn is_empty(&self) -> bool {
        self.clients.lock().is_empty()
    }
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    const IDLE: Duration = Duration::from_secs(180);

    fn client(ip: &str) -> ClientIdentity {
        ClientIdentity::from(ip)
    }

    #[test]
    fn test_registry_creation() {
        let registry = ClientRegistry::new();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_new_clients_use_registry_quota() {
        let registry = ClientRegistry::with_quota(Quota::new(1.0, 2));
        let start = Instant::now();

        let limiter = registry.get_or_create_at(&client("10.0.0.1"), start);
        assert_eq!(limiter.lock().available(start), 2.0);
    }

    #[test]
    fn test_get_or_create_inserts_once() {
        let registry = ClientRegistry::new();
        let identity = client("10.0.0.1");

        let first = registry.get_or_create(&identity);
        let second = registry.get_or_create(&identity);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_limiter_state_is_shared() {
        let registry = ClientRegistry::new();
        let identity = client("10.0.0.1");

        for _ in 0..4 {
            assert!(registry.check(&identity));
        }

        let limiter = registry.get_or_create(&identity);
        assert!(!limiter.lock().allow());
    }

    #[test]
    fn test_clients_are_limited_independently() {
        let registry = ClientRegistry::new();
        let a = client("10.0.0.1");
        let b = client("10.0.0.2");

        for _ in 0..4 {
            assert!(registry.check(&a));
        }
        assert!(!registry.check(&a));

        assert!(registry.check(&b));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_sweep_removes_idle_clients() {
        let registry = ClientRegistry::new();
        let start = Instant::now();

        registry.get_or_create_at(&client("10.0.0.1"), start);
        registry.get_or_create_at(&client("10.0.0.2"), start + Duration::from_secs(120));

        let now = start + IDLE + Duration::from_secs(1);
        let evicted = registry.sweep_at(now, IDLE);

        assert_eq!(evicted, 1);
        assert!(!registry.contains("10.0.0.1"));
        assert!(registry.contains("10.0.0.2"));
    }

    #[test]
    fn test_lookup_refreshes_last_seen() {
        let registry = ClientRegistry::new();
        let identity = client("10.0.0.1");
        let start = Instant::now();

        registry.get_or_create_at(&identity, start);
        registry.get_or_create_at(&identity, start + Duration::from_secs(150));

        assert_eq!(registry.sweep_at(start + Duration::from_secs(200), IDLE), 0);
        assert!(registry.contains("10.0.0.1"));
    }

    #[test]
    fn test_sweep_keeps_client_at_exact_threshold() {
        let registry = ClientRegistry::new();
        let start = Instant::now();
        registry.get_or_create_at(&client("10.0.0.1"), start);

        assert_eq!(registry.sweep_at(start + IDLE, IDLE), 0);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_evicted_client_starts_with_full_bucket() {
        let registry = ClientRegistry::new();
        let identity = client("10.0.0.1");
        let start = Instant::now();

        let limiter = registry.get_or_create_at(&identity, start);
        for _ in 0..4 {
            limiter.lock().try_acquire(start);
        }
        registry.sweep_at(start + Duration::from_secs(600), IDLE);
        assert!(registry.is_empty());

        let fresh = registry.get_or_create(&identity);
        assert!(!Arc::ptr_eq(&limiter, &fresh));
        assert!(fresh.lock().allow());
    }

    #[test]
    fn test_concurrent_checks_keep_one_entry_per_client() {
        let registry = Arc::new(ClientRegistry::new());
        let shared = client("10.0.0.1");
        let started = std::time::Instant::now();

        let admitted: usize = thread::scope(|scope| {
            let handles: Vec<_> = (0..16)
                .map(|worker| {
                    let registry = Arc::clone(&registry);
                    let shared = shared.clone();
                    scope.spawn(move || {
                        let own = ClientIdentity::from(format!("10.1.0.{worker}").as_str());
                        let mut admitted = 0;
                        for _ in 0..100 {
                            if registry.check(&shared) {
                                admitted += 1;
                            }
                            registry.check(&own);
                        }
                        admitted
                    })
                })
                .collect();

            handles.into_iter().map(|h| h.join().unwrap()).sum()
        });

        assert_eq!(registry.len(), 17);
        assert!(registry.contains("10.0.0.1"));
        for worker in 0..16 {
            assert!(registry.contains(&format!("10.1.0.{worker}")));
        }

        // Every admission is backed by a token: the burst plus whatever
        // refilled while the workers ran.
        let refilled = (started.elapsed().as_secs_f64() * 2.0).ceil() as usize;
        assert!(admitted >= 4);
        assert!(admitted <= 4 + refilled);
    }
}
