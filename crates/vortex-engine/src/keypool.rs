use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;
use tracing::{error, info, warn};

/// Environment variable name prefixes recognized as backend credentials.
const KEY_PREFIXES: &[&str] = &["GOOGLE_KEY_", "GEMINI_KEY_"];
/// Exact environment variable name also recognized.
const KEY_EXACT: &str = "GEMINI_API_KEY";
/// Sample values shipped in docs/templates; never usable credentials.
const PLACEHOLDER_VALUES: &[&str] = &["MY_GEMINI_API_KEY", "YOUR_API_KEY"];

const RATE_LIMIT_COOLDOWN_MS: i64 = 60_000;
const SERVER_ERROR_COOLDOWN_MS: i64 = 30_000;

/// How a failed backend call reflects on the credential that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// The key itself was rejected. Permanent exclusion.
    Invalid,
    /// Too many requests. 60s cooldown.
    RateLimited,
    /// Quota exceeded. 60s cooldown.
    Quota,
    /// Upstream fault not attributable to the key. 30s cooldown.
    ServerError,
}

#[derive(Debug, Clone)]
struct Credential {
    secret: String,
    disabled: bool,
    /// Unix ms before which this credential is ineligible. 0 = none.
    cooldown_until: i64,
    usage_count: u64,
    last_used_at: i64,
}

impl Credential {
    fn new(secret: String) -> Self {
        Self {
            secret,
            disabled: false,
            cooldown_until: 0,
            usage_count: 0,
            last_used_at: 0,
        }
    }
}

struct PoolState {
    keys: Vec<Credential>,
    /// Rotation cursor, always in `[0, keys.len())` for a non-empty pool.
    cursor: usize,
}

/// Availability breakdown of the pool at a point in time.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct PoolStatus {
    pub total: usize,
    pub active: usize,
    pub cooling: usize,
    pub disabled: usize,
}

/// A rotating pool of backend API credentials.
///
/// Insertion order is fixed at load time; selection is fair round-robin
/// from a persistent cursor, skipping disabled and cooling entries. All
/// mutation happens under one mutex since the pool is shared across
/// concurrent analysis calls.
pub struct KeyPool {
    state: Mutex<PoolState>,
}

impl KeyPool {
    /// Build a pool from explicit secrets, filtering empties, known
    /// placeholder values, and duplicates (insertion order preserved).
    ///
    /// An empty result is a degraded state, not an error: callers must
    /// treat "no credentials" as normal and `next()` will return `None`.
    pub fn from_secrets(secrets: impl IntoIterator<Item = String>) -> Self {
        let mut seen = HashSet::new();
        let keys: Vec<Credential> = secrets
            .into_iter()
            .filter(|s| !s.is_empty() && !PLACEHOLDER_VALUES.contains(&s.as_str()))
            .filter(|s| seen.insert(s.clone()))
            .map(Credential::new)
            .collect();

        if keys.is_empty() {
            error!("No API keys found; pool starts exhausted");
        } else {
            info!(count = keys.len(), "Loaded API keys");
        }

        Self {
            state: Mutex::new(PoolState { keys, cursor: 0 }),
        }
    }

    /// Build a pool from the process environment, matching the recognized
    /// variable names sorted for deterministic load order.
    pub fn from_env() -> Self {
        Self::from_secrets(secrets_from_vars(std::env::vars()))
    }

    pub fn len(&self) -> usize {
        self.locked().keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locked().keys.is_empty()
    }

    /// Select the next eligible credential and mark it used.
    ///
    /// Scans at most one full revolution from the cursor; the cursor
    /// advances once per inspected candidate so rotation stays fair
    /// across calls. `None` means the pool is exhausted right now.
    pub fn next(&self) -> Option<String> {
        self.next_at(Utc::now().timestamp_millis())
    }

    pub(crate) fn next_at(&self, now_ms: i64) -> Option<String> {
        let mut state = self.locked();
        let size = state.keys.len();
        if size == 0 {
            return None;
        }

        for _ in 0..size {
            let idx = state.cursor;
            state.cursor = (state.cursor + 1) % size;

            let key = &mut state.keys[idx];
            if key.disabled || key.cooldown_until > now_ms {
                continue;
            }

            key.last_used_at = now_ms;
            key.usage_count += 1;
            return Some(key.secret.clone());
        }

        None
    }

    /// Record a failure against the credential with the given secret.
    ///
    /// Unknown secrets are a no-op. Repeated failures overwrite the
    /// cooldown deadline; they do not escalate.
    pub fn report_failure(&self, secret: &str, kind: FailureKind) {
        self.report_failure_at(secret, kind, Utc::now().timestamp_millis());
    }

    pub(crate) fn report_failure_at(&self, secret: &str, kind: FailureKind, now_ms: i64) {
        let mut state = self.locked();
        let Some(key) = state.keys.iter_mut().find(|k| k.secret == secret) else {
            return;
        };

        match kind {
            FailureKind::Invalid => {
                key.disabled = true;
                error!(
                    key = %suffix(secret),
                    usage = key.usage_count,
                    last_used_ms = key.last_used_at,
                    "Key permanently disabled (invalid)"
                );
            }
            FailureKind::RateLimited | FailureKind::Quota => {
                key.cooldown_until = now_ms + RATE_LIMIT_COOLDOWN_MS;
                warn!(key = %suffix(secret), kind = ?kind, "Key cooling for 60s");
            }
            FailureKind::ServerError => {
                key.cooldown_until = now_ms + SERVER_ERROR_COOLDOWN_MS;
                warn!(key = %suffix(secret), "Key cooling for 30s (server error)");
            }
        }
    }

    /// Availability counts, for health reporting.
    pub fn status(&self) -> PoolStatus {
        self.status_at(Utc::now().timestamp_millis())
    }

    pub(crate) fn status_at(&self, now_ms: i64) -> PoolStatus {
        let state = self.locked();
        let mut status = PoolStatus {
            total: state.keys.len(),
            active: 0,
            cooling: 0,
            disabled: 0,
        };
        for key in &state.keys {
            if key.disabled {
                status.disabled += 1;
            } else if key.cooldown_until > now_ms {
                status.cooling += 1;
            } else {
                status.active += 1;
            }
        }
        status
    }

    fn locked(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[cfg(test)]
    fn usage_of(&self, secret: &str) -> Option<(u64, i64)> {
        self.locked()
            .keys
            .iter()
            .find(|k| k.secret == secret)
            .map(|k| (k.usage_count, k.last_used_at))
    }
}

/// Pick recognized credential variables out of a flat name/value namespace,
/// sorted by name for deterministic load order.
fn secrets_from_vars(vars: impl IntoIterator<Item = (String, String)>) -> Vec<String> {
    let mut matched: Vec<(String, String)> = vars
        .into_iter()
        .filter(|(name, _)| {
            name == KEY_EXACT || KEY_PREFIXES.iter().any(|p| name.starts_with(p))
        })
        .collect();
    matched.sort_by(|a, b| a.0.cmp(&b.0));
    matched.into_iter().map(|(_, value)| value).collect()
}

/// Last few characters of a secret, for logs. Never the full value.
fn suffix(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    let tail: String = chars.iter().rev().take(4).rev().collect();
    format!("...{tail}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool_of(secrets: &[&str]) -> KeyPool {
        KeyPool::from_secrets(secrets.iter().map(|s| s.to_string()))
    }

    #[test]
    fn load_filters_placeholders_empties_and_duplicates() {
        let pool = pool_of(&["key-a", "", "MY_GEMINI_API_KEY", "key-a", "YOUR_API_KEY", "key-b"]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn empty_pool_is_degraded_not_fatal() {
        let pool = pool_of(&[]);
        assert!(pool.is_empty());
        assert_eq!(pool.next_at(0), None);
    }

    #[test]
    fn rotation_returns_distinct_keys_then_wraps() {
        let pool = pool_of(&["k1", "k2", "k3"]);

        let first: Vec<String> = (0..3).map(|_| pool.next_at(1_000).unwrap()).collect();
        assert_eq!(first, vec!["k1", "k2", "k3"]);

        // Fourth call wraps back to the first key.
        assert_eq!(pool.next_at(1_000).unwrap(), "k1");
    }

    #[test]
    fn invalid_key_is_never_selected_again() {
        let pool = pool_of(&["k1", "k2"]);
        pool.report_failure_at("k1", FailureKind::Invalid, 1_000);

        for _ in 0..10 {
            assert_eq!(pool.next_at(i64::MAX - 1).unwrap(), "k2");
        }
    }

    #[test]
    fn quota_cooldown_lasts_exactly_sixty_seconds() {
        let pool = pool_of(&["k1"]);
        pool.report_failure_at("k1", FailureKind::Quota, 10_000);

        assert_eq!(pool.next_at(10_000 + 59_999), None);
        assert_eq!(pool.next_at(10_000 + 60_000).unwrap(), "k1");
    }

    #[test]
    fn rate_limit_cooldown_matches_quota() {
        let pool = pool_of(&["k1"]);
        pool.report_failure_at("k1", FailureKind::RateLimited, 0);

        assert_eq!(pool.next_at(59_999), None);
        assert!(pool.next_at(60_000).is_some());
    }

    #[test]
    fn server_error_cooldown_lasts_exactly_thirty_seconds() {
        let pool = pool_of(&["k1"]);
        pool.report_failure_at("k1", FailureKind::ServerError, 10_000);

        assert_eq!(pool.next_at(10_000 + 29_999), None);
        assert_eq!(pool.next_at(10_000 + 30_000).unwrap(), "k1");
    }

    #[test]
    fn exhausted_when_every_key_unavailable() {
        let pool = pool_of(&["k1", "k2", "k3"]);
        pool.report_failure_at("k1", FailureKind::Invalid, 0);
        pool.report_failure_at("k2", FailureKind::Quota, 0);
        pool.report_failure_at("k3", FailureKind::ServerError, 0);

        assert_eq!(pool.next_at(1_000), None);
    }

    #[test]
    fn repeated_failures_overwrite_cooldown_deadline() {
        let pool = pool_of(&["k1"]);
        pool.report_failure_at("k1", FailureKind::Quota, 0);
        pool.report_failure_at("k1", FailureKind::ServerError, 50_000);

        // The later 30s deadline replaced the earlier 60s one.
        assert_eq!(pool.next_at(79_999), None);
        assert!(pool.next_at(80_000).is_some());
    }

    #[test]
    fn unknown_secret_is_a_no_op() {
        let pool = pool_of(&["k1"]);
        pool.report_failure_at("not-in-pool", FailureKind::Invalid, 0);
        assert!(pool.next_at(1_000).is_some());
    }

    #[test]
    fn cursor_skips_cooling_key_without_starving_others() {
        let pool = pool_of(&["k1", "k2", "k3"]);
        pool.report_failure_at("k2", FailureKind::Quota, 0);

        assert_eq!(pool.next_at(1_000).unwrap(), "k1");
        assert_eq!(pool.next_at(1_000).unwrap(), "k3");
        assert_eq!(pool.next_at(1_000).unwrap(), "k1");

        // After the cooldown expires k2 rejoins the rotation.
        assert_eq!(pool.next_at(70_000).unwrap(), "k2");
    }

    #[test]
    fn selection_tracks_usage_and_last_used() {
        let pool = pool_of(&["k1", "k2"]);
        assert_eq!(pool.usage_of("k1").unwrap(), (0, 0));

        pool.next_at(5_000);
        pool.next_at(6_000);
        pool.next_at(7_000);

        assert_eq!(pool.usage_of("k1").unwrap(), (2, 7_000));
        assert_eq!(pool.usage_of("k2").unwrap(), (1, 6_000));
    }

    #[test]
    fn status_counts_by_availability() {
        let pool = pool_of(&["k1", "k2", "k3", "k4"]);
        pool.report_failure_at("k2", FailureKind::Invalid, 0);
        pool.report_failure_at("k3", FailureKind::Quota, 1_000);

        let status = pool.status_at(2_000);
        assert_eq!(
            status,
            PoolStatus {
                total: 4,
                active: 2,
                cooling: 1,
                disabled: 1,
            }
        );
    }

    #[test]
    fn env_discovery_matches_prefixes_and_sorts_by_name() {
        let vars = vec![
            ("GEMINI_KEY_B".to_string(), "kb".to_string()),
            ("PATH".to_string(), "/usr/bin".to_string()),
            ("GOOGLE_KEY_1".to_string(), "kg".to_string()),
            ("GEMINI_API_KEY".to_string(), "ka".to_string()),
            ("GEMINI_KEY_A".to_string(), "kaa".to_string()),
            ("GEMINI_API_KEY_EXTRA".to_string(), "ignored".to_string()),
        ];

        let secrets = secrets_from_vars(vars);
        assert_eq!(secrets, vec!["ka", "kaa", "kb", "kg"]);
    }

    #[test]
    fn suffix_never_exposes_full_secret() {
        assert_eq!(suffix("abcdef1234"), "...1234");
        assert_eq!(suffix("ab"), "...ab");
    }
}
