//! # Stream Reference Manager
//!
//! In-memory lease bookkeeping: which holders want which stream, and until
//! when. A stream is active while it has at least one unexpired holder; the
//! caller subscribes on the first holder and unsubscribes once the last one
//! is gone (see [`crate::hub::StreamHub`]).
//!
//! Everything sits behind one coarse lock and nothing here does I/O.
//! Operations read the clock themselves; only [`StreamRefManager::prune`]
//! takes `now` explicitly.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Shortest lease a holder can get.
pub const MIN_TTL: Duration = Duration::from_secs(1);

/// Identity of one logical consumer. An absent id is the empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct HolderId(String);

impl HolderId {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for HolderId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for HolderId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<Option<&str>> for HolderId {
    fn from(id: Option<&str>) -> Self {
        Self(id.unwrap_or_default().to_string())
    }
}

impl From<Option<String>> for HolderId {
    fn from(id: Option<String>) -> Self {
        Self(id.unwrap_or_default())
    }
}

impl std::fmt::Display for HolderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of [`StreamRefManager::start`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartOutcome {
    /// The stream went from no holders to one.
    pub first: bool,
    pub count: usize,
}

/// Outcome of [`StreamRefManager::stop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopOutcome {
    /// No holders are left.
    pub empty: bool,
    pub count: usize,
    /// The holder was registered, expired or not.
    pub removed: bool,
}

/// Snapshot of one stream for status reporting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRefStatus {
    pub stream: String,
    pub holders: Vec<String>,
}

type Holders = HashMap<HolderId, Instant>;

fn purge(holders: &mut Holders, now: Instant) {
    holders.retain(|_, expiry| *expiry > now);
}

fn expiry(now: Instant, ttl: Duration) -> Instant {
    now + ttl.max(MIN_TTL)
}

#[derive(Debug, Default)]
pub struct StreamRefManager {
    streams: Mutex<HashMap<String, Holders>>,
}

impl StreamRefManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Holders>> {
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register (or re-register) `holder` on `stream` for `ttl`.
    pub fn start(&self, stream: &str, holder: impl Into<HolderId>, ttl: Duration) -> StartOutcome {
        let now = Instant::now();
        let mut streams = self.lock();
        let holders = streams.entry(stream.to_string()).or_default();
        purge(holders, now);

        let first = holders.is_empty();
        holders.insert(holder.into(), expiry(now, ttl));
        StartOutcome {
            first,
            count: holders.len(),
        }
    }

    /// Drop `holder` from `stream`.
    pub fn stop(&self, stream: &str, holder: impl Into<HolderId>) -> StopOutcome {
        let holder = holder.into();
        let now = Instant::now();
        let mut streams = self.lock();

        let Some(holders) = streams.get_mut(stream) else {
            return StopOutcome {
                empty: true,
                count: 0,
                removed: false,
            };
        };

        let removed = holders.remove(&holder).is_some();
        let count = holders.values().filter(|e| **e > now).count();
        // Without a removal, expired holders are left for prune to report.
        if count == 0 && removed {
            streams.remove(stream);
        }

        StopOutcome {
            empty: count == 0,
            count,
            removed,
        }
    }

    /// Extend an existing, unexpired holder. Returns the stream's holder
    /// count, or `None` if the holder was unknown or already expired.
    pub fn renew(&self, stream: &str, holder: impl Into<HolderId>, ttl: Duration) -> Option<usize> {
        let holder = holder.into();
        let now = Instant::now();
        let mut streams = self.lock();
        let holders = streams.get_mut(stream)?;

        // Expired holders stay put so the next prune still reports the stream.
        let slot = holders.get_mut(&holder).filter(|e| **e > now)?;
        *slot = expiry(now, ttl);
        Some(holders.values().filter(|e| **e > now).count())
    }

    /// Remove holders expired at `now` and return the streams that lost
    /// their last holder. A second call with the same `now` returns nothing.
    pub fn prune(&self, now: Instant) -> Vec<String> {
        let mut streams = self.lock();
        let mut emptied = Vec::new();

        streams.retain(|stream, holders| {
            let before = holders.len();
            purge(holders, now);
            if holders.is_empty() {
                if before > 0 {
                    emptied.push(stream.clone());
                }
                false
            } else {
                true
            }
        });

        emptied.sort();
        emptied
    }

    /// Unexpired holders of `stream`.
    #[must_use]
    pub fn count(&self, stream: &str) -> usize {
        let now = Instant::now();
        self.lock()
            .get(stream)
            .map_or(0, |holders| holders.values().filter(|e| **e > now).count())
    }

    #[must_use]
    pub fn is_active(&self, stream: &str) -> bool {
        self.count(stream) > 0
    }

    #[must_use]
    pub fn holders(&self, stream: &str) -> Vec<String> {
        let now = Instant::now();
        let mut holders: Vec<String> = self
            .lock()
            .get(stream)
            .map(|holders| {
                holders
                    .iter()
                    .filter(|(_, e)| **e > now)
                    .map(|(h, _)| h.0.clone())
                    .collect()
            })
            .unwrap_or_default();
        holders.sort();
        holders
    }

    /// Every stream with at least one unexpired holder, sorted by name.
    #[must_use]
    pub fn status(&self) -> Vec<StreamRefStatus> {
        let now = Instant::now();
        let mut status: Vec<StreamRefStatus> = self
            .lock()
            .iter()
            .filter_map(|(stream, holders)| {
                let mut live: Vec<String> = holders
                    .iter()
                    .filter(|(_, e)| **e > now)
                    .map(|(h, _)| h.0.clone())
                    .collect();
                if live.is_empty() {
                    return None;
                }
                live.sort();
                Some(StreamRefStatus {
                    stream: stream.clone(),
                    holders: live,
                })
            })
            .collect();
        status.sort_by(|a, b| a.stream.cmp(&b.stream));
        status
    }
}
