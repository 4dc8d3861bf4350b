//! Window buckets and the `"a:b,c:d"` header shape they are synchronized from.

use serde::{Deserialize, Serialize};

/// One independently tracked rate-limit window.
///
/// `observed_count` is whatever the server last reported for this window; it is never
/// incremented locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowBucket {
    pub limit: u64,
    pub window_secs: u64,
    pub observed_count: u64,
    /// Unix time (seconds) of the last count synchronization, `0.0` when never observed.
    pub observed_at: f64,
}

impl WindowBucket {
    pub fn new(limit: u64, window_secs: u64) -> Self {
        Self {
            limit,
            window_secs,
            observed_count: 0,
            observed_at: 0.0,
        }
    }

    /// A rolled-over window counts as fresh.
    pub fn admits(&self, now: f64) -> bool {
        now - self.observed_at >= self.window_secs as f64 || self.observed_count < self.limit
    }

    /// Seconds until this window rolls over, `None` if it currently admits.
    pub fn wait_secs(&self, now: f64) -> Option<f64> {
        if self.admits(now) {
            None
        } else {
            Some((self.observed_at + self.window_secs as f64 - now).max(0.0))
        }
    }

    fn same_definition(&self, limit: u64, window_secs: u64) -> bool {
        self.limit == limit && self.window_secs == window_secs
    }
}

/// Parse `"L1:W1,L2:W2,…"` into ordered `(value, window)` pairs.
///
/// Malformed fragments are skipped with a warning; an empty or missing header yields no pairs.
pub fn parse_header(raw: &str) -> Vec<(u64, u64)> {
    raw.split(',')
        .map(str::trim)
        .filter(|fragment| !fragment.is_empty())
        .filter_map(|fragment| {
            let parsed = fragment.split_once(':').and_then(|(value, window)| {
                Some((
                    value.trim().parse::<u64>().ok()?,
                    window.trim().parse::<u64>().ok()?,
                ))
            });
            if parsed.is_none() {
                tracing::warn!(fragment, "ignoring malformed rate limit header fragment");
            }
            parsed
        })
        .collect()
}

/// Replace a bucket list with new definitions, keeping observations of unchanged windows.
pub(crate) fn redefine(buckets: &mut Vec<WindowBucket>, definitions: &[(u64, u64)]) {
    let previous = std::mem::take(buckets);
    *buckets = definitions
        .iter()
        .map(|&(limit, window_secs)| {
            previous
                .iter()
                .find(|b| b.same_definition(limit, window_secs))
                .cloned()
                .unwrap_or_else(|| WindowBucket::new(limit, window_secs))
        })
        .collect();
}

/// Overwrite observed counts from `(count, window)` pairs.
pub(crate) fn synchronize(buckets: &mut [WindowBucket], counts: &[(u64, u64)], now: f64) {
    for &(count, window_secs) in counts {
        match buckets.iter_mut().find(|b| b.window_secs == window_secs) {
            Some(bucket) => {
                bucket.observed_count = count;
                bucket.observed_at = now;
            }
            None => {
                tracing::debug!(window_secs, "count reported for an undeclared window");
            }
        }
    }
}
