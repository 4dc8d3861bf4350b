use super::window::{parse_header, redefine, synchronize, WindowBucket};
use crate::utils::{sha256_hex, unix_now};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Read-only view of every bucket that applies to one `(credential, region, resource)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RateLimitStatus {
    pub application: Vec<WindowBucket>,
    pub method: Vec<WindowBucket>,
    /// Estimated wait until every bucket admits again (ms), if currently blocked.
    pub estimated_wait_ms: Option<u64>,
}

impl RateLimitStatus {
    pub fn is_blocked(&self) -> bool {
        self.estimated_wait_ms.is_some()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RegionLimits {
    application: Vec<WindowBucket>,
    methods: HashMap<String, Vec<WindowBucket>>,
}

/// Admission control mirrored from server-declared rate-limit headers.
///
/// - Application scope is keyed by `(credential, region)`
/// - Method scope is keyed by `(credential, region, resource)`
/// - Limits and counts are replaced wholesale on every registration; nothing is counted locally,
///   so several processes sharing one credential stay consistent with the server
///
/// Credentials are stored as SHA-256 digests so a persisted snapshot never contains a raw key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitControl {
    credentials: HashMap<String, HashMap<String, RegionLimits>>,
}

fn credential_id(credential: &str) -> String {
    sha256_hex(credential.as_bytes())
}

impl RateLimitControl {
    pub fn new() -> Self {
        Self::default()
    }

    fn scope(&self, credential: &str, region: &str) -> Option<&RegionLimits> {
        self.credentials
            .get(&credential_id(credential))
            .and_then(|regions| regions.get(region))
    }

    fn scope_mut(&mut self, credential: &str, region: &str) -> &mut RegionLimits {
        self.credentials
            .entry(credential_id(credential))
            .or_default()
            .entry(region.to_string())
            .or_default()
    }

    /// Replace bucket definitions from `"limit:window,…"` headers.
    ///
    /// A missing header leaves that scope untouched. Windows whose `(limit, window)` pair is
    /// unchanged keep their observed counts; windows no longer declared are dropped.
    pub fn register_limits(
        &mut self,
        credential: &str,
        region: &str,
        resource: &str,
        app_limit: Option<&str>,
        method_limit: Option<&str>,
    ) {
        if app_limit.is_none() && method_limit.is_none() {
            return;
        }
        let scope = self.scope_mut(credential, region);
        if let Some(header) = app_limit {
            redefine(&mut scope.application, &parse_header(header));
        }
        if let Some(header) = method_limit {
            let buckets = scope.methods.entry(resource.to_string()).or_default();
            redefine(buckets, &parse_header(header));
        }
    }

    /// Synchronize observed usage from `"count:window,…"` headers.
    pub fn register_call(
        &mut self,
        credential: &str,
        region: &str,
        resource: &str,
        app_count: Option<&str>,
        method_count: Option<&str>,
    ) {
        self.register_call_at(
            credential,
            region,
            resource,
            app_count,
            method_count,
            unix_now(),
        )
    }

    pub(crate) fn register_call_at(
        &mut self,
        credential: &str,
        region: &str,
        resource: &str,
        app_count: Option<&str>,
        method_count: Option<&str>,
        now: f64,
    ) {
        if app_count.is_none() && method_count.is_none() {
            return;
        }
        let scope = self.scope_mut(credential, region);
        if let Some(header) = app_count {
            synchronize(&mut scope.application, &parse_header(header), now);
        }
        if let Some(header) = method_count {
            if let Some(buckets) = scope.methods.get_mut(resource) {
                synchronize(buckets, &parse_header(header), now);
            }
        }
    }

    /// Whether every applicable bucket admits a call right now.
    ///
    /// `endpoint` is only used for diagnostics; method limits are scoped by `resource`.
    pub fn can_call(&self, credential: &str, region: &str, resource: &str, endpoint: &str) -> bool {
        let admitted = self.can_call_at(credential, region, resource, unix_now());
        if !admitted {
            tracing::debug!(region, resource, endpoint, "rate limit admission denied");
        }
        admitted
    }

    pub(crate) fn can_call_at(&self, credential: &str, region: &str, resource: &str, now: f64) -> bool {
        let Some(scope) = self.scope(credential, region) else {
            return true;
        };
        let method = scope.methods.get(resource).map(Vec::as_slice).unwrap_or(&[]);
        scope
            .application
            .iter()
            .chain(method.iter())
            .all(|bucket| bucket.admits(now))
    }

    pub fn current_status(&self, credential: &str, region: &str, resource: &str) -> RateLimitStatus {
        self.current_status_at(credential, region, resource, unix_now())
    }

    pub(crate) fn current_status_at(
        &self,
        credential: &str,
        region: &str,
        resource: &str,
        now: f64,
    ) -> RateLimitStatus {
        let Some(scope) = self.scope(credential, region) else {
            return RateLimitStatus::default();
        };
        let application = scope.application.clone();
        let method = scope.methods.get(resource).cloned().unwrap_or_default();
        let estimated_wait_ms = application
            .iter()
            .chain(method.iter())
            .filter_map(|b| b.wait_secs(now))
            .fold(None, |acc: Option<f64>, w| Some(acc.map_or(w, |a| a.max(w))))
            .map(|secs| (secs * 1000.0).ceil() as u64);
        RateLimitStatus {
            application,
            method,
            estimated_wait_ms,
        }
    }

    pub fn clear(&mut self) {
        self.credentials.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }
}
