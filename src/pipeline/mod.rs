//! 调用流水线：为每次 API 调用执行准入、缓存、回放、分类与状态同步。
//!
//! # Call Pipeline
//!
//! Every outbound call walks the same sequence:
//!
//! ```text
//! resolve context → before hooks → dispatch → classify → after hooks → result
//!                    │              │
//!              rate-limit veto    fixture replay │ cached body │ network
//! ```
//!
//! - **Before hooks**: the built-in admission check (when `cache_rate_limits` is on) runs
//!   first, then user hooks in registration order. Any veto ends the call with
//!   [`Error::RequestAborted`] before network activity.
//! - **Dispatch**: replayed fixture, then cached body (synthetic `200`, no headers), then
//!   the transport. Suspension happens only at the transport.
//! - **After hooks**: rate-limit synchronization, call caching, fixture recording, one
//!   store commit, then user hooks. They run for every obtained response, including ones
//!   classified as failures.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`CallPipeline`] | The orchestrator |
//! | [`CallPipelineBuilder`] | Validates settings and wires collaborators |
//! | [`CallRequest`] | What the caller asks for |
//! | [`CallContext`] | Resolved per-call state handed to hooks |
//! | [`CallResult`] | Status, headers and body of a successful call |
//!
//! ## Example
//!
//! ```rust,no_run
//! use callgate::pipeline::{CallPipeline, CallRequest};
//! use callgate::settings::Settings;
//!
//! # async fn run() -> callgate::Result<()> {
//! let pipeline = CallPipeline::builder(Settings::new("RGAPI-key", "eune").with_cache_rate_limits(true))
//!     .build()?;
//! let result = pipeline
//!     .call(CallRequest::get("/lol/status/v4/platform-data", "3:status"))
//!     .await?;
//! println!("{}", result.json()?);
//! # Ok(())
//! # }
//! ```

mod builder;
mod context;
mod hooks;

#[cfg(test)]
mod tests;

pub use builder::CallPipelineBuilder;
pub use context::{CallContext, CallRequest};
pub use hooks::{AfterHook, BeforeHook, FnAfterHook, FnBeforeHook, HookDecision};

use crate::cache::{CacheManager, CallCacheControl};
use crate::classify::{classify, remote_error, Outcome};
use crate::fixtures::{Fixture, FixtureStore};
use crate::region::RegionResolver;
use crate::registry::{Extension, ExtensionRegistry};
use crate::resilience::{RateLimitControl, RateLimitStatus};
use crate::settings::Settings;
use crate::transport::{RawResponse, Transport, TransportFactory};
use crate::{Error, ErrorContext, Result};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Fixture,
    Cache,
    Network,
}

/// A call that classified as success.
#[derive(Debug, Clone)]
pub struct CallResult {
    pub call_id: Uuid,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub raw_body: String,
    pub source: ResponseSource,
    pub region: String,
    /// Value of the deprecation header, if the server flagged the endpoint.
    pub deprecation: Option<String>,
}

impl CallResult {
    pub fn json(&self) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(&self.raw_body)?)
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.raw_body)?)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

#[derive(Default)]
struct Controls {
    limits: RateLimitControl,
    calls: CallCacheControl,
}

/// Outcome of the synchronous part of a call.
pub(crate) enum Prepared {
    /// Answered locally by a fixture or the call cache.
    Answered(CallContext, RawResponse, ResponseSource),
    /// Needs the transport.
    Dispatch(CallContext),
}

pub struct CallPipeline {
    settings: Settings,
    base_region: String,
    regions: Arc<dyn RegionResolver>,
    transport: Arc<dyn Transport>,
    transports: Arc<dyn TransportFactory>,
    cache: Option<CacheManager>,
    fixtures: Arc<dyn FixtureStore>,
    before_hooks: Vec<Arc<dyn BeforeHook>>,
    after_hooks: Vec<Arc<dyn AfterHook>>,
    extensions: ExtensionRegistry,
    base_url_override: Option<String>,
    controls: Mutex<Controls>,
    region_stack: Mutex<Vec<String>>,
}

fn poisoned(what: &str) -> Error {
    Error::cache_with_context(
        format!("{} lock poisoned", what),
        ErrorContext::new().with_source("pipeline"),
    )
}

impl CallPipeline {
    pub fn builder(settings: Settings) -> CallPipelineBuilder {
        CallPipelineBuilder::new(settings)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Perform one call, waiting for the network if it has to.
    pub async fn call(&self, request: CallRequest) -> Result<CallResult> {
        match self.prepare(&request)? {
            Prepared::Answered(ctx, response, source) => self.finish(&ctx, response, source),
            Prepared::Dispatch(ctx) => self.dispatch(ctx, self.transport.clone()).await,
        }
    }

    /// Resolve the context, run before hooks and try the local answers.
    pub(crate) fn prepare(&self, request: &CallRequest) -> Result<Prepared> {
        let active_region = self.active_region()?;
        let ctx = CallContext::resolve(
            request,
            &self.settings,
            self.regions.as_ref(),
            &active_region,
            self.base_url_override.as_deref(),
        )?;

        self.run_before_hooks(&ctx)?;

        if self.settings.fixtures.replay {
            match self.fixtures.load(&ctx.signature)? {
                Some(fixture) => {
                    tracing::debug!(call_id = %ctx.call_id, signature = %ctx.signature, "answering from fixture");
                    return Ok(Prepared::Answered(ctx, fixture.into(), ResponseSource::Fixture));
                }
                None if !self.settings.fixtures.record => {
                    return Err(Error::FixtureMissing {
                        signature: ctx.signature.clone(),
                    });
                }
                None => {
                    tracing::debug!(call_id = %ctx.call_id, signature = %ctx.signature, "fixture missing, recording from network");
                    return Ok(Prepared::Dispatch(ctx));
                }
            }
        }

        if self.settings.cache_calls {
            let cached = self.controls()?.calls.load_call_data(&ctx.fingerprint);
            if let Some(body) = cached {
                tracing::debug!(call_id = %ctx.call_id, resource = %ctx.resource, "answering from call cache");
                return Ok(Prepared::Answered(
                    ctx,
                    RawResponse::new(200, body),
                    ResponseSource::Cache,
                ));
            }
        }

        Ok(Prepared::Dispatch(ctx))
    }

    /// Network dispatch through `transport`, then classification and after hooks.
    pub(crate) async fn dispatch(
        &self,
        ctx: CallContext,
        transport: Arc<dyn Transport>,
    ) -> Result<CallResult> {
        tracing::debug!(call_id = %ctx.call_id, method = %ctx.method, resource = %ctx.resource, "dispatching to network");
        let response = transport.send(&ctx.http_request()).await.map_err(|e| {
            tracing::debug!(call_id = %ctx.call_id, error = %e, "no response obtained");
            Error::Transport(e)
        })?;
        self.finish(&ctx, response, ResponseSource::Network)
    }

    pub(crate) fn finish(
        &self,
        ctx: &CallContext,
        response: RawResponse,
        source: ResponseSource,
    ) -> Result<CallResult> {
        let deprecation = response
            .header(&self.settings.headers.deprecation)
            .map(str::to_string);
        if let Some(since) = &deprecation {
            tracing::warn!(endpoint = %ctx.endpoint, deprecated_since = %since, "used endpoint is deprecated");
        }

        let outcome = classify(response.status);
        self.run_after_hooks(ctx, &response, source, outcome);

        tracing::info!(
            call_id = %ctx.call_id,
            http_status = response.status,
            resource = %ctx.resource,
            duration_ms = ctx.elapsed_ms(),
            source = ?source,
            "call completed"
        );

        match outcome {
            Outcome::Success => Ok(CallResult {
                call_id: ctx.call_id,
                status: response.status,
                headers: response.headers,
                raw_body: response.body,
                source,
                region: ctx.region.clone(),
                deprecation,
            }),
            Outcome::Failure(kind) => Err(remote_error(response.status, kind, &response.body)),
        }
    }

    fn run_before_hooks(&self, ctx: &CallContext) -> Result<()> {
        if self.settings.cache_rate_limits {
            let admitted = self.controls()?.limits.can_call(
                &ctx.credential,
                &ctx.region,
                &ctx.resource,
                &ctx.endpoint,
            );
            if !admitted {
                return Err(Error::aborted(
                    "API call rate limit would be exceeded by this call.",
                ));
            }
        }
        for hook in &self.before_hooks {
            if let HookDecision::Abort(reason) = hook.before_call(ctx) {
                tracing::debug!(call_id = %ctx.call_id, hook = hook.name(), "call vetoed");
                return Err(Error::aborted(reason));
            }
        }
        Ok(())
    }

    fn run_after_hooks(
        &self,
        ctx: &CallContext,
        response: &RawResponse,
        source: ResponseSource,
        outcome: Outcome,
    ) {
        if let Err(e) = self.synchronize_state(ctx, response, source, outcome) {
            tracing::warn!(call_id = %ctx.call_id, error = %e, "failed to persist call state");
        }
        for hook in &self.after_hooks {
            hook.after_call(ctx, response);
        }
    }

    fn synchronize_state(
        &self,
        ctx: &CallContext,
        response: &RawResponse,
        source: ResponseSource,
        outcome: Outcome,
    ) -> Result<()> {
        let mut controls = self.controls()?;
        let headers = &self.settings.headers;

        if self.settings.cache_rate_limits {
            controls.limits.register_limits(
                &ctx.credential,
                &ctx.region,
                &ctx.resource,
                response.header(&headers.app_limit),
                response.header(&headers.method_limit),
            );
            controls.limits.register_call(
                &ctx.credential,
                &ctx.region,
                &ctx.resource,
                response.header(&headers.app_count),
                response.header(&headers.method_count),
            );
        }

        if self.settings.cache_calls
            && outcome.is_success()
            && !controls.calls.is_call_cached(&ctx.fingerprint)
        {
            if let Some(ttl) = self.settings.call_ttl(&ctx.resource) {
                controls
                    .calls
                    .save_call_data(&ctx.fingerprint, &response.body, ttl);
            }
        }

        let recorded = if self.settings.fixtures.record && source == ResponseSource::Network {
            self.record_fixture(ctx, response)
        } else {
            Ok(())
        };

        if self.settings.cache_calls {
            controls.calls.purge_expired();
        }

        // The commit runs even when recording failed.
        let committed = match &self.cache {
            Some(cache) => cache
                .save(
                    self.settings.cache_rate_limits.then_some(&controls.limits),
                    self.settings.cache_calls.then_some(&controls.calls),
                )
                .map(|_| ()),
            None => Ok(()),
        };

        if let Err(e) = recorded {
            tracing::warn!(call_id = %ctx.call_id, signature = %ctx.signature, error = %e, "failed to record fixture");
        }
        committed
    }

    fn record_fixture(&self, ctx: &CallContext, response: &RawResponse) -> Result<()> {
        if !self.fixtures.exists(&ctx.signature)? {
            self.fixtures.save(&ctx.signature, &Fixture::from(response))?;
        }
        Ok(())
    }

    fn controls(&self) -> Result<MutexGuard<'_, Controls>> {
        self.controls.lock().map_err(|_| poisoned("controls"))
    }

    fn region_stack(&self) -> Result<MutexGuard<'_, Vec<String>>> {
        self.region_stack.lock().map_err(|_| poisoned("region"))
    }

    /// Region used by calls that do not name one.
    pub fn active_region(&self) -> Result<String> {
        Ok(self
            .region_stack()?
            .last()
            .cloned()
            .unwrap_or_else(|| self.base_region.clone()))
    }

    /// Override the region for subsequent calls until the matching pop.
    ///
    /// Overrides nest: each pop restores the region that was active before its push.
    pub fn push_temporary_region(&self, region: &str) -> Result<()> {
        let region = self.regions.region_name(region)?;
        self.regions.routing_target(&region)?;
        self.region_stack()?.push(region);
        Ok(())
    }

    pub fn pop_temporary_region(&self) -> Result<Option<String>> {
        Ok(self.region_stack()?.pop())
    }

    /// Push the continent serving the currently active region.
    pub fn with_continent_region(&self) -> Result<()> {
        let continent = self.regions.continent_of(&self.active_region()?)?;
        self.push_temporary_region(&continent)
    }

    /// Rate-limit snapshot for `resource` in the active region.
    pub fn current_limits(&self, key_name: Option<&str>, resource: &str) -> Result<RateLimitStatus> {
        let region = self.active_region()?;
        let credential = self.settings.credential(key_name);
        Ok(self
            .controls()?
            .limits
            .current_status(credential, &region, resource))
    }

    /// Empty both controls and the backing store.
    pub fn clear_cache(&self) -> Result<bool> {
        {
            let mut controls = self.controls()?;
            controls.limits.clear();
            controls.calls.clear();
        }
        match &self.cache {
            Some(cache) => cache.clear(),
            None => Ok(true),
        }
    }

    /// Build the extension registered under `tag` for a result.
    pub fn extension_for(&self, tag: &str, result: &CallResult) -> Result<Option<Box<dyn Extension>>> {
        match self.extensions.get(tag) {
            Some(factory) => Ok(Some(factory.create(&result.json()?)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn transport_factory(&self) -> Arc<dyn TransportFactory> {
        self.transports.clone()
    }

    pub fn cache_manager(&self) -> Option<&CacheManager> {
        self.cache.as_ref()
    }
}
