use super::result::SettledGroup;
use crate::pipeline::{CallPipeline, CallRequest, CallResult, Prepared};
use crate::transport::Transport;
use crate::{Error, ErrorContext, Result};
use futures::future::{self, BoxFuture, FutureExt};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

pub type OnFulfilled = Box<dyn FnOnce(&CallResult) + Send>;
pub type OnRejected = Box<dyn FnOnce(&Error) + Send>;

struct PendingCall {
    handle: BoxFuture<'static, Result<CallResult>>,
    on_fulfilled: Option<OnFulfilled>,
    on_rejected: Option<OnRejected>,
}

struct AsyncGroup {
    transport: Arc<dyn Transport>,
    calls: Vec<PendingCall>,
}

/// Named groups of deferred calls settled together.
///
/// Each group owns a transport created on its first enqueue, so connection state is never
/// shared between groups. Before hooks and local answers (fixture, call cache) run at
/// enqueue time; only the network step is deferred until [`commit`](Self::commit).
pub struct AsyncBatcher {
    pipeline: Arc<CallPipeline>,
    groups: Mutex<HashMap<String, AsyncGroup>>,
}

impl AsyncBatcher {
    pub fn new(pipeline: Arc<CallPipeline>) -> Self {
        Self {
            pipeline,
            groups: Mutex::new(HashMap::new()),
        }
    }

    pub fn pipeline(&self) -> &Arc<CallPipeline> {
        &self.pipeline
    }

    pub fn enqueue(&self, group: &str, request: CallRequest) -> Result<()> {
        self.enqueue_with(group, request, None, None)
    }

    /// Defer `request` under `group`.
    ///
    /// A call vetoed at enqueue time is not an error here; it settles as a failure on
    /// commit and reaches `on_rejected` like any other.
    pub fn enqueue_with(
        &self,
        group: &str,
        request: CallRequest,
        on_fulfilled: Option<OnFulfilled>,
        on_rejected: Option<OnRejected>,
    ) -> Result<()> {
        let mut groups = self.groups()?;
        if !groups.contains_key(group) {
            let transport = self.pipeline.transport_factory().create()?;
            tracing::debug!(group, "created async group");
            groups.insert(
                group.to_string(),
                AsyncGroup {
                    transport,
                    calls: Vec::new(),
                },
            );
        }
        let Some(entry) = groups.get_mut(group) else {
            return Err(poisoned());
        };

        let handle = match self.pipeline.prepare(&request) {
            Ok(Prepared::Dispatch(ctx)) => {
                let pipeline = self.pipeline.clone();
                let transport = entry.transport.clone();
                async move { pipeline.dispatch(ctx, transport).await }.boxed()
            }
            Ok(Prepared::Answered(ctx, response, source)) => {
                future::ready(self.pipeline.finish(&ctx, response, source)).boxed()
            }
            Err(e) => future::ready(Err(e)).boxed(),
        };

        entry.calls.push(PendingCall {
            handle,
            on_fulfilled,
            on_rejected,
        });
        Ok(())
    }

    /// Wait until every call in `group` settles, then drop the group.
    ///
    /// One failure never cancels the others. Callbacks fire in enqueue order after all calls
    /// settle; the name can be reused as soon as this returns. Committing an unknown group
    /// yields an empty result.
    pub async fn commit(&self, group: &str) -> Result<SettledGroup> {
        let start = Instant::now();
        let Some(removed) = self.groups()?.remove(group) else {
            return Ok(SettledGroup::empty(group));
        };

        let (handles, callbacks): (Vec<_>, Vec<_>) = removed
            .calls
            .into_iter()
            .map(|c| (c.handle, (c.on_fulfilled, c.on_rejected)))
            .unzip();
        let outcomes = future::join_all(handles).await;

        for (outcome, (on_fulfilled, on_rejected)) in outcomes.iter().zip(callbacks) {
            match (outcome, on_fulfilled, on_rejected) {
                (Ok(call), Some(callback), _) => callback(call),
                (Err(e), _, Some(callback)) => callback(e),
                _ => {}
            }
        }

        let settled = SettledGroup {
            name: group.to_string(),
            outcomes,
            elapsed: start.elapsed(),
        };
        tracing::debug!(
            group,
            total = settled.len(),
            rejected = settled.rejected_count(),
            "async group committed"
        );
        Ok(settled)
    }

    pub fn pending(&self, group: &str) -> usize {
        self.groups
            .lock()
            .map(|g| g.get(group).map(|e| e.calls.len()).unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn group_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .groups
            .lock()
            .map(|g| g.keys().cloned().collect())
            .unwrap_or_default();
        names.sort();
        names
    }

    fn groups(&self) -> Result<MutexGuard<'_, HashMap<String, AsyncGroup>>> {
        self.groups.lock().map_err(|_| poisoned())
    }
}

fn poisoned() -> Error {
    Error::cache_with_context(
        "async group lock poisoned",
        ErrorContext::new().with_source("batch"),
    )
}
