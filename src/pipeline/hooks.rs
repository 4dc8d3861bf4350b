//! Hook system.

use super::context::CallContext;
use crate::transport::RawResponse;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Proceed,
    Abort(String),
}

/// Runs before dispatch, in registration order; the first `Abort` stops the call.
pub trait BeforeHook: Send + Sync {
    fn name(&self) -> &str {
        "before_hook"
    }
    fn before_call(&self, ctx: &CallContext) -> HookDecision;
}

/// Runs after every obtained response, whatever its classification.
pub trait AfterHook: Send + Sync {
    fn name(&self) -> &str {
        "after_hook"
    }
    fn after_call(&self, ctx: &CallContext, response: &RawResponse);
}

pub struct FnBeforeHook<F> {
    name: String,
    func: F,
}

impl<F> FnBeforeHook<F>
where
    F: Fn(&CallContext) -> HookDecision + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> BeforeHook for FnBeforeHook<F>
where
    F: Fn(&CallContext) -> HookDecision + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }
    fn before_call(&self, ctx: &CallContext) -> HookDecision {
        (self.func)(ctx)
    }
}

pub struct FnAfterHook<F> {
    name: String,
    func: F,
}

impl<F> FnAfterHook<F>
where
    F: Fn(&CallContext, &RawResponse) + Send + Sync,
{
    pub fn new(name: impl Into<String>, func: F) -> Self {
        Self {
            name: name.into(),
            func,
        }
    }
}

impl<F> AfterHook for FnAfterHook<F>
where
    F: Fn(&CallContext, &RawResponse) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }
    fn after_call(&self, ctx: &CallContext, response: &RawResponse) {
        (self.func)(ctx, response)
    }
}
