//! Typed extensions attached to response objects.

use super::validate_tag;
use crate::Result;
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Extra behaviour for one kind of response object.
///
/// Capabilities are declared up front; callers downcast through [`Extension::as_any`] to
/// reach the concrete type.
pub trait Extension: Send + Sync {
    fn capabilities(&self) -> &[&'static str];
    fn as_any(&self) -> &dyn Any;

    fn supports(&self, capability: &str) -> bool {
        self.capabilities().contains(&capability)
    }
}

pub trait ExtensionFactory: Send + Sync {
    fn create(&self, data: &serde_json::Value) -> Result<Box<dyn Extension>>;
}

/// Adapter turning a closure into an [`ExtensionFactory`].
pub struct FnExtensionFactory<F>(pub F);

impl<F> ExtensionFactory for FnExtensionFactory<F>
where
    F: Fn(&serde_json::Value) -> Result<Box<dyn Extension>> + Send + Sync,
{
    fn create(&self, data: &serde_json::Value) -> Result<Box<dyn Extension>> {
        (self.0)(data)
    }
}

#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    factories: HashMap<String, Arc<dyn ExtensionFactory>>,
}

impl ExtensionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        tag: impl Into<String>,
        factory: Arc<dyn ExtensionFactory>,
    ) -> Result<()> {
        let tag = tag.into();
        validate_tag(&tag, self.factories.contains_key(&tag), "extensions")?;
        self.factories.insert(tag, factory);
        Ok(())
    }

    pub fn get(&self, tag: &str) -> Option<Arc<dyn ExtensionFactory>> {
        self.factories.get(tag).cloned()
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}
