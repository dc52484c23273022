use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::error::ModelError;
use crate::handler::{InferenceHandler, StreamInferenceHandler};
use crate::types::ModelProvider;

/// Provider keyed handler lookup. Built once at startup and then shared
/// read-only behind an `Arc`.
pub struct HandlerRegistry<H: ?Sized> {
    handlers: HashMap<ModelProvider, Arc<H>>,
}

pub type InferenceHandlerRegistry = HandlerRegistry<dyn InferenceHandler>;
pub type StreamInferenceHandlerRegistry = HandlerRegistry<dyn StreamInferenceHandler>;

impl<H: ?Sized> HandlerRegistry<H> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `provider`, replacing any earlier handler.
    pub fn register(&mut self, provider: ModelProvider, handler: Arc<H>) {
        if self.handlers.insert(provider, handler).is_some() {
            debug!(%provider, "replaced registered handler");
        } else {
            debug!(%provider, "registered handler");
        }
    }

    pub fn with(mut self, provider: ModelProvider, handler: Arc<H>) -> Self {
        self.register(provider, handler);
        self
    }

    pub fn get(&self, provider: ModelProvider) -> Result<Arc<H>, ModelError> {
        self.handlers
            .get(&provider)
            .cloned()
            .ok_or_else(|| ModelError::provider_not_supported(provider))
    }

    pub fn contains(&self, provider: ModelProvider) -> bool {
        self.handlers.contains_key(&provider)
    }

    /// Registered providers in declaration order.
    pub fn providers(&self) -> Vec<ModelProvider> {
        let mut providers = self.handlers.keys().copied().collect::<Vec<_>>();
        providers.sort();
        providers
    }
}

impl<H: ?Sized> Default for HandlerRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}
