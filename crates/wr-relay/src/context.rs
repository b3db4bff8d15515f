//! Shared state for relay tasks.

use std::sync::Arc;

use wr_core::{ChatClient, ConfigHandle};

use crate::alert::{Alerter, FatalReceiver};
use crate::correlation::{CorrelationRegistry, TokenAllocator};
use crate::fanout::Fanout;

/// Everything a flush, a relay, or the inbound dispatcher needs.
///
/// Built once at startup and shared as `Arc<RelayContext>`.
pub struct RelayContext {
    chat: Arc<dyn ChatClient>,
    config: Arc<ConfigHandle>,
    registry: Arc<CorrelationRegistry>,
    tokens: TokenAllocator,
    alerter: Alerter,
    fanout: Fanout,
}

impl std::fmt::Debug for RelayContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayContext")
            .field("config", &self.config.path())
            .field("pending", &self.registry.pending_count())
            .finish_non_exhaustive()
    }
}

impl RelayContext {
    /// Creates the context and the receiver on which fatal errors arrive.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatClient>, config: Arc<ConfigHandle>) -> (Arc<Self>, FatalReceiver) {
        let (alerter, fatal_rx) = Alerter::new(Arc::clone(&chat), Arc::clone(&config));
        let fanout = Fanout::new(Arc::clone(&chat), alerter.clone());
        let ctx = Self {
            chat,
            config,
            registry: Arc::new(CorrelationRegistry::new()),
            tokens: TokenAllocator::new(),
            alerter,
            fanout,
        };
        (Arc::new(ctx), fatal_rx)
    }

    /// The chat platform.
    #[inline]
    #[must_use]
    pub fn chat(&self) -> &Arc<dyn ChatClient> {
        &self.chat
    }

    /// The reloadable configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Arc<ConfigHandle> {
        &self.config
    }

    /// Relays waiting for a caption.
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &Arc<CorrelationRegistry> {
        &self.registry
    }

    /// Source of correlation tokens.
    #[inline]
    #[must_use]
    pub fn tokens(&self) -> &TokenAllocator {
        &self.tokens
    }

    /// Problem reporter.
    #[inline]
    #[must_use]
    pub fn alerter(&self) -> &Alerter {
        &self.alerter
    }

    /// Subscriber delivery.
    #[inline]
    #[must_use]
    pub fn fanout(&self) -> &Fanout {
        &self.fanout
    }
}
