//! Transport channel adapters and outbound routing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use tracing::{debug, error, warn};

use kenobot_core::{OutboundMessage, channel};
use kenobot_events::{SignalBus, SignalPayload, SignalType, SubscriberId};

/// Error from a channel operation.
pub type ChannelError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A transport adapter: a capability set, not a base class.
///
/// Concrete platform adapters (Telegram, Discord, ...) live outside the
/// core; they implement this trait and register with the router. An
/// adapter owns delivery for exactly the channel bearing its name.
#[async_trait]
pub trait ChannelAdapter: Send + Sync {
    /// Channel name (matches `OutboundMessage::channel`).
    fn name(&self) -> &str;

    /// Connect to the platform and begin feeding `INCOMING_MESSAGE`s.
    async fn start(&self) -> Result<(), ChannelError>;

    /// Disconnect.
    async fn stop(&self);

    /// Deliver a reply to the platform.
    async fn send(&self, message: &OutboundMessage) -> Result<(), ChannelError>;
}

/// Delivers each `OUTGOING_MESSAGE` to exactly one adapter.
///
/// The correlator channels (`api`, `webhook`) are claimed by the gateway's
/// own subscribers, so the router skips them; everything else goes to the
/// adapter registered under the message's channel name.
pub struct OutboundRouter {
    adapters: Arc<RwLock<HashMap<String, Arc<dyn ChannelAdapter>>>>,
    subscription: Mutex<Option<SubscriberId>>,
}

impl OutboundRouter {
    /// Create a router with no adapters.
    #[must_use]
    pub fn new() -> Self {
        Self {
            adapters: Arc::new(RwLock::new(HashMap::new())),
            subscription: Mutex::new(None),
        }
    }

    /// Register an adapter under its channel name.
    pub fn register(&self, adapter: Arc<dyn ChannelAdapter>) {
        self.adapters
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(adapter.name().to_string(), adapter);
    }

    /// Subscribe to `OUTGOING_MESSAGE` on the bus.
    pub fn attach(&self, bus: &Arc<SignalBus>) {
        let adapters = Arc::clone(&self.adapters);
        let id = bus.on_named(
            SignalType::OutgoingMessage,
            "outbound-router",
            move |signal| {
                let SignalPayload::Outbound(message) = &signal.payload else {
                    return Ok(());
                };
                if message.channel == channel::API || message.channel == channel::WEBHOOK {
                    return Ok(());
                }
                let adapter = adapters
                    .read()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .get(&message.channel)
                    .cloned();
                match adapter {
                    Some(adapter) => {
                        let message = message.clone();
                        tokio::spawn(async move {
                            debug!(channel = %message.channel, chat = %message.chat_id, "delivering reply");
                            if let Err(e) = adapter.send(&message).await {
                                error!(channel = %message.channel, error = %e, "delivery failed");
                            }
                        });
                    },
                    None => {
                        warn!(channel = %message.channel, "no adapter for outgoing channel");
                    },
                }
                Ok(())
            },
        );
        *self
            .subscription
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(id);
    }

    /// Unsubscribe from the bus.
    pub fn detach(&self, bus: &SignalBus) {
        if let Some(id) = self
            .subscription
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            bus.off(id);
        }
    }

    /// Start every registered adapter.
    pub async fn start_all(&self) {
        for adapter in self.snapshot() {
            if let Err(e) = adapter.start().await {
                error!(channel = adapter.name(), error = %e, "adapter failed to start");
            }
        }
    }

    /// Stop every registered adapter.
    pub async fn stop_all(&self) {
        for adapter in self.snapshot() {
            adapter.stop().await;
        }
    }

    fn snapshot(&self) -> Vec<Arc<dyn ChannelAdapter>> {
        self.adapters
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }
}

impl Default for OutboundRouter {
    fn default() -> Self {
        Self::new()
    }
}
