//! Shared state of the HTTP surface.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use kenobot_core::channel;
use kenobot_events::{SignalBus, SignalPayload, SignalType, SubscriberId};
use kenobot_llm::{BreakerStatus, CostTracker};
use kenobot_scheduler::Scheduler;
use kenobot_sleep::SleepCycle;
use kenobot_store::{ConversationStore, MemoryStore, TaskEventLog};
use kenobot_watchdog::Watchdog;
use tracing::info;

use crate::pending::PendingTable;
use crate::ratelimit::RateLimiter;

/// Reads the circuit-breaker status for the stats endpoint.
pub type BreakerProbe = Arc<dyn Fn() -> BreakerStatus + Send + Sync>;

/// Knobs of the HTTP surface.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bind address.
    pub host: String,
    /// Bind port (0 lets the OS pick, used by tests).
    pub port: u16,
    /// Bearer token for the REST API; empty locks the API.
    pub api_key: String,
    /// HMAC secret for webhook signatures; empty rejects all webhooks.
    pub webhook_secret: String,
    /// Requests allowed per IP per window.
    pub rate_limit: u32,
    /// Sliding-window length.
    pub rate_window: Duration,
    /// How long a correlator waits for an agent reply.
    pub request_timeout: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            api_key: String::new(),
            webhook_secret: String::new(),
            rate_limit: 60,
            rate_window: Duration::from_secs(60),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// Everything the handlers need, cheaply cloneable.
#[derive(Clone)]
pub struct GatewayState {
    /// The signal bus.
    pub bus: Arc<SignalBus>,
    /// Gateway knobs.
    pub config: Arc<GatewayConfig>,
    /// Pending table of the REST correlator.
    pub pending_api: Arc<PendingTable>,
    /// Pending table of the webhook correlator.
    pub pending_webhook: Arc<PendingTable>,
    /// Per-IP limiter, applied before auth.
    pub limiter: Arc<RateLimiter>,
    /// Conversation metadata and journals.
    pub conversations: Arc<ConversationStore>,
    /// Memory read surface.
    pub memory: Arc<MemoryStore>,
    /// Active tasks and their events.
    pub tasks: Arc<TaskEventLog>,
    /// The cron scheduler.
    pub scheduler: Arc<Scheduler>,
    /// The sleep-cycle supervisor.
    pub sleep: Arc<SleepCycle>,
    /// The watchdog.
    pub watchdog: Arc<Watchdog>,
    /// Spend accounting for the budget guard.
    pub cost: Arc<CostTracker>,
    /// Breaker status reader, when a provider is wired.
    pub breaker: Option<BreakerProbe>,
    /// When the gateway came up.
    pub started: Instant,
    subscriptions: Arc<Mutex<Vec<SubscriberId>>>,
}

impl GatewayState {
    /// Assemble the state.
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn new(
        bus: Arc<SignalBus>,
        config: GatewayConfig,
        conversations: Arc<ConversationStore>,
        memory: Arc<MemoryStore>,
        tasks: Arc<TaskEventLog>,
        scheduler: Arc<Scheduler>,
        sleep: Arc<SleepCycle>,
        watchdog: Arc<Watchdog>,
        cost: Arc<CostTracker>,
    ) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limit, config.rate_window));
        Self {
            bus,
            config: Arc::new(config),
            pending_api: Arc::new(PendingTable::new()),
            pending_webhook: Arc::new(PendingTable::new()),
            limiter,
            conversations,
            memory,
            tasks,
            scheduler,
            sleep,
            watchdog,
            cost,
            breaker: None,
            started: Instant::now(),
            subscriptions: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Wire a breaker status reader into the stats endpoint.
    #[must_use]
    pub fn with_breaker(mut self, probe: BreakerProbe) -> Self {
        self.breaker = Some(probe);
        self
    }

    /// Subscribe both correlators to `OUTGOING_MESSAGE`.
    ///
    /// Each subscriber claims only its own channel, so a reply is
    /// delivered by exactly one party — the matching correlator here, or a
    /// transport adapter elsewhere.
    pub fn register_bus_subscribers(&self) {
        let api_table = Arc::clone(&self.pending_api);
        let api_id = self
            .bus
            .on_named(SignalType::OutgoingMessage, "api-correlator", move |signal| {
                if let SignalPayload::Outbound(msg) = &signal.payload {
                    if msg.channel == channel::API {
                        api_table.resolve(&msg.chat_id, &msg.channel, &msg.text);
                    }
                }
                Ok(())
            });

        let webhook_table = Arc::clone(&self.pending_webhook);
        let webhook_id = self.bus.on_named(
            SignalType::OutgoingMessage,
            "webhook-correlator",
            move |signal| {
                if let SignalPayload::Outbound(msg) = &signal.payload {
                    if msg.channel == channel::WEBHOOK {
                        webhook_table.resolve(&msg.chat_id, &msg.channel, &msg.text);
                    }
                }
                Ok(())
            },
        );

        self.subscriptions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .extend([api_id, webhook_id]);
    }

    /// Release everything on shutdown: reject parked callers, drop bus
    /// subscriptions, clear limiter state.
    pub fn release(&self) {
        let rejected = self.pending_api.drain() + self.pending_webhook.drain();
        if rejected > 0 {
            info!(rejected, "rejected pending requests on shutdown");
        }
        let ids: Vec<SubscriberId> = self
            .subscriptions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
            .collect();
        for id in ids {
            self.bus.off(id);
        }
        self.limiter.clear();
    }
}
