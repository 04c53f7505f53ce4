//! The construction function and lifecycle of one daemon instance.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::info;

use kenobot_config::Config;
use kenobot_core::{ChatId, DataPaths};
use kenobot_events::SignalBus;
use kenobot_gateway::{BreakerProbe, GatewayConfig, GatewayServer, GatewayState};
use kenobot_llm::{BreakerStatus, ChatProvider, CircuitBreaker, CostTracker};
use kenobot_scheduler::Scheduler;
use kenobot_sleep::{NoopPhase, SleepCycle, SleepCycleState};
use kenobot_store::{ConversationStore, MemoryStore, TaskEventLog};
use kenobot_watchdog::{Watchdog, WatchdogStatus};

use crate::agent::{Agent, AgentBridge, ProviderAgent};
use crate::channel::{ChannelAdapter, OutboundRouter};
use crate::checks::{BreakerCheck, MemoryCheck, SleepCheck};
use crate::error::RuntimeResult;
use crate::notifier::HealthNotifier;

/// One fully wired daemon instance.
///
/// `build` constructs everything from a [`Config`] — bus, stores,
/// scheduler, watchdog, sleep cycle, gateway — with no global state, so
/// several instances can run side by side in one process. `start` brings
/// the background tasks and the listener up; `stop` releases every
/// resource in reverse order.
pub struct Kenobot {
    bus: Arc<SignalBus>,
    breaker: Arc<CircuitBreaker<Box<dyn ChatProvider>>>,
    gateway: GatewayServer,
    scheduler: Arc<Scheduler>,
    watchdog: Arc<Watchdog>,
    sleep: Arc<SleepCycle>,
    router: OutboundRouter,
    agent: Arc<dyn Agent>,
    bridge: Mutex<Option<AgentBridge>>,
    notifier: Mutex<Option<HealthNotifier>>,
    owner: Option<(ChatId, String)>,
    scheduler_enabled: bool,
}

impl Kenobot {
    /// Wire a daemon from configuration and a chat provider.
    ///
    /// The default agent is a single-turn bridge to the provider through
    /// the circuit breaker; a full agent loop replaces it via
    /// [`Kenobot::with_agent`]. Sleep phases default to no-ops for the
    /// same reason — their content belongs to the agent.
    pub fn build(config: &Config, provider: Box<dyn ChatProvider>) -> RuntimeResult<Self> {
        let paths = DataPaths::new(config.data_dir());
        paths.ensure_layout()?;

        let bus = Arc::new(SignalBus::new());
        bus.install_standard_middleware();
        bus.enable_audit(paths.bus_audit_log())?;

        let cost = Arc::new(CostTracker::new(config.budget.daily_usd));
        let breaker = Arc::new(CircuitBreaker::new(
            provider,
            config.breaker.threshold,
            Duration::from_secs(config.breaker.cooldown_secs),
        ));
        let agent: Arc<dyn Agent> = Arc::new(ProviderAgent::new(
            Arc::clone(&breaker),
            Arc::clone(&cost),
        ));

        let conversations = Arc::new(ConversationStore::open(paths.conversations_dir())?);
        let memory = Arc::new(MemoryStore::new(paths.memory_dir()));
        let tasks = Arc::new(TaskEventLog::new());
        let scheduler = Arc::new(Scheduler::new(Arc::clone(&bus), paths.scheduler_dir())?);
        let sleep = Arc::new(SleepCycle::new(
            NoopPhase::standard_set(),
            config.sleep.period_hours,
            config.sleep.target_hour,
        ));

        let watchdog = Arc::new(Watchdog::new(
            Arc::clone(&bus),
            Duration::from_secs(config.watchdog.interval_secs),
            Duration::from_secs(config.watchdog.check_timeout_secs),
        ));
        let breaker_probe: BreakerProbe = {
            let breaker = Arc::clone(&breaker);
            Arc::new(move || breaker.status())
        };
        watchdog.register_check(
            "provider_circuit",
            BreakerCheck::new(Arc::clone(&breaker_probe)),
            true,
        );
        watchdog.register_check("process_memory", MemoryCheck::new(), false);
        watchdog.register_check(
            "sleep_cycle",
            SleepCheck::new(Arc::clone(&sleep), config.sleep.period_hours * 2),
            false,
        );

        let gateway_config = GatewayConfig {
            host: config.server.host.clone(),
            port: config.server.port,
            api_key: config.auth.api_key.clone(),
            webhook_secret: config.auth.webhook_secret.clone(),
            rate_limit: config.limits.rate_limit,
            rate_window: Duration::from_secs(config.limits.rate_window_secs),
            request_timeout: Duration::from_secs(config.limits.request_timeout_secs),
        };
        let state = GatewayState::new(
            Arc::clone(&bus),
            gateway_config,
            conversations,
            memory,
            tasks,
            Arc::clone(&scheduler),
            Arc::clone(&sleep),
            Arc::clone(&watchdog),
            cost,
        )
        .with_breaker(breaker_probe);
        let gateway = GatewayServer::new(state);

        let owner = match (&config.owner.chat_id, &config.owner.channel) {
            (Some(chat), Some(channel)) => Some((ChatId::new(chat.clone()), channel.clone())),
            _ => None,
        };

        Ok(Self {
            bus,
            breaker,
            gateway,
            scheduler,
            watchdog,
            sleep,
            router: OutboundRouter::new(),
            agent,
            bridge: Mutex::new(None),
            notifier: Mutex::new(None),
            owner,
            scheduler_enabled: config.scheduler.enabled,
        })
    }

    /// Replace the default single-turn agent with a full agent loop.
    #[must_use]
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agent = agent;
        self
    }

    /// Register a transport adapter with the outbound router.
    pub fn register_adapter(&self, adapter: Arc<dyn ChannelAdapter>) {
        self.router.register(adapter);
    }

    /// Start everything; returns the bound HTTP address.
    pub async fn start(&self) -> RuntimeResult<SocketAddr> {
        if self.scheduler_enabled {
            self.scheduler.load()?;
            self.scheduler.start();
        }
        self.watchdog.start();
        self.sleep.start();

        *self
            .notifier
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) =
            Some(HealthNotifier::attach(&self.bus, self.owner.clone()));
        self.router.attach(&self.bus);
        self.router.start_all().await;
        *self
            .bridge
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(AgentBridge::spawn(
            Arc::clone(&self.bus),
            Arc::clone(&self.agent),
        ));

        let addr = self.gateway.start().await?;
        info!(%addr, "kenobot up");
        Ok(addr)
    }

    /// Stop everything: close the listener, reject parked callers, stop
    /// timers, unsubscribe from the bus.
    pub async fn stop(&self) {
        self.gateway.stop().await;
        self.scheduler.stop();
        self.watchdog.stop();
        self.sleep.stop();

        let bridge = self
            .bridge
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(bridge) = bridge {
            bridge.stop(&self.bus);
        }
        let notifier = self
            .notifier
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(notifier) = notifier {
            notifier.detach(&self.bus);
        }
        self.router.detach(&self.bus);
        self.router.stop_all().await;
        info!("kenobot stopped");
    }

    /// The instance's bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    /// Circuit-breaker snapshot.
    #[must_use]
    pub fn breaker_status(&self) -> BreakerStatus {
        self.breaker.status()
    }

    /// Watchdog snapshot.
    #[must_use]
    pub fn watchdog_status(&self) -> WatchdogStatus {
        self.watchdog.status()
    }

    /// Sleep-cycle snapshot.
    #[must_use]
    pub fn sleep_state(&self) -> SleepCycleState {
        self.sleep.state()
    }

    /// The scheduler (task management surface).
    #[must_use]
    pub fn scheduler(&self) -> &Arc<Scheduler> {
        &self.scheduler
    }

    /// The watchdog (for forcing a tick in tests and diagnostics).
    #[must_use]
    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }
}
