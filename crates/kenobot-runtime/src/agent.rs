//! The agent seam and the bus bridge around it.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tracing::{debug, error};

use kenobot_core::{InboundMessage, OutboundMessage};
use kenobot_events::{ErrorReport, SignalBus, SignalPayload, SignalType, SubscriberId};
use kenobot_llm::{ChatProvider, ChatRequest, CostTracker};

/// Error from the agent.
pub type AgentError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// What the user sees when the agent itself fails.
const APOLOGY: &str = "Sorry, something went wrong while handling that. Please try again.";

/// The opaque request→reply participant behind the bus.
///
/// The core guarantees the contract around implementations: exactly one
/// `OUTGOING_MESSAGE` per `INCOMING_MESSAGE`, same chat and channel.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Produce the reply to one user message.
    async fn respond(&self, message: &InboundMessage) -> Result<String, AgentError>;
}

/// Agent that parrots the message back. Tests and dry runs.
pub struct EchoAgent;

#[async_trait]
impl Agent for EchoAgent {
    async fn respond(&self, message: &InboundMessage) -> Result<String, AgentError> {
        Ok(message.text.clone())
    }
}

/// Agent backed by a chat provider (through the circuit breaker).
///
/// Single-turn: transcript assembly, memory, and skills belong to the full
/// agent loop outside the core.
pub struct ProviderAgent<P> {
    provider: Arc<P>,
    cost: Arc<CostTracker>,
    system_prompt: String,
}

impl<P: ChatProvider> ProviderAgent<P> {
    /// Create an agent over a provider, recording spend per reply.
    #[must_use]
    pub fn new(provider: Arc<P>, cost: Arc<CostTracker>) -> Self {
        Self {
            provider,
            cost,
            system_prompt: String::new(),
        }
    }

    /// Set the system prompt.
    #[must_use]
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

#[async_trait]
impl<P: ChatProvider> Agent for ProviderAgent<P> {
    async fn respond(&self, message: &InboundMessage) -> Result<String, AgentError> {
        let mut request = ChatRequest::from_user_text(&message.text);
        if !self.system_prompt.is_empty() {
            request.system = Some(self.system_prompt.clone());
        }
        let reply = self.provider.chat(&request).await?;
        self.cost.record(reply.usage);
        Ok(reply.text)
    }
}

/// Consumes `INCOMING_MESSAGE` and drives the agent.
///
/// For every inbound message the bridge fires `THINKING_START`, invokes
/// the agent, and fires exactly one `OUTGOING_MESSAGE` with the same chat
/// and channel — an apologetic one when the agent fails, so synchronous
/// callers get an answer instead of waiting out their deadline. Failures
/// additionally become `ERROR` signals.
pub struct AgentBridge {
    subscription: SubscriberId,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl AgentBridge {
    /// Subscribe to the bus and start the processing task.
    #[must_use]
    pub fn spawn(bus: Arc<SignalBus>, agent: Arc<dyn Agent>) -> Self {
        let (subscription, mut rx) = bus.subscribe_channel(SignalType::IncomingMessage);
        let handle = tokio::spawn(async move {
            while let Some(signal) = rx.recv().await {
                let SignalPayload::Inbound(message) = &signal.payload else {
                    continue;
                };
                debug!(chat = %message.chat_id, channel = %message.channel, "agent turn started");
                bus.fire(
                    SignalType::ThinkingStart,
                    SignalPayload::Json(serde_json::json!({
                        "chat_id": message.chat_id,
                        "channel": message.channel,
                    })),
                    "agent",
                );

                let reply = match agent.respond(message).await {
                    Ok(text) => text,
                    Err(e) => {
                        error!(chat = %message.chat_id, error = %e, "agent failed");
                        bus.fire(
                            SignalType::Error,
                            SignalPayload::Error(ErrorReport {
                                message: e.to_string(),
                                context: "agent".to_string(),
                            }),
                            "agent",
                        );
                        APOLOGY.to_string()
                    },
                };
                bus.fire(
                    SignalType::OutgoingMessage,
                    SignalPayload::Outbound(OutboundMessage::reply_to(message, reply)),
                    "agent",
                );
            }
        });
        Self {
            subscription,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Unsubscribe and stop the processing task.
    pub fn stop(&self, bus: &SignalBus) {
        bus.off(self.subscription);
        if let Some(handle) = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kenobot_core::ChatId;
    use std::time::Duration;

    struct FailingAgent;

    #[async_trait]
    impl Agent for FailingAgent {
        async fn respond(&self, _message: &InboundMessage) -> Result<String, AgentError> {
            Err("model exploded".into())
        }
    }

    fn fire_inbound(bus: &SignalBus, text: &str) {
        bus.fire(
            SignalType::IncomingMessage,
            SignalPayload::Inbound(InboundMessage::new(
                text,
                ChatId::api("t"),
                "api",
                "api",
            )),
            "test",
        );
    }

    /// One inbound → thinking indicator plus exactly one reply on the same
    /// chat and channel.
    #[tokio::test]
    async fn test_bridge_replies_once_per_inbound() {
        let bus = Arc::new(SignalBus::new());
        let (_s1, mut out_rx) = bus.subscribe_channel(SignalType::OutgoingMessage);
        let (_s2, mut think_rx) = bus.subscribe_channel(SignalType::ThinkingStart);
        let bridge = AgentBridge::spawn(Arc::clone(&bus), Arc::new(EchoAgent));

        fire_inbound(&bus, "marco");

        let reply = tokio::time::timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        match &reply.payload {
            SignalPayload::Outbound(msg) => {
                assert_eq!(msg.text, "marco");
                assert_eq!(msg.chat_id, ChatId::api("t"));
                assert_eq!(msg.channel, "api");
            },
            other => panic!("unexpected payload: {other:?}"),
        }
        assert!(think_rx.try_recv().is_ok());
        // Exactly one reply.
        assert!(out_rx.try_recv().is_err());

        bridge.stop(&bus);
    }

    /// A failing agent produces an ERROR signal and an apologetic reply.
    #[tokio::test]
    async fn test_bridge_converts_agent_failure() {
        let bus = Arc::new(SignalBus::new());
        let (_s1, mut out_rx) = bus.subscribe_channel(SignalType::OutgoingMessage);
        let (_s2, mut err_rx) = bus.subscribe_channel(SignalType::Error);
        let bridge = AgentBridge::spawn(Arc::clone(&bus), Arc::new(FailingAgent));

        fire_inbound(&bus, "boom");

        let error = tokio::time::timeout(Duration::from_secs(1), err_rx.recv())
            .await
            .unwrap()
            .unwrap();
        match &error.payload {
            SignalPayload::Error(report) => {
                assert_eq!(report.message, "model exploded");
                assert_eq!(report.context, "agent");
            },
            other => panic!("unexpected payload: {other:?}"),
        }

        let reply = tokio::time::timeout(Duration::from_secs(1), out_rx.recv())
            .await
            .unwrap()
            .unwrap();
        match &reply.payload {
            SignalPayload::Outbound(msg) => assert_eq!(msg.text, APOLOGY),
            other => panic!("unexpected payload: {other:?}"),
        }

        bridge.stop(&bus);
    }

    /// After stop, inbound messages are no longer consumed.
    #[tokio::test]
    async fn test_bridge_stop_unsubscribes() {
        let bus = Arc::new(SignalBus::new());
        let bridge = AgentBridge::spawn(Arc::clone(&bus), Arc::new(EchoAgent));
        bridge.stop(&bus);

        let (_s, mut out_rx) = bus.subscribe_channel(SignalType::OutgoingMessage);
        fire_inbound(&bus, "anyone?");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(out_rx.try_recv().is_err());
    }
}
