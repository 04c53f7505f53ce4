//! Health notifier: `HEALTH_*` → owner notification.

use std::sync::{Arc, Mutex};

use tracing::debug;

use kenobot_core::{ChatId, OutboundMessage};
use kenobot_events::{SignalBus, SignalPayload, SignalType, SubscriberId};

/// Forwards health transitions to the configured owner chat.
///
/// Each transition also becomes a `NOTIFICATION` signal so other
/// subscribers (task log, future surfaces) can observe it. Owner delivery
/// uses `emit` — internal fan-out must not loop through tracing.
pub struct HealthNotifier {
    subscriptions: Mutex<Vec<SubscriberId>>,
}

impl HealthNotifier {
    /// Subscribe to the three health signals.
    ///
    /// With no owner configured, transitions are only re-announced as
    /// notifications.
    #[must_use]
    pub fn attach(bus: &Arc<SignalBus>, owner: Option<(ChatId, String)>) -> Self {
        let mut subscriptions = Vec::new();
        for signal_type in [
            SignalType::HealthDegraded,
            SignalType::HealthUnhealthy,
            SignalType::HealthRecovered,
        ] {
            let bus_out = Arc::clone(bus);
            let owner = owner.clone();
            let id = bus.on_named(signal_type, "health-notifier", move |signal| {
                let SignalPayload::Health(transition) = &signal.payload else {
                    return Ok(());
                };
                let headline = match signal.signal_type {
                    SignalType::HealthUnhealthy => "KenoBot is unhealthy",
                    SignalType::HealthRecovered => "KenoBot recovered",
                    _ => "KenoBot is degraded",
                };
                let text = format!(
                    "{headline} (was {}): {}",
                    transition.previous, transition.detail
                );

                bus_out.emit(
                    SignalType::Notification,
                    SignalPayload::Json(serde_json::json!({
                        "kind": "health",
                        "state": signal.signal_type.wire_name(),
                        "text": text,
                    })),
                    "notifier",
                );

                if let Some((chat_id, channel)) = &owner {
                    debug!(chat = %chat_id, "notifying owner of health transition");
                    bus_out.emit(
                        SignalType::OutgoingMessage,
                        SignalPayload::Outbound(OutboundMessage::new(
                            text,
                            chat_id.clone(),
                            channel.clone(),
                        )),
                        "notifier",
                    );
                }
                Ok(())
            });
            subscriptions.push(id);
        }
        Self {
            subscriptions: Mutex::new(subscriptions),
        }
    }

    /// Unsubscribe from the bus.
    pub fn detach(&self, bus: &SignalBus) {
        for id in self
            .subscriptions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .drain(..)
        {
            bus.off(id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kenobot_events::HealthTransition;

    fn health_payload() -> SignalPayload {
        SignalPayload::Health(HealthTransition {
            previous: "healthy".to_string(),
            detail: "provider circuit open".to_string(),
        })
    }

    #[tokio::test]
    async fn test_owner_gets_a_message_per_transition() {
        let bus = Arc::new(SignalBus::new());
        let (_s, mut out_rx) = bus.subscribe_channel(SignalType::OutgoingMessage);
        let notifier = HealthNotifier::attach(
            &bus,
            Some((ChatId::new("telegram-owner"), "telegram".to_string())),
        );

        bus.fire(SignalType::HealthUnhealthy, health_payload(), "watchdog");

        let signal = out_rx.try_recv().unwrap();
        match &signal.payload {
            SignalPayload::Outbound(msg) => {
                assert_eq!(msg.chat_id, ChatId::new("telegram-owner"));
                assert_eq!(msg.channel, "telegram");
                assert!(msg.text.contains("unhealthy"));
                assert!(msg.text.contains("provider circuit open"));
            },
            other => panic!("unexpected payload: {other:?}"),
        }

        notifier.detach(&bus);
    }

    #[tokio::test]
    async fn test_without_owner_only_notification_fires() {
        let bus = Arc::new(SignalBus::new());
        let (_s1, mut out_rx) = bus.subscribe_channel(SignalType::OutgoingMessage);
        let (_s2, mut note_rx) = bus.subscribe_channel(SignalType::Notification);
        let _notifier = HealthNotifier::attach(&bus, None);

        bus.fire(SignalType::HealthRecovered, health_payload(), "watchdog");

        assert!(note_rx.try_recv().is_ok());
        assert!(out_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_detach_silences_the_notifier() {
        let bus = Arc::new(SignalBus::new());
        let (_s, mut note_rx) = bus.subscribe_channel(SignalType::Notification);
        let notifier = HealthNotifier::attach(&bus, None);
        notifier.detach(&bus);

        bus.fire(SignalType::HealthDegraded, health_payload(), "watchdog");
        assert!(note_rx.try_recv().is_err());
    }
}
