//! Router assembly and server lifecycle.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Mutex;

use axum::Router;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use crate::api;
use crate::envelope::ApiError;
use crate::error::{GatewayError, GatewayResult};
use crate::state::GatewayState;
use crate::webhook;

/// Build the full router: webhook at the root, REST under `/api/v1`.
///
/// Rate limiting wraps only the API (and runs before the handlers'
/// auth checks); CORS headers go on every response.
pub fn build_router(state: GatewayState) -> Router {
    let api = Router::new()
        .route("/", get(api::index))
        .route("/health", get(api::health))
        .route("/stats", get(api::stats))
        .route(
            "/conversations",
            get(api::conversations_list).post(api::conversations_create),
        )
        .route(
            "/conversations/{id}",
            get(api::conversation_get).delete(api::conversation_delete),
        )
        .route(
            "/conversations/{id}/messages",
            get(api::messages_list).post(api::messages_send),
        )
        .route("/memory", get(api::memory_long_term))
        .route("/memory/recent", get(api::memory_recent))
        .route("/memory/working/{session_id}", get(api::memory_working))
        .route("/memory/patterns", get(api::memory_patterns))
        .route(
            "/scheduler",
            get(api::scheduler_list).post(api::scheduler_create),
        )
        .route("/scheduler/{id}", delete(api::scheduler_delete))
        .route("/sleep-cycle", get(api::sleep_get))
        .route("/sleep-cycle/run", post(api::sleep_run))
        .route("/tasks/active", get(api::tasks_active))
        .route("/tasks/{id}/events", get(api::task_events))
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit));

    Router::new()
        .route("/webhook", post(webhook::handle))
        .nest("/api/v1", api)
        .layer(middleware::from_fn(cors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn apply_cors_headers(headers: &mut axum::http::HeaderMap) {
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_static("*"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET,POST,DELETE,OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Authorization,Content-Type"),
    );
}

/// CORS on every response; preflight answers 204 directly.
async fn cors(request: Request, next: Next) -> Response {
    if request.method() == Method::OPTIONS {
        let mut response = StatusCode::NO_CONTENT.into_response();
        apply_cors_headers(response.headers_mut());
        return response;
    }
    let mut response = next.run(request).await;
    apply_cors_headers(response.headers_mut());
    response
}

/// Per-IP admission, before auth — public endpoints count too.
async fn rate_limit(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(&request);
    let decision = state.limiter.check(ip);
    if !decision.allowed {
        return ApiError::rate_limited(decision.retry_after_secs).into_response();
    }
    next.run(request).await
}

/// Client address: `X-Forwarded-For` first, then the socket peer.
fn client_ip(request: &Request) -> IpAddr {
    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded.split(',').next() {
            if let Ok(ip) = first.trim().parse() {
                return ip;
            }
        }
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED), |info| info.0.ip())
}

/// The HTTP server: binds, serves, and releases everything on stop.
pub struct GatewayServer {
    state: GatewayState,
    shutdown_tx: Mutex<Option<oneshot::Sender<()>>>,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl GatewayServer {
    /// Create a server over prepared state.
    #[must_use]
    pub fn new(state: GatewayState) -> Self {
        Self {
            state,
            shutdown_tx: Mutex::new(None),
            handle: Mutex::new(None),
        }
    }

    /// The shared state (for wiring and tests).
    #[must_use]
    pub fn state(&self) -> &GatewayState {
        &self.state
    }

    /// Bind and start serving. Returns the bound address.
    pub async fn start(&self) -> GatewayResult<SocketAddr> {
        self.state.register_bus_subscribers();

        let addr = format!("{}:{}", self.state.config.host, self.state.config.port);
        let listener =
            tokio::net::TcpListener::bind(&addr)
                .await
                .map_err(|source| GatewayError::Bind {
                    addr: addr.clone(),
                    source,
                })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| GatewayError::Bind { addr, source })?;

        let app = build_router(self.state.clone());
        let (tx, rx) = oneshot::channel::<()>();
        *self
            .shutdown_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(tx);

        let handle = tokio::spawn(async move {
            let serve = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(async {
                let _ = rx.await;
            });
            if let Err(e) = serve.await {
                error!(error = %e, "gateway server error");
            }
        });
        *self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(handle);

        info!(addr = %local_addr, "gateway listening");
        Ok(local_addr)
    }

    /// Stop serving: close the listener, reject parked callers, drop bus
    /// subscriptions, clear limiter state.
    pub async fn stop(&self) {
        if let Some(tx) = self
            .shutdown_tx
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take()
        {
            let _ = tx.send(());
        }
        self.state.release();
        let handle = self
            .handle
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("gateway stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::sign_body;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;
    use kenobot_core::{ChatId, OutboundMessage, channel};
    use kenobot_events::{SignalBus, SignalPayload, SignalType};
    use kenobot_llm::CostTracker;
    use kenobot_scheduler::Scheduler;
    use kenobot_sleep::{NoopPhase, SleepCycle};
    use kenobot_store::{ConversationStore, MemoryStore, TaskEventLog};
    use kenobot_watchdog::Watchdog;
    use serde_json::{Value, json};
    use std::sync::Arc;
    use std::time::Duration;
    use tower::ServiceExt;

    fn test_state(tmp: &tempfile::TempDir, config: crate::GatewayConfig) -> GatewayState {
        let bus = Arc::new(SignalBus::new());
        let conversations =
            Arc::new(ConversationStore::open(tmp.path().join("conversations")).unwrap());
        let memory = Arc::new(MemoryStore::new(tmp.path().join("memory")));
        let tasks = Arc::new(TaskEventLog::new());
        let scheduler =
            Arc::new(Scheduler::new(Arc::clone(&bus), tmp.path().join("scheduler")).unwrap());
        let sleep = Arc::new(SleepCycle::new(NoopPhase::standard_set(), 24, 3));
        let watchdog = Arc::new(Watchdog::new(
            Arc::clone(&bus),
            Duration::from_secs(60),
            Duration::from_secs(5),
        ));
        let cost = Arc::new(CostTracker::new(0.0));
        let state = GatewayState::new(
            bus,
            config,
            conversations,
            memory,
            tasks,
            scheduler,
            sleep,
            watchdog,
            cost,
        );
        state.register_bus_subscribers();
        state
    }

    /// Wire a synchronous echo agent: every INCOMING_MESSAGE gets exactly
    /// one OUTGOING_MESSAGE with the given reply.
    fn wire_agent(state: &GatewayState, reply: &'static str) {
        let bus = Arc::clone(&state.bus);
        state
            .bus
            .on(SignalType::IncomingMessage, move |signal| {
                if let SignalPayload::Inbound(msg) = &signal.payload {
                    bus.fire(
                        SignalType::OutgoingMessage,
                        SignalPayload::Outbound(OutboundMessage::new(
                            reply,
                            msg.chat_id.clone(),
                            msg.channel.clone(),
                        )),
                        "agent",
                    );
                }
                Ok(())
            });
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn webhook_request(secret: &str, body: &str, signed: bool) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri("/webhook")
            .header("content-type", "application/json");
        if signed {
            builder = builder.header("X-Webhook-Signature", sign_body(secret, body.as_bytes()));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    fn api_get(path: &str, key: Option<&str>) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder().method("GET").uri(path);
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder.body(Body::empty()).unwrap()
    }

    fn api_post(path: &str, key: Option<&str>, body: Value) -> HttpRequest<Body> {
        let mut builder = HttpRequest::builder()
            .method("POST")
            .uri(path)
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    /// Happy webhook: signed request, agent replies, 200 with the reply.
    #[tokio::test]
    async fn test_webhook_happy_path() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                webhook_secret: "s".to_string(),
                ..Default::default()
            },
        );
        wire_agent(&state, "General Kenobi!");
        let app = build_router(state);

        let response = app
            .oneshot(webhook_request("s", r#"{"message":"Hello there!"}"#, true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["response"], "General Kenobi!");
        assert_eq!(body["status"], "ok");
    }

    /// Missing signature is rejected before the body is even parsed.
    #[tokio::test]
    async fn test_webhook_missing_signature() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                webhook_secret: "s".to_string(),
                ..Default::default()
            },
        );
        wire_agent(&state, "never seen");
        let app = build_router(state);

        let response = app
            .oneshot(webhook_request("s", r#"{"message":"Hello there!"}"#, false))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid signature");
    }

    /// With no secret configured, even a correctly signed request fails.
    #[tokio::test]
    async fn test_webhook_unconfigured_secret() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp, crate::GatewayConfig::default());
        let app = build_router(state);

        let response = app
            .oneshot(webhook_request("s", r#"{"message":"hi"}"#, true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_webhook_malformed_body() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                webhook_secret: "s".to_string(),
                ..Default::default()
            },
        );
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(webhook_request("s", "{not json", true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .oneshot(webhook_request("s", r#"{"message": 42}"#, true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    /// Agent never replies: 408 at the deadline and the pending table is
    /// empty afterwards.
    #[tokio::test]
    async fn test_webhook_timeout_evicts_entry() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                webhook_secret: "s".to_string(),
                request_timeout: Duration::from_millis(100),
                ..Default::default()
            },
        );
        let app = build_router(state.clone());

        let response = app
            .oneshot(webhook_request("s", r#"{"message":"anyone?"}"#, true))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        let body = body_json(response).await;
        assert_eq!(body["error"], "timeout");
        assert_eq!(body["status"], "error");
        assert!(state.pending_webhook.is_empty());
    }

    /// A late reply after the timeout is silently dropped.
    #[tokio::test]
    async fn test_webhook_late_reply_dropped() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                webhook_secret: "s".to_string(),
                request_timeout: Duration::from_millis(50),
                ..Default::default()
            },
        );
        let app = build_router(state.clone());

        let response = app
            .oneshot(webhook_request(
                "s",
                r#"{"message":"slow","chat_id":"slow-session"}"#,
                true,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);

        // The reply arrives after eviction: nothing blows up, nothing matches.
        state.bus.fire(
            SignalType::OutgoingMessage,
            SignalPayload::Outbound(OutboundMessage::new(
                "too late",
                ChatId::webhook("slow-session"),
                channel::WEBHOOK,
            )),
            "agent",
        );
        assert!(state.pending_webhook.is_empty());
    }

    /// Conflict on API send: a second message for the same conversation
    /// while the first is in flight is rejected with 409.
    #[tokio::test]
    async fn test_api_send_conflict() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                request_timeout: Duration::from_millis(500),
                ..Default::default()
            },
        );
        let app = build_router(state);

        let first = tokio::spawn(
            app.clone().oneshot(api_post(
                "/api/v1/conversations/abc/messages",
                Some("k"),
                json!({"content": "first"}),
            )),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;

        let response = app
            .oneshot(api_post(
                "/api/v1/conversations/abc/messages",
                Some("k"),
                json!({"content": "second"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "CONFLICT");

        // The first request times out on its own (no agent is wired).
        let first = first.await.unwrap().unwrap();
        assert_eq!(first.status(), StatusCode::GATEWAY_TIMEOUT);
    }

    /// Rate limit trips on the third request and is applied before auth.
    #[tokio::test]
    async fn test_rate_limit_trips() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                rate_limit: 2,
                ..Default::default()
            },
        );
        let app = build_router(state);

        for _ in 0..2 {
            let response = app
                .clone()
                .oneshot(api_get("/api/v1/health", None))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app
            .oneshot(api_get("/api/v1/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "RATE_LIMITED");
        assert_eq!(body["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn test_api_auth_rejections() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
        );
        let app = build_router(state);

        // Public endpoints need no key.
        let response = app
            .clone()
            .oneshot(api_get("/api/v1/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        for key in [None, Some("wrong")] {
            let response = app
                .clone()
                .oneshot(api_get("/api/v1/conversations", key))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = body_json(response).await;
            assert_eq!(body["error"]["code"], "UNAUTHORIZED");
        }
    }

    /// Full API conversation round trip: send, list, read, delete.
    #[tokio::test]
    async fn test_api_conversation_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
        );
        wire_agent(&state, "hello yourself");
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(api_post(
                "/api/v1/conversations/abc/messages",
                Some("k"),
                json!({"content": "hello"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["data"]["response"], "hello yourself");
        assert!(body["meta"]["requestId"].is_string());

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/conversations", Some("k")))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"][0]["title"], "hello");

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/conversations/abc/messages", Some("k")))
            .await
            .unwrap();
        let body = body_json(response).await;
        let messages = body["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[1]["role"], "assistant");

        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .method("DELETE")
                    .uri("/api/v1/conversations/abc")
                    .header("Authorization", "Bearer k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(api_get("/api/v1/conversations/abc", Some("k")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// `?limit` is clamped to `[1, 200]`: zero still yields one message.
    #[tokio::test]
    async fn test_message_limit_clamped() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
        );
        let chat = ChatId::api("clamp");
        for i in 0..3 {
            state
                .conversations
                .append_message(&chat, &kenobot_store::StoredMessage::user(format!("m{i}")))
                .unwrap();
        }
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(api_get(
                "/api/v1/conversations/clamp/messages?limit=0",
                Some("k"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let messages = body["data"]["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["content"], "m2");

        let response = app
            .oneshot(api_get(
                "/api/v1/conversations/clamp/messages?limit=99999",
                Some("k"),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_api_send_missing_content() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
        );
        let app = build_router(state);

        let response = app
            .oneshot(api_post(
                "/api/v1/conversations/x/messages",
                Some("k"),
                json!({"content": 7}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "MISSING_FIELD");
    }

    #[tokio::test]
    async fn test_api_budget_guard() {
        let tmp = tempfile::tempdir().unwrap();
        let bus = Arc::new(SignalBus::new());
        let state = GatewayState::new(
            bus.clone(),
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
            Arc::new(ConversationStore::open(tmp.path().join("c")).unwrap()),
            Arc::new(MemoryStore::new(tmp.path().join("m"))),
            Arc::new(TaskEventLog::new()),
            Arc::new(Scheduler::new(bus, tmp.path().join("s")).unwrap()),
            Arc::new(SleepCycle::new(NoopPhase::standard_set(), 24, 3)),
            Arc::new(Watchdog::new(
                Arc::new(SignalBus::new()),
                Duration::from_secs(60),
                Duration::from_secs(5),
            )),
            Arc::new(CostTracker::new(0.000_001).with_rates(1000.0, 1000.0)),
        );
        // Burn the budget.
        state.cost.record(kenobot_llm::Usage {
            input_tokens: 10_000,
            output_tokens: 10_000,
        });
        let app = build_router(state);

        let response = app
            .oneshot(api_post(
                "/api/v1/conversations/x/messages",
                Some("k"),
                json!({"content": "pricey"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], "BUDGET_EXCEEDED");
        assert_eq!(body["error"]["retryable"], true);
    }

    #[tokio::test]
    async fn test_memory_days_clamped() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
        );
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/memory/recent?days=99", Some("k")))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["data"]["days"], 30);

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/memory/recent?days=0", Some("k")))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["data"]["days"], 1);

        let response = app
            .oneshot(api_get("/api/v1/memory/recent", Some("k")))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["data"]["days"], 3);
    }

    #[tokio::test]
    async fn test_scheduler_endpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
        );
        let app = build_router(state);

        // Invalid cron is a 400 with the stable code.
        let response = app
            .clone()
            .oneshot(api_post(
                "/api/v1/scheduler",
                Some("k"),
                json!({"cron_expr": "every tuesday", "message": "hi"}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"]["code"], "INVALID_CRON");

        // Valid task: created, listed, deleted.
        let response = app
            .clone()
            .oneshot(api_post(
                "/api/v1/scheduler",
                Some("k"),
                json!({
                    "cron_expr": "0 9 * * 1-5",
                    "message": "standup",
                    "description": "weekday standup",
                    "chat_id": "telegram-9",
                    "user_id": "9",
                    "channel": "telegram",
                }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["data"]["id"]
            .as_str()
            .unwrap()
            .to_string();

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/scheduler", Some("k")))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["data"].as_array().unwrap().len(), 1);

        let response = app
            .clone()
            .oneshot(
                HttpRequest::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/scheduler/{id}"))
                    .header("Authorization", "Bearer k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("DELETE")
                    .uri(format!("/api/v1/scheduler/{id}"))
                    .header("Authorization", "Bearer k")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_sleep_cycle_endpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
        );
        let app = build_router(state.clone());

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/sleep-cycle", Some("k")))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["data"]["status"], "idle");

        let response = app
            .clone()
            .oneshot(api_post("/api/v1/sleep-cycle/run", Some("k"), json!({})))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        // Fire-and-forget: poll until the no-op phases finish.
        for _ in 0..50 {
            if state.sleep.state().status == kenobot_sleep::SleepStatus::Success {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            state.sleep.state().status,
            kenobot_sleep::SleepStatus::Success
        );
    }

    #[tokio::test]
    async fn test_tasks_endpoints() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                ..Default::default()
            },
        );
        state.tasks.begin("job-1", "reindexing memory");
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/tasks/active", Some("k")))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"][0]["id"], "job-1");

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/tasks/job-1/events", Some("k")))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["data"]["events"][0]["kind"], "started");

        let response = app
            .oneshot(api_get("/api/v1/tasks/ghost/events", Some("k")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    /// Every response carries CORS headers; OPTIONS answers 204 directly.
    #[tokio::test]
    async fn test_cors_everywhere() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(&tmp, crate::GatewayConfig::default());
        let app = build_router(state);

        let response = app
            .clone()
            .oneshot(api_get("/api/v1/health", None))
            .await
            .unwrap();
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "*"
        );
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_METHODS],
            "GET,POST,DELETE,OPTIONS"
        );

        let response = app
            .oneshot(
                HttpRequest::builder()
                    .method("OPTIONS")
                    .uri("/api/v1/conversations")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            response.headers()[header::ACCESS_CONTROL_ALLOW_HEADERS],
            "Authorization,Content-Type"
        );
    }

    /// Shutdown rejects a parked caller with a terminal error.
    #[tokio::test]
    async fn test_shutdown_rejects_pending() {
        let tmp = tempfile::tempdir().unwrap();
        let state = test_state(
            &tmp,
            crate::GatewayConfig {
                api_key: "k".to_string(),
                request_timeout: Duration::from_secs(30),
                ..Default::default()
            },
        );
        let app = build_router(state.clone());

        let parked = tokio::spawn(
            app.oneshot(api_post(
                "/api/v1/conversations/parked/messages",
                Some("k"),
                json!({"content": "wait for me"}),
            )),
        );
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(state.pending_api.len(), 1);

        state.release();

        let response = parked.await.unwrap().unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(state.pending_api.is_empty());
    }

    /// Two gateways in one process are fully independent (no globals).
    #[tokio::test]
    async fn test_two_instances_in_one_process() {
        let tmp_a = tempfile::tempdir().unwrap();
        let tmp_b = tempfile::tempdir().unwrap();
        let state_a = test_state(
            &tmp_a,
            crate::GatewayConfig {
                webhook_secret: "a".to_string(),
                ..Default::default()
            },
        );
        let state_b = test_state(
            &tmp_b,
            crate::GatewayConfig {
                webhook_secret: "b".to_string(),
                ..Default::default()
            },
        );
        wire_agent(&state_a, "from A");
        wire_agent(&state_b, "from B");

        let response = build_router(state_a)
            .oneshot(webhook_request("a", r#"{"message":"ping"}"#, true))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["response"], "from A");

        let response = build_router(state_b)
            .oneshot(webhook_request("b", r#"{"message":"ping"}"#, true))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["response"], "from B");
    }
}
