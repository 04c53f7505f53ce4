//! The `/api/v1` REST handlers.
//!
//! Every handler wraps its payload in the success envelope or returns an
//! [`ApiError`]; auth is an explicit helper rather than a layer because the
//! index and health endpoints stay public while everything else requires
//! the bearer key.

use std::collections::HashMap;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

use kenobot_core::{ChatId, InboundMessage, channel};
use kenobot_events::{SignalPayload, SignalType};
use kenobot_scheduler::TaskSpec;
use kenobot_sleep::SleepStatus;
use kenobot_store::{StoredMessage, TaskEvent, TaskStatus};

use crate::auth::verify_bearer;
use crate::envelope::{ApiError, success};
use crate::pending::PendingOutcome;
use crate::state::GatewayState;

/// Bounds for the `?limit` parameter on message windows.
const MESSAGE_LIMIT_RANGE: (usize, usize) = (1, 200);
const MESSAGE_LIMIT_DEFAULT: usize = 50;

/// Bounds for the `?days` parameter on recent memory.
const MEMORY_DAYS_RANGE: (u32, u32) = (1, 30);
const MEMORY_DAYS_DEFAULT: u32 = 3;

fn authorize(state: &GatewayState, headers: &HeaderMap) -> Result<(), ApiError> {
    let header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if verify_bearer(header, &state.config.api_key) {
        Ok(())
    } else {
        Err(ApiError::unauthorized())
    }
}

// ---------------------------------------------------------------------------
// Public endpoints
// ---------------------------------------------------------------------------

pub(crate) async fn index() -> Response {
    success(
        StatusCode::OK,
        json!({
            "name": "kenobot",
            "endpoints": [
                "GET /api/v1/health",
                "GET /api/v1/stats",
                "GET /api/v1/conversations",
                "POST /api/v1/conversations",
                "GET /api/v1/conversations/{id}",
                "DELETE /api/v1/conversations/{id}",
                "GET /api/v1/conversations/{id}/messages",
                "POST /api/v1/conversations/{id}/messages",
                "GET /api/v1/memory",
                "GET /api/v1/memory/recent",
                "GET /api/v1/memory/working/{session_id}",
                "GET /api/v1/memory/patterns",
                "GET /api/v1/scheduler",
                "POST /api/v1/scheduler",
                "DELETE /api/v1/scheduler/{id}",
                "GET /api/v1/sleep-cycle",
                "POST /api/v1/sleep-cycle/run",
                "GET /api/v1/tasks/active",
                "GET /api/v1/tasks/{id}/events",
            ],
        }),
    )
}

pub(crate) async fn health() -> Response {
    success(
        StatusCode::OK,
        json!({ "status": "ok", "timestamp": Utc::now().timestamp_millis() }),
    )
}

// ---------------------------------------------------------------------------
// Stats
// ---------------------------------------------------------------------------

pub(crate) async fn stats(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let breaker = state.breaker.as_ref().map(|probe| probe());
    Ok(success(
        StatusCode::OK,
        json!({
            "uptime_secs": state.started.elapsed().as_secs(),
            "bus": state.bus.stats(),
            "breaker": breaker,
            "budget": state.cost.snapshot(),
            "conversations": state.conversations.len(),
            "scheduler_tasks": state.scheduler.len(),
            "sleep": state.sleep.state(),
            "watchdog": state.watchdog.status(),
            "pending_requests": {
                "api": state.pending_api.len(),
                "webhook": state.pending_webhook.len(),
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Conversations
// ---------------------------------------------------------------------------

pub(crate) async fn conversations_list(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    Ok(success(StatusCode::OK, json!(state.conversations.list())))
}

pub(crate) async fn conversations_create(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let id = body
        .as_ref()
        .and_then(|Json(b)| b.get("id").and_then(Value::as_str))
        .map_or_else(|| Uuid::new_v4().to_string(), ToString::to_string);
    let chat_id = ChatId::api(&id);
    state
        .conversations
        .create(chat_id)
        .map_err(ApiError::internal)?;
    Ok(success(StatusCode::CREATED, json!({ "id": id })))
}

pub(crate) async fn conversation_get(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let convo = state
        .conversations
        .get(&ChatId::api(&id))
        .ok_or_else(|| ApiError::not_found(format!("conversation {id:?}")))?;
    Ok(success(StatusCode::OK, json!(convo)))
}

pub(crate) async fn conversation_delete(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let removed = state
        .conversations
        .delete(&ChatId::api(&id))
        .map_err(ApiError::internal)?;
    if !removed {
        return Err(ApiError::not_found(format!("conversation {id:?}")));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

pub(crate) async fn messages_list(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let chat_id = ChatId::api(&id);
    if !state.conversations.exists(&chat_id) {
        return Err(ApiError::not_found(format!("conversation {id:?}")));
    }
    let limit = query
        .get("limit")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(MESSAGE_LIMIT_DEFAULT)
        .clamp(MESSAGE_LIMIT_RANGE.0, MESSAGE_LIMIT_RANGE.1);
    let messages = state
        .conversations
        .messages(&chat_id, limit)
        .map_err(ApiError::internal)?;
    Ok(success(StatusCode::OK, json!({ "messages": messages })))
}

pub(crate) async fn messages_send(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let Json(body) = body.map_err(ApiError::invalid_body)?;
    let Some(content) = body.get("content").and_then(Value::as_str) else {
        return Err(ApiError::missing_field("content"));
    };

    if state.cost.over_budget() {
        return Err(ApiError::budget_exceeded());
    }

    let chat_id = ChatId::api(&id);
    let (request_id, reply_rx) = state
        .pending_api
        .register(chat_id.clone(), channel::API)
        .map_err(|_| ApiError::conflict(&chat_id))?;

    state
        .conversations
        .append_message(&chat_id, &StoredMessage::user(content))
        .map_err(ApiError::internal)?;

    state.bus.fire(
        SignalType::IncomingMessage,
        SignalPayload::Inbound(InboundMessage::new(content, chat_id.clone(), "api", channel::API)),
        "api",
    );

    match tokio::time::timeout(state.config.request_timeout, reply_rx).await {
        Ok(Ok(PendingOutcome::Reply(text))) => {
            state
                .conversations
                .append_message(&chat_id, &StoredMessage::assistant(&text))
                .map_err(ApiError::internal)?;
            Ok(success(
                StatusCode::OK,
                json!({ "response": text, "conversation_id": id }),
            ))
        },
        Ok(Ok(PendingOutcome::ShuttingDown)) | Ok(Err(_)) => {
            Err(ApiError::internal("server shutting down"))
        },
        Err(_elapsed) => {
            state.pending_api.evict(request_id);
            Err(ApiError::gateway_timeout())
        },
    }
}

// ---------------------------------------------------------------------------
// Memory
// ---------------------------------------------------------------------------

pub(crate) async fn memory_long_term(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let content = state.memory.long_term().map_err(ApiError::internal)?;
    Ok(success(StatusCode::OK, json!({ "memory": content })))
}

pub(crate) async fn memory_recent(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let days = query
        .get("days")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(MEMORY_DAYS_DEFAULT)
        .clamp(MEMORY_DAYS_RANGE.0, MEMORY_DAYS_RANGE.1);
    let entries = state.memory.recent(days).map_err(ApiError::internal)?;
    Ok(success(
        StatusCode::OK,
        json!({ "days": days, "entries": entries }),
    ))
}

pub(crate) async fn memory_working(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(session_id): Path<String>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let content = state
        .memory
        .working(&session_id)
        .map_err(ApiError::internal)?;
    Ok(success(
        StatusCode::OK,
        json!({ "session_id": session_id, "memory": content }),
    ))
}

pub(crate) async fn memory_patterns(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let content = state.memory.patterns().map_err(ApiError::internal)?;
    Ok(success(StatusCode::OK, json!({ "patterns": content })))
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

pub(crate) async fn scheduler_list(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    Ok(success(StatusCode::OK, json!(state.scheduler.list())))
}

pub(crate) async fn scheduler_create(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let Json(body) = body.map_err(ApiError::invalid_body)?;
    let Some(cron_expr) = body.get("cron_expr").and_then(Value::as_str) else {
        return Err(ApiError::missing_field("cron_expr"));
    };
    let Some(message) = body.get("message").and_then(Value::as_str) else {
        return Err(ApiError::missing_field("message"));
    };

    let field = |name: &str, default: &str| {
        body.get(name)
            .and_then(Value::as_str)
            .unwrap_or(default)
            .to_string()
    };
    let spec = TaskSpec {
        cron_expr: cron_expr.to_string(),
        message: message.to_string(),
        description: field("description", ""),
        chat_id: ChatId::new(field("chat_id", "api-scheduler")),
        user_id: field("user_id", "scheduler"),
        channel: field("channel", channel::API),
    };

    let task = state.scheduler.add(spec).map_err(|e| match e {
        kenobot_scheduler::SchedulerError::InvalidCron { .. } => ApiError::invalid_cron(e),
        other => ApiError::internal(other),
    })?;
    Ok(success(StatusCode::CREATED, json!({ "id": task.id })))
}

pub(crate) async fn scheduler_delete(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let task_id = id
        .parse::<Uuid>()
        .map_err(|_| ApiError::not_found(format!("task {id:?}")))?;
    let removed = state
        .scheduler
        .remove(task_id)
        .map_err(ApiError::internal)?;
    if !removed {
        return Err(ApiError::not_found(format!("task {id:?}")));
    }
    Ok(StatusCode::NO_CONTENT.into_response())
}

// ---------------------------------------------------------------------------
// Sleep cycle
// ---------------------------------------------------------------------------

pub(crate) async fn sleep_get(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    Ok(success(StatusCode::OK, json!(state.sleep.state())))
}

pub(crate) async fn sleep_run(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    if state.sleep.state().status == SleepStatus::Running {
        return Err(ApiError::conflict("sleep-cycle"));
    }

    let task_id = format!("sleep-{}", Uuid::new_v4());
    state.tasks.begin(&task_id, "sleep cycle run");
    let sleep = std::sync::Arc::clone(&state.sleep);
    let tasks = std::sync::Arc::clone(&state.tasks);
    let spawned_id = task_id.clone();
    tokio::spawn(async move {
        match sleep.run().await {
            Ok(()) => {
                tasks.push_event(&spawned_id, TaskEvent::now("completed", ""));
                tasks.finish(&spawned_id, TaskStatus::Completed);
            },
            Err(e) => {
                tracing::error!(error = %e, "manually triggered sleep cycle failed");
                tasks.push_event(&spawned_id, TaskEvent::now("error", e.to_string()));
                tasks.finish(&spawned_id, TaskStatus::Failed);
            },
        }
    });
    Ok(success(
        StatusCode::ACCEPTED,
        json!({ "status": "started", "task_id": task_id }),
    ))
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub(crate) async fn tasks_active(
    State(state): State<GatewayState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    Ok(success(StatusCode::OK, json!(state.tasks.active())))
}

pub(crate) async fn task_events(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    authorize(&state, &headers)?;
    let events = state
        .tasks
        .events(&id)
        .ok_or_else(|| ApiError::not_found(format!("task {id:?}")))?;
    Ok(success(StatusCode::OK, json!({ "id": id, "events": events })))
}
