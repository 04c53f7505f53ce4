//! REST response envelopes and the stable error taxonomy.
//!
//! Every response is wrapped: successes as `{data, meta}`, errors as
//! `{error: {code, message, hint, retryable}, meta}`. `meta` carries a
//! per-response request id and a millisecond timestamp.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Value, json};
use uuid::Uuid;

/// Stable error codes of the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Missing or invalid bearer token.
    Unauthorized,
    /// The resource does not exist.
    NotFound,
    /// Per-IP sliding window exceeded.
    RateLimited,
    /// The cost tracker reports over-budget.
    BudgetExceeded,
    /// No agent reply within the configured timeout.
    GatewayTimeout,
    /// A request for the conversation is already in flight.
    Conflict,
    /// A required field is absent or mistyped.
    MissingField,
    /// The request body is not valid JSON.
    InvalidBody,
    /// A cron expression failed validation.
    InvalidCron,
    /// Anything else.
    InternalError,
}

impl ErrorCode {
    /// The wire name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::NotFound => "NOT_FOUND",
            Self::RateLimited => "RATE_LIMITED",
            Self::BudgetExceeded => "BUDGET_EXCEEDED",
            Self::GatewayTimeout => "GATEWAY_TIMEOUT",
            Self::Conflict => "CONFLICT",
            Self::MissingField => "MISSING_FIELD",
            Self::InvalidBody => "INVALID_BODY",
            Self::InvalidCron => "INVALID_CRON",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// HTTP status for the code.
    #[must_use]
    pub fn status(self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::RateLimited | Self::BudgetExceeded => StatusCode::TOO_MANY_REQUESTS,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Conflict => StatusCode::CONFLICT,
            Self::MissingField | Self::InvalidBody | Self::InvalidCron => StatusCode::BAD_REQUEST,
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether a retry can succeed without the caller changing anything.
    #[must_use]
    pub fn retryable(self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::BudgetExceeded | Self::GatewayTimeout | Self::InternalError
        )
    }
}

/// A REST error ready to become a response.
#[derive(Debug)]
pub struct ApiError {
    /// Stable code.
    pub code: ErrorCode,
    /// Human message.
    pub message: String,
    /// What the caller can do about it.
    pub hint: Option<String>,
    /// Value for the `Retry-After` header.
    pub retry_after_secs: Option<u64>,
}

impl ApiError {
    /// Build an error with no hint.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            hint: None,
            retry_after_secs: None,
        }
    }

    /// Attach a hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Missing/invalid bearer token.
    #[must_use]
    pub fn unauthorized() -> Self {
        Self::new(ErrorCode::Unauthorized, "missing or invalid bearer token")
            .with_hint("send Authorization: Bearer <api key>")
    }

    /// Unknown resource.
    #[must_use]
    pub fn not_found(what: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("{what} not found"))
    }

    /// Sliding window exceeded.
    #[must_use]
    pub fn rate_limited(retry_after_secs: u64) -> Self {
        let mut err = Self::new(ErrorCode::RateLimited, "too many requests")
            .with_hint(format!("retry after {retry_after_secs}s"));
        err.retry_after_secs = Some(retry_after_secs);
        err
    }

    /// Cost tracker over budget.
    #[must_use]
    pub fn budget_exceeded() -> Self {
        Self::new(ErrorCode::BudgetExceeded, "daily budget exhausted")
            .with_hint("retry after the budget window resets")
    }

    /// No agent reply in time.
    #[must_use]
    pub fn gateway_timeout() -> Self {
        Self::new(ErrorCode::GatewayTimeout, "no reply from the agent in time")
    }

    /// Conversation already being processed.
    #[must_use]
    pub fn conflict(chat_id: impl std::fmt::Display) -> Self {
        Self::new(
            ErrorCode::Conflict,
            format!("a request for {chat_id} is already in flight"),
        )
        .with_hint("wait for the current reply before sending another message")
    }

    /// Required field absent or mistyped.
    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("field {field:?} is required and must be a string"),
        )
    }

    /// Body is not valid JSON.
    #[must_use]
    pub fn invalid_body(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidBody, format!("invalid JSON body: {detail}"))
    }

    /// Cron expression rejected.
    #[must_use]
    pub fn invalid_cron(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InvalidCron, detail.to_string())
    }

    /// Catch-all.
    #[must_use]
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::InternalError, detail.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.code.retryable(),
            },
            "meta": meta(),
        });
        let mut response = (self.code.status(), Json(body)).into_response();
        if let Some(secs) = self.retry_after_secs {
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

/// Wrap a success payload in the envelope.
#[must_use]
pub fn success(status: StatusCode, data: Value) -> Response {
    (status, Json(json!({ "data": data, "meta": meta() }))).into_response()
}

fn meta() -> Value {
    json!({
        "requestId": Uuid::new_v4(),
        "timestamp": Utc::now().timestamp_millis(),
    })
}
