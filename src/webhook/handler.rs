use std::sync::Arc;

use axum::{
    body::to_bytes,
    extract::{Request, State},
    http::{HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Credentials;
use crate::messaging::PushApi;
use crate::webhook::signature::{self, SIGNATURE_HEADER};
use crate::webhook::{parse_first_event, ValidationError};

/// Largest webhook body buffered; the platform's deliveries are far smaller.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Shared, read-only state handed to every webhook invocation.
pub struct AppState {
    pub credentials: Credentials,
    pub push: Arc<dyn PushApi>,
    pub verify_signature: bool,
}

/// JSON body for every non-200 response.
#[derive(Debug, Serialize)]
pub struct ApiResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("Only POST method allowed")]
    MethodNotAllowed,
    #[error("Invalid signature")]
    InvalidSignature,
    #[error("Request body too large")]
    PayloadTooLarge,
    #[error("Invalid event structure")]
    Validation(#[source] ValidationError),
    #[error("Missing required environment variables")]
    MissingCredentials,
    #[error("{0}")]
    Delivery(anyhow::Error),
}

impl WebhookError {
    fn status(&self) -> StatusCode {
        match self {
            WebhookError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            WebhookError::InvalidSignature => StatusCode::UNAUTHORIZED,
            WebhookError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            WebhookError::Validation(_) => StatusCode::BAD_REQUEST,
            WebhookError::MissingCredentials | WebhookError::Delivery(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn body(&self) -> ApiResponse {
        let error = match self {
            WebhookError::MethodNotAllowed => None,
            WebhookError::InvalidSignature => Some("Unauthorized"),
            WebhookError::PayloadTooLarge => Some("Payload Too Large"),
            WebhookError::Validation(_) => Some("Bad Request"),
            WebhookError::MissingCredentials | WebhookError::Delivery(_) => {
                Some("Internal Server Error")
            }
        };

        let message = match self {
            WebhookError::Delivery(e) => {
                let text = format!("{e:#}");
                if text.is_empty() {
                    "Unknown error occurred".to_string()
                } else {
                    text
                }
            }
            other => other.to_string(),
        };

        ApiResponse { error, message }
    }
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.body())).into_response()
    }
}

/// Mount the webhook on `path` for every method; non-POST calls get a 405
/// from the handler itself so the body matches the other error responses.
pub fn router(path: &str, state: AppState) -> Router {
    Router::new()
        .route(path, any(handle_webhook))
        .with_state(Arc::new(state))
}

async fn handle_webhook(State(state): State<Arc<AppState>>, request: Request) -> Response {
    match accept(&state, request).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => e.into_response(),
    }
}

/// The method is checked before the body is read, so a non-POST call is
/// answered with 405 whatever it carries.
async fn accept(state: &AppState, request: Request) -> Result<(), WebhookError> {
    if *request.method() != Method::POST {
        warn!("Rejected {} request to webhook", request.method());
        return Err(WebhookError::MethodNotAllowed);
    }

    let (parts, body) = request.into_parts();
    let body = to_bytes(body, MAX_BODY_BYTES).await.map_err(|e| {
        error!("Failed to read webhook body: {}", e);
        WebhookError::PayloadTooLarge
    })?;

    process(state, &parts.headers, &body).await
}

async fn process(state: &AppState, headers: &HeaderMap, body: &[u8]) -> Result<(), WebhookError> {
    if state.verify_signature {
        if let Some(secret) = state
            .credentials
            .channel_secret
            .as_deref()
            .filter(|s| !s.is_empty())
        {
            let valid = headers
                .get(SIGNATURE_HEADER)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|sig| signature::verify(secret, body, sig));
            if !valid {
                warn!("Rejected webhook with missing or invalid signature");
                return Err(WebhookError::InvalidSignature);
            }
        }
    }

    let parsed = match parse_first_event(body) {
        Ok(parsed) => parsed,
        Err(invalid) => {
            match &invalid.event {
                Some(event) => error!("Invalid event structure: {} ({})", event, invalid.reason),
                None => error!("Invalid event structure: {}", invalid.reason),
            }
            return Err(WebhookError::Validation(invalid.reason));
        }
    };

    if parsed.ignored > 0 {
        debug!("Ignoring {} additional event(s) in batch", parsed.ignored);
    }

    if !state.credentials.is_complete() {
        error!("Missing required environment variables");
        return Err(WebhookError::MissingCredentials);
    }

    let Some(reply) = parsed.event.source.id_reply() else {
        debug!("No reply for source {:?}", parsed.event.source);
        return Ok(());
    };

    if let Err(e) = state.push.push_message(&reply).await {
        error!("An error occurred while pushing to {}: {:#}", reply.to, e);
        return Err(WebhookError::Delivery(e));
    }

    info!("Sent source ID to {}", reply.to);
    Ok(())
}
