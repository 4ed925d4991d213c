//! HTTP routes
//!
//! - `GET /stream/{user}/{camera}` opens an MJPEG stream for the session key
//!   `{user}.{camera}`. The response body *is* the relay: it stays open
//!   until the relay stops.
//! - `PUT /heartbeat/{user}` is the producer's liveness ping; it echoes the
//!   user id.
//! - `GET /sessions` lists the session keys currently streaming.
//!
//! Stream request statuses:
//!
//! | status | when |
//! |---|---|
//! | 400 | user or camera id is not a valid key part |
//! | 403 | the access check said no |
//! | 503 | `max_connections` streams are already running |
//! | 409 | another relay already serves the key |
//! | 500 | the relay could not start for another reason |
//! | 200 | streaming |

use std::convert::Infallible;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, put};
use axum::Router;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::error::Error;
use crate::registry::SessionRegistry;
use crate::relay::{response_headers, FrameRelay, RelayConfig, RelayOutcome};
use crate::session::SessionKey;

use super::access::AccessCheck;

/// Body of the 403 response
pub const FORBIDDEN_BODY: &str = "You are not authorized to access this resource";

/// State shared by all handlers
pub(crate) struct AppState<A> {
    pub access: A,
    pub registry: Arc<SessionRegistry>,
    pub relay: RelayConfig,
    pub sessions: Option<Arc<Semaphore>>,
    pub cancel: CancellationToken,
}

impl<A: AccessCheck> AppState<A> {
    pub fn new(
        access: A,
        registry: Arc<SessionRegistry>,
        relay: RelayConfig,
        max_connections: usize,
        cancel: CancellationToken,
    ) -> Self {
        let sessions = if max_connections > 0 {
            Some(Arc::new(Semaphore::new(max_connections)))
        } else {
            None
        };

        Self {
            access,
            registry,
            relay,
            sessions,
            cancel,
        }
    }

    /// Reserve a streaming slot. `Err` means the limit is reached.
    fn reserve_slot(&self) -> Result<Option<OwnedSemaphorePermit>, ()> {
        match &self.sessions {
            Some(sem) => sem.clone().try_acquire_owned().map(Some).map_err(|_| ()),
            None => Ok(None),
        }
    }
}

pub(crate) fn build<A: AccessCheck>(state: Arc<AppState<A>>) -> Router {
    Router::new()
        .route("/stream/{user}/{camera}", get(stream::<A>))
        .route("/heartbeat/{user}", put(heartbeat))
        .route("/sessions", get(sessions::<A>))
        .with_state(state)
}

async fn stream<A: AccessCheck>(
    State(state): State<Arc<AppState<A>>>,
    Path((user_id, camera_id)): Path<(String, String)>,
) -> Response {
    let key = match SessionKey::new(user_id.as_str(), camera_id.as_str()) {
        Ok(key) => key,
        Err(e) => {
            tracing::warn!(user = %user_id, camera = %camera_id, error = %e, "Rejected stream request");
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if !state.access.can_access(&user_id, &camera_id).await {
        tracing::info!(session = %key, "Access denied");
        return (StatusCode::FORBIDDEN, FORBIDDEN_BODY).into_response();
    }

    let Ok(permit) = state.reserve_slot() else {
        tracing::warn!(session = %key, "Stream rejected: limit reached");
        return (StatusCode::SERVICE_UNAVAILABLE, "Too many active streams").into_response();
    };

    let relay = match FrameRelay::start(key.clone(), state.registry.clone(), state.relay.clone()).await {
        Ok(relay) => relay,
        Err(Error::StartupConflict(_)) => {
            return (StatusCode::CONFLICT, "Stream already active for this camera").into_response();
        }
        Err(e) => {
            tracing::error!(session = %key, error = %e, "Failed to start relay");
            return (StatusCode::INTERNAL_SERVER_ERROR, "Failed to start stream").into_response();
        }
    };

    let (rx, handle) = relay.spawn(state.cancel.child_token());

    tokio::spawn(async move {
        // Slot is held for the relay's lifetime, not the handler's
        let _permit = permit;
        match handle.await {
            Ok(outcome) => log_outcome(&outcome),
            Err(e) => tracing::error!(session = %key, error = %e, "Relay task failed"),
        }
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    (response_headers(), body).into_response()
}

fn log_outcome(outcome: &RelayOutcome) {
    tracing::info!(
        session = %outcome.key,
        reason = %outcome.reason,
        frames_sent = outcome.stats.frames_sent,
        fps = outcome.stats.frame_rate(),
        duration_secs = outcome.stats.duration().as_secs(),
        "Stream closed"
    );
}

async fn heartbeat(Path(user_id): Path<String>) -> (StatusCode, String) {
    tracing::debug!(user = %user_id, "Producer heartbeat");
    (StatusCode::OK, user_id)
}

async fn sessions<A: AccessCheck>(State(state): State<Arc<AppState<A>>>) -> Json<Vec<String>> {
    let mut keys: Vec<String> = state
        .registry
        .active_sessions()
        .iter()
        .map(ToString::to_string)
        .collect();
    keys.sort();
    Json(keys)
}
