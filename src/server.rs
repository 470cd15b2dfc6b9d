//! Web server module for LivePing.
//!
//! Serves the observer page and the `/ws` endpoint. Each WebSocket
//! connection becomes one hub observer; its read half carries control
//! commands.

use std::sync::Arc;

use askama::Template;
use axum::{
    Json, Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
};
use futures::{SinkExt, StreamExt, stream::SplitSink};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};

use crate::hub::{Frame, FrameSink, HubError, HubHandle, Observer, ObserverId};
use crate::probe::ProbeController;

/// Inbound text that replaces the probe session.
pub const RESTART_COMMAND: &str = "RESTART";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub hub: HubHandle,
    pub controller: ProbeController,
    /// Fired on process shutdown; ends open WebSocket read loops.
    pub shutdown: CancellationToken,
}

/// Health check response.
#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    target: String,
    running: bool,
    observers: usize,
}

/// Observer page.
#[derive(Template)]
#[template(path = "index.html")]
struct IndexTemplate {
    target: String,
}

/// Wrapper to render Askama templates as Axum responses.
struct HtmlTemplate<T>(T);

impl<T> IntoResponse for HtmlTemplate<T>
where
    T: Template,
{
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(rendered) => Html(rendered).into_response(),
            Err(err) => {
                tracing::error!(error = %err, "Template render failed");
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    let app_state = Arc::new(state);

    Router::new()
        .route("/", get(index_handler))
        .route("/healthz", get(healthz_handler))
        .route("/ws", get(ws_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::default().include_headers(true)),
        )
        .layer(CorsLayer::permissive())
        .with_state(app_state)
}

/// Serve the router on `listener` until `signal` completes.
///
/// Teardown stops the probe and its stats timer first, then fires
/// `state.shutdown` so open sockets unregister and get their Close frame.
pub async fn serve<F>(listener: TcpListener, state: AppState, signal: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let controller = state.controller.clone();
    let shutdown = state.shutdown.clone();
    let teardown = async move {
        signal.await;
        tracing::info!("Stopping probe...");
        controller.shutdown().await;
        shutdown.cancel();
    };

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(teardown)
        .await
}

async fn index_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    HtmlTemplate(IndexTemplate {
        target: state.controller.target().to_string(),
    })
}

/// Liveness probe reporting the session and observer count.
async fn healthz_handler(State(state): State<Arc<AppState>>) -> Response {
    let running = state
        .controller
        .session()
        .await
        .is_some_and(|s| s.is_running());
    let target = state.controller.target().to_string();

    match state.hub.observer_count().await {
        Ok(observers) => Json(HealthResponse {
            status: "ok",
            target,
            running,
            observers,
        })
        .into_response(),
        Err(err) => {
            tracing::error!(error = %err, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(HealthResponse {
                    status: "unavailable",
                    target,
                    running,
                    observers: 0,
                }),
            )
                .into_response()
        }
    }
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Write half of one WebSocket connection.
struct WsSink {
    tx: SplitSink<WebSocket, Message>,
}

#[async_trait::async_trait]
impl FrameSink for WsSink {
    async fn send_frame(&mut self, frame: &Frame) -> Result<(), HubError> {
        self.tx
            .send(Message::Text(frame.as_str().into()))
            .await
            .map_err(|e| HubError::Delivery(e.to_string()))
    }

    async fn close(&mut self) {
        // Peer may already be gone
        let _ = self.tx.send(Message::Close(None)).await;
        let _ = self.tx.close().await;
    }
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (tx, mut rx) = socket.split();
    let observer = Observer::new(WsSink { tx });
    let id = observer.id();

    if let Err(e) = state.hub.register(observer).await {
        tracing::warn!(observer = %id, error = %e, "Failed to register observer");
        return;
    }
    tracing::debug!(observer = %id, "Observer connected");

    loop {
        let msg = tokio::select! {
            biased;
            () = state.shutdown.cancelled() => break,
            msg = rx.next() => msg,
        };

        match msg {
            Some(Ok(Message::Text(text))) => handle_command(&state, id, text.as_str()).await,
            Some(Ok(Message::Close(_))) | None => break,
            Some(Err(e)) => {
                tracing::debug!(observer = %id, error = %e, "WebSocket read failed");
                break;
            }
            Some(Ok(_)) => {}
        }
    }

    if let Err(e) = state.hub.unregister(id).await {
        tracing::debug!(observer = %id, error = %e, "Hub gone before unregister");
    }
    tracing::debug!(observer = %id, "Observer disconnected");
}

async fn handle_command(state: &AppState, id: ObserverId, text: &str) {
    if text != RESTART_COMMAND {
        tracing::debug!(observer = %id, len = text.len(), "Ignoring unknown command");
        return;
    }

    tracing::info!(observer = %id, "Restart requested");
    if let Err(e) = state.controller.restart().await {
        tracing::error!(observer = %id, error = %e, "Restart failed, probe is idle");
    }
}
