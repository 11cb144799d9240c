//! Gateway HTTP server on Axum

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};
use vaani_core::Coordinator;

use crate::protocol::{AgentsResponse, CommandRequest, CommandResponse, HealthResponse, routes};

/// Shared state for all requests
#[derive(Clone)]
pub struct GatewayState {
    pub coordinator: Arc<Coordinator>,
    /// Held for the duration of one `handle` call so utterances never overlap
    pub turn: Arc<Mutex<()>>,
    pub start_time: std::time::Instant,
}

impl GatewayState {
    pub fn new(coordinator: Arc<Coordinator>) -> Self {
        Self {
            coordinator,
            turn: Arc::new(Mutex::new(())),
            start_time: std::time::Instant::now(),
        }
    }
}

/// The gateway server
pub struct GatewayServer {
    state: GatewayState,
    bind: SocketAddr,
}

impl GatewayServer {
    pub fn new(bind: SocketAddr, coordinator: Arc<Coordinator>) -> Self {
        Self {
            state: GatewayState::new(coordinator),
            bind,
        }
    }

    /// Build the Axum router
    pub fn router(&self) -> Router {
        Router::new()
            .route(routes::PROCESS_COMMAND, post(process_command_handler))
            .route(routes::AGENTS, get(agents_handler))
            .route(routes::HEALTH, get(health_handler))
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Start the server (blocks until shutdown)
    pub async fn run(self) -> anyhow::Result<()> {
        let router = self.router();
        let listener = tokio::net::TcpListener::bind(self.bind).await?;
        info!("Gateway listening on {}", self.bind);

        axum::serve(listener, router).await?;

        Ok(())
    }
}

// ── HTTP Handlers ──

async fn process_command_handler(
    State(state): State<GatewayState>,
    Json(req): Json<CommandRequest>,
) -> Json<CommandResponse> {
    debug!(
        "Command from {}: {:?}",
        req.user_id.as_deref().unwrap_or("anonymous"),
        req.command
    );

    let routed = {
        let _turn = state.turn.lock().await;
        state.coordinator.handle(&req.command).await
    };

    Json(CommandResponse::new(routed))
}

async fn agents_handler(State(state): State<GatewayState>) -> Json<AgentsResponse> {
    Json(AgentsResponse {
        agents: state.coordinator.capabilities(),
    })
}

async fn health_handler(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        capabilities: state.coordinator.capabilities().len(),
    })
}
