//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Build the shared application state from configuration
//! - Create the Axum router with every endpoint and the admin API
//! - Wire up middleware (tracing, correlation, body limit)
//! - Serve plain TCP or TLS with graceful shutdown
//! - Apply fault-table reloads from the config watcher

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, FromRef},
    http::{Method, Request, Uri},
    middleware,
    response::Response,
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::Span;

use crate::admin::{setup_admin_router, RequestCounters};
use crate::config::{AdminConfig, AppConfig, WorkloadConfig};
use crate::endpoints::setup_workload_router;
use crate::errors::Failure;
use crate::external::{ExternalService, HttpExternalService};
use crate::faults::FaultPolicy;
use crate::http::middleware::correlation_middleware;
use crate::http::request::RequestLog;
use crate::http::response;
use crate::lifecycle::StartupError;
use crate::observability::LogEmitter;

/// Grace period for in-flight TLS connections after shutdown is triggered.
const TLS_DRAIN_SECS: u64 = 30;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub policy: Arc<FaultPolicy>,
    pub emitter: Arc<LogEmitter>,
    pub external: Arc<dyn ExternalService>,
    pub counters: Arc<RequestCounters>,
    pub workloads: Arc<WorkloadConfig>,
    pub admin: Arc<AdminConfig>,
    pub request_timeout: Duration,
    pub started_at: Instant,
}

impl AppState {
    /// Build every collaborator from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        let emitter = Arc::new(LogEmitter::from_config(&config.observability)?);
        let policy = Arc::new(FaultPolicy::new(
            config.faults.default_error_rate,
            config.faults.profile(),
            config.faults.seed,
        )?);
        let external: Arc<dyn ExternalService> = Arc::new(HttpExternalService::new(
            &config.external.url,
            Duration::from_secs(config.timeouts.external_call_secs),
        )?);
        Ok(Self::new(config, policy, emitter, external))
    }

    /// Assemble state from prepared collaborators.
    pub fn new(
        config: &AppConfig,
        policy: Arc<FaultPolicy>,
        emitter: Arc<LogEmitter>,
        external: Arc<dyn ExternalService>,
    ) -> Self {
        Self {
            policy,
            emitter,
            external,
            counters: Arc::new(RequestCounters::new()),
            workloads: Arc::new(config.workloads.clone()),
            admin: Arc::new(config.admin.clone()),
            request_timeout: Duration::from_secs(config.timeouts.request_secs),
            started_at: Instant::now(),
        }
    }
}

impl FromRef<AppState> for Arc<LogEmitter> {
    fn from_ref(state: &AppState) -> Self {
        state.emitter.clone()
    }
}

/// HTTP server for the workload generator.
pub struct HttpServer {
    router: Router,
    state: AppState,
}

impl HttpServer {
    /// Create a server with state built from `config`.
    pub fn new(config: &AppConfig) -> Result<Self, StartupError> {
        let state = AppState::from_config(config)?;
        Ok(Self::with_state(config, state))
    }

    pub fn with_state(config: &AppConfig, state: AppState) -> Self {
        let router = Self::build_router(config, state.clone());
        Self { router, state }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &AppConfig, state: AppState) -> Router {
        Router::new()
            .merge(setup_workload_router())
            .merge(setup_admin_router(state.clone()))
            .fallback(not_found)
            .method_not_allowed_fallback(method_not_allowed)
            .layer(DefaultBodyLimit::max(config.security.max_body_size))
            // Inside the correlation boundary so the span can carry the id.
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(correlated_span)
                    .on_failure(()),
            )
            .layer(middleware::from_fn_with_state(state.clone(), correlation_middleware))
            .with_state(state)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// A clone of the fully layered router.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve plain HTTP on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            error_rate = self.state.policy.error_rate(),
            "HTTP server starting"
        );

        let reloader = spawn_reloader(self.state.policy.clone(), config_updates);
        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr` until `shutdown` fires.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: RustlsConfig,
        config_updates: mpsc::UnboundedReceiver<AppConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        tracing::info!(address = %addr, "HTTPS server starting");

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(Duration::from_secs(TLS_DRAIN_SECS)));
        });

        let reloader = spawn_reloader(self.state.policy.clone(), config_updates);
        axum_server::bind_rustls(addr, tls)
            .handle(handle)
            .serve(self.router.into_make_service_with_connect_info::<SocketAddr>())
            .await?;

        reloader.abort();
        tracing::info!("HTTPS server stopped");
        Ok(())
    }
}

/// Apply reloaded fault tables. The live error rate is left alone.
fn spawn_reloader(
    policy: Arc<FaultPolicy>,
    mut updates: mpsc::UnboundedReceiver<AppConfig>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(config) = updates.recv().await {
            let profile = config.faults.profile();
            let sites = profile.sites().count();
            policy.replace_profile(profile);
            tracing::info!(sites, error_rate = policy.error_rate(), "Fault tables reloaded");
        }
    })
}

async fn not_found(log: RequestLog, uri: Uri) -> Response {
    response::failure(
        &log,
        Failure::NotFound {
            path: uri.path().to_string(),
        },
    )
}

async fn method_not_allowed(log: RequestLog, method: Method, uri: Uri) -> Response {
    response::failure(
        &log,
        Failure::MethodNotAllowed {
            method: method.to_string(),
            path: uri.path().to_string(),
        },
    )
}

/// Request span for `TraceLayer`, tagged with the correlation id that
/// `correlation_middleware` placed in the extensions.
fn correlated_span(request: &Request<Body>) -> Span {
    let correlation_id = request
        .extensions()
        .get::<RequestLog>()
        .map(|log| log.correlation_id().to_string())
        .unwrap_or_default();
    tracing::info_span!(
        "request",
        correlation_id = %correlation_id,
        method = %request.method(),
        uri = %request.uri(),
    )
}
