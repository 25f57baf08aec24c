//! Shared utilities for integration and load testing.
#![allow(dead_code)]

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use apm_workload::config::AppConfig;
use apm_workload::external::HttpExternalService;
use apm_workload::faults::FaultPolicy;
use apm_workload::http::{AppState, HttpServer};
use apm_workload::lifecycle::Shutdown;
use apm_workload::observability::{LogEmitter, LogRecord, LogSink, MemorySink};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

/// A running service bound to an ephemeral port.
pub struct TestApp {
    pub addr: SocketAddr,
    pub url: String,
    pub sink: Arc<MemorySink>,
    pub state: AppState,
    pub shutdown: Shutdown,
}

impl TestApp {
    /// Records logged under `correlation_id`, in emission order.
    pub fn logs_for(&self, correlation_id: &str) -> Vec<LogRecord> {
        self.sink.for_correlation(correlation_id)
    }

    /// Wait until the terminal record of `correlation_id` has been written.
    pub async fn completion_for(&self, correlation_id: &str) -> LogRecord {
        for _ in 0..100 {
            if let Some(record) = self
                .logs_for(correlation_id)
                .into_iter()
                .find(|r| r.message == "request completed" || r.message == "request cancelled")
            {
                return record;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("no completion record for {}", correlation_id);
    }
}

/// Config with quiet defaults: no faults, seeded draws, short workloads.
pub fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.faults.default_error_rate = 0.0;
    config.faults.seed = Some(42);
    config.workloads.slow_min_ms = 10;
    config.workloads.slow_max_ms = 20;
    config.workloads.db_min_ms = 5;
    config.workloads.db_max_ms = 10;
    config.workloads.chain_min_ms = 1;
    config.workloads.chain_max_ms = 5;
    config.workloads.memory_items = 1_000;
    config.workloads.cpu_iterations = 10_000;
    config.workloads.error_random_timeout_ms = 50;
    config.external.url = "http://127.0.0.1:9/json".to_string();
    config
}

pub async fn spawn_app(customize: impl FnOnce(&mut AppConfig)) -> TestApp {
    spawn_app_with_sinks(customize, Vec::new()).await
}

/// Start the service with a `MemorySink` plus `extra_sinks`.
pub async fn spawn_app_with_sinks(
    customize: impl FnOnce(&mut AppConfig),
    extra_sinks: Vec<Arc<dyn LogSink>>,
) -> TestApp {
    let mut config = test_config();
    customize(&mut config);

    let sink = Arc::new(MemorySink::new());
    let mut emitter = LogEmitter::new("apm_workload_test");
    for extra in extra_sinks {
        emitter = emitter.with_sink(extra);
    }
    let emitter = Arc::new(emitter.with_sink(sink.clone()));

    let policy = Arc::new(
        FaultPolicy::new(
            config.faults.default_error_rate,
            config.faults.profile(),
            config.faults.seed,
        )
        .unwrap(),
    );
    let external = Arc::new(
        HttpExternalService::new(
            &config.external.url,
            Duration::from_secs(config.timeouts.external_call_secs),
        )
        .unwrap(),
    );
    let state = AppState::new(&config, policy, emitter, external);
    let server = HttpServer::with_state(&config, state.clone());

    let listener = TcpListener::bind(&config.listener.bind_address).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let (_, config_updates) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let _ = server.run(listener, config_updates, server_shutdown).await;
    });

    TestApp {
        addr,
        url: format!("http://{}", addr),
        sink,
        state,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

fn status_line(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

/// Start a mock backend that returns a fixed 200 body. Returns its address.
pub async fn start_mock_backend(response: &'static str) -> SocketAddr {
    start_programmable_backend(move || async move { (200, response.to_string()) }).await
}

/// Start a programmable mock backend. Returns its address.
pub async fn start_programmable_backend<F, Fut>(f: F) -> SocketAddr
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let mut buf = [0u8; 4096];
                        let _ = socket.read(&mut buf).await;
                        let (status, body) = f().await;
                        let response = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_line(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response.as_bytes()).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });
    addr
}

/// Accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    addr
}

/// An address with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
