//! Shared utilities for integration tests.
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Notify;

use discovery_gateway::config::GatewayConfig;
use discovery_gateway::discovery::{
    MemoryRegistry, Registration, RegistrationHandle, RegistryBackend, RegistryError,
    ServiceEntries, ServiceIdentity,
};
use discovery_gateway::http::{AppState, HttpServer};
use discovery_gateway::lifecycle::{assemble, Shutdown};

/// A request seen by a programmable backend.
#[derive(Debug, Clone)]
pub struct MockRequest {
    pub method: String,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

fn status_text(status: u16) -> &'static str {
    match status {
        200 => "200 OK",
        201 => "201 Created",
        400 => "400 Bad Request",
        404 => "404 Not Found",
        500 => "500 Internal Server Error",
        502 => "502 Bad Gateway",
        503 => "503 Service Unavailable",
        _ => "200 OK",
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<MockRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let path = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while buf.len() < header_end + length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&buf[header_end..]).to_string();

    Some(MockRequest {
        method,
        path,
        headers,
        body,
    })
}

/// Start a programmable mock backend with async support. Bodies are sent as
/// JSON.
pub async fn start_programmable_backend<F, Fut>(addr: SocketAddr, f: F)
where
    F: Fn(MockRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = (u16, String)> + Send + 'static,
{
    let listener = TcpListener::bind(addr).await.unwrap();
    let f = Arc::new(f);

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let f = f.clone();
                    tokio::spawn(async move {
                        let request = match read_request(&mut socket).await {
                            Some(r) => r,
                            None => return,
                        };
                        let (status, body) = f(request).await;
                        let response_str = format!(
                            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                            status_text(status),
                            body.len(),
                            body
                        );
                        let _ = socket.write_all(response_str.as_bytes()).await;
                        let _ = socket.shutdown().await;
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    });
                }
                Err(_) => break,
            }
        }
    });
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

/// Poll `check` until it holds or two seconds pass.
pub async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

/// Registry wrapper that counts calls reaching the backend.
#[derive(Debug, Default)]
pub struct CountingRegistry {
    pub inner: MemoryRegistry,
    pub registers: AtomicU32,
    pub deregisters: AtomicU32,
    pub deregistered_ids: Mutex<Vec<String>>,
}

impl CountingRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryBackend for CountingRegistry {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn register(&self, registration: &Registration) -> Result<RegistrationHandle, RegistryError> {
        self.registers.fetch_add(1, Ordering::SeqCst);
        self.inner.register(registration).await
    }

    async fn deregister(&self, handle: &RegistrationHandle) -> Result<(), RegistryError> {
        self.deregisters.fetch_add(1, Ordering::SeqCst);
        self.deregistered_ids
            .lock()
            .unwrap()
            .push(handle.id().to_string());
        self.inner.deregister(handle).await
    }

    async fn heartbeat(&self, handle: &RegistrationHandle) -> Result<(), RegistryError> {
        self.inner.heartbeat(handle).await
    }

    async fn lookup(&self, name: &str, environment: &str) -> Result<ServiceEntries, RegistryError> {
        self.inner.lookup(name, environment).await
    }
}

/// Register a collaborator instance directly with the registry.
pub async fn register_instance(
    registry: &dyn RegistryBackend,
    name: &str,
    version: &str,
    environment: &str,
    address: &str,
) -> RegistrationHandle {
    registry
        .register(&Registration {
            identity: ServiceIdentity::new(name, version, environment),
            address: address.to_string(),
            metadata: HashMap::new(),
            ttl: Duration::from_secs(60),
        })
        .await
        .unwrap()
}

/// A running gateway on a loopback port.
pub struct TestGateway {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    /// Completes once the HTTP server has stopped.
    pub server: tokio::task::JoinHandle<()>,
    _dir: tempfile::TempDir,
}

impl TestGateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn stop(&self) {
        self.shutdown.trigger();
    }
}

/// Assemble, register and serve a gateway on `port` with `file` as its
/// config file contents.
pub async fn start_gateway(
    port: u16,
    mut config: GatewayConfig,
    file: &str,
    registry: Arc<dyn RegistryBackend>,
) -> TestGateway {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.toml");
    std::fs::write(&path, file).unwrap();

    config.service.bind_host = "127.0.0.1".to_string();
    config.registry.cache_ttl_secs = 1;
    config.upstream.timeout_secs = 2;
    config.upstream.retry_base_ms = 10;
    config.upstream.retry_max_ms = 20;
    config.shutdown.drain_timeout_secs = 1;

    let shutdown = Shutdown::new();
    let components = assemble(config, &path, false, registry, shutdown.clone())
        .await
        .unwrap();

    let addr: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let state = components.state.clone();
    state
        .lifecycle
        .register(
            state.config.service.identity(),
            &addr.to_string(),
            HashMap::new(),
            Duration::from_secs(30),
        )
        .await
        .unwrap();

    let listener = TcpListener::bind(addr).await.unwrap();
    let server = HttpServer::new(state.clone(), &state.config.timeouts);
    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestGateway {
        addr,
        state,
        shutdown,
        server,
        _dir: dir,
    }
}

/// Minimal Consul agent: service catalog with TTL checks and a KV store with
/// blocking queries.
#[derive(Debug, Default)]
pub struct MockConsul {
    services: Mutex<HashMap<String, (Value, String)>>,
    kv: Mutex<HashMap<String, String>>,
    index: AtomicU64,
    changed: Notify,
}

impl MockConsul {
    pub async fn start(addr: SocketAddr) -> Arc<MockConsul> {
        let consul = Arc::new(MockConsul::default());
        consul.index.store(1, Ordering::SeqCst);

        let app = Router::new()
            .route("/v1/agent/service/register", put(register_service))
            .route("/v1/agent/service/deregister/{id}", put(deregister_service))
            .route("/v1/agent/check/pass/{check}", put(pass_check))
            .route("/v1/health/service/{name}", get(health_service))
            .route("/v1/kv/{*key}", get(read_kv))
            .with_state(consul.clone());

        let listener = TcpListener::bind(addr).await.unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        consul
    }

    pub fn put_kv(&self, key: &str, value: &str) {
        self.kv
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        self.index.fetch_add(1, Ordering::SeqCst);
        self.changed.notify_waiters();
    }

    pub fn service_ids(&self) -> Vec<String> {
        self.services.lock().unwrap().keys().cloned().collect()
    }

    pub fn check_status(&self, id: &str) -> Option<String> {
        self.services
            .lock()
            .unwrap()
            .get(id)
            .map(|(_, status)| status.clone())
    }
}

type Consul = State<Arc<MockConsul>>;

async fn register_service(State(consul): Consul, Json(body): Json<Value>) -> StatusCode {
    let id = body["ID"].as_str().unwrap_or_default().to_string();
    consul
        .services
        .lock()
        .unwrap()
        .insert(id, (body, "critical".to_string()));
    StatusCode::OK
}

async fn deregister_service(State(consul): Consul, Path(id): Path<String>) -> StatusCode {
    match consul.services.lock().unwrap().remove(&id) {
        Some(_) => StatusCode::OK,
        None => StatusCode::NOT_FOUND,
    }
}

async fn pass_check(State(consul): Consul, Path(check): Path<String>) -> StatusCode {
    let id = check.trim_start_matches("service:");
    match consul.services.lock().unwrap().get_mut(id) {
        Some((_, status)) => {
            *status = "passing".to_string();
            StatusCode::OK
        }
        None => StatusCode::NOT_FOUND,
    }
}

async fn health_service(State(consul): Consul, Path(name): Path<String>) -> Json<Value> {
    let services = consul.services.lock().unwrap();
    let entries: Vec<Value> = services
        .values()
        .filter(|(body, _)| body["Name"] == name.as_str())
        .map(|(body, status)| {
            json!({
                "Node": { "Address": "127.0.0.1" },
                "Service": {
                    "ID": body["ID"],
                    "Tags": body["Tags"],
                    "Address": body["Address"],
                    "Port": body["Port"],
                    "Meta": body["Meta"],
                },
                "Checks": [{ "Status": status }],
            })
        })
        .collect();
    Json(Value::Array(entries))
}

async fn read_kv(
    State(consul): Consul,
    Path(key): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if params.contains_key("keys") {
        let keys: Vec<String> = consul
            .kv
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(&key))
            .cloned()
            .collect();
        if keys.is_empty() {
            return StatusCode::NOT_FOUND.into_response();
        }
        return Json(keys).into_response();
    }

    let requested: u64 = params
        .get("index")
        .and_then(|i| i.parse().ok())
        .unwrap_or(0);
    if requested > 0 && requested >= consul.index.load(Ordering::SeqCst) {
        let notified = consul.changed.notified();
        let _ = tokio::time::timeout(Duration::from_millis(500), notified).await;
    }

    let index = consul.index.load(Ordering::SeqCst);
    let mut headers = HeaderMap::new();
    headers.insert("X-Consul-Index", HeaderValue::from(index));
    match consul.kv.lock().unwrap().get(&key).cloned() {
        Some(value) => (StatusCode::OK, headers, value).into_response(),
        None => (StatusCode::NOT_FOUND, headers).into_response(),
    }
}
