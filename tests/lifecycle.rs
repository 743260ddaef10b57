//! Registration, discovery and shutdown across the whole service.

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use discovery_gateway::config::GatewayConfig;
use discovery_gateway::discovery::{
    AccessType, DiscoveryClient, DiscoveryError, DiscoveryQuery, MemoryRegistry, RegistryBackend,
    ServiceIdentity,
};
use discovery_gateway::lifecycle::{
    assemble, Components, LifecycleManager, LifecycleState, Shutdown, StartupError,
    EXIT_ON_SIGNAL,
};
use discovery_gateway::load_balancer::RoundRobin;

mod common;

fn discovery(registry: Arc<dyn RegistryBackend>) -> Arc<DiscoveryClient> {
    Arc::new(DiscoveryClient::new(
        registry,
        Box::new(RoundRobin::new()),
        Duration::from_secs(1),
        Duration::from_secs(10),
    ))
}

#[tokio::test]
async fn test_register_then_discover_direct() {
    let registry = Arc::new(MemoryRegistry::new());
    let client = discovery(registry.clone());
    let manager = LifecycleManager::new(client.clone(), Shutdown::new(), Duration::from_secs(1));

    manager
        .register(
            ServiceIdentity::new("svc", "1.0.0", "dev"),
            "10.0.0.5:9000",
            HashMap::new(),
            Duration::from_secs(30),
        )
        .await
        .unwrap();
    assert_eq!(manager.state(), LifecycleState::Registered);

    let query = DiscoveryQuery::parse("svc", "1.0.0", "dev", AccessType::Direct).unwrap();
    assert_eq!(client.discover(&query).await.unwrap(), "10.0.0.5:9000");

    let unknown = DiscoveryQuery::parse("nope", "1.0.0", "dev", AccessType::Direct).unwrap();
    let err = client.discover(&unknown).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::NotFound { .. }));

    let other_env = DiscoveryQuery::parse("svc", "1.0.0", "prod", AccessType::Direct).unwrap();
    assert!(client.discover(&other_env).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_zero_healthy_instances_is_not_found() {
    let registry = Arc::new(MemoryRegistry::new());
    let handle = common::register_instance(registry.as_ref(), "svc", "1.0.0", "dev", "10.0.0.5:9000").await;
    registry.set_passing(handle.id(), false);

    let client = discovery(registry);
    let query = DiscoveryQuery::parse("svc", "1.0.0", "dev", AccessType::Direct).unwrap();
    assert!(client.discover(&query).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_repeated_termination_deregisters_once() {
    let registry = Arc::new(common::CountingRegistry::new());
    let shutdown = Shutdown::new();
    let manager = Arc::new(LifecycleManager::new(
        discovery(registry.clone()),
        shutdown.clone(),
        Duration::from_millis(100),
    ));
    manager
        .register(
            ServiceIdentity::new("svc", "1.0.0", "dev"),
            "10.0.0.5:9000",
            HashMap::new(),
            Duration::from_secs(30),
        )
        .await
        .unwrap();
    let instance_id = manager.instance_id().await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..5 {
        let manager = manager.clone();
        tasks.push(tokio::spawn(async move { manager.begin_drain().await }));
    }
    let mut winners = 0;
    for task in tasks {
        if task.await.unwrap() {
            winners += 1;
        }
    }
    assert!(!manager.begin_drain().await);

    assert_eq!(winners, 1);
    assert_eq!(registry.deregisters.load(Ordering::SeqCst), 1);
    assert_eq!(*registry.deregistered_ids.lock().unwrap(), vec![instance_id]);
    assert!(registry.inner.is_empty());
    assert!(shutdown.is_triggered());

    manager.drain().await;
    assert_eq!(manager.finish(), EXIT_ON_SIGNAL);
    assert_eq!(manager.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn test_registration_failure_is_fatal() {
    let registry = Arc::new(MemoryRegistry::new());
    registry.set_available(false);
    let manager = LifecycleManager::new(discovery(registry), Shutdown::new(), Duration::from_secs(1));

    let result = manager
        .register(
            ServiceIdentity::new("svc", "1.0.0", "dev"),
            "10.0.0.5:9000",
            HashMap::new(),
            Duration::from_secs(30),
        )
        .await;
    assert!(result.is_err());
    assert_eq!(manager.state(), LifecycleState::Starting);
    assert!(manager.instance_id().await.is_none());
}

#[tokio::test]
async fn test_defaults_when_keys_absent() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.toml");
    std::fs::write(&path, "[service]\nname = \"customers-service\"\n").unwrap();

    let components = assemble(
        GatewayConfig::default(),
        &path,
        false,
        Arc::new(MemoryRegistry::new()),
        Shutdown::new(),
    )
    .await
    .unwrap();

    assert_eq!(components.port, 9000);
    let client = &components.state.config_client;
    assert!(client.get("rest-config.string-property").await.is_none());
    assert!(!components.state.rest_config.maintenance.get());
    assert_eq!(components.state.rest_config.string_property.get(), "");
}

#[tokio::test]
async fn test_drain_stops_server_and_leaves_registry() {
    let registry = Arc::new(common::CountingRegistry::new());
    let gateway = common::start_gateway(28501, GatewayConfig::default(), "", registry.clone()).await;
    let client = common::http_client();

    let res = client.get(gateway.url("/health")).send().await.unwrap();
    assert_eq!(res.status(), 200);

    let query = DiscoveryQuery::parse("customers-service", "1.0.0", "dev", AccessType::Direct).unwrap();
    let lookup = discovery(registry.clone());
    assert_eq!(lookup.discover(&query).await.unwrap(), gateway.addr.to_string());

    assert!(gateway.state.lifecycle.begin_drain().await);
    assert_eq!(gateway.state.lifecycle.state(), LifecycleState::Draining);
    lookup.invalidate(&query);
    assert!(lookup.discover(&query).await.unwrap_err().is_not_found());

    let stopped = common::eventually(|| {
        let client = client.clone();
        let url = gateway.url("/health");
        async move { client.get(url).send().await.is_err() }
    })
    .await;
    assert!(stopped, "listener still accepting after drain");
    assert_eq!(registry.deregisters.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_half_sent_request_does_not_outlive_drain_timeout() {
    let registry = Arc::new(common::CountingRegistry::new());
    let gateway = common::start_gateway(28502, GatewayConfig::default(), "", registry.clone()).await;
    assert_eq!(gateway.state.lifecycle.drain_timeout(), Duration::from_secs(1));

    // Headers never terminated, so the request never reaches a handler.
    let mut stalled = TcpStream::connect(gateway.addr).await.unwrap();
    stalled
        .write_all(b"GET /v1/customers HTTP/1.1\r\nHost: x\r\n")
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    assert!(gateway.state.lifecycle.begin_drain().await);
    let stopped = tokio::time::timeout(Duration::from_secs(4), gateway.server).await;
    assert!(stopped.is_ok(), "server kept waiting on a stalled connection");
    assert!(started.elapsed() < Duration::from_secs(3));

    gateway.state.lifecycle.drain().await;
    assert_eq!(gateway.state.lifecycle.finish(), EXIT_ON_SIGNAL);
    assert_eq!(gateway.state.lifecycle.state(), LifecycleState::Stopped);
    assert_eq!(registry.deregisters.load(Ordering::SeqCst), 1);
    drop(stalled);
}

async fn components_on_port(
    port: u16,
    admin_bind: Option<String>,
    registry: Arc<dyn RegistryBackend>,
) -> (Components, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gateway.toml");
    std::fs::write(&path, format!("[server.http]\nport = {}\n", port)).unwrap();

    let mut config = GatewayConfig::default();
    config.service.bind_host = "127.0.0.1".to_string();
    if let Some(bind) = admin_bind {
        config.admin.enabled = true;
        config.admin.bind_address = bind;
    }
    let components = assemble(config, &path, false, registry, Shutdown::new())
        .await
        .unwrap();
    (components, dir)
}

#[tokio::test]
async fn test_bind_failure_registers_nothing() {
    let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let taken_addr = taken.local_addr().unwrap();

    // Service port in use.
    let registry = Arc::new(common::CountingRegistry::new());
    let (components, _dir) = components_on_port(taken_addr.port(), None, registry.clone()).await;
    let err = components.start().await.unwrap_err();
    assert!(matches!(err, StartupError::Bind(_)), "{}", err);
    assert_eq!(registry.registers.load(Ordering::SeqCst), 0);
    assert_eq!(components.state.lifecycle.state(), LifecycleState::Starting);

    // Service port free, admin address in use.
    let registry = Arc::new(common::CountingRegistry::new());
    let (components, _dir) =
        components_on_port(0, Some(taken_addr.to_string()), registry.clone()).await;
    let err = components.start().await.unwrap_err();
    assert!(matches!(err, StartupError::Bind(_)), "{}", err);
    assert_eq!(registry.registers.load(Ordering::SeqCst), 0);
    assert!(registry.inner.is_empty());
    assert!(components.state.lifecycle.instance_id().await.is_none());
}
