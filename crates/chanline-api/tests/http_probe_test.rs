//! Integration tests for `HttpProber` and `HttpRouteChecker` against a
//! local mock server.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use chanline_api::{
    Error, HttpProber, HttpProberConfig, HttpRouteChecker, NetworkProber, ProxyEndpoint,
    ProxyScheme, RouteChecker, TransportConfig,
};
use secrecy::SecretString;
use url::Url;
use wiremock::matchers::{any, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> MockServer {
    MockServer::start().await
}

fn prober_for(server: &MockServer, ping_count: u32) -> HttpProber {
    HttpProber::new(HttpProberConfig {
        latency_url: Url::parse(&format!("{}/ping", server.uri())).unwrap(),
        download_url: Url::parse(&format!("{}/blob", server.uri())).unwrap(),
        ping_count,
        max_download_bytes: 32 * 1024,
        transport: TransportConfig::default(),
    })
    .unwrap()
}

fn proxy_at(server: &MockServer) -> ProxyEndpoint {
    ProxyEndpoint {
        scheme: ProxyScheme::Http,
        host: server.address().ip().to_string(),
        port: server.address().port(),
        username: Some("viewer".into()),
        password: Some(SecretString::from("hunter2")),
    }
}

fn checker() -> HttpRouteChecker {
    HttpRouteChecker::new(
        Url::parse("http://probe.chanline.test/generate_204").unwrap(),
        Duration::from_secs(5),
    )
}

// ── Prober ──────────────────────────────────────────────────────────

#[tokio::test]
async fn measures_a_healthy_link() {
    let server = setup().await;
    Mock::given(method("HEAD"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 64 * 1024]))
        .mount(&server)
        .await;

    let m = prober_for(&server, 4).measure().await.unwrap();

    assert!(m.bandwidth_mbps > 0.0);
    assert!(m.latency_ms >= 0.0);
    assert!(m.packet_loss.abs() < f64::EPSILON);
}

#[tokio::test]
async fn failed_pings_count_as_loss() {
    let server = setup().await;
    Mock::given(method("HEAD"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/ping"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/blob"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8; 1024]))
        .mount(&server)
        .await;

    let m = prober_for(&server, 4).measure().await.unwrap();

    assert!((m.packet_loss - 0.25).abs() < f64::EPSILON);
}

#[tokio::test]
async fn all_pings_lost_is_unreachable() {
    let server = setup().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let result = prober_for(&server, 3).measure().await;

    assert!(matches!(result, Err(Error::Unreachable(_))));
}

// ── Route checker ───────────────────────────────────────────────────

#[tokio::test]
async fn proxy_answering_407_is_auth_failure() {
    let server = setup().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(407))
        .mount(&server)
        .await;

    let result = checker().check(&proxy_at(&server)).await;

    assert!(matches!(result, Err(Error::ProxyAuthRequired)));
}

#[tokio::test]
async fn proxy_forwarding_the_probe_is_accepted() {
    let server = setup().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    checker().check(&proxy_at(&server)).await.unwrap();
}

#[tokio::test]
async fn proxy_gateway_error_is_rejected() {
    let server = setup().await;
    Mock::given(any())
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let result = checker().check(&proxy_at(&server)).await;

    assert!(matches!(result, Err(Error::ProxyRejected { status: 502 })));
}

#[tokio::test]
async fn closed_proxy_port_is_connect_failure() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let proxy = ProxyEndpoint {
        scheme: ProxyScheme::Http,
        host: "127.0.0.1".into(),
        port,
        username: None,
        password: None,
    };
    let result = checker().check(&proxy).await;

    assert!(matches!(result, Err(Error::ProxyConnect(_))), "{result:?}");
}
