//! Device client and monitor against a fake AxeOS HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use axebar::config::{MonitorConfig, SharedAddress};
use axebar::device::{DeviceAddress, DeviceClient, MetricsSnapshot, PollOutcome, StatusSource};
use axebar::scheduler::{Activity, Monitor, MonitorExit};
use axebar::sink::{Alert, Relaunch, Sinks, StatusUpdate};
use axebar::status::ConnectionState;
use axebar::types::AlertCategory;
use axebar::update::UpdateStatus;

const STATUS_ROUTE: &str = "/api/system/info";

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn serve_status<H, T>(handler: H) -> DeviceAddress
where
    H: axum::handler::Handler<T, ()>,
    T: 'static,
{
    let addr = serve(Router::new().route(STATUS_ROUTE, get(handler))).await;
    DeviceAddress::parse(&addr.to_string()).unwrap()
}

fn client() -> DeviceClient {
    DeviceClient::new(Duration::from_secs(2)).unwrap()
}

fn gamma_status() -> serde_json::Value {
    json!({
        "hashRate": 1399.0,
        "temp": 67.4,
        "vrTemp": 67.0,
        "boardVersion": "601",
        "frequency": 525,
        "coreVoltage": 1150,
        "hostname": "bitaxe",
        "uptimeSeconds": 3600
    })
}

#[tokio::test]
async fn full_status_is_success() {
    let address = serve_status(|| async { Json(gamma_status()) }).await;

    let outcome = client().fetch_status(&address).await;

    let PollOutcome::Success(metrics) = outcome else {
        panic!("expected success, got {outcome:?}");
    };
    assert_eq!(metrics.hashrate, Some(1399.0));
    assert_eq!(metrics.asic_temp_c, Some(67.4));
    assert_eq!(metrics.board_version.as_deref(), Some("601"));
    assert_eq!(metrics.frequency_mhz, Some(525.0));
    assert!(metrics.is_complete());
}

#[tokio::test]
async fn missing_fields_are_partial() {
    let address = serve_status(|| async { Json(json!({ "hashRate": 980.5 })) }).await;

    let outcome = client().fetch_status(&address).await;

    assert_eq!(
        outcome,
        PollOutcome::Success(MetricsSnapshot {
            hashrate: Some(980.5),
            ..Default::default()
        })
    );
    assert!(matches!(
        ConnectionState::from_outcome(outcome),
        ConnectionState::PartialData { .. }
    ));
}

#[tokio::test]
async fn error_status_is_http_error() {
    let address = serve_status(|| async { StatusCode::INTERNAL_SERVER_ERROR }).await;

    assert_eq!(
        client().fetch_status(&address).await,
        PollOutcome::HttpError(500)
    );
}

#[tokio::test]
async fn unknown_path_is_http_error() {
    let addr = serve(Router::new()).await;
    let address = DeviceAddress::parse(&addr.to_string()).unwrap();

    assert_eq!(
        client().fetch_status(&address).await,
        PollOutcome::HttpError(404)
    );
}

#[tokio::test]
async fn non_json_body_is_malformed() {
    let address = serve_status(|| async { (StatusCode::OK, "<html>AxeOS</html>") }).await;

    assert_eq!(client().fetch_status(&address).await, PollOutcome::Malformed);
}

#[tokio::test]
async fn json_array_is_malformed() {
    let address = serve_status(|| async { Json(json!([1, 2, 3])) }).await;

    assert_eq!(client().fetch_status(&address).await, PollOutcome::Malformed);
}

#[tokio::test]
async fn slow_device_times_out() {
    let address = serve_status(|| async {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Json(gamma_status()).into_response()
    })
    .await;
    let client = DeviceClient::new(Duration::from_millis(200)).unwrap();

    assert_eq!(client.fetch_status(&address).await, PollOutcome::Timeout);
}

#[tokio::test]
async fn closed_port_is_network_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    let address = DeviceAddress::parse(&addr.to_string()).unwrap();

    assert_eq!(
        client().fetch_status(&address).await,
        PollOutcome::NetworkError
    );
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("monitor output within 5s")
        .expect("monitor alive")
}

struct NoRelaunch;

impl Relaunch for NoRelaunch {
    fn relaunch(&self) -> axebar::error::Result<()> {
        panic!("no update was installed");
    }
}

#[tokio::test]
async fn monitor_reports_hot_device() {
    let address = serve_status(|| async { Json(gamma_status()) }).await;

    let (update_sink, mut updates) = mpsc::unbounded_channel::<StatusUpdate>();
    let (alert_sink, mut alerts) = mpsc::unbounded_channel::<Alert>();
    let (_activity_tx, activity_rx) = watch::channel(Activity::Foreground);
    let (_update_tx, update_rx) = watch::channel(UpdateStatus::Current);

    let config = MonitorConfig {
        poll_interval: Duration::from_millis(100),
        request_timeout: Duration::from_secs(2),
        ..MonitorConfig::default()
    };
    let monitor = Monitor::new(
        config,
        Arc::new(client()),
        Arc::new(SharedAddress::new(Some(address.host().to_string()))),
        Sinks {
            presentation: Box::new(update_sink),
            alerts: Box::new(alert_sink),
            relauncher: Box::new(NoRelaunch),
        },
        activity_rx,
        update_rx,
    );
    let cancellation = CancellationToken::new();
    let handle = tokio::spawn(monitor.run(cancellation.clone()));

    let first = recv(&mut updates).await;
    assert_eq!(first.state, ConnectionState::Connecting);
    assert_eq!(first.display.status_line, "⛏️ Connecting...");

    let second = recv(&mut updates).await;
    assert_eq!(second.display.status_line, "⛏️ 1.399 TH/s | 🔥 T 67°C | VR 67°C");
    assert_eq!(second.display.detail, "Connected to Bitaxe Gamma");
    assert_eq!(second.history, vec![1399.0]);

    let alert = recv(&mut alerts).await;
    assert_eq!(alert.category, AlertCategory::AsicTemperature);

    // A few more polls: history grows, the cooldown holds the alert back.
    for _ in 0..3 {
        recv(&mut updates).await;
    }
    assert!(alerts.try_recv().is_err());

    cancellation.cancel();
    assert_eq!(handle.await.unwrap().unwrap(), MonitorExit::Cancelled);
}
