#![allow(clippy::unwrap_used)]
// Clock calibration against a mock module server.

use chrono::Utc;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use floorsync_api::{ModuleClient, TransportConfig};
use floorsync_core::{ClockOffset, CoreError, Dashboard, DashboardConfig};

async fn client_for(server: &MockServer) -> ModuleClient {
    let base = Url::parse(&server.uri()).unwrap();
    ModuleClient::new(base, &TransportConfig::default()).unwrap()
}

#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
fn server_secs_behind(ms: i64) -> String {
    format!("{:.3}", (Utc::now().timestamp_millis() - ms) as f64 / 1000.0)
}

#[tokio::test]
async fn test_calibration_measures_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timestamp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(server_secs_behind(60_000)))
        .mount(&server)
        .await;

    let clock = ClockOffset::new();
    let offset = clock.calibrate(&client_for(&server).await).await.unwrap();

    assert!(clock.is_calibrated());
    assert_eq!(clock.offset_ms(), offset);
    assert!((59_000..=61_000).contains(&offset), "offset {offset}");
}

#[tokio::test]
async fn test_failed_calibration_keeps_previous_offset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timestamp"))
        .respond_with(ResponseTemplate::new(200).set_body_string(server_secs_behind(-2_000)))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/timestamp"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not a number"))
        .mount(&server)
        .await;

    let clock = ClockOffset::new();
    let client = client_for(&server).await;
    let first = clock.calibrate(&client).await.unwrap();

    let err = clock.calibrate(&client).await.unwrap_err();
    assert!(matches!(err, CoreError::CalibrationFailed { .. }));
    assert_eq!(clock.offset_ms(), first);
}

#[tokio::test]
async fn test_uncalibrated_after_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/timestamp"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let clock = ClockOffset::new();
    assert!(clock.calibrate(&client_for(&server).await).await.is_err());
    assert!(!clock.is_calibrated());
    assert_eq!(clock.offset_ms(), 0);
}

#[tokio::test]
async fn test_dashboard_commands_hit_module_endpoints() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/module/07/1/relay"))
        .and(wiremock::matchers::body_string("300"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/module/2c/3/dimvalue"))
        .respond_with(ResponseTemplate::new(200).set_body_string("42"))
        .expect(2)
        .mount(&server)
        .await;

    let mut config = DashboardConfig::new(Url::parse(&server.uri()).unwrap());
    config.calibrate_clock = false;
    let dashboard = Dashboard::new(config).unwrap();

    dashboard
        .send_command(0x07, 1, "relay", serde_json::json!(300))
        .await
        .unwrap();
    dashboard.request_state(0x2c, 3, "dimvalue").await.unwrap();
    assert_eq!(
        dashboard.get(0x2c, 3, "dimvalue").await.unwrap(),
        serde_json::json!(42)
    );

    let missing = dashboard.put(0x08, 1, "relay", &serde_json::json!(true)).await;
    assert!(matches!(missing, Err(CoreError::Api { status: Some(404), .. })));
}
