//! Navio client tests using wiremock.

use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use zonesync_core::{Geofence, LngLat};
use zonesync_navio::{NavioClient, NavioConfig, NavioError};

fn zone_body() -> serde_json::Value {
    serde_json::json!({
        "zones": [
            {
                "id": "nav-1",
                "name": "Oslo Sentrum",
                "display_name": "Sentrum",
                "is_active": true,
                "geofence": {
                    "type": "Polygon",
                    "coordinates": [[[59.91, 10.75], [59.92, 10.76], [59.91, 10.77], [59.91, 10.75]]]
                },
                "postal_codes": ["0150", "0151"],
                "city": "Oslo",
                "country_code": "NO"
            },
            {
                "id": "nav-2",
                "name": "BG-4711",
                "is_active": false,
                "city": "Bergen"
            }
        ]
    })
}

async fn client_for(server: &MockServer) -> NavioClient {
    NavioClient::new(NavioConfig::new(server.uri(), "test-key")).unwrap()
}

#[tokio::test]
async fn fetch_zones_parses_and_swaps_ordinates() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/delivery-zones"))
        .and(header("X-Api-Key", "test-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(zone_body()))
        .expect(1)
        .mount(&server)
        .await;

    let zones = client_for(&server).await.fetch_zones().await.unwrap();

    assert_eq!(zones.len(), 2);
    assert_eq!(zones[0].id.as_str(), "nav-1");
    assert_eq!(zones[0].city_hint.as_deref(), Some("Oslo"));
    let expected = Geofence::<LngLat>::polygon(vec![vec![
        [10.75, 59.91],
        [10.76, 59.92],
        [10.77, 59.91],
        [10.75, 59.91],
    ]]);
    assert_eq!(zones[0].geofence, Some(expected));
    assert!(!zones[1].is_active);
    assert!(zones[1].geofence.is_none());
}

#[tokio::test]
async fn server_errors_are_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/delivery-zones"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = client_for(&server).await.fetch_zones().await.unwrap_err();
    assert!(matches!(err, NavioError::Server { status: 503 }));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn rate_limit_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/delivery-zones"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.fetch_zones().await.unwrap_err();
    match err {
        NavioError::RateLimited { retry_after_secs } => assert_eq!(retry_after_secs, Some(7)),
        other => panic!("expected rate limit error, got {other:?}"),
    }
}

#[tokio::test]
async fn client_errors_are_not_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/delivery-zones"))
        .respond_with(ResponseTemplate::new(403).set_body_string("no access"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.fetch_zones().await.unwrap_err();
    match &err {
        NavioError::Rejected { status, body } => {
            assert_eq!(*status, 403);
            assert_eq!(body, "no access");
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/delivery-zones"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let err = client_for(&server).await.fetch_zones().await.unwrap_err();
    assert!(matches!(err, NavioError::Decode(_)));
}
