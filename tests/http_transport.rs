//! reqwest transport and the full pipeline against a mock HTTP server

mod integration;

use callgate::classify::ErrorKind;
use callgate::settings::{KeyPlacement, Settings};
use callgate::transport::{HttpRequest, HttpTransport, Method, Transport, TransportOptions};
use callgate::{CallRequest, Error};
use integration::mock_server::MockServerFixture;
use mockito::Matcher;

const CHAMPION_PATH: &str = "/lol/platform/v3/champion-rotations";

fn mock_settings() -> Settings {
    let mut settings = Settings::new("RGAPI-mock", "euw");
    settings.cache_store.directory = std::env::temp_dir().join(format!(
        "callgate-http-{}",
        uuid::Uuid::new_v4()
    ));
    settings
}

#[tokio::test]
async fn test_transport_returns_error_statuses_as_responses() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .mock_json(
            CHAMPION_PATH,
            404,
            r#"{"status":{"message":"Data not found","status_code":404}}"#,
            &[("X-App-Rate-Limit", "20:1,100:120")],
        )
        .await;

    let transport = HttpTransport::new(&TransportOptions::default()).unwrap();
    let response = transport
        .send(&HttpRequest {
            method: Method::Get,
            url: format!("{}{}", fixture.base_url, CHAMPION_PATH),
            headers: vec![("X-Riot-Token".to_string(), "RGAPI-mock".to_string())],
            body: None,
        })
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(response.header("X-App-Rate-Limit"), Some("20:1,100:120"));
    assert!(response.headers.contains_key("x-app-rate-limit"));
    assert!(response.body.contains("Data not found"));
    mock.assert_async().await;
}

#[tokio::test]
async fn test_pipeline_sends_key_header_and_vetoes_after_exhaustion() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", CHAMPION_PATH)
        .match_header("X-Riot-Token", "RGAPI-mock")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_header("X-App-Rate-Limit", "20:1,100:120")
        .with_header("X-App-Rate-Limit-Count", "1:1,100:120")
        .with_header("X-Method-Rate-Limit", "30:10")
        .with_header("X-Method-Rate-Limit-Count", "1:10")
        .with_body(r#"{"freeChampionIds":[1,2,3]}"#)
        .expect(1)
        .create_async()
        .await;

    let pipeline = fixture
        .create_pipeline(mock_settings().with_cache_rate_limits(true))
        .unwrap();
    let result = pipeline
        .call(CallRequest::get(CHAMPION_PATH, "1:champion"))
        .await
        .unwrap();
    assert_eq!(result.json().unwrap()["freeChampionIds"][2], 3);

    let vetoed = pipeline
        .call(CallRequest::get(CHAMPION_PATH, "1:champion"))
        .await;
    assert!(matches!(vetoed, Err(Error::RequestAborted { .. })));

    let status = pipeline.current_limits(None, "1:champion").unwrap();
    assert_eq!(status.application.len(), 2);
    assert!(status.estimated_wait_ms.unwrap() <= 120_000);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_pipeline_places_key_in_query_when_configured() {
    let mut fixture = MockServerFixture::new().await;
    let mock = fixture
        .server
        .mock("GET", "/lol/summoner/v4/summoners/by-name/Faker")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("api_key".into(), "RGAPI-mock".into()),
            Matcher::UrlEncoded("locale".into(), "ko_KR".into()),
        ]))
        .with_status(200)
        .with_body(r#"{"name":"Faker"}"#)
        .create_async()
        .await;

    let pipeline = fixture
        .create_pipeline(mock_settings().with_key_placement(KeyPlacement::Query))
        .unwrap();
    let result = pipeline
        .call(
            CallRequest::get("/lol/summoner/v4/summoners/by-name/Faker", "1:summoner")
                .with_query("locale", "ko_KR"),
        )
        .await
        .unwrap();
    assert_eq!(result.json().unwrap()["name"], "Faker");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_pipeline_classifies_failure_statuses() {
    let mut fixture = MockServerFixture::new().await;
    fixture
        .mock_json(
            "/lol/match/v5/matches/EUW1_1",
            429,
            r#"{"status":{"message":"Rate limit exceeded","status_code":429}}"#,
            &[("Retry-After", "7")],
        )
        .await;
    fixture
        .mock_json("/lol/match/v5/matches/EUW1_2", 503, "", &[])
        .await;

    let pipeline = fixture.create_pipeline(mock_settings()).unwrap();

    let limited = pipeline
        .call(CallRequest::get("/lol/match/v5/matches/EUW1_1", "5:match"))
        .await
        .unwrap_err();
    assert_eq!(limited.kind(), Some(ErrorKind::RateLimited));
    assert_eq!(limited.status(), Some(429));
    assert!(limited.to_string().contains("Rate limit exceeded"));

    let unavailable = pipeline
        .call(CallRequest::get("/lol/match/v5/matches/EUW1_2", "5:match"))
        .await
        .unwrap_err();
    assert_eq!(unavailable.kind(), Some(ErrorKind::ServerError));
    assert!(unavailable.kind().unwrap().retryable());
}

#[tokio::test]
async fn test_pipeline_surfaces_deprecation_header() {
    let mut fixture = MockServerFixture::new().await;
    fixture
        .mock_json(
            "/lol/summoner/v3/summoners/1",
            200,
            r#"{"id":1}"#,
            &[("X-Riot-Deprecated", "1546300800")],
        )
        .await;

    let pipeline = fixture.create_pipeline(mock_settings()).unwrap();
    let result = pipeline
        .call(CallRequest::get("/lol/summoner/v3/summoners/1", "1:summoner"))
        .await
        .unwrap();
    assert_eq!(result.deprecation.as_deref(), Some("1546300800"));
}

#[tokio::test]
async fn test_unreachable_server_is_transport_failure() {
    let pipeline = callgate::CallPipeline::builder(mock_settings())
        .base_url_override("http://127.0.0.1:9")
        .build()
        .unwrap();
    let err = pipeline
        .call(CallRequest::get(CHAMPION_PATH, "1:champion"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::TransportFailure));
}
