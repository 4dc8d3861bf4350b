use super::*;
use crate::classify::ErrorKind;
use crate::fixtures::MemoryFixtureStore;
use crate::registry::FnExtensionFactory;
use crate::settings::CallTtl;
use crate::transport::{HttpRequest, TransportError};
use async_trait::async_trait;
use serde_json::json;
use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Answers every request with the same response and counts sends.
struct ScriptedTransport {
    response: RawResponse,
    sent: Arc<Mutex<Vec<HttpRequest>>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> std::result::Result<RawResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());
        Ok(self.response.clone())
    }
}

struct ScriptedFactory {
    response: RawResponse,
    sent: Arc<Mutex<Vec<HttpRequest>>>,
}

impl ScriptedFactory {
    fn new(response: RawResponse) -> Arc<Self> {
        Arc::new(Self {
            response,
            sent: Arc::new(Mutex::new(Vec::new())),
        })
    }
    fn sent(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl TransportFactory for ScriptedFactory {
    fn create(&self) -> Result<Arc<dyn Transport>> {
        Ok(Arc::new(ScriptedTransport {
            response: self.response.clone(),
            sent: self.sent.clone(),
        }))
    }
}

fn settings() -> Settings {
    Settings::new("RGAPI-test", "eune").with_store_kind("memory")
}

fn ok_response() -> RawResponse {
    RawResponse::new(200, r#"{"id":"platform"}"#)
        .with_header("X-App-Rate-Limit", "1:1")
        .with_header("X-App-Rate-Limit-Count", "1:1")
}

fn status_request() -> CallRequest {
    CallRequest::get("/lol/status/v4/platform-data", "3:status")
}

#[tokio::test]
async fn test_exhausted_limit_aborts_before_network() {
    let factory = ScriptedFactory::new(ok_response());
    let pipeline = CallPipeline::builder(settings().with_cache_rate_limits(true))
        .transport_factory(factory.clone())
        .build()
        .unwrap();

    let first = pipeline.call(status_request()).await.unwrap();
    assert_eq!(first.source, ResponseSource::Network);

    let second = pipeline.call(status_request()).await.unwrap_err();
    assert_eq!(second.kind(), Some(ErrorKind::RequestAborted));
    assert_eq!(factory.sent(), 1);

    let status = pipeline.current_limits(None, "3:status").unwrap();
    assert!(status.is_blocked());
}

#[tokio::test]
async fn test_user_before_hook_veto() {
    let factory = ScriptedFactory::new(ok_response());
    let pipeline = CallPipeline::builder(settings())
        .transport_factory(factory.clone())
        .before_hook(Arc::new(FnBeforeHook::new("deny_match", |ctx: &CallContext| {
            if ctx.resource.ends_with(":match") {
                HookDecision::Abort("match calls are disabled".into())
            } else {
                HookDecision::Proceed
            }
        })))
        .build()
        .unwrap();

    let err = pipeline
        .call(CallRequest::get("/lol/match/v5/matches/x", "2:match"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::RequestAborted { ref reason } if reason == "match calls are disabled"));
    assert_eq!(factory.sent(), 0);

    pipeline.call(status_request()).await.unwrap();
    assert_eq!(factory.sent(), 1);
}

#[tokio::test]
async fn test_cached_call_skips_network() {
    let factory = ScriptedFactory::new(ok_response());
    let pipeline = CallPipeline::builder(settings().with_cache_calls(CallTtl::Uniform(60)))
        .transport_factory(factory.clone())
        .build()
        .unwrap();

    let first = pipeline.call(status_request()).await.unwrap();
    let second = pipeline.call(status_request()).await.unwrap();

    assert_eq!(factory.sent(), 1);
    assert_eq!(second.source, ResponseSource::Cache);
    assert_eq!(second.status, 200);
    assert!(second.headers.is_empty());
    assert_eq!(second.raw_body, first.raw_body);

    // different query, different fingerprint
    pipeline
        .call(status_request().with_query("locale", "en_US"))
        .await
        .unwrap();
    assert_eq!(factory.sent(), 2);
}

#[tokio::test]
async fn test_resource_without_ttl_is_not_cached() {
    let factory = ScriptedFactory::new(ok_response());
    let ttl = CallTtl::PerResource(std::collections::HashMap::from([(
        "1:summoner".to_string(),
        Some(60),
    )]));
    let pipeline = CallPipeline::builder(settings().with_cache_calls(ttl))
        .transport_factory(factory.clone())
        .build()
        .unwrap();

    pipeline.call(status_request()).await.unwrap();
    pipeline.call(status_request()).await.unwrap();
    assert_eq!(factory.sent(), 2);
}

#[tokio::test]
async fn test_after_hooks_run_on_failure() {
    let factory = ScriptedFactory::new(
        RawResponse::new(404, r#"{"status":{"message":"Data not found","status_code":404}}"#)
            .with_header("X-App-Rate-Limit", "20:1")
            .with_header("X-App-Rate-Limit-Count", "3:1"),
    );
    let seen = Arc::new(AtomicUsize::new(0));
    let counter = seen.clone();
    let pipeline = CallPipeline::builder(settings().with_cache_rate_limits(true))
        .transport_factory(factory)
        .after_hook(Arc::new(FnAfterHook::new(
            "count",
            move |_: &CallContext, response: &RawResponse| {
                assert_eq!(response.status, 404);
                counter.fetch_add(1, Ordering::SeqCst);
            },
        )))
        .build()
        .unwrap();

    let err = pipeline.call(status_request()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    assert_eq!(err.status(), Some(404));
    assert!(err.to_string().contains("Data not found"));
    assert_eq!(seen.load(Ordering::SeqCst), 1);

    // limits were still synchronized from the failed response
    let status = pipeline.current_limits(None, "3:status").unwrap();
    assert_eq!(status.application[0].observed_count, 3);
}

#[tokio::test]
async fn test_failures_are_not_cached() {
    let factory = ScriptedFactory::new(RawResponse::new(503, "{}"));
    let pipeline = CallPipeline::builder(settings().with_cache_calls(CallTtl::Uniform(60)))
        .transport_factory(factory.clone())
        .build()
        .unwrap();

    for _ in 0..2 {
        let err = pipeline.call(status_request()).await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::ServerError));
    }
    assert_eq!(factory.sent(), 2);
}

#[tokio::test]
async fn test_fixture_replay_and_missing() {
    let factory = ScriptedFactory::new(ok_response());
    let fixtures = Arc::new(MemoryFixtureStore::new().with_fixture(
        "GET_lol-status-v4-platform-data",
        Fixture {
            headers: BTreeMap::new(),
            body: r#"{"id":"recorded"}"#.to_string(),
            code: 200,
        },
    ));
    let pipeline = CallPipeline::builder(settings().with_fixtures(true, false))
        .transport_factory(factory.clone())
        .fixture_store(fixtures)
        .build()
        .unwrap();

    let replayed = pipeline.call(status_request()).await.unwrap();
    assert_eq!(replayed.source, ResponseSource::Fixture);
    assert_eq!(replayed.json().unwrap()["id"], "recorded");

    let err = pipeline
        .call(CallRequest::get("/lol/status/v4/shard-data", "3:status"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FixtureMissing { ref signature } if signature == "GET_lol-status-v4-shard-data"));
    assert_eq!(factory.sent(), 0);
}

#[tokio::test]
async fn test_fixture_recording_falls_through_to_network() {
    let factory = ScriptedFactory::new(ok_response());
    let fixtures = Arc::new(MemoryFixtureStore::new());
    let pipeline = CallPipeline::builder(settings().with_fixtures(true, true))
        .transport_factory(factory.clone())
        .fixture_store(fixtures.clone())
        .build()
        .unwrap();

    let first = pipeline.call(status_request()).await.unwrap();
    assert_eq!(first.source, ResponseSource::Network);
    assert_eq!(fixtures.len(), 1);

    let second = pipeline.call(status_request()).await.unwrap();
    assert_eq!(second.source, ResponseSource::Fixture);
    assert_eq!(factory.sent(), 1);
}

/// Fixture store whose writes always fail.
struct ReadOnlyFixtures;

impl FixtureStore for ReadOnlyFixtures {
    fn load(&self, _signature: &str) -> Result<Option<Fixture>> {
        Ok(None)
    }
    fn save(&self, _signature: &str, _fixture: &Fixture) -> Result<()> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "read-only fixture directory",
        )))
    }
}

#[tokio::test]
async fn test_failed_fixture_write_still_commits_limits() {
    let factory = ScriptedFactory::new(ok_response());
    let pipeline = CallPipeline::builder(
        settings()
            .with_cache_rate_limits(true)
            .with_fixtures(false, true),
    )
    .transport_factory(factory)
    .fixture_store(Arc::new(ReadOnlyFixtures))
    .build()
    .unwrap();

    let result = pipeline.call(status_request()).await.unwrap();
    assert_eq!(result.source, ResponseSource::Network);

    let persisted = pipeline.cache_manager().unwrap().load_rate_limits().unwrap();
    assert!(!persisted.is_empty());
    assert!(pipeline.current_limits(None, "3:status").unwrap().is_blocked());
}

#[tokio::test]
async fn test_replayed_fixture_with_canonical_header_names_feeds_limits() {
    let factory = ScriptedFactory::new(ok_response());
    let fixtures = Arc::new(MemoryFixtureStore::new().with_fixture(
        "GET_lol-status-v4-platform-data",
        Fixture {
            headers: BTreeMap::from([
                ("X-App-Rate-Limit".to_string(), "1:1".to_string()),
                ("X-App-Rate-Limit-Count".to_string(), "1:1".to_string()),
            ]),
            body: "{}".to_string(),
            code: 200,
        },
    ));
    let pipeline = CallPipeline::builder(
        settings()
            .with_cache_rate_limits(true)
            .with_fixtures(true, false),
    )
    .transport_factory(factory.clone())
    .fixture_store(fixtures)
    .build()
    .unwrap();

    let replayed = pipeline.call(status_request()).await.unwrap();
    assert_eq!(replayed.header("x-app-rate-limit"), Some("1:1"));
    let status = pipeline.current_limits(None, "3:status").unwrap();
    assert_eq!(status.application.len(), 1);
    assert_eq!(factory.sent(), 0);
}

#[tokio::test]
async fn test_expired_entries_are_purged_before_commit() {
    let factory = ScriptedFactory::new(ok_response());
    let pipeline = CallPipeline::builder(settings().with_cache_calls(CallTtl::Uniform(60)))
        .transport_factory(factory)
        .build()
        .unwrap();
    pipeline
        .controls()
        .unwrap()
        .calls
        .save_call_data_at("stale-fingerprint", "{}", 1, 0.0);

    pipeline.call(status_request()).await.unwrap();

    assert_eq!(pipeline.controls().unwrap().calls.len(), 1);
    let persisted = pipeline.cache_manager().unwrap().load_call_cache().unwrap();
    assert_eq!(persisted.len(), 1);
    assert!(!persisted.is_call_cached("stale-fingerprint"));
}

#[tokio::test]
async fn test_deprecation_is_reported_not_fatal() {
    let factory = ScriptedFactory::new(ok_response().with_header("X-Riot-Deprecated", "1700000000"));
    let pipeline = CallPipeline::builder(settings())
        .transport_factory(factory)
        .build()
        .unwrap();

    let result = pipeline.call(status_request()).await.unwrap();
    assert_eq!(result.deprecation.as_deref(), Some("1700000000"));
}

#[tokio::test]
async fn test_region_overrides_nest() {
    let factory = ScriptedFactory::new(RawResponse::new(200, "{}"));
    let pipeline = CallPipeline::builder(settings())
        .transport_factory(factory.clone())
        .build()
        .unwrap();

    pipeline.push_temporary_region("kr").unwrap();
    pipeline.push_temporary_region("na").unwrap();
    assert_eq!(pipeline.active_region().unwrap(), "na");
    assert_eq!(pipeline.pop_temporary_region().unwrap().as_deref(), Some("na"));
    assert_eq!(pipeline.active_region().unwrap(), "kr");
    pipeline.pop_temporary_region().unwrap();
    assert_eq!(pipeline.active_region().unwrap(), "eune");
    assert_eq!(pipeline.pop_temporary_region().unwrap(), None);

    pipeline.with_continent_region().unwrap();
    let result = pipeline.call(status_request()).await.unwrap();
    assert_eq!(result.region, "europe");
    pipeline.pop_temporary_region().unwrap();

    // a per-call region leaves the shared state alone
    let result = pipeline.call(status_request().in_region("jp")).await.unwrap();
    assert_eq!(result.region, "jp");
    assert_eq!(pipeline.active_region().unwrap(), "eune");

    let urls: Vec<String> = factory.sent.lock().unwrap().iter().map(|r| r.url.clone()).collect();
    assert!(urls[0].starts_with("https://europe.api.riotgames.com/"));
    assert!(urls[1].starts_with("https://jp1.api.riotgames.com/"));

    assert!(pipeline.push_temporary_region("atlantis").is_err());
}

#[tokio::test]
async fn test_clear_cache() {
    let factory = ScriptedFactory::new(ok_response());
    let pipeline = CallPipeline::builder(
        settings()
            .with_cache_rate_limits(true)
            .with_cache_calls(CallTtl::Uniform(60)),
    )
    .transport_factory(factory.clone())
    .build()
    .unwrap();

    pipeline.call(status_request()).await.unwrap();
    assert!(pipeline.clear_cache().unwrap());
    assert!(!pipeline.current_limits(None, "3:status").unwrap().is_blocked());

    let again = pipeline.call(status_request()).await.unwrap();
    assert_eq!(again.source, ResponseSource::Network);
    assert_eq!(factory.sent(), 2);
}

struct Platform(String);

impl Extension for Platform {
    fn capabilities(&self) -> &[&'static str] {
        &["platform_id"]
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[tokio::test]
async fn test_extension_for_result() {
    let pipeline = CallPipeline::builder(settings())
        .transport_factory(ScriptedFactory::new(ok_response()))
        .extension(
            "platform",
            Arc::new(FnExtensionFactory(|data: &serde_json::Value| {
                Ok(Box::new(Platform(data["id"].as_str().unwrap_or_default().to_string()))
                    as Box<dyn Extension>)
            })),
        )
        .unwrap()
        .build()
        .unwrap();

    let result = pipeline.call(status_request()).await.unwrap();
    let ext = pipeline.extension_for("platform", &result).unwrap().unwrap();
    assert_eq!(
        ext.as_any().downcast_ref::<Platform>().map(|p| p.0.as_str()),
        Some("platform")
    );
    assert!(pipeline.extension_for("champion", &result).unwrap().is_none());
}

#[test]
fn test_build_rejects_invalid_settings() {
    let result = CallPipeline::builder(Settings::new("", "eune"))
        .transport_factory(ScriptedFactory::new(ok_response()))
        .build();
    assert!(matches!(result, Err(Error::Configuration { .. })));
}

#[test]
fn test_call_result_json_helpers() {
    let result = CallResult {
        call_id: Uuid::new_v4(),
        status: 200,
        headers: BTreeMap::from([("x-app-rate-limit".to_string(), "20:1".to_string())]),
        raw_body: json!({"name": "status"}).to_string(),
        source: ResponseSource::Network,
        region: "eune".to_string(),
        deprecation: None,
    };
    assert_eq!(result.header("X-App-Rate-Limit"), Some("20:1"));
    let parsed: std::collections::HashMap<String, String> = result.json_as().unwrap();
    assert_eq!(parsed["name"], "status");
}
