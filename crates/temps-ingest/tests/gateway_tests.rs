use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use temps_core::Job;
use temps_ingest::context::{TAG_AGENT, TAG_PROJECT, TAG_PROTOCOL};
use temps_ingest::{
    CredentialResolver, CredentialStore, CredentialStoreError, GatewayConfig, IngestError,
    IngestRequest, IngestionGateway, InsertOptions, ProjectCredential, RequestParts,
    StaticCredentialStore,
};
use temps_payload_cache::{Attachment, CacheError, InMemoryPayloadCache, PayloadCache};
use temps_queue::BroadcastQueueService;
use tokio::sync::broadcast;

const AUTH: &str = "sentry sentry_key=abc123, sentry_version=7, sentry_client=myagent/1.0";
const EVENT_ID: &str = "fc6d8c0c43fc4630ad850f6d4e0e9b4a";

struct CountingStore {
    inner: StaticCredentialStore,
    lookups: AtomicUsize,
}

impl CountingStore {
    fn new(credentials: Vec<ProjectCredential>) -> Self {
        Self {
            inner: StaticCredentialStore::new(credentials),
            lookups: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl CredentialStore for CountingStore {
    async fn get_credential(
        &self,
        public_key: &str,
    ) -> Result<Option<ProjectCredential>, CredentialStoreError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.inner.get_credential(public_key).await
    }
}

/// Cache whose backing store is unreachable
struct UnreachableCache;

#[async_trait]
impl PayloadCache for UnreachableCache {
    async fn put(&self, _key: &str, _value: &Value, _ttl: Duration) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn put_attachments(
        &self,
        _key: &str,
        _attachments: &[Attachment],
        _ttl: Duration,
    ) -> Result<(), CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }

    async fn get_attachments(&self, _key: &str) -> Result<Option<Vec<Attachment>>, CacheError> {
        Err(CacheError::Unavailable("connection refused".to_string()))
    }
}

struct Harness {
    gateway: IngestionGateway,
    store: Arc<CountingStore>,
    cache: Arc<InMemoryPayloadCache>,
    jobs: broadcast::Receiver<Job>,
}

impl Harness {
    fn new(credential: ProjectCredential) -> Self {
        let store = Arc::new(CountingStore::new(vec![credential]));
        let cache = Arc::new(InMemoryPayloadCache::new());
        let (queue, jobs) = BroadcastQueueService::create_job_queue_arc_with_receiver(16);
        let gateway = IngestionGateway::new(
            CredentialResolver::new(store.clone()),
            cache.clone(),
            queue,
            GatewayConfig::default(),
        );
        Self {
            gateway,
            store,
            cache,
            jobs,
        }
    }

    fn lookups(&self) -> usize {
        self.store.lookups.load(Ordering::SeqCst)
    }
}

fn active_key() -> ProjectCredential {
    ProjectCredential::new("abc123", 42)
}

fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for (name, value) in pairs {
        map.append(
            HeaderName::from_static(*name),
            HeaderValue::from_str(value).unwrap(),
        );
    }
    map
}

fn header_request(auth: &str, body: Value) -> IngestRequest {
    let parts = RequestParts::new(headers(&[("x-sentry-auth", auth)]), Vec::new());
    IngestRequest::new(parts, serde_json::to_vec(&body).unwrap())
}

fn event() -> Value {
    json!({"event_id": EVENT_ID, "message": "boom", "level": "error"})
}

#[tokio::test]
async fn test_scenario_a_admits_and_enqueues() {
    let mut harness = Harness::new(active_key());

    let admission = harness
        .gateway
        .admit(header_request(AUTH, event()))
        .await
        .unwrap();

    assert_eq!(admission.event_id, EVENT_ID);
    assert_eq!(admission.cache_key, format!("e:{}:42", EVENT_ID));

    let cached = harness
        .cache
        .get(&admission.cache_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached["message"], "boom");
    assert_eq!(cached["project"], 42);

    let job = harness.jobs.try_recv().unwrap();
    assert!(matches!(job, Job::PreprocessEvent(_)));
    assert_eq!(job.task().cache_key, admission.cache_key);
    assert_eq!(job.task().event_id, EVENT_ID);

    // No attachments were submitted
    assert!(harness
        .cache
        .get_attachments(&admission.cache_key)
        .await
        .unwrap()
        .is_none());

    let tags = &admission.context.tags;
    assert_eq!(tags.get(TAG_PROJECT).map(String::as_str), Some("42"));
    assert_eq!(tags.get(TAG_AGENT).map(String::as_str), Some("myagent/1.0"));
    assert_eq!(tags.get(TAG_PROTOCOL).map(String::as_str), Some("7"));
}

#[tokio::test]
async fn test_scenario_b_inactive_key_is_rejected() {
    let mut harness = Harness::new(ProjectCredential {
        is_active: false,
        ..active_key()
    });

    let result = harness.gateway.admit(header_request(AUTH, event())).await;

    assert!(matches!(result, Err(IngestError::Unauthenticated { .. })));
    assert!(harness.cache.is_empty().await);
    assert!(harness.jobs.try_recv().is_err());
}

#[tokio::test]
async fn test_scenario_c_conflicting_channels_skip_lookup() {
    let mut harness = Harness::new(active_key());

    let parts = RequestParts::new(
        headers(&[("x-sentry-auth", AUTH)]),
        vec![("sentry_key".to_string(), "abc123".to_string())],
    );
    let request = IngestRequest::new(parts, serde_json::to_vec(&event()).unwrap());
    let result = harness.gateway.admit(request).await;

    assert!(matches!(result, Err(IngestError::MalformedRequest(_))));
    assert_eq!(harness.lookups(), 0);
    assert!(harness.cache.is_empty().await);
    assert!(harness.jobs.try_recv().is_err());
}

#[tokio::test]
async fn test_scenario_d_cache_outage_enqueues_nothing() {
    let store = Arc::new(StaticCredentialStore::new([active_key()]));
    let (queue, mut jobs) = BroadcastQueueService::create_job_queue_arc_with_receiver(16);
    let gateway = IngestionGateway::new(
        CredentialResolver::new(store),
        Arc::new(UnreachableCache),
        queue,
        GatewayConfig::default(),
    );

    let result = gateway.admit(header_request(AUTH, event())).await;

    assert!(matches!(result, Err(IngestError::CacheUnavailable(_))));
    assert!(jobs.try_recv().is_err());
}

#[tokio::test]
async fn test_rejected_outcome_keeps_bound_context() {
    let harness = Harness::new(ProjectCredential {
        allowed_origins: vec!["app.example.com".to_string()],
        ..active_key()
    });
    let parts = RequestParts::new(
        headers(&[("origin", "https://evil.test"), ("x-sentry-auth", AUTH)]),
        Vec::new(),
    );

    let outcome = harness
        .gateway
        .process(IngestRequest::new(parts, serde_json::to_vec(&event()).unwrap()))
        .await;

    assert!(matches!(outcome.result, Err(IngestError::Forbidden(_))));
    let tags = &outcome.context.tags;
    assert_eq!(tags.get(TAG_PROJECT).map(String::as_str), Some("42"));
    assert_eq!(tags.get(TAG_AGENT).map(String::as_str), Some("myagent/1.0"));
    assert!(harness.cache.is_empty().await);
}

#[tokio::test]
async fn test_unauthenticated_outcome_has_no_project_tags() {
    let harness = Harness::new(active_key());
    let parts = RequestParts::new(headers(&[("user-agent", "curl/8.0")]), Vec::new());

    let outcome = harness
        .gateway
        .process(IngestRequest::new(parts, "{}").with_project_id(Some(42)))
        .await;

    assert!(outcome.result.is_err());
    assert_eq!(outcome.context.project_id, Some(42));
    assert!(outcome.context.tags.get(TAG_PROJECT).is_none());
}

#[tokio::test]
async fn test_missing_credentials_are_unauthenticated() {
    let harness = Harness::new(active_key());
    let parts = RequestParts::new(headers(&[("user-agent", "curl/8.0")]), Vec::new());

    let result = harness
        .gateway
        .admit(IngestRequest::new(parts, "{}"))
        .await;

    assert!(matches!(result, Err(IngestError::Unauthenticated { .. })));
    assert_eq!(harness.lookups(), 0);
}

#[tokio::test]
async fn test_key_without_store_access_is_rejected() {
    let harness = Harness::new(ProjectCredential {
        allows_store_access: false,
        ..active_key()
    });

    let result = harness.gateway.admit(header_request(AUTH, event())).await;

    assert!(matches!(result, Err(IngestError::Unauthenticated { .. })));
    assert!(harness.cache.is_empty().await);
}

#[tokio::test]
async fn test_secret_must_match_when_presented() {
    let harness = Harness::new(ProjectCredential {
        secret_key: "s3cr3t".to_string(),
        ..active_key()
    });

    let wrong = format!("{}, sentry_secret=wrong", AUTH);
    let result = harness.gateway.admit(header_request(&wrong, event())).await;
    assert!(matches!(result, Err(IngestError::Unauthenticated { .. })));

    let right = format!("{}, sentry_secret=s3cr3t", AUTH);
    assert!(harness
        .gateway
        .admit(header_request(&right, event()))
        .await
        .is_ok());

    // Public DSN flow: no secret sent at all
    assert!(harness
        .gateway
        .admit(header_request(AUTH, event()))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_repeated_delivery_reuses_cache_key() {
    let mut harness = Harness::new(active_key());

    let first = harness
        .gateway
        .admit(header_request(AUTH, event()))
        .await
        .unwrap();
    let second = harness
        .gateway
        .admit(header_request(AUTH, event()))
        .await
        .unwrap();

    assert_eq!(first.cache_key, second.cache_key);
    assert_eq!(harness.cache.len().await, 1);

    // Each admission still enqueues; consumers dedupe on the key
    assert!(harness.jobs.try_recv().is_ok());
    assert!(harness.jobs.try_recv().is_ok());
}

#[tokio::test]
async fn test_null_origin_is_public() {
    let harness = Harness::new(active_key());
    let parts = RequestParts::new(
        headers(&[("origin", "null"), ("x-sentry-auth", AUTH)]),
        Vec::new(),
    );

    let admission = harness
        .gateway
        .admit(IngestRequest::new(parts, serde_json::to_vec(&event()).unwrap()))
        .await
        .unwrap();
    assert_eq!(admission.event_id, EVENT_ID);

    let restricted = Harness::new(ProjectCredential {
        allowed_origins: vec!["app.example.com".to_string()],
        ..active_key()
    });
    let parts = RequestParts::new(
        headers(&[("origin", "null"), ("x-sentry-auth", AUTH)]),
        Vec::new(),
    );
    let result = restricted
        .gateway
        .admit(IngestRequest::new(parts, serde_json::to_vec(&event()).unwrap()))
        .await;
    assert!(matches!(result, Err(IngestError::Forbidden(_))));
    assert!(restricted.cache.is_empty().await);
}

#[tokio::test]
async fn test_reprocessing_and_attachments() {
    let mut harness = Harness::new(active_key());
    let start_time = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let attachments = vec![Attachment::new("log.txt", b"line one".to_vec())
        .with_content_type("text/plain")];

    let request = header_request(AUTH, event()).with_options(InsertOptions {
        attachments: Some(attachments.clone()),
        start_time: Some(start_time),
        from_reprocessing: true,
    });
    let admission = harness.gateway.admit(request).await.unwrap();

    let job = harness.jobs.try_recv().unwrap();
    assert!(matches!(job, Job::PreprocessEventFromReprocessing(_)));
    assert_eq!(job.task().start_time, start_time);

    let stored = harness
        .cache
        .get_attachments(&admission.cache_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored, attachments);
}

#[tokio::test]
async fn test_legacy_interfaces_are_canonicalized() {
    let harness = Harness::new(active_key());
    let body = json!({
        "event_id": EVENT_ID,
        "sentry.interfaces.Exception": {"values": [{"type": "ValueError"}]},
    });

    let admission = harness
        .gateway
        .admit(header_request(AUTH, body))
        .await
        .unwrap();
    let cached = harness
        .cache
        .get(&admission.cache_key)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(cached["exception"]["values"][0]["type"], "ValueError");
    assert!(cached.get("sentry.interfaces.Exception").is_none());
}

#[tokio::test]
async fn test_queue_without_consumer_fails() {
    let store = Arc::new(StaticCredentialStore::new([active_key()]));
    let (queue, jobs) = BroadcastQueueService::create_job_queue_arc_with_receiver(16);
    drop(jobs);
    let cache = Arc::new(InMemoryPayloadCache::new());
    let gateway = IngestionGateway::new(
        CredentialResolver::new(store),
        cache.clone(),
        queue,
        GatewayConfig::default(),
    );

    let result = gateway.admit(header_request(AUTH, event())).await;
    assert!(matches!(result, Err(IngestError::EnqueueFailure(_))));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let store = Arc::new(StaticCredentialStore::new([active_key()]));
    let (queue, _jobs) = BroadcastQueueService::create_job_queue_arc_with_receiver(16);
    let cache = Arc::new(InMemoryPayloadCache::new());
    let gateway = IngestionGateway::new(
        CredentialResolver::new(store),
        cache.clone(),
        queue,
        GatewayConfig {
            max_event_size: 16,
            ..GatewayConfig::default()
        },
    );

    let result = gateway.admit(header_request(AUTH, event())).await;
    assert!(matches!(result, Err(IngestError::PayloadTooLarge { limit: 16 })));
    assert!(cache.is_empty().await);
}
