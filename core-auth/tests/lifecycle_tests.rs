//! End-to-end scenarios for the token lifecycle manager, driven through
//! scripted host capabilities.

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bridge_traits::navigation::Navigator;
use bridge_traits::storage::KeyValueStore;
use bridge_traits::time::{Clock, SystemClock};
use chrono::{DateTime, Duration as TimeDelta, TimeZone, Utc};
use core_auth::{AuthConfig, AuthError, StoredCredential, TokenLifecycleManager};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use url::Url;

const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

// ---------------------------------------------------------------------------
// Scripted host capabilities
// ---------------------------------------------------------------------------

struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().unwrap().get(key).cloned()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(&self, key: &str, value: &str) -> BridgeResult<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> BridgeResult<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.entries.lock().unwrap().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.entries.lock().unwrap().clear();
        Ok(())
    }
}

struct ScriptedNavigator {
    location: Mutex<Url>,
}

impl ScriptedNavigator {
    fn at(url: &str) -> Self {
        Self {
            location: Mutex::new(Url::parse(url).unwrap()),
        }
    }

    fn location(&self) -> Url {
        self.location.lock().unwrap().clone()
    }
}

#[async_trait]
impl Navigator for ScriptedNavigator {
    async fn current_location(&self) -> BridgeResult<Url> {
        Ok(self.location())
    }

    async fn assign(&self, url: Url) -> BridgeResult<()> {
        *self.location.lock().unwrap() = url;
        Ok(())
    }

    async fn replace(&self, url: Url) -> BridgeResult<()> {
        *self.location.lock().unwrap() = url;
        Ok(())
    }
}

/// Routes token-endpoint requests and API requests to separate scripted
/// response queues, recording every request. When a queue runs down to one
/// response, that response repeats.
struct RoutedHttpClient {
    token_responses: Mutex<VecDeque<(u16, String)>>,
    api_responses: Mutex<VecDeque<(u16, String)>>,
    token_requests: Mutex<Vec<HttpRequest>>,
    api_requests: Mutex<Vec<HttpRequest>>,
    token_delay: Option<Duration>,
}

impl RoutedHttpClient {
    fn new(token: Vec<(u16, &str)>, api: Vec<(u16, &str)>) -> Self {
        Self {
            token_responses: Mutex::new(
                token.into_iter().map(|(s, b)| (s, b.to_string())).collect(),
            ),
            api_responses: Mutex::new(api.into_iter().map(|(s, b)| (s, b.to_string())).collect()),
            token_requests: Mutex::new(Vec::new()),
            api_requests: Mutex::new(Vec::new()),
            token_delay: None,
        }
    }

    fn with_token_delay(mut self, delay: Duration) -> Self {
        self.token_delay = Some(delay);
        self
    }

    fn token_request_count(&self) -> usize {
        self.token_requests.lock().unwrap().len()
    }

    fn api_request_count(&self) -> usize {
        self.api_requests.lock().unwrap().len()
    }

    fn api_request(&self, index: usize) -> HttpRequest {
        self.api_requests.lock().unwrap()[index].clone()
    }

    fn next_response(queue: &Mutex<VecDeque<(u16, String)>>) -> (u16, String) {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().expect("response queue is empty")
        }
    }
}

#[async_trait]
impl HttpClient for RoutedHttpClient {
    async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse> {
        let is_token_request = request.url == TOKEN_URL;
        let (status, body) = if is_token_request {
            self.token_requests.lock().unwrap().push(request);
            if let Some(delay) = self.token_delay {
                sleep(delay).await;
            }
            Self::next_response(&self.token_responses)
        } else {
            self.api_requests.lock().unwrap().push(request);
            Self::next_response(&self.api_responses)
        };

        Ok(HttpResponse {
            status,
            headers: HashMap::new(),
            body: bytes::Bytes::from(body),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    http: Arc<RoutedHttpClient>,
    store: Arc<MemoryStore>,
    navigator: Arc<ScriptedNavigator>,
    clock: Arc<dyn Clock>,
}

impl Harness {
    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn new(http: RoutedHttpClient) -> Self {
        Self {
            http: Arc::new(http),
            store: Arc::new(MemoryStore::new()),
            navigator: Arc::new(ScriptedNavigator::at("https://app.example.com/compose")),
            clock: Arc::new(ManualClock::at(Self::fixed_now())),
        }
    }

    fn with_system_clock(mut self) -> Self {
        self.clock = Arc::new(SystemClock);
        self
    }

    fn with_location(self, url: &str) -> Self {
        Self {
            navigator: Arc::new(ScriptedNavigator::at(url)),
            ..self
        }
    }

    /// Seed the persisted record before the manager is constructed.
    async fn seed_record(&self, record: &StoredCredential) {
        self.store
            .set("test_auth", &serde_json::to_string(record).unwrap())
            .await
            .unwrap();
    }

    async fn manager(&self) -> Arc<TokenLifecycleManager> {
        TokenLifecycleManager::new(
            AuthConfig {
                client_id: Some("abc".to_string()),
                client_secret: Some("xyz".to_string()),
                scope: "https://scope.example.com/documents".to_string(),
                storage_namespace: "test_auth".to_string(),
                ..AuthConfig::default()
            },
            self.http.clone(),
            self.store.clone(),
            self.navigator.clone(),
            self.clock.clone(),
            EventBus::new(16),
        )
        .await
    }
}

fn seeded_record(expires_at: DateTime<Utc>) -> StoredCredential {
    StoredCredential {
        client_id: Some("abc".to_string()),
        client_secret: Some("xyz".to_string()),
        access_token: Some("OLD".to_string()),
        refresh_token: Some("RT1".to_string()),
        expires_at: Some(expires_at),
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test]
async fn exchange_code_authenticates_and_persists() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(
            200,
            r#"{"access_token":"AT1","refresh_token":"RT1","expires_in":3600}"#,
        )],
        vec![],
    ))
    .with_system_clock();
    let manager = harness.manager().await;

    manager
        .exchange_code_for_tokens("code123", None)
        .await
        .unwrap();

    let status = manager.status().await;
    assert!(status.is_authenticated);
    assert!(status.has_refresh_token);
    assert!(status.can_auto_refresh);

    assert_eq!(manager.auth_header_value().await.unwrap(), "Bearer AT1");

    // Persisted record carries an absolute expiry within a second of
    // now + 3600s
    let raw = harness.store.raw("test_auth").unwrap();
    let record: StoredCredential = serde_json::from_str(&raw).unwrap();
    assert_eq!(record.access_token.as_deref(), Some("AT1"));
    assert_eq!(record.refresh_token.as_deref(), Some("RT1"));
    let expected = Utc::now() + TimeDelta::seconds(3600);
    let drift = (record.expires_at.unwrap() - expected).num_milliseconds().abs();
    assert!(drift < 1000, "expiry drifted by {}ms", drift);
}

#[tokio::test]
async fn exchange_emits_refresh_notification() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(
            200,
            r#"{"access_token":"AT1","refresh_token":"RT1","expires_in":3600}"#,
        )],
        vec![],
    ));
    let manager = harness.manager().await;
    let mut events = manager.event_bus().subscribe();

    manager
        .exchange_code_for_tokens("code123", None)
        .await
        .unwrap();

    assert!(matches!(
        events.try_recv().unwrap(),
        CoreEvent::Auth(AuthEvent::Authorized { .. })
    ));
    match events.try_recv().unwrap() {
        CoreEvent::Auth(AuthEvent::TokenRefreshed {
            access_token,
            expires_at,
        }) => {
            assert_eq!(access_token, "AT1");
            assert_eq!(expires_at, Harness::fixed_now() + TimeDelta::seconds(3600));
        }
        other => panic!("Expected TokenRefreshed, got {:?}", other),
    }
}

#[tokio::test]
async fn exchange_failure_carries_provider_payload() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(400, r#"{"error":"invalid_grant"}"#)],
        vec![],
    ));
    let manager = harness.manager().await;

    let result = manager.exchange_code_for_tokens("stale", None).await;
    match result {
        Err(AuthError::TokenExchange { status, body }) => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("Expected TokenExchange error, got {:?}", other.err()),
    }

    // Credential state unchanged
    assert!(!manager.status().await.has_access_token);
}

#[tokio::test]
async fn complete_authorization_exchanges_once_and_strips_code() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(
            200,
            r#"{"access_token":"AT1","refresh_token":"RT1","expires_in":3600}"#,
        )],
        vec![],
    ))
    .with_location("https://app.example.com/compose?code=code123&state=s1");
    let manager = harness.manager().await;

    // First call: code present, exchange happens, code stripped
    assert!(manager.complete_authorization(None).await.unwrap());
    assert_eq!(harness.http.token_request_count(), 1);
    assert_eq!(
        harness.navigator.location().as_str(),
        "https://app.example.com/compose?state=s1"
    );

    // Second call: no code left, no-op, no further exchange
    assert!(!manager.complete_authorization(None).await.unwrap());
    assert_eq!(harness.http.token_request_count(), 1);
}

#[tokio::test]
async fn complete_authorization_without_code_is_noop() {
    let harness = Harness::new(RoutedHttpClient::new(vec![(500, "")], vec![]));
    let manager = harness.manager().await;

    assert!(!manager.complete_authorization(None).await.unwrap());
    assert_eq!(harness.http.token_request_count(), 0);
}

#[tokio::test]
async fn authenticated_request_retries_exactly_once_on_401() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(200, r#"{"access_token":"AT2","expires_in":3600}"#)],
        // API rejects every attempt
        vec![(401, r#"{"error":"unauthorized"}"#)],
    ));
    harness
        .seed_record(&seeded_record(Harness::fixed_now() + TimeDelta::hours(1)))
        .await;
    let manager = harness.manager().await;

    let response = manager
        .authenticated_request(HttpRequest::new(
            HttpMethod::Get,
            "https://api.example.com/generate",
        ))
        .await
        .unwrap();

    // Two attempts, one refresh, second response surfaced as-is
    assert_eq!(response.status, 401);
    assert_eq!(harness.http.api_request_count(), 2);
    assert_eq!(harness.http.token_request_count(), 1);

    // First attempt used the old token, the retry used the refreshed one
    assert_eq!(
        harness.http.api_request(0).headers.get("Authorization"),
        Some(&"Bearer OLD".to_string())
    );
    assert_eq!(
        harness.http.api_request(1).headers.get("Authorization"),
        Some(&"Bearer AT2".to_string())
    );
}

#[tokio::test]
async fn authenticated_request_passes_through_success() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(500, "")],
        vec![(200, r#"{"ok":true}"#)],
    ));
    harness
        .seed_record(&seeded_record(Harness::fixed_now() + TimeDelta::hours(1)))
        .await;
    let manager = harness.manager().await;

    let response = manager
        .authenticated_request(HttpRequest::new(
            HttpMethod::Get,
            "https://api.example.com/generate",
        ))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(harness.http.api_request_count(), 1);
    assert_eq!(harness.http.token_request_count(), 0);
}

#[tokio::test]
async fn authenticated_request_401_without_refresh_returns_first_response() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(500, "")],
        vec![(401, "")],
    ));
    // Access token but no refresh token
    harness
        .seed_record(&StoredCredential {
            refresh_token: None,
            ..seeded_record(Harness::fixed_now() + TimeDelta::hours(1))
        })
        .await;
    let manager = harness.manager().await;

    let response = manager
        .authenticated_request(HttpRequest::new(
            HttpMethod::Get,
            "https://api.example.com/generate",
        ))
        .await
        .unwrap();

    assert_eq!(response.status, 401);
    assert_eq!(harness.http.api_request_count(), 1);
    assert_eq!(harness.http.token_request_count(), 0);
}

#[tokio::test]
async fn authenticated_request_without_token_fails() {
    let harness = Harness::new(RoutedHttpClient::new(vec![(500, "")], vec![(200, "")]));
    let manager = harness.manager().await;

    let result = manager
        .authenticated_request(HttpRequest::new(
            HttpMethod::Get,
            "https://api.example.com/generate",
        ))
        .await;

    assert!(matches!(result, Err(AuthError::NoToken)));
    assert_eq!(harness.http.api_request_count(), 0);
}

#[tokio::test]
async fn check_expiry_inside_window_dispatches_refresh() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(200, r#"{"access_token":"AT2","expires_in":3600}"#)],
        vec![],
    ));
    // Two minutes of lifetime left: inside the refresh window
    harness
        .seed_record(&seeded_record(Harness::fixed_now() + TimeDelta::minutes(2)))
        .await;
    let manager = harness.manager().await;
    let mut events = manager.event_bus().subscribe();

    let status = manager.check_expiry().await.unwrap();
    assert!(!status.expired);
    assert_eq!(status.minutes_left, 2);

    // Background refresh resolves and swaps the token in
    sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.http.token_request_count(), 1);
    assert_eq!(manager.auth_header_value().await.unwrap(), "Bearer AT2");
    assert!(matches!(
        events.try_recv().unwrap(),
        CoreEvent::Auth(AuthEvent::TokenRefreshed { .. })
    ));

    // Refresh response carried no refresh_token; the stored one survives
    let raw = harness.store.raw("test_auth").unwrap();
    let record: StoredCredential = serde_json::from_str(&raw).unwrap();
    assert_eq!(record.refresh_token.as_deref(), Some("RT1"));
}

#[tokio::test]
async fn check_expiry_after_expiry_schedules_nothing() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(200, r#"{"access_token":"AT2","expires_in":3600}"#)],
        vec![],
    ));
    harness
        .seed_record(&seeded_record(Harness::fixed_now() - TimeDelta::minutes(10)))
        .await;
    let manager = harness.manager().await;

    let status = manager.check_expiry().await.unwrap();
    assert!(status.expired);
    assert!(status.time_left < TimeDelta::zero());

    sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.http.token_request_count(), 0);
    assert_eq!(manager.auth_header_value().await.unwrap(), "Bearer OLD");
}

#[tokio::test]
async fn check_expiry_with_plenty_of_lifetime_schedules_nothing() {
    let harness = Harness::new(RoutedHttpClient::new(vec![(500, "")], vec![]));
    harness
        .seed_record(&seeded_record(Harness::fixed_now() + TimeDelta::hours(1)))
        .await;
    let manager = harness.manager().await;

    let status = manager.check_expiry().await.unwrap();
    assert!(!status.expired);
    assert_eq!(status.minutes_left, 60);

    sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.http.token_request_count(), 0);
}

#[tokio::test]
async fn check_expiry_without_tokens_is_absent() {
    let harness = Harness::new(RoutedHttpClient::new(vec![(500, "")], vec![]));
    let manager = harness.manager().await;

    assert!(manager.check_expiry().await.is_none());
}

#[tokio::test]
async fn refresh_only_credential_reports_expired() {
    let harness = Harness::new(RoutedHttpClient::new(vec![(500, "")], vec![]));
    harness
        .seed_record(&StoredCredential {
            access_token: None,
            expires_at: None,
            ..seeded_record(Harness::fixed_now())
        })
        .await;
    let manager = harness.manager().await;

    let status = manager.check_expiry().await.unwrap();
    assert!(status.expired);
    assert_eq!(status.time_left, TimeDelta::zero());

    // Expired means no background dispatch
    sleep(Duration::from_millis(50)).await;
    assert_eq!(harness.http.token_request_count(), 0);

    let snapshot = manager.status().await;
    assert!(!snapshot.has_access_token);
    assert!(snapshot.has_refresh_token);
    assert!(!snapshot.is_authenticated);
    assert!(snapshot.can_auto_refresh);
}

#[tokio::test]
async fn background_refresh_failure_is_routed_to_events() {
    let harness = Harness::new(RoutedHttpClient::new(
        vec![(400, r#"{"error":"invalid_grant"}"#)],
        vec![],
    ));
    harness
        .seed_record(&seeded_record(Harness::fixed_now() + TimeDelta::minutes(2)))
        .await;
    let manager = harness.manager().await;
    let mut events = manager.event_bus().subscribe();

    // The call itself never fails
    let status = manager.check_expiry().await.unwrap();
    assert!(!status.expired);

    sleep(Duration::from_millis(50)).await;
    match events.try_recv().unwrap() {
        CoreEvent::Auth(AuthEvent::AutoRefreshFailed { message }) => {
            assert!(message.contains("invalid_grant"));
        }
        other => panic!("Expected AutoRefreshFailed, got {:?}", other),
    }

    // Failed refresh left the credential untouched
    assert_eq!(manager.auth_header_value().await.unwrap(), "Bearer OLD");
}

#[tokio::test]
async fn concurrent_refreshes_share_one_request() {
    let harness = Harness::new(
        RoutedHttpClient::new(
            vec![(200, r#"{"access_token":"AT2","expires_in":3600}"#)],
            vec![],
        )
        .with_token_delay(Duration::from_millis(50)),
    );
    harness
        .seed_record(&seeded_record(Harness::fixed_now() + TimeDelta::minutes(2)))
        .await;
    let manager = harness.manager().await;

    let (a, b) = tokio::join!(
        manager.refresh_access_token(),
        manager.refresh_access_token()
    );
    a.unwrap();
    b.unwrap();

    assert_eq!(harness.http.token_request_count(), 1);
    assert_eq!(manager.auth_header_value().await.unwrap(), "Bearer AT2");
}

#[tokio::test]
async fn status_reflects_expired_token() {
    let harness = Harness::new(RoutedHttpClient::new(vec![(500, "")], vec![]));
    harness
        .seed_record(&seeded_record(Harness::fixed_now() - TimeDelta::minutes(1)))
        .await;
    let manager = harness.manager().await;

    let status = manager.status().await;
    assert!(status.has_access_token);
    assert!(!status.is_authenticated);
    assert!(status.expiry.unwrap().expired);
}
