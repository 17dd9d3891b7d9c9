use crate::config::DashConfig;
use crate::create_app;
use crate::state::AppState;
use axum::body::Body;
use axum::Router;
use dash_core::SessionIdentity;
use http::{HeaderMap, Method, Request, StatusCode};
use http_body_util::BodyExt;
use log::LevelFilter;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tower::ServiceExt;
use wiremock::MockServer;

/// Test fixture wiring the full application against mock servers for the
/// Discord API and the kv store.
///
/// ```rust
/// #[tokio::test]
/// async fn test_endpoint() {
///     let fixture = TestFixture::new().await;
///
///     Mock::given(matchers::method("GET"))
///         .and(matchers::path("/users/@me/guilds"))
///         .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
///         .mount(&fixture.discord_mock)
///         .await;
///
///     let token = fixture.session_token("42", "tester");
///     let response = fixture.get_with_session("/api/guilds", &token).await;
///     response.assert_ok();
/// }
/// ```
pub struct TestFixture {
    /// The application router
    pub app: Router,
    /// Application state (for issuing tokens directly in tests)
    pub state: AppState,
    /// Mock server standing in for the Discord API
    pub discord_mock: MockServer,
    /// Mock server standing in for the kv REST store
    pub kv_mock: MockServer,
}

/// Intermediate builder allowing tests to tweak the config before the
/// app is constructed.
pub struct TestFixtureBuilder {
    pub config: DashConfig,
    pub discord_mock: MockServer,
    pub kv_mock: MockServer,
}

impl TestFixture {
    pub async fn new() -> Self {
        Self::builder().await.build().await
    }

    /// Start the mock servers and derive a config pointing at them,
    /// without building the app yet.
    pub async fn builder() -> TestFixtureBuilder {
        let _ = env_logger::builder()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .try_init();

        let discord_mock = MockServer::start().await;
        let kv_mock = MockServer::start().await;
        let config = DashConfig::for_test_with_mocks(&discord_mock, &kv_mock);

        TestFixtureBuilder {
            config,
            discord_mock,
            kv_mock,
        }
    }

    /// Issue a session token the way the callback handler would, with the
    /// canonical test upstream credential.
    pub fn session_token(&self, user_id: &str, username: &str) -> String {
        self.state
            .tokens
            .issue_session(
                SessionIdentity {
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                    avatar_ref: None,
                },
                Some("user-access-token".to_string()),
            )
            .expect("Failed to issue session token")
    }

    /// GET without any credentials.
    pub async fn get_raw(&self, uri: impl AsRef<str>) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.as_ref())
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// GET with a session bearer token.
    pub async fn get_with_session(&self, uri: impl AsRef<str>, token: &str) -> TestResponse {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri.as_ref())
            .header("Authorization", format!("Bearer {token}"))
            .body(Body::empty())
            .expect("Failed to build request");
        self.send(request).await
    }

    /// POST a JSON body without any credentials.
    pub async fn post_raw<T: Serialize>(&self, uri: impl AsRef<str>, body: &T) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header("Content-Type", "application/json")
            .body(Body::from(json_body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// POST a JSON body with a session bearer token.
    pub async fn post_with_session<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
        token: &str,
    ) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header("Authorization", format!("Bearer {token}"))
            .header("Content-Type", "application/json")
            .body(Body::from(json_body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// POST a JSON body with the configured ingest token.
    pub async fn post_with_ingest<T: Serialize>(
        &self,
        uri: impl AsRef<str>,
        body: &T,
    ) -> TestResponse {
        let json_body = serde_json::to_vec(body).expect("Failed to serialize body to JSON");
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri.as_ref())
            .header(
                "Authorization",
                format!("Bearer {}", self.state.config.ingest),
            )
            .header("Content-Type", "application/json")
            .body(Body::from(json_body))
            .expect("Failed to build request");
        self.send(request).await
    }

    /// Send a request through the router and collect the response.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .app
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("Failed to read response body")
            .to_bytes();

        let json = if !body.is_empty() {
            serde_json::from_slice(&body).unwrap_or_else(|_| serde_json::json!({}))
        } else {
            serde_json::json!({})
        };

        TestResponse {
            status,
            headers,
            json,
        }
    }
}

impl TestFixtureBuilder {
    pub async fn build(self) -> TestFixture {
        let cache = crate::cache::create_cache(&self.config).expect("Failed to create cache");
        let state = AppState::new(self.config, cache).expect("Failed to create app state");
        let app = create_app(state.clone()).await;

        TestFixture {
            app,
            state,
            discord_mock: self.discord_mock,
            kv_mock: self.kv_mock,
        }
    }
}

/// Response from a test request with convenient access to status,
/// headers, and the JSON body.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub json: Value,
}

impl TestResponse {
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status,
            expected,
            "Expected status {} but got {} with body: {}",
            expected,
            self.status,
            serde_json::to_string_pretty(&self.json).unwrap_or_default()
        );
        self
    }

    pub fn assert_ok(&self) -> &Self {
        self.assert_status(StatusCode::OK)
    }

    /// A response header as a string; panics when absent.
    pub fn header(&self, name: &str) -> String {
        self.headers
            .get(name)
            .unwrap_or_else(|| panic!("Missing response header: {name}"))
            .to_str()
            .expect("Header is not valid UTF-8")
            .to_string()
    }

    pub fn json_as<T: DeserializeOwned>(&self) -> T {
        serde_json::from_value(self.json.clone()).expect("Failed to deserialize response JSON")
    }
}
