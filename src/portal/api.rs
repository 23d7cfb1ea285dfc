//! Shared HTTP client for the portal JSON API with a consistent timeout, cookie
//! store and error mapping. The bearer token is never held here: each request
//! asks a [`TokenProvider`] for the current token when it is sent, and a `401`
//! triggers exactly one refresh-and-replay before the error is surfaced.

use crate::{
    portal::{
        errors::ApiError,
        types::{ApiResponse, RefreshResponse},
    },
    APP_USER_AGENT,
};
use reqwest::{header, Client, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::{fmt, sync::Arc, time::Duration};
use tracing::{debug, instrument, warn};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const REFRESH_PATH: &str = "/auth/token/refresh/";
/// Where the visitor is sent once the session cannot be recovered.
pub const LOGIN_ENTRY_POINT: &str = "/login";
/// Maximum number of error body characters written to the logs.
const MAX_ERROR_CHARS: usize = 200;

/// Source of the bearer token attached to outgoing requests.
///
/// Implemented by the session state so the token is read at send time rather
/// than stored as a default header on the client.
pub trait TokenProvider: Send + Sync {
    fn access_token(&self) -> Option<SecretString>;

    fn refresh_token(&self) -> Option<SecretString>;

    /// Called after a `401` was recovered by a successful refresh.
    fn token_refreshed(&self, access: SecretString);

    /// Called when the refresh attempt behind a `401` failed.
    fn refresh_failed(&self);
}

#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One logical request, kept around so it can be replayed after a refresh.
#[derive(Clone, Debug)]
struct ApiRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    retried: bool,
}

impl ApiRequest {
    fn new(method: Method, path: &str, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.to_string(),
            body,
            retried: false,
        }
    }
}

#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// # Errors
    /// Returns `ApiError::Config` if the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, tokens: Arc<dyn TokenProvider>) -> Result<Self, ApiError> {
        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .default_headers(headers)
            .timeout(config.timeout)
            .cookie_store(true)
            .build()
            .map_err(|err| ApiError::Config(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
            tokens,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// # Errors
    /// Returns an error if the request fails or the envelope cannot be decoded.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<ApiResponse<T>, ApiError> {
        self.envelope(ApiRequest::new(Method::GET, path, None)).await
    }

    /// # Errors
    /// Returns an error if the request fails or the envelope cannot be decoded.
    pub async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<ApiResponse<T>, ApiError> {
        let body = encode_body(body)?;
        self.envelope(ApiRequest::new(Method::POST, path, body)).await
    }

    /// # Errors
    /// Returns an error if the request fails or the envelope cannot be decoded.
    pub async fn patch<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse<T>, ApiError> {
        let body = encode_body(Some(body))?;
        self.envelope(ApiRequest::new(Method::PATCH, path, body)).await
    }

    /// GET and unwrap the envelope's `data` field.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response carries no data.
    pub async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        require_data(path, self.get(path).await?)
    }

    /// POST and unwrap the envelope's `data` field.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response carries no data.
    pub async fn post_data<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        require_data(path, self.post(path, body).await?)
    }

    /// PATCH and unwrap the envelope's `data` field.
    ///
    /// # Errors
    /// Returns an error if the request fails or the response carries no data.
    pub async fn patch_data<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        require_data(path, self.patch(path, body).await?)
    }

    /// POST and ignore whatever body comes back.
    ///
    /// # Errors
    /// Returns an error if the request fails.
    pub async fn post_empty<B: Serialize>(
        &self,
        path: &str,
        body: Option<&B>,
    ) -> Result<(), ApiError> {
        let body = encode_body(body)?;
        let response = self.execute(ApiRequest::new(Method::POST, path, body)).await?;
        handle_empty_response(response).await
    }

    /// Exchanges the refresh credential for a new access token.
    ///
    /// The refresh call itself is never retried on `401`. Session state is not
    /// touched; callers decide what to do with the token.
    ///
    /// # Errors
    /// Returns an error if the refresh request fails or carries no token.
    #[instrument(skip(self))]
    pub async fn refresh_access_token(&self) -> Result<SecretString, ApiError> {
        let body = self
            .tokens
            .refresh_token()
            .map(|refresh| json!({ "refresh": refresh.expose_secret() }));
        let request = ApiRequest::new(Method::POST, REFRESH_PATH, body);
        let response = self.send_once(&request).await?;
        let payload: Value = handle_json_response(response).await?;
        parse_refresh(payload).map(|refresh| SecretString::from(refresh.access))
    }

    async fn envelope<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
    ) -> Result<ApiResponse<T>, ApiError> {
        let response = self.execute(request).await?;
        handle_json_response(response).await
    }

    /// Sends the request, refreshing and replaying once on `401`.
    ///
    /// A `401` that survives the refresh, or a failed refresh, ends the
    /// session through [`TokenProvider::refresh_failed`].
    async fn execute(&self, mut request: ApiRequest) -> Result<reqwest::Response, ApiError> {
        loop {
            let response = self.send_once(&request).await?;

            if response.status() != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }
            if request.retried {
                warn!("{} {} still unauthorized after refresh", request.method, request.path);
                self.session_expired();
                return Ok(response);
            }

            request.retried = true;
            debug!("{} {} unauthorized, refreshing token", request.method, request.path);

            match self.refresh_access_token().await {
                Ok(access) => self.tokens.token_refreshed(access),
                Err(err) => {
                    warn!("token refresh failed: {err}");
                    self.session_expired();
                    return Ok(response);
                }
            }
        }
    }

    fn session_expired(&self) {
        self.tokens.refresh_failed();
        warn!("session expired, login required at {LOGIN_ENTRY_POINT}");
    }

    async fn send_once(&self, request: &ApiRequest) -> Result<reqwest::Response, ApiError> {
        let url = build_url_with_base(&self.base_url, &request.path);
        let mut builder = self.http.request(request.method.clone(), &url);

        if let Some(token) = self.tokens.access_token() {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        debug!("-> {} {}", request.method, request.path);

        let response = builder.send().await.map_err(|err| {
            warn!("{} {} failed: {err}", request.method, request.path);
            map_request_error(&err)
        })?;

        debug!("<- {} {}", response.status().as_u16(), request.path);

        Ok(response)
    }
}

fn encode_body<B: Serialize>(body: Option<&B>) -> Result<Option<Value>, ApiError> {
    body.map(serde_json::to_value)
        .transpose()
        .map_err(|err| ApiError::Serialization(format!("Failed to encode request: {err}")))
}

fn require_data<T>(path: &str, envelope: ApiResponse<T>) -> Result<T, ApiError> {
    envelope
        .data
        .ok_or_else(|| ApiError::Parse(format!("Response from {path} carried no data")))
}

/// Accepts both the bare `{ access }` body and an enveloped `{ data: { access } }`.
fn parse_refresh(payload: Value) -> Result<RefreshResponse, ApiError> {
    let candidate = match payload.get("data") {
        Some(data) if data.get("access").is_some() => data.clone(),
        _ => payload,
    };
    serde_json::from_value(candidate)
        .map_err(|err| ApiError::Parse(format!("Failed to decode refresh response: {err}")))
}

/// Builds a URL from an explicit base URL and the provided path.
fn build_url_with_base(base_url: &str, path: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    let path = path.trim();

    if base.is_empty() {
        path.to_string()
    } else {
        format!("{}/{}", base, path.trim_start_matches('/'))
    }
}

fn map_request_error(err: &reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout("Request timed out. Please try again.".to_string())
    } else if err.is_builder() {
        ApiError::Config(format!("Invalid request: {err}"))
    } else {
        ApiError::Network(format!("Unable to reach the server: {err}"))
    }
}

async fn handle_json_response<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ApiError> {
    if response.status().is_success() {
        response
            .json::<T>()
            .await
            .map_err(|err| ApiError::Parse(format!("Failed to decode response: {err}")))
    } else {
        Err(error_from_response(response).await)
    }
}

async fn handle_empty_response(response: reqwest::Response) -> Result<(), ApiError> {
    if response.status().is_success() {
        Ok(())
    } else {
        Err(error_from_response(response).await)
    }
}

async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let (code, message) = error_details(&body);
    let message = message.unwrap_or_else(|| {
        debug!("unstructured error body ({}): {}", status.as_u16(), sanitize_body(&body));
        String::new()
    });

    if status == StatusCode::UNAUTHORIZED {
        ApiError::TokenExpired(message)
    } else {
        ApiError::AuthService {
            status: status.as_u16(),
            code,
            message,
        }
    }
}

/// Pulls `error.code`/`error.message` out of the portal envelope, falling back
/// to a bare `detail` field.
fn error_details(body: &str) -> (Option<String>, Option<String>) {
    if let Ok(envelope) = serde_json::from_str::<ApiResponse<Value>>(body) {
        if let Some(error) = envelope.error {
            return (Some(error.code), Some(error.message));
        }
    }
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        if let Some(detail) = value.get("detail").and_then(Value::as_str) {
            return (None, Some(detail.to_string()));
        }
    }
    (None, None)
}

/// Trims and truncates raw error bodies before they reach the logs.
fn sanitize_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "Request failed.".to_string()
    } else {
        trimmed.chars().take(MAX_ERROR_CHARS).collect()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::portal::types::User;
    use std::{
        net::TcpListener,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Mutex,
        },
    };
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn can_bind_localhost() -> bool {
        TcpListener::bind("127.0.0.1:0").is_ok()
    }

    #[derive(Default)]
    struct TestTokens {
        access: Mutex<Option<String>>,
        refresh: Mutex<Option<String>>,
        refreshed: AtomicUsize,
        failed: AtomicUsize,
    }

    impl TestTokens {
        fn with_access(token: &str) -> Arc<Self> {
            let tokens = Self::default();
            *tokens.access.lock().unwrap() = Some(token.to_string());
            Arc::new(tokens)
        }
    }

    impl TokenProvider for TestTokens {
        fn access_token(&self) -> Option<SecretString> {
            self.access.lock().unwrap().clone().map(SecretString::from)
        }

        fn refresh_token(&self) -> Option<SecretString> {
            self.refresh.lock().unwrap().clone().map(SecretString::from)
        }

        fn token_refreshed(&self, access: SecretString) {
            *self.access.lock().unwrap() = Some(access.expose_secret().to_string());
            self.refreshed.fetch_add(1, Ordering::SeqCst);
        }

        fn refresh_failed(&self) {
            *self.access.lock().unwrap() = None;
            self.failed.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn client_for(server: &MockServer, tokens: Arc<TestTokens>) -> ApiClient {
        let config = ClientConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        };
        ApiClient::new(&config, tokens).unwrap()
    }

    #[test]
    fn build_url_with_base_joins_slashes() {
        assert_eq!(
            build_url_with_base("http://localhost:8000/api/v1/", "/auth/profile/"),
            "http://localhost:8000/api/v1/auth/profile/"
        );
        assert_eq!(build_url_with_base("  ", "/auth/profile/"), "/auth/profile/");
    }

    #[test]
    fn error_details_reads_envelope_then_detail() {
        let (code, message) = error_details(
            r#"{"success":false,"error":{"code":"NOT_FOUND","message":"No such user"}}"#,
        );
        assert_eq!(code.as_deref(), Some("NOT_FOUND"));
        assert_eq!(message.as_deref(), Some("No such user"));

        let (code, message) = error_details(r#"{"detail":"Token is invalid or expired"}"#);
        assert_eq!(code, None);
        assert_eq!(message.as_deref(), Some("Token is invalid or expired"));

        let body = json!({
            "success": false,
            "data": null,
            "error": { "code": "NOT_FOUND", "message": "Submission not found", "details": null }
        });
        let (_, message) = error_details(&body.to_string());
        assert_eq!(message.as_deref(), Some("Submission not found"));

        assert_eq!(error_details("<html>Bad Gateway</html>"), (None, None));
        assert_eq!(sanitize_body("   "), "Request failed.");
    }

    #[test]
    fn parse_refresh_accepts_bare_and_enveloped_bodies() {
        let bare = parse_refresh(json!({ "access": "a1" })).unwrap();
        assert_eq!(bare.access, "a1");
        let wrapped = json!({ "success": true, "data": { "access": "a2" } });
        let wrapped = parse_refresh(wrapped).unwrap();
        assert_eq!(wrapped.access, "a2");
        assert!(parse_refresh(json!({ "data": {} })).is_err());
    }

    #[tokio::test]
    async fn attaches_current_token_at_send_time() -> anyhow::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/profile/"))
            .and(header("Authorization", "Bearer second"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "id": "1", "orcid_id": "0000-0001" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = TestTokens::with_access("first");
        let client = client_for(&server, tokens.clone());
        *tokens.access.lock().unwrap() = Some("second".to_string());

        let user: User = client.get_data("/auth/profile/").await?;
        assert_eq!(user.orcid_id, "0000-0001");
        Ok(())
    }

    #[tokio::test]
    async fn retries_once_after_successful_refresh() -> anyhow::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/profile/"))
            .and(header("Authorization", "Bearer stale"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "detail": "Given token not valid for any token type"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/auth/profile/"))
            .and(header("Authorization", "Bearer fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": true,
                "data": { "id": "7", "profile_completed": true }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = TestTokens::with_access("stale");
        let client = client_for(&server, tokens.clone());

        let user: User = client.get_data("/auth/profile/").await?;
        assert_eq!(user.id, "7");
        assert_eq!(tokens.refreshed.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.failed.load(Ordering::SeqCst), 0);
        Ok(())
    }

    #[tokio::test]
    async fn does_not_retry_a_second_unauthorized() -> anyhow::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/profile/"))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "fresh" })))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = TestTokens::with_access("stale");
        let client = client_for(&server, tokens.clone());

        let result = client.get_data::<User>("/auth/profile/").await;
        assert!(matches!(result, Err(ApiError::TokenExpired(_))));
        assert_eq!(tokens.refreshed.load(Ordering::SeqCst), 1);
        assert_eq!(tokens.failed.load(Ordering::SeqCst), 1);
        assert!(tokens.access_token().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn failed_refresh_propagates_original_error() -> anyhow::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/orcid/sync/"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "success": false,
                "error": { "code": "TOKEN_EXPIRED", "message": "Token expired" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .and(body_json(json!({ "refresh": "r1" })))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let tokens = TestTokens::with_access("stale");
        *tokens.refresh.lock().unwrap() = Some("r1".to_string());
        let client = client_for(&server, tokens.clone());

        let result = client
            .post_data::<Value, User>("/auth/orcid/sync/", None)
            .await;
        assert_eq!(
            result.unwrap_err(),
            ApiError::TokenExpired("Token expired".to_string())
        );
        assert_eq!(tokens.failed.load(Ordering::SeqCst), 1);
        assert!(tokens.access_token().is_none());
        Ok(())
    }

    #[tokio::test]
    async fn non_unauthorized_errors_are_not_retried() -> anyhow::Result<()> {
        if !can_bind_localhost() {
            eprintln!("Skipping test: cannot bind localhost");
            return Ok(());
        }
        let server = MockServer::start().await;
        Mock::given(method("PATCH"))
            .and(path("/auth/profile/"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "success": false,
                "error": { "code": "VALIDATION_ERROR", "message": "Invalid email" }
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/auth/token/refresh/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "x" })))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, TestTokens::with_access("t"));
        let result = client
            .patch_data::<Value, User>("/auth/profile/", &json!({ "email": "nope" }))
            .await;

        assert_eq!(
            result.unwrap_err(),
            ApiError::AuthService {
                status: 400,
                code: Some("VALIDATION_ERROR".to_string()),
                message: "Invalid email".to_string(),
            }
        );
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_error() {
        let config = ClientConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
        };
        let client = ApiClient::new(&config, Arc::new(TestTokens::default())).unwrap();
        let result = client.get::<Value>("/auth/orcid/login/").await;
        assert!(matches!(
            result,
            Err(ApiError::Network(_) | ApiError::Timeout(_))
        ));
    }
}
