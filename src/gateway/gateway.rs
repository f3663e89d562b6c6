use std::sync::Arc;
use std::time::{Duration, Instant};

use http::header::AUTHORIZATION;
use http::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::{CallOutcome, GatewayError, RefreshError};
use super::listener::SessionListener;
use super::refresh::TokenRefresher;
use crate::config::{ApiConfig, RoutesConfig};
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{ApiRequest, ApiResponse};
use crate::store::SessionStore;
use crate::utils::log_throttle::LogThrottle;

/// How many times a request is replayed after a 401.
const MAX_REPLAYS: u8 = 1;
const UNAUTHORIZED_LOG_WINDOW: Duration = Duration::from_secs(30);

/// Central choke point for API calls.
pub struct Gateway {
    api: ApiConfig,
    client: reqwest::Client,
    store: Arc<dyn SessionStore>,
    refresher: TokenRefresher,
    metrics: Metrics,
    throttle: LogThrottle,
}

impl Gateway {
    pub fn new(
        api: &ApiConfig,
        routes: &RoutesConfig,
        store: Arc<dyn SessionStore>,
        listener: Arc<dyn SessionListener>,
        metrics: Metrics,
    ) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(api.timeout_in_ms))
            .build()
            .map_err(GatewayError::Client)?;

        // Shares the connection pool; the refresher posts directly and never
        // goes through `send`.
        let refresher = TokenRefresher::new(
            client.clone(),
            api.url(&api.refresh_path),
            routes.login_entry_point.clone(),
            store.clone(),
            listener,
            metrics.clone(),
        );

        Ok(Gateway {
            api: api.clone(),
            client,
            store,
            refresher,
            metrics,
            throttle: LogThrottle::new(UNAUTHORIZED_LOG_WINDOW),
        })
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn api(&self) -> &ApiConfig {
        &self.api
    }

    /// Sends `request`, renewing the access token once if the API answers 401.
    ///
    /// Any status other than 401 comes back as `Ok`, untouched. Errors:
    /// - `Network` when no response arrived (never retried),
    /// - `Unauthorized` when a 401 cannot be recovered,
    /// - `SessionRevoked` when the refresh token itself failed; by then the
    ///   store is empty and the session listener has been notified.
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, GatewayError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let result = self.send_with_replay(request, &request_id).await;
        self.observe(request, &request_id, started, result)
    }

    /// Sends `request` without a credential and without 401 handling.
    ///
    /// For the endpoints that create sessions (login, registration, password
    /// reset): their 401s are answers about the submitted credentials, never
    /// about a stored session, so every status comes back as `Ok`.
    pub async fn send_public(&self, request: &ApiRequest) -> Result<ApiResponse, GatewayError> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let result = self.dispatch(request, None, &request_id, 0).await;
        self.observe(request, &request_id, started, result)
    }

    fn observe(
        &self,
        request: &ApiRequest,
        request_id: &Uuid,
        started: Instant,
        result: Result<ApiResponse, GatewayError>,
    ) -> Result<ApiResponse, GatewayError> {
        let method = request.method().as_str();
        let outcome = CallOutcome::of(&result);
        self.metrics.record_request(method, outcome.as_str());
        self.metrics
            .record_request_duration(method, started.elapsed().as_secs_f64());
        debug!(
            event_name = "gateway.request.finished",
            event_domain = "gateway",
            request_id = %request_id,
            method,
            path = request.path(),
            outcome = outcome.as_str(),
            "gateway call finished"
        );
        result
    }

    async fn send_with_replay(
        &self,
        request: &ApiRequest,
        request_id: &Uuid,
    ) -> Result<ApiResponse, GatewayError> {
        // The session this request speaks for; a refresh only applies to it.
        let session = self.store.get();
        let mut credential = session.bearer_token().map(str::to_string);
        let mut replays = 0;

        loop {
            let response = self
                .dispatch(request, credential.as_deref(), request_id, replays)
                .await?;
            if response.status != StatusCode::UNAUTHORIZED {
                return Ok(response);
            }

            if replays >= MAX_REPLAYS {
                warn!(
                    event_name = "gateway.request.unauthorized_after_refresh",
                    event_domain = "gateway",
                    request_id = %request_id,
                    path = request.path(),
                    "request still unauthorized after token renewal"
                );
                return Err(GatewayError::Unauthorized(Box::new(response)));
            }
            replays += 1;

            match self.refresher.refresh(&session).await {
                Ok(access_token) => credential = Some(access_token),
                Err(RefreshError::NoSession) => {
                    if let Some(suppressed_count) = self
                        .throttle
                        .should_emit("gateway.request.unauthorized_without_refresh_token")
                    {
                        warn!(
                            event_name = "gateway.request.unauthorized_without_refresh_token",
                            event_domain = "gateway",
                            request_id = %request_id,
                            path = request.path(),
                            suppressed_count,
                            "unauthorized and no refresh token stored"
                        );
                    }
                    return Err(GatewayError::Unauthorized(Box::new(response)));
                }
                Err(RefreshError::SessionChanged) => {
                    debug!(
                        event_name = "gateway.request.session_changed",
                        event_domain = "gateway",
                        request_id = %request_id,
                        path = request.path(),
                        "session replaced while in flight; not replaying"
                    );
                    return Err(GatewayError::Unauthorized(Box::new(response)));
                }
                Err(e) => return Err(GatewayError::SessionRevoked(e)),
            }
        }
    }

    async fn dispatch(
        &self,
        request: &ApiRequest,
        credential: Option<&str>,
        request_id: &Uuid,
        attempt: u8,
    ) -> Result<ApiResponse, GatewayError> {
        let url = self.api.url(request.path());

        let mut headers = request.headers().clone();
        headers.remove(AUTHORIZATION);
        let mut builder = self
            .client
            .request(request.method().clone(), &url)
            .headers(headers);
        if let Some(token) = credential {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = request.body() {
            builder = builder.json(body);
        }

        debug!(
            event_name = "gateway.request.sent",
            event_domain = "gateway",
            request_id = %request_id,
            method = request.method().as_str(),
            path = request.path(),
            attempt,
            authenticated = credential.is_some(),
            "sending request"
        );

        let network_error = |source| GatewayError::Network {
            path: request.path().to_string(),
            source,
        };
        let response = builder.send().await.map_err(network_error)?;
        let response = ApiResponse::read(response).await.map_err(network_error)?;

        debug!(
            event_name = "gateway.response.received",
            event_domain = "gateway",
            request_id = %request_id,
            status = response.status.as_u16(),
            "response received"
        );
        Ok(response)
    }

    /// Sends `request` and decodes a successful JSON body. Non-success
    /// statuses become `GatewayError::Status`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: &ApiRequest,
    ) -> Result<T, GatewayError> {
        let response = self.send(request).await?;
        if !response.is_success() {
            return Err(GatewayError::Status(Box::new(response)));
        }
        Ok(response.json()?)
    }

    pub async fn get(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(&ApiRequest::get(path)).await
    }

    pub async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(&ApiRequest::post(path).json(body)?).await
    }

    pub async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse, GatewayError> {
        self.send(&ApiRequest::put(path).json(body)?).await
    }

    pub async fn delete(&self, path: &str) -> Result<ApiResponse, GatewayError> {
        self.send(&ApiRequest::delete(path)).await
    }
}
