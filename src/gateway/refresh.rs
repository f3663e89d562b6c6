use std::sync::{Arc, Mutex};

use futures::future::{BoxFuture, FutureExt, Shared};
use tracing::{debug, info, warn};

use super::error::RefreshError;
use super::listener::SessionListener;
use crate::metrics::{Metrics, MetricsRecorder};
use crate::models::{ApiResponse, RefreshRequest, RefreshResponse, Session};
use crate::store::SessionStore;

type RefreshFuture = Shared<BoxFuture<'static, Result<String, RefreshError>>>;

/// An exchange in progress, keyed by the refresh token it spends.
struct Inflight {
    refresh_token: String,
    future: RefreshFuture,
}

/// Exchanges the refresh token for a new access token.
///
/// The refresh call goes straight to the HTTP client and never through
/// [`Gateway::send`](super::Gateway::send), so it is never itself refreshed.
/// Refreshes are single-flight per session: while one is in progress, every
/// other caller holding the same refresh token awaits the same result instead
/// of starting another exchange. The outcome is applied to the store once per
/// exchange, and only if the store still holds the session that was refreshed.
pub struct TokenRefresher {
    client: reqwest::Client,
    refresh_url: String,
    login_entry_point: String,
    store: Arc<dyn SessionStore>,
    listener: Arc<dyn SessionListener>,
    metrics: Metrics,
    inflight: Mutex<Option<Inflight>>,
}

impl TokenRefresher {
    pub fn new(
        client: reqwest::Client,
        refresh_url: String,
        login_entry_point: String,
        store: Arc<dyn SessionStore>,
        listener: Arc<dyn SessionListener>,
        metrics: Metrics,
    ) -> Self {
        TokenRefresher {
            client,
            refresh_url,
            login_entry_point,
            store,
            listener,
            metrics,
            inflight: Mutex::new(None),
        }
    }

    /// Returns an access token to replay with after a request sent with
    /// `sent` drew a 401.
    ///
    /// - `NoSession` when `sent` or the store has no refresh token.
    /// - `SessionChanged` when the store now holds a different session; the
    ///   request belongs to a session that no longer exists.
    /// - The stored access token, without an exchange, when another call
    ///   already renewed this session's token.
    /// - Otherwise the result of exchanging the refresh token, joining an
    ///   in-flight exchange for the same token if there is one.
    pub async fn refresh(&self, sent: &Session) -> Result<String, RefreshError> {
        let Some(refresh_token) = sent.refresh_token() else {
            return Err(RefreshError::NoSession);
        };

        let future = {
            let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
            let joined = slot
                .as_ref()
                .filter(|inflight| inflight.refresh_token == refresh_token)
                .map(|inflight| inflight.future.clone());
            if let Some(future) = joined {
                debug!(
                    event_name = "gateway.refresh.joined",
                    event_domain = "gateway",
                    "joining in-flight token refresh"
                );
                future
            } else {
                // Checked under the lock: a finished refresh updates the
                // store before it leaves the slot.
                let current = self.store.get();
                match current.refresh_token() {
                    None => return Err(RefreshError::NoSession),
                    Some(stored) if stored != refresh_token => {
                        debug!(
                            event_name = "gateway.refresh.session_changed",
                            event_domain = "gateway",
                            "session replaced since the request was sent"
                        );
                        return Err(RefreshError::SessionChanged);
                    }
                    Some(_) => {}
                }
                if let Some(renewed) = current.bearer_token() {
                    if sent.bearer_token() != Some(renewed) {
                        debug!(
                            event_name = "gateway.refresh.already_renewed",
                            event_domain = "gateway",
                            "access token was renewed by another call"
                        );
                        return Ok(renewed.to_string());
                    }
                }
                let future = self.start(refresh_token.to_string());
                *slot = Some(Inflight {
                    refresh_token: refresh_token.to_string(),
                    future: future.clone(),
                });
                future
            }
        };

        let result = future.clone().await;

        let mut slot = self.inflight.lock().unwrap_or_else(|e| e.into_inner());
        if slot
            .as_ref()
            .is_some_and(|inflight| inflight.future.ptr_eq(&future))
        {
            *slot = None;
        }
        result
    }

    fn start(&self, refresh_token: String) -> RefreshFuture {
        let client = self.client.clone();
        let url = self.refresh_url.clone();
        let login_entry_point = self.login_entry_point.clone();
        let store = self.store.clone();
        let listener = self.listener.clone();
        let metrics = self.metrics.clone();

        async move {
            debug!(
                event_name = "gateway.refresh.started",
                event_domain = "gateway",
                "exchanging refresh token for a new access token"
            );
            match exchange(&client, &url, &refresh_token).await {
                Ok(access_token) => {
                    if !store.set_access_token_if(&refresh_token, &access_token) {
                        metrics.record_refresh_attempt("discarded");
                        info!(
                            event_name = "gateway.refresh.discarded",
                            event_domain = "gateway",
                            "session replaced during refresh; new token discarded"
                        );
                        return Err(RefreshError::SessionChanged);
                    }
                    metrics.record_refresh_attempt("ok");
                    info!(
                        event_name = "gateway.refresh.succeeded",
                        event_domain = "gateway",
                        "access token renewed"
                    );
                    Ok(access_token)
                }
                Err(e) => {
                    metrics.record_refresh_attempt("failed");
                    if !store.clear_if(&refresh_token) {
                        info!(
                            event_name = "gateway.refresh.failed_after_session_change",
                            event_domain = "gateway",
                            error = %e,
                            "refresh failed for a session that was already replaced"
                        );
                        return Err(RefreshError::SessionChanged);
                    }
                    metrics.record_session_invalidated();
                    warn!(
                        event_name = "gateway.refresh.failed",
                        event_domain = "gateway",
                        error = %e,
                        redirect = login_entry_point.as_str(),
                        "refresh token failed, logging out"
                    );
                    listener.session_invalidated(&login_entry_point);
                    Err(e)
                }
            }
        }
        .boxed()
        .shared()
    }
}

/// Posts `{refresh}` to the refresh endpoint and extracts `access`.
async fn exchange(
    client: &reqwest::Client,
    url: &str,
    refresh_token: &str,
) -> Result<String, RefreshError> {
    let response = client
        .post(url)
        .json(&RefreshRequest {
            refresh: refresh_token,
        })
        .send()
        .await
        .map_err(|e| RefreshError::Transport(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        let message = ApiResponse::read(response)
            .await
            .ok()
            .and_then(|body| body.error_message());
        return Err(RefreshError::Rejected { status, message });
    }

    let body = response
        .json::<RefreshResponse>()
        .await
        .map_err(|e| RefreshError::MalformedResponse(e.to_string()))?;
    if body.access.is_empty() {
        return Err(RefreshError::MalformedResponse(
            "empty access token".to_string(),
        ));
    }
    Ok(body.access)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::listener::ChannelListener;
    use crate::models::Role;
    use crate::store::MemoryStore;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::io::Write;

    fn refresher(
        url: String,
        store: Arc<dyn SessionStore>,
    ) -> (TokenRefresher, tokio::sync::mpsc::UnboundedReceiver<crate::gateway::Navigation>) {
        let (listener, rx) = ChannelListener::new();
        let refresher = TokenRefresher::new(
            reqwest::Client::new(),
            url,
            "/login".to_string(),
            store,
            Arc::new(listener),
            Metrics::new().unwrap(),
        );
        (refresher, rx)
    }

    fn sent(access_token: &str, refresh_token: &str) -> Session {
        Session::from_parts(
            Some(access_token.to_string()),
            Some(refresh_token.to_string()),
            None,
            None,
        )
    }

    /// A refresh endpoint that answers after `delay_ms`.
    async fn slow_refresh_mock(
        server: &mut mockito::ServerGuard,
        status: usize,
        body: &'static str,
        delay_ms: u64,
    ) -> mockito::Mock {
        server
            .mock("POST", "/token/refresh/")
            .with_status(status)
            .with_chunked_body(move |w| {
                std::thread::sleep(std::time::Duration::from_millis(delay_ms));
                w.write_all(body.as_bytes())
            })
            .expect(1)
            .create_async()
            .await
    }

    #[tokio::test]
    async fn test_refresh_success_updates_only_access_token() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/token/refresh/")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Json(json!({"refresh": "R1"})))
            .with_status(200)
            .with_body(r#"{"access": "A2"}"#)
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.save("A1", "R1", Some("alice"), Some(Role::Admin));
        let (refresher, mut rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        let token = refresher.refresh(&sent("A1", "R1")).await.unwrap();

        m.assert_async().await;
        assert_eq!(token, "A2");
        let session = store.get();
        assert_eq!(session.access_token.as_deref(), Some("A2"));
        assert_eq!(session.refresh_token.as_deref(), Some("R1"));
        assert_eq!(session.display_name.as_deref(), Some("alice"));
        assert_eq!(session.role, Some(Role::Admin));
        assert!(rx.try_recv().is_err(), "no navigation on success");
    }

    #[tokio::test]
    async fn test_rejected_refresh_clears_store_and_navigates() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token/refresh/")
            .with_status(403)
            .with_body(r#"{"error": "Invalid refresh token"}"#)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.save("A1", "R1", Some("alice"), Some(Role::User));
        let (refresher, mut rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        let err = refresher.refresh(&sent("A1", "R1")).await.unwrap_err();

        match err {
            RefreshError::Rejected { status, message } => {
                assert_eq!(status.as_u16(), 403);
                assert_eq!(message.as_deref(), Some("Invalid refresh token"));
            }
            other => panic!("Expected Rejected, got {:?}", other),
        }
        assert!(!store.get().is_authenticated());
        assert_eq!(rx.try_recv().unwrap().to, "/login");
        assert!(rx.try_recv().is_err(), "exactly one navigation");
    }

    #[tokio::test]
    async fn test_response_without_access_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/token/refresh/")
            .with_status(200)
            .with_body(r#"{"token": "A2"}"#)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.save("A1", "R1", None, None);
        let (refresher, _rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        let err = refresher.refresh(&sent("A1", "R1")).await.unwrap_err();
        assert!(matches!(err, RefreshError::MalformedResponse(_)));
        assert!(!store.get().is_authenticated());
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_share_one_exchange() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/token/refresh/")
            .with_status(200)
            .with_body(r#"{"access": "A2"}"#)
            .expect(1)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.save("A1", "R1", None, None);
        let (refresher, _rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        let (s1, s2, s3) = (sent("A1", "R1"), sent("A1", "R1"), sent("A1", "R1"));
        let (a, b, c) = tokio::join!(
            refresher.refresh(&s1),
            refresher.refresh(&s2),
            refresher.refresh(&s3)
        );

        m.assert_async().await;
        assert_eq!(a.unwrap(), "A2");
        assert_eq!(b.unwrap(), "A2");
        assert_eq!(c.unwrap(), "A2");
    }

    #[tokio::test]
    async fn test_sequential_refreshes_each_call_the_endpoint() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/token/refresh/")
            .with_status(200)
            .with_body(r#"{"access": "A2"}"#)
            .expect(2)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.save("A1", "R1", None, None);
        let (refresher, _rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        refresher.refresh(&sent("A1", "R1")).await.unwrap();
        // The renewed token expired in turn.
        refresher.refresh(&sent("A2", "R1")).await.unwrap();

        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_token_renewed_elsewhere_skips_exchange() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/token/refresh/")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.save("A2", "R1", None, None);
        let (refresher, _rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        assert_eq!(refresher.refresh(&sent("A1", "R1")).await.unwrap(), "A2");
        m.assert_async().await;
    }

    #[tokio::test]
    async fn test_no_refresh_token_is_no_session() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/token/refresh/")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        let (refresher, mut rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        let err = refresher.refresh(&Session::default()).await.unwrap_err();

        m.assert_async().await;
        assert!(matches!(err, RefreshError::NoSession));
        assert!(rx.try_recv().is_err(), "nothing to invalidate");
    }

    #[tokio::test]
    async fn test_replaced_session_is_not_refreshed() {
        let mut server = Server::new_async().await;
        let m = server
            .mock("POST", "/token/refresh/")
            .expect(0)
            .create_async()
            .await;

        let store = Arc::new(MemoryStore::new());
        store.save("B1", "RB", Some("bob"), Some(Role::User));
        let (refresher, mut rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        let err = refresher.refresh(&sent("A1", "R1")).await.unwrap_err();

        m.assert_async().await;
        assert!(matches!(err, RefreshError::SessionChanged));
        assert_eq!(store.get().access_token.as_deref(), Some("B1"));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_token_renewed_for_replaced_session_is_discarded() {
        let mut server = Server::new_async().await;
        let m = slow_refresh_mock(&mut server, 200, r#"{"access": "A2"}"#, 400).await;

        let store = Arc::new(MemoryStore::new());
        store.save("A1", "R1", Some("alice"), Some(Role::Admin));
        let (refresher, mut rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        let switch_user = async {
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;
            store.clear();
            store.save("B1", "RB", Some("bob"), Some(Role::User));
        };
        let sent_session = sent("A1", "R1");
        let (result, ()) = tokio::join!(refresher.refresh(&sent_session), switch_user);

        m.assert_async().await;
        assert!(matches!(result, Err(RefreshError::SessionChanged)));
        let session = store.get();
        assert_eq!(session.access_token.as_deref(), Some("B1"));
        assert_eq!(session.refresh_token.as_deref(), Some("RB"));
        assert_eq!(session.display_name.as_deref(), Some("bob"));
        assert!(rx.try_recv().is_err(), "the new session is not logged out");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_failed_refresh_leaves_replacing_session_alone() {
        let mut server = Server::new_async().await;
        let m = slow_refresh_mock(&mut server, 403, r#"{"error": "expired"}"#, 400).await;

        let store = Arc::new(MemoryStore::new());
        store.save("A1", "R1", Some("alice"), Some(Role::Admin));
        let (refresher, mut rx) =
            refresher(format!("{}/token/refresh/", server.url()), store.clone());

        let switch_user = async {
            tokio::time::sleep(std::time::Duration::from_millis(150)).await;
            store.save("B1", "RB", Some("bob"), Some(Role::User));
        };
        let sent_session = sent("A1", "R1");
        let (result, ()) = tokio::join!(refresher.refresh(&sent_session), switch_user);

        m.assert_async().await;
        assert!(matches!(result, Err(RefreshError::SessionChanged)));
        assert_eq!(store.get().access_token.as_deref(), Some("B1"));
        assert!(rx.try_recv().is_err(), "no navigation for a replaced session");
    }
}
