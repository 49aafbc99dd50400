use std::sync::Arc;
use std::time::Duration;

use array_protocol::{is_session_expired_code, ArrayError, Document};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock, Semaphore};
use tracing::{debug, warn};

/// Response header carrying the auth token, fixed on both sides (spec
/// §4.A, §6.1).
const AUTH_TOKEN_HEADER: &str = "iBaseToken";

const LOGIN_PATH: &str = "/deviceManager/rest/xxxxx/sessions";
const LOGOUT_PATH_SUFFIX: &str = "/sessions";
const KEEPALIVE_PATH: &str = "/deviceManager/rest/xxxxx/keepalivetimeout";

/// Paths that are never logged, even at debug level (spec §4.A: "Logging of
/// request/response is suppressed for a fixed set of paths").
fn is_quiet_path(path: &str) -> bool {
    path == LOGIN_PATH
        || path.ends_with(LOGOUT_PATH_SUFFIX)
        || path == KEEPALIVE_PATH
        || path.contains("storagepool")
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub urls: Vec<String>,
    pub user: String,
    pub password: String,
    pub vstore: Option<String>,
    pub parallel_num: usize,
    pub insecure_skip_verify: bool,
    pub request_timeout: Duration,
}

impl SessionConfig {
    /// Clamps `parallel_num` to `[20, 1000]` per spec §3 ("default 50,
    /// clamped to [20, 1000]").
    pub fn clamped_parallel_num(&self) -> usize {
        self.parallel_num.clamp(20, 1000)
    }
}

/// Session Client (spec §4.A). Holds base URL, credentials, auth token,
/// bounded request concurrency; safe for concurrent use, with at most one
/// relogin in flight at any instant.
pub struct Session {
    base_url: String,
    config: SessionConfig,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
    relogin_lock: Mutex<()>,
    permits: Arc<Semaphore>,
}

impl Session {
    pub fn new(config: SessionConfig) -> Result<Self, ArrayError> {
        let base_url = config
            .urls
            .first()
            .cloned()
            .ok_or_else(|| ArrayError::InvalidConfig("urls must not be empty".into()))?;
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ArrayError::Network(e.to_string()))?;
        let capacity = config.clamped_parallel_num();
        Ok(Self {
            base_url,
            permits: Arc::new(Semaphore::new(capacity)),
            http,
            token: RwLock::new(None),
            relogin_lock: Mutex::new(()),
            config,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POSTs credentials to the login endpoint; on success stores the
    /// returned auth token and clears any prior token. Fails with
    /// `AuthFailed` if the response code is nonzero (spec §4.A).
    pub async fn login(&self) -> Result<(), ArrayError> {
        let body = serde_json::json!({
            "userName": self.config.user,
            "password": self.config.password,
            "scope": self.config.vstore.clone().unwrap_or_default(),
        });
        let (headers, doc) = self.send_raw(Method::POST, LOGIN_PATH, Some(body), true).await?;
        let code = doc.opt_i64_field("result_code").unwrap_or(0);
        if code != 0 {
            return Err(ArrayError::AuthFailed(format!(
                "login rejected with code {code}"
            )));
        }
        let token = headers
            .get(AUTH_TOKEN_HEADER)
            .ok_or_else(|| ArrayError::AuthFailed("login response missing auth token".into()))?;
        *self.token.write().await = Some(token.clone());
        Ok(())
    }

    /// Best-effort logout; clears the token regardless of outcome.
    /// Idempotent (spec §4.A).
    pub async fn logout(&self) {
        let path = format!("{LOGOUT_PATH_SUFFIX}");
        let _ = self.call(Method::DELETE, &path, None, "logout").await;
        *self.token.write().await = None;
    }

    /// Periodic keepalive; failure is logged, never propagated (spec §4.A).
    pub async fn keep_alive(&self) {
        if let Err(e) = self.call(Method::POST, KEEPALIVE_PATH, None, "keepalive").await {
            warn!(error = %e, "keepalive failed");
        }
    }

    /// Performs one JSON request with automatic single relogin on
    /// auth-expired (spec §4.A). `op` labels the call for error
    /// classification and logging; it is not a REST path.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        op: &str,
    ) -> Result<Document, ArrayError> {
        match self.call_once(method.clone(), path, body.clone()).await {
            Ok(doc) => Ok(doc),
            Err(ArrayError::Network(_)) => {
                // Network dropout: one retry via the relogin path (spec
                // §4.A: "On network failure mapped to unconnected, retry
                // once via a relogin path").
                self.relogin().await?;
                self.call_once(method, path, body).await
            }
            Err(ArrayError::Server { code, .. }) if is_session_expired_code(code) => {
                self.relogin().await?;
                self.call_once(method, path, body)
                    .await
                    .map_err(|e| match e {
                        ArrayError::Server { code, .. } => ArrayError::Server {
                            code,
                            op: op.to_string(),
                        },
                        other => other,
                    })
            }
            Err(ArrayError::Server { code, .. }) => Err(ArrayError::Server {
                code,
                op: op.to_string(),
            }),
            Err(other) => Err(other),
        }
    }

    async fn call_once(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Document, ArrayError> {
        let (_, doc) = self.send_raw(method, path, body, false).await?;
        if let Some(code) = doc.opt_i64_field("result_code") {
            if code != 0 {
                return Err(ArrayError::Server {
                    code,
                    op: path.to_string(),
                });
            }
        } else if let Some(obj) = doc.as_value().get("result").and_then(Value::as_object) {
            if let Some(code) = obj.get("code").and_then(Value::as_i64) {
                if code != 0 {
                    return Err(ArrayError::Server {
                        code,
                        op: path.to_string(),
                    });
                }
            }
        }
        Ok(doc)
    }

    /// Low-level send: acquires a concurrency permit, attaches the current
    /// token (except for login), sends the request, and parses JSON.
    async fn send_raw(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        is_login: bool,
    ) -> Result<(std::collections::HashMap<String, String>, Document), ArrayError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| ArrayError::Network(e.to_string()))?;

        let quiet = is_quiet_path(path);
        if !quiet {
            debug!(path, method = %method, "array request");
        }

        let url = format!("{}{}", self.base_url, path);
        let mut req = self
            .http
            .request(method, &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::REFERER, self.base_url.clone());

        if !is_login {
            if let Some(token) = self.token.read().await.clone() {
                req = req.header(AUTH_TOKEN_HEADER, token);
            }
        }
        if let Some(body) = body {
            req = req.json(&body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ArrayError::Network(format!("unconnected: {e}")))?;

        let mut headers = std::collections::HashMap::new();
        for (name, value) in resp.headers() {
            if let Ok(v) = value.to_str() {
                headers.insert(name.as_str().to_string(), v.to_string());
            }
        }
        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ArrayError::Network(e.to_string()))?;
        if status == StatusCode::NO_CONTENT || text.trim().is_empty() {
            return Ok((headers, Document::new(serde_json::json!({}))));
        }
        let value: Value = serde_json::from_str(&text)
            .map_err(|e| ArrayError::Decode(format!("invalid JSON from {path}: {e}")))?;
        if !quiet {
            debug!(path, %status, "array response");
        }
        Ok((headers, Document::new(value)))
    }

    /// Relogin protocol (spec §4.A, critical): a mutex serializes
    /// reloginers. On entry, the caller captures the current token; after
    /// taking the lock it re-reads the token. If it changed since capture,
    /// another caller already reloginned and we return success without
    /// calling `login` again. Otherwise we call `logout` (if we had a
    /// token) then `login`.
    ///
    /// This double-checked re-read under the lock must not be "optimized
    /// away" (spec §9 design note) — it is what bounds concurrent relogins
    /// to exactly one.
    async fn relogin(&self) -> Result<(), ArrayError> {
        let observed = self.token.read().await.clone();
        let _guard = self.relogin_lock.lock().await;
        let current = self.token.read().await.clone();
        if current != observed {
            // Someone else already refreshed the token while we waited for
            // the lock; reuse it.
            return Ok(());
        }
        if current.is_some() {
            self.logout_inner().await;
        }
        self.login().await
    }

    async fn logout_inner(&self) {
        let path = format!("{LOGOUT_PATH_SUFFIX}");
        let _ = self.call_once(Method::DELETE, &path, None).await;
        *self.token.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base: &str) -> SessionConfig {
        SessionConfig {
            urls: vec![base.to_string()],
            user: "admin".into(),
            password: "pw".into(),
            vstore: None,
            parallel_num: 20,
            insecure_skip_verify: true,
            request_timeout: Duration::from_secs(5),
        }
    }

    #[tokio::test]
    async fn login_stores_token_from_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header(AUTH_TOKEN_HEADER, "tok-1")
                    .set_body_json(serde_json::json!({"result_code": 0})),
            )
            .mount(&server)
            .await;

        let session = Session::new(test_config(&server.uri())).unwrap();
        session.login().await.unwrap();
        assert_eq!(session.token.read().await.as_deref(), Some("tok-1"));
    }

    #[tokio::test]
    async fn login_failure_surfaces_auth_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"result_code": 5})),
            )
            .mount(&server)
            .await;

        let session = Session::new(test_config(&server.uri())).unwrap();
        let err = session.login().await.unwrap_err();
        assert!(matches!(err, ArrayError::AuthFailed(_)));
    }

    #[tokio::test]
    async fn call_relogins_once_on_session_expired_then_retries() {
        let server = MockServer::start().await;
        let login_calls = Arc::new(AtomicUsize::new(0));
        let login_calls_clone = login_calls.clone();

        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(move |_: &wiremock::Request| {
                login_calls_clone.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(200)
                    .insert_header(AUTH_TOKEN_HEADER, "fresh-token")
                    .set_body_json(serde_json::json!({"result_code": 0}))
            })
            .mount(&server)
            .await;

        let call_count = Arc::new(AtomicUsize::new(0));
        let call_count_clone = call_count.clone();
        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(move |_: &wiremock::Request| {
                let n = call_count_clone.fetch_add(1, Ordering::SeqCst);
                if n == 0 {
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"result_code": 1077949069}))
                } else {
                    ResponseTemplate::new(200).set_body_json(serde_json::json!({"result_code": 0, "data": {}}))
                }
            })
            .mount(&server)
            .await;

        let session = Session::new(test_config(&server.uri())).unwrap();
        *session.token.write().await = Some("stale-token".into());
        let result = session
            .call(Method::GET, "/thing", None, "query-thing")
            .await;
        assert!(result.is_ok(), "{result:?}");
        assert_eq!(login_calls.load(Ordering::SeqCst), 1);
    }

    /// Spec §8: "under N concurrent calls observing simultaneous
    /// auth-expired responses, `login` is invoked at most once".
    #[tokio::test]
    async fn concurrent_relogins_collapse_to_a_single_login() {
        let server = MockServer::start().await;
        let login_calls = Arc::new(AtomicUsize::new(0));
        let login_calls_clone = login_calls.clone();

        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(move |_: &wiremock::Request| {
                login_calls_clone.fetch_add(1, Ordering::SeqCst);
                ResponseTemplate::new(200)
                    .insert_header(AUTH_TOKEN_HEADER, "fresh-token")
                    .set_body_json(serde_json::json!({"result_code": 0}))
            })
            .mount(&server)
            .await;

        // Any request without the fresh token is treated as session-expired;
        // once the fresh token is attached it succeeds.
        Mock::given(method("GET"))
            .and(path("/thing"))
            .respond_with(|req: &wiremock::Request| {
                let has_fresh = req
                    .headers
                    .get(AUTH_TOKEN_HEADER)
                    .map(|v| v.to_str().unwrap() == "fresh-token")
                    .unwrap_or(false);
                if has_fresh {
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"result_code": 0, "data": {}}))
                } else {
                    ResponseTemplate::new(200)
                        .set_body_json(serde_json::json!({"result_code": 1077949069}))
                }
            })
            .mount(&server)
            .await;

        let session = Arc::new(Session::new(test_config(&server.uri())).unwrap());
        *session.token.write().await = Some("stale-token".into());

        let mut handles = Vec::new();
        for _ in 0..10 {
            let session = session.clone();
            handles.push(tokio::spawn(async move {
                session.call(Method::GET, "/thing", None, "query-thing").await
            }));
        }
        for h in handles {
            assert!(h.await.unwrap().is_ok());
        }
        assert_eq!(login_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn parallel_num_is_clamped_to_bounds() {
        let cfg_low = SessionConfig {
            parallel_num: 1,
            ..test_config("https://example.invalid")
        };
        assert_eq!(cfg_low.clamped_parallel_num(), 20);
        let cfg_high = SessionConfig {
            parallel_num: 5000,
            ..test_config("https://example.invalid")
        };
        assert_eq!(cfg_high.clamped_parallel_num(), 1000);
    }
}
