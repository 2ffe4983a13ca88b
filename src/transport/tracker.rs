//! Issue-tracker REST API.
//!
//! [`JiraClient`] talks JSON over HTTP and authenticates with a session
//! cookie obtained from `rest/auth/1/session`. An unauthorized response
//! invalidates the session and retries, up to [`MAX_ATTEMPTS`] times.

use super::credentials::CredentialSource;
use crate::error::{Result, TemplaterError};
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
use reqwest::{Method, StatusCode, Url};
use serde_json::{Value, json};
use std::time::Duration;

/// Attempts for session refresh and for password retries.
pub const MAX_ATTEMPTS: usize = 3;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const SESSION_PATH: &str = "rest/auth/1/session";
const ISSUE_PATH: &str = "rest/api/2/issue/";

/// Operations the tracker variant needs.
pub trait TrackerApi {
    /// Create an issue from rendered fields; returns the issue key.
    fn create_issue(&mut self, fields: &Value) -> Result<String>;

    /// Apply fields and/or one partial-update action to an issue.
    fn update_issue(&mut self, key: &str, fields: Option<&Value>, update: Option<&Value>) -> Result<()>;

    fn add_watcher(&mut self, key: &str, watcher: &Value) -> Result<()>;
}

/// Blocking HTTP client for a Jira-compatible API.
pub struct JiraClient {
    base: Url,
    user: Option<String>,
    service: String,
    credentials: Box<dyn CredentialSource>,
    http: Client,
    session: Option<String>,
}

impl JiraClient {
    /// # Arguments
    ///
    /// * `base` - API root, e.g. `https://jira.example.com`
    /// * `user` - Login; without it requests are sent unauthenticated
    /// * `service` - Name passwords are looked up under
    pub fn new(
        base: &str,
        user: Option<String>,
        service: String,
        credentials: Box<dyn CredentialSource>,
    ) -> Result<Self> {
        let mut base = Url::parse(base).map_err(|e| {
            TemplaterError::Configuration(format!("invalid jira address '{}': {}", base, e))
        })?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TemplaterError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base,
            user,
            service,
            credentials,
            http,
            session: None,
        })
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .map_err(|e| TemplaterError::Configuration(format!("invalid API path '{}': {}", path, e)))
    }

    /// Send one request; `Ok(None)` for 204 No Content.
    fn request(&mut self, method: Method, path: &str, body: Option<&Value>) -> Result<Option<Value>> {
        let url = self.url(path)?;
        tracing::debug!("{} {} {:?} {:?}", method, path, self.user, body);

        for attempt in 1..=MAX_ATTEMPTS {
            let mut request = self
                .http
                .request(method.clone(), url.clone())
                .header(CONTENT_TYPE, "application/json");
            if self.user.is_some() {
                request = request.header(COOKIE, self.session_cookie()?);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            let response = request
                .send()
                .map_err(|e| TemplaterError::Transport(format!("{} {} failed: {}", method, path, e)))?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED && self.user.is_some() {
                tracing::info!("bad session cookie, refreshing (attempt {})", attempt);
                self.session = None;
                continue;
            }
            if !status.is_success() {
                let text = response.text().unwrap_or_default();
                tracing::error!("{} {} {}", status, path, text);
                return Err(TemplaterError::Transport(format!(
                    "{} {} returned {}: {}",
                    method, path, status, text
                )));
            }
            if status == StatusCode::NO_CONTENT {
                return Ok(None);
            }

            let text = response
                .text()
                .map_err(|e| TemplaterError::Transport(format!("failed to read response: {}", e)))?;
            if text.trim().is_empty() {
                return Ok(None);
            }
            let value: Value = serde_json::from_str(&text)
                .map_err(|e| TemplaterError::Transport(format!("invalid JSON response: {}", e)))?;
            tracing::debug!("{}", value);
            return Ok(Some(value));
        }

        Err(TemplaterError::Transport(format!(
            "{} {} still unauthorized after {} attempts",
            method, path, MAX_ATTEMPTS
        )))
    }

    /// Current session cookie, logging in when there is none.
    fn session_cookie(&mut self) -> Result<String> {
        if let Some(cookie) = &self.session {
            return Ok(cookie.clone());
        }
        let user = self.user.clone().unwrap_or_default();
        let url = self.url(SESSION_PATH)?;

        let mut wrong_password = false;
        for _ in 0..MAX_ATTEMPTS {
            let password = self.credentials.password(&self.service, &user, wrong_password)?;
            tracing::debug!("POST {} {} (password redacted)", SESSION_PATH, user);
            let response = self
                .http
                .post(url.clone())
                .json(&json!({ "username": user, "password": password }))
                .send()
                .map_err(|e| TemplaterError::Transport(format!("login failed: {}", e)))?;

            if response.status() == StatusCode::UNAUTHORIZED {
                tracing::warn!("Wrong password");
                wrong_password = true;
                continue;
            }
            if !response.status().is_success() {
                return Err(TemplaterError::Transport(format!(
                    "login returned {}",
                    response.status()
                )));
            }

            let cookie = response
                .headers()
                .get_all(SET_COOKIE)
                .iter()
                .filter_map(|v| v.to_str().ok())
                .filter_map(|v| v.split(';').next())
                .collect::<Vec<_>>()
                .join("; ");
            self.session = Some(cookie.clone());
            return Ok(cookie);
        }

        Err(TemplaterError::Transport(
            "unable to get session from jira".to_string(),
        ))
    }
}

impl TrackerApi for JiraClient {
    fn create_issue(&mut self, fields: &Value) -> Result<String> {
        let result = self.request(Method::POST, ISSUE_PATH, Some(&json!({ "fields": fields })))?;
        result
            .as_ref()
            .and_then(|r| r.get("key"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| TemplaterError::Transport("create response has no issue key".to_string()))
    }

    fn update_issue(&mut self, key: &str, fields: Option<&Value>, update: Option<&Value>) -> Result<()> {
        let mut body = serde_json::Map::new();
        if let Some(fields) = fields {
            body.insert("fields".to_string(), fields.clone());
        }
        if let Some(update) = update {
            body.insert("update".to_string(), update.clone());
        }
        let path = format!("{}{}", ISSUE_PATH, key);
        self.request(Method::PUT, &path, Some(&Value::Object(body)))?;
        Ok(())
    }

    fn add_watcher(&mut self, key: &str, watcher: &Value) -> Result<()> {
        let path = format!("{}{}/watchers", ISSUE_PATH, key);
        self.request(Method::POST, &path, Some(watcher))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NoCredentials;

    impl CredentialSource for NoCredentials {
        fn password(&mut self, _: &str, _: &str, _: bool) -> Result<String> {
            Ok(String::new())
        }
    }

    fn client(base: &str) -> Result<JiraClient> {
        JiraClient::new(base, None, "jira".to_string(), Box::new(NoCredentials))
    }

    #[test]
    fn api_paths_join_under_base_path() {
        let c = client("https://jira.example.com/tracker").unwrap();
        assert_eq!(
            c.url("rest/api/2/issue/OPS-1").unwrap().as_str(),
            "https://jira.example.com/tracker/rest/api/2/issue/OPS-1"
        );

        let c = client("https://jira.example.com").unwrap();
        assert_eq!(
            c.url(ISSUE_PATH).unwrap().as_str(),
            "https://jira.example.com/rest/api/2/issue/"
        );
    }

    #[test]
    fn invalid_base_is_configuration_error() {
        let err = client("not a url").err().unwrap();
        assert!(matches!(err, TemplaterError::Configuration(_)));
    }

    mod http {
        use super::*;
        use reqwest::Method;
        use serde_json::json;
        use std::sync::{Arc, Mutex};
        use wiremock::matchers::{header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        /// Hands out a fixed password and records each `refresh` flag.
        #[derive(Clone, Default)]
        struct RecordingCredentials {
            calls: Arc<Mutex<Vec<bool>>>,
        }

        impl CredentialSource for RecordingCredentials {
            fn password(&mut self, _: &str, _: &str, refresh: bool) -> Result<String> {
                self.calls.lock().unwrap().push(refresh);
                Ok("pw".to_string())
            }
        }

        /// The blocking client must not run on an async worker thread.
        async fn with_client<T, F>(base: String, creds: RecordingCredentials, f: F) -> T
        where
            T: Send + 'static,
            F: FnOnce(&mut JiraClient) -> T + Send + 'static,
        {
            tokio::task::spawn_blocking(move || {
                let mut client = JiraClient::new(
                    &base,
                    Some("alice".to_string()),
                    "jira".to_string(),
                    Box::new(creds),
                )
                .unwrap();
                f(&mut client)
            })
            .await
            .unwrap()
        }

        async fn mount_session(server: &MockServer, expected: u64) {
            Mock::given(method("POST"))
                .and(path("/rest/auth/1/session"))
                .respond_with(
                    ResponseTemplate::new(200)
                        .insert_header("set-cookie", "JSESSIONID=abc; Path=/")
                        .set_body_json(json!({"session": {"name": "JSESSIONID", "value": "abc"}})),
                )
                .expect(expected)
                .mount(server)
                .await;
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn persistent_unauthorized_gives_up_after_three_attempts() {
            let server = MockServer::start().await;
            mount_session(&server, 3).await;
            Mock::given(method("PUT"))
                .and(path("/rest/api/2/issue/OPS-1"))
                .respond_with(ResponseTemplate::new(401))
                .expect(3)
                .mount(&server)
                .await;

            let creds = RecordingCredentials::default();
            let result = with_client(server.uri(), creds.clone(), |c| {
                c.update_issue("OPS-1", Some(&json!({"summary": "x"})), None)
            })
            .await;

            assert!(matches!(result, Err(TemplaterError::Transport(_))));
            assert_eq!(*creds.calls.lock().unwrap(), vec![false, false, false]);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn unauthorized_once_refreshes_session_and_succeeds() {
            let server = MockServer::start().await;
            mount_session(&server, 2).await;
            Mock::given(method("POST"))
                .and(path("/rest/api/2/issue/"))
                .respond_with(ResponseTemplate::new(401))
                .up_to_n_times(1)
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/rest/api/2/issue/"))
                .and(header("cookie", "JSESSIONID=abc"))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "10", "key": "OPS-7"})))
                .expect(1)
                .mount(&server)
                .await;

            let key = with_client(server.uri(), RecordingCredentials::default(), |c| {
                c.create_issue(&json!({"summary": "Deploy"}))
            })
            .await
            .unwrap();

            assert_eq!(key, "OPS-7");
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn no_content_and_empty_body_yield_none() {
            let server = MockServer::start().await;
            mount_session(&server, 1).await;
            Mock::given(method("PUT"))
                .and(path("/rest/api/2/issue/OPS-1"))
                .respond_with(ResponseTemplate::new(204))
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/rest/api/2/issue/OPS-1/watchers"))
                .respond_with(ResponseTemplate::new(200))
                .mount(&server)
                .await;

            let (put, post) = with_client(server.uri(), RecordingCredentials::default(), |c| {
                let put = c.request(Method::PUT, "rest/api/2/issue/OPS-1", Some(&json!({})));
                let post = c.request(Method::POST, "rest/api/2/issue/OPS-1/watchers", Some(&json!("bob")));
                (put, post)
            })
            .await;

            assert_eq!(put.unwrap(), None);
            assert_eq!(post.unwrap(), None);
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn server_error_is_transport_error_without_retry() {
            let server = MockServer::start().await;
            mount_session(&server, 1).await;
            Mock::given(method("PUT"))
                .and(path("/rest/api/2/issue/OPS-1"))
                .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
                .expect(1)
                .mount(&server)
                .await;

            let err = with_client(server.uri(), RecordingCredentials::default(), |c| {
                c.update_issue("OPS-1", None, Some(&json!({"labels": [{"add": "x"}]})))
            })
            .await
            .unwrap_err();

            match err {
                TemplaterError::Transport(msg) => assert!(msg.contains("500"), "{}", msg),
                other => panic!("unexpected error: {:?}", other),
            }
        }

        #[tokio::test(flavor = "multi_thread")]
        async fn wrong_password_prompts_at_most_three_times() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/rest/auth/1/session"))
                .respond_with(ResponseTemplate::new(401))
                .expect(3)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/rest/api/2/issue/"))
                .respond_with(ResponseTemplate::new(201).set_body_json(json!({"key": "OPS-1"})))
                .expect(0)
                .mount(&server)
                .await;

            let creds = RecordingCredentials::default();
            let result = with_client(server.uri(), creds.clone(), |c| {
                c.create_issue(&json!({"summary": "Deploy"}))
            })
            .await;

            assert!(matches!(result, Err(TemplaterError::Transport(_))));
            assert_eq!(*creds.calls.lock().unwrap(), vec![false, true, true]);
        }
    }
}
