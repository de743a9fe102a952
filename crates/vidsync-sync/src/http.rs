//! reqwest client for the sync server

use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use reqwest::{header::USER_AGENT, Method, RequestBuilder, Response};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use url::Url;

use vidsync_core::config::ServerConfig;
use vidsync_core::types::{
    AccountDataUpdate, DataGet, DataPost, DataPut, DownloadId, DownloadProgress, DownloadRequest,
    FileExtension, KeyWithSyncTime, Registration, SyncTime, SyncTimeWithHash,
};
use vidsync_crypto::ApiCredentials;

use crate::api::{AccountDataApi, DownloadApi, ExtensionDataApi, TransportResult, UserApi};
use crate::error::TransportError;

/// HTTP implementation of every remote API trait.
///
/// Sets timeouts and a user agent, and retries 429/5xx/connect failures with
/// exponential backoff.
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    max_retries: u32,
}

impl HttpRemote {
    pub fn new(base_url: &str, timeout: Duration, max_retries: u32) -> TransportResult<Self> {
        let parsed = Url::parse(base_url).map_err(|e| TransportError::Network {
            url: base_url.to_string(),
            message: format!("invalid base URL: {e}"),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(TransportError::Network {
                url: base_url.to_string(),
                message: "base URL cannot have a path".into(),
            });
        }

        Ok(Self {
            client: reqwest::Client::new(),
            base_url: parsed,
            timeout,
            max_retries,
        })
    }

    /// Build from config.
    ///
    /// If `enforce_tls` is true and the base URL uses HTTP, this returns an error.
    /// Otherwise, a warning is logged for non-HTTPS URLs.
    pub fn from_config(server: &ServerConfig) -> TransportResult<Self> {
        if server.base_url.starts_with("http://") {
            if server.enforce_tls {
                return Err(TransportError::Insecure(format!(
                    "server URL uses plaintext HTTP ({}), but enforce_tls is enabled. \
                     Use an HTTPS URL or set server.enforce_tls = false for local development.",
                    server.base_url
                )));
            }
            tracing::warn!(
                base_url = %server.base_url,
                "server URL uses plaintext HTTP; credentials are transmitted unencrypted"
            );
        }

        Self::new(
            &server.base_url,
            Duration::from_secs(server.timeout_secs),
            server.max_retries,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL plus percent-encoded path segments.
    fn endpoint(&self, segments: &[&str]) -> TransportResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| TransportError::Network {
                url: self.base_url.to_string(),
                message: "base URL cannot have a path".into(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn endpoint_with_id(&self, segments: &[&str], id: &str) -> TransportResult<Url> {
        let mut url = self.endpoint(segments)?;
        url.query_pairs_mut().append_pair("id", id);
        Ok(url)
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        auth: Option<&ApiCredentials>,
    ) -> TransportResult<RequestBuilder> {
        let mut builder = self
            .client
            .request(method, url)
            .timeout(self.timeout)
            .header(USER_AGENT, format!("vidsync/{}", env!("CARGO_PKG_VERSION")));

        if let Some(auth) = auth {
            if auth.username.contains(':') {
                return Err(TransportError::Credentials(
                    "username may not contain a ':'".into(),
                ));
            }
            builder = builder.basic_auth(&auth.username, Some(auth.password.expose_secret()));
        }

        Ok(builder)
    }

    /// Send with retries for transient failures, then reject non-2xx responses.
    async fn send(&self, builder: RequestBuilder) -> TransportResult<Response> {
        let Some(template) = builder.try_clone() else {
            let resp = execute(builder).await?;
            return check_status(resp).await;
        };

        let backoff = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(self.max_retries as usize);

        let resp = (|| async {
            let builder = template.try_clone().ok_or_else(|| {
                RequestHandleError::permanent(
                    "<unknown>".into(),
                    None,
                    "request cannot be retried because it is not cloneable".into(),
                )
            })?;
            execute(builder).await
        })
        .retry(backoff)
        .when(|err: &RequestHandleError| err.retryable)
        .notify(|err: &RequestHandleError, after: Duration| {
            tracing::debug!(url = %err.url, error = %err.message, ?after, "retrying request");
        })
        .await?;

        check_status(resp).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        auth: Option<&ApiCredentials>,
    ) -> TransportResult<T> {
        let resp = self.send(self.request(Method::GET, url, auth)?).await?;
        read_json(resp).await
    }

    async fn send_json<B: serde::Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        auth: Option<&ApiCredentials>,
        body: &B,
    ) -> TransportResult<T> {
        let resp = self
            .send(self.request(method, url, auth)?.json(body))
            .await?;
        read_json(resp).await
    }

    async fn send_empty(
        &self,
        method: Method,
        url: Url,
        auth: Option<&ApiCredentials>,
    ) -> TransportResult<()> {
        self.send(self.request(method, url, auth)?).await?;
        Ok(())
    }
}

#[async_trait]
impl ExtensionDataApi for HttpRemote {
    async fn all_keys(&self, auth: &ApiCredentials) -> TransportResult<Vec<KeyWithSyncTime>> {
        let url = self.endpoint(&["sync", "extension", "allKeys"])?;
        self.get_json(url, Some(auth)).await
    }

    async fn last_sync_time(&self, auth: &ApiCredentials, key: &str) -> TransportResult<SyncTime> {
        let url = self.endpoint(&["sync", "extension", "entry", key, "lastSyncTime"])?;
        self.get_json(url, Some(auth)).await
    }

    async fn get_data(&self, auth: &ApiCredentials, key: &str) -> TransportResult<String> {
        let url = self.endpoint(&["sync", "extension", "entry", key, "data"])?;
        let resp = self
            .send(self.request(Method::GET, url, Some(auth))?)
            .await?;
        let url = resp.url().to_string();
        let text = resp.text().await.map_err(|e| network_error(&url, &e))?;
        parse_data_body(&url, &text)
    }

    async fn post_data(
        &self,
        auth: &ApiCredentials,
        key: &str,
        body: &DataPost,
    ) -> TransportResult<KeyWithSyncTime> {
        let url = self.endpoint(&["sync", "extension", "entry", key, "data"])?;
        self.send_json(Method::POST, url, Some(auth), body).await
    }

    async fn put_data(
        &self,
        auth: &ApiCredentials,
        key: &str,
        body: &DataPut,
    ) -> TransportResult<SyncTime> {
        let url = self.endpoint(&["sync", "extension", "entry", key, "data"])?;
        self.send_json(Method::PUT, url, Some(auth), body).await
    }

    async fn delete_entry(&self, auth: &ApiCredentials, key: &str) -> TransportResult<()> {
        let url = self.endpoint(&["sync", "extension", "entry", key])?;
        self.send_empty(Method::DELETE, url, Some(auth)).await
    }
}

#[async_trait]
impl AccountDataApi for HttpRemote {
    async fn account_last_sync_time(
        &self,
        auth: &ApiCredentials,
    ) -> TransportResult<SyncTimeWithHash> {
        let url = self.endpoint(&["sync", "invidious", "lastSyncTime"])?;
        self.get_json(url, Some(auth)).await
    }

    async fn account_data(&self, auth: &ApiCredentials) -> TransportResult<DataGet> {
        let url = self.endpoint(&["sync", "invidious", "data"])?;
        self.get_json(url, Some(auth)).await
    }

    async fn put_account_data(
        &self,
        auth: &ApiCredentials,
        body: &AccountDataUpdate,
    ) -> TransportResult<SyncTime> {
        let url = self.endpoint(&["sync", "invidious", "data"])?;
        self.send_json(Method::PUT, url, Some(auth), body).await
    }
}

#[async_trait]
impl DownloadApi for HttpRemote {
    async fn request_download(
        &self,
        auth: &ApiCredentials,
        body: &DownloadRequest,
    ) -> TransportResult<DownloadId> {
        let url = self.endpoint(&["download"])?;
        self.send_json(Method::POST, url, Some(auth), body).await
    }

    async fn download_progress(
        &self,
        auth: &ApiCredentials,
        id: &str,
    ) -> TransportResult<DownloadProgress> {
        let url = self.endpoint_with_id(&["download", "progress"], id)?;
        self.get_json(url, Some(auth)).await
    }

    async fn download_extension(
        &self,
        auth: &ApiCredentials,
        id: &str,
    ) -> TransportResult<FileExtension> {
        let url = self.endpoint_with_id(&["download", "extension"], id)?;
        self.get_json(url, Some(auth)).await
    }

    async fn cancel_download(&self, auth: &ApiCredentials, id: &str) -> TransportResult<()> {
        let url = self.endpoint_with_id(&["download"], id)?;
        self.send_empty(Method::DELETE, url, Some(auth)).await
    }
}

#[async_trait]
impl UserApi for HttpRemote {
    async fn register(&self, body: &Registration) -> TransportResult<()> {
        let url = self.endpoint(&["user", "register"])?;
        self.send(self.request(Method::POST, url, None)?.json(body))
            .await?;
        Ok(())
    }

    async fn test_login(&self, auth: &ApiCredentials) -> TransportResult<()> {
        let url = self.endpoint(&["user", "testLogin"])?;
        self.send_empty(Method::GET, url, Some(auth)).await
    }
}

// ── Request execution ─────────────────────────────────────────────────────────

#[derive(Debug)]
struct RequestHandleError {
    url: String,
    status: Option<u16>,
    message: String,
    retryable: bool,
}

impl RequestHandleError {
    fn retryable(url: String, status: Option<u16>, message: String) -> Self {
        Self {
            url,
            status,
            message,
            retryable: true,
        }
    }

    fn permanent(url: String, status: Option<u16>, message: String) -> Self {
        Self {
            url,
            status,
            message,
            retryable: false,
        }
    }
}

impl From<RequestHandleError> for TransportError {
    fn from(e: RequestHandleError) -> Self {
        match e.status {
            Some(status) => TransportError::Status {
                url: e.url,
                status,
                body: e.message,
            },
            None => TransportError::Network {
                url: e.url,
                message: e.message,
            },
        }
    }
}

async fn execute(builder: RequestBuilder) -> Result<Response, RequestHandleError> {
    let (client, request) = builder.build_split();
    let request = request.map_err(|err| {
        RequestHandleError::permanent(
            err.url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| "<unknown>".to_string()),
            None,
            format!("request build failed: {err}"),
        )
    })?;
    let url = request.url().to_string();

    match client.execute(request).await {
        Ok(resp) => {
            let status = resp.status().as_u16();
            if status == 429 || (500..600).contains(&status) {
                let body = resp.text().await.unwrap_or_default();
                return Err(RequestHandleError::retryable(url, Some(status), body));
            }
            Ok(resp)
        }
        Err(err) if err.is_timeout() || err.is_connect() => Err(RequestHandleError::retryable(
            url,
            None,
            format!("request timeout/connect error: {err}"),
        )),
        Err(err) => Err(RequestHandleError::permanent(
            url,
            None,
            format!("request failed: {err}"),
        )),
    }
}

async fn check_status(resp: Response) -> TransportResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let url = resp.url().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(TransportError::Status {
        url,
        status: status.as_u16(),
        body,
    })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> TransportResult<T> {
    let url = resp.url().to_string();
    let text = resp.text().await.map_err(|e| network_error(&url, &e))?;
    serde_json::from_str(&text).map_err(|e| TransportError::Payload {
        url,
        message: format!("invalid JSON body: {e}"),
    })
}

/// The data endpoint answers either `{"data": "..."}`, a JSON string or plain text.
fn parse_data_body(url: &str, text: &str) -> TransportResult<String> {
    if let Ok(wrapped) = serde_json::from_str::<DataGet>(text) {
        return Ok(wrapped.data);
    }
    if let Ok(plain) = serde_json::from_str::<String>(text) {
        return Ok(plain);
    }

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TransportError::Payload {
            url: url.to_string(),
            message: "empty data payload".into(),
        });
    }
    Ok(trimmed.to_string())
}

fn network_error(url: &str, err: &reqwest::Error) -> TransportError {
    TransportError::Network {
        url: url.to_string(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use vidsync_core::types::{DownloadJobState, FileType};

    fn creds() -> ApiCredentials {
        ApiCredentials {
            username: "alice".into(),
            password: SecretString::from("secret"),
        }
    }

    fn remote(url: &str) -> HttpRemote {
        HttpRemote::new(url, Duration::from_secs(5), 0).unwrap()
    }

    #[tokio::test]
    async fn test_all_keys_sends_basic_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/InvidiousExt/sync/extension/allKeys")
            .match_header("authorization", "Basic YWxpY2U6c2VjcmV0")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"[{"key":"k1","syncTime":10},{"key":"k2","syncTime":20}]"#)
            .create_async()
            .await;

        let remote = remote(&format!("{}/InvidiousExt", server.url()));
        let keys = remote.all_keys(&creds()).await.unwrap();

        assert_eq!(keys.len(), 2);
        assert_eq!(keys[1].key, "k2");
        assert_eq!(keys[1].sync_time, 20);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_key_segments_are_percent_encoded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/sync/extension/entry/ab%2Fcd/lastSyncTime")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"time":42}"#)
            .create_async()
            .await;

        let time = remote(&server.url())
            .last_sync_time(&creds(), "ab/cd")
            .await
            .unwrap();

        assert_eq!(time.time, 42);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_get_data_accepts_text_and_wrapped() {
        let mut server = mockito::Server::new_async().await;
        let _text = server
            .mock("GET", "/sync/extension/entry/plain/data")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("aXY=$Y3Q=")
            .create_async()
            .await;
        let _json = server
            .mock("GET", "/sync/extension/entry/wrapped/data")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":"aXY=$Y3Q="}"#)
            .create_async()
            .await;

        let remote = remote(&server.url());
        assert_eq!(remote.get_data(&creds(), "plain").await.unwrap(), "aXY=$Y3Q=");
        assert_eq!(remote.get_data(&creds(), "wrapped").await.unwrap(), "aXY=$Y3Q=");
    }

    #[tokio::test]
    async fn test_put_conflict_is_a_status_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("PUT", "/sync/extension/entry/k/data")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"force":false,"expectedLastSync":7}"#.into(),
            ))
            .with_status(409)
            .with_body("expectedLastSync mismatch")
            .create_async()
            .await;

        let err = remote(&server.url())
            .put_data(
                &creds(),
                "k",
                &DataPut {
                    data: "x$y".into(),
                    force: false,
                    expected_last_sync: 7,
                },
            )
            .await
            .unwrap_err();

        assert!(err.is_status(409));
        assert!(err.to_string().contains("expectedLastSync mismatch"));
    }

    #[tokio::test]
    async fn test_server_error_after_retries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("DELETE", "/sync/extension/entry/k")
            .with_status(503)
            .expect(2)
            .create_async()
            .await;

        let remote = HttpRemote::new(&server.url(), Duration::from_secs(5), 1).unwrap();
        let err = remote.delete_entry(&creds(), "k").await.unwrap_err();

        assert!(err.is_status(503));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_json_is_a_payload_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/sync/invidious/lastSyncTime")
            .with_status(200)
            .with_body("not json")
            .create_async()
            .await;

        let err = remote(&server.url())
            .account_last_sync_time(&creds())
            .await
            .unwrap_err();
        assert!(matches!(err, TransportError::Payload { .. }));
    }

    #[tokio::test]
    async fn test_download_progress_uses_query_id() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/download/progress")
            .match_query(mockito::Matcher::UrlEncoded("id".into(), "job-1".into()))
            .with_status(200)
            .with_body(r#"{"id":"job-1","state":"STARTED","progress":0.5}"#)
            .create_async()
            .await;
        let _post = server
            .mock("POST", "/download")
            .match_body(mockito::Matcher::PartialJsonString(
                r#"{"videoId":"abc","destType":"MP3"}"#.into(),
            ))
            .with_status(200)
            .with_body(r#"{"id":"job-1"}"#)
            .create_async()
            .await;

        let remote = remote(&server.url());
        let id = remote
            .request_download(
                &creds(),
                &DownloadRequest {
                    video_id: "abc".into(),
                    dest_type: FileType::Mp3,
                    tags: None,
                },
            )
            .await
            .unwrap();
        let progress = remote.download_progress(&creds(), &id.id).await.unwrap();

        assert_eq!(progress.state, DownloadJobState::Started);
        assert!((progress.progress - 0.5).abs() < f32::EPSILON);
    }

    #[tokio::test]
    async fn test_register_without_auth() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/user/register")
            .match_header("authorization", mockito::Matcher::Missing)
            .with_status(409)
            .create_async()
            .await;

        let err = remote(&server.url())
            .register(&Registration {
                username: "alice".into(),
                password: "derived".into(),
            })
            .await
            .unwrap_err();

        assert!(err.is_status(409));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_colon_in_username_is_rejected() {
        let remote = remote("https://example.com");
        let bad = ApiCredentials {
            username: "a:b".into(),
            password: SecretString::from("x"),
        };
        assert!(matches!(
            remote.test_login(&bad).await,
            Err(TransportError::Credentials(_))
        ));
    }

    #[test]
    fn test_from_config_enforces_tls() {
        let mut cfg = ServerConfig {
            base_url: "http://localhost:8080".into(),
            ..ServerConfig::default()
        };
        assert!(matches!(
            HttpRemote::from_config(&cfg),
            Err(TransportError::Insecure(_))
        ));

        cfg.enforce_tls = false;
        assert!(HttpRemote::from_config(&cfg).is_ok());
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let remote = remote("https://example.com/InvidiousExt/");
        let url = remote.endpoint(&["sync", "extension", "allKeys"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/InvidiousExt/sync/extension/allKeys"
        );
    }
}
