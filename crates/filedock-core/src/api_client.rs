use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::api::{
    Credentials, DownloadResponse, ErrorBody, FileEntry, PendingFile, SuccessResponse,
    TokenResponse, UploadResponse,
};
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};

pub const AUTH_HEADER: &str = "X-Auth-Token";

/// The storage server's HTTP contract, one method per endpoint.
///
/// `token` is the session token; an empty token sends no auth header.
#[async_trait]
pub trait FileApi: Send + Sync {
    async fn register(&self, credentials: &Credentials) -> Result<TokenResponse>;
    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse>;
    async fn upload(&self, token: &str, file: &PendingFile) -> Result<UploadResponse>;
    async fn download(&self, token: &str, file_hash: &str) -> Result<DownloadResponse>;
    async fn delete(&self, token: &str, file_hash: &str) -> Result<SuccessResponse>;
    async fn update(&self, token: &str, file_hash: &str, file: &PendingFile)
        -> Result<SuccessResponse>;
    async fn search(&self, token: &str, query: &str) -> Result<Vec<FileEntry>>;
    async fn list(&self, token: &str) -> Result<Vec<FileEntry>>;
}

#[derive(Clone)]
pub struct ApiClient {
    client: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("filedock/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()?;
        let base = config.api_base_url.trim_end_matches('/');
        let base_url =
            Url::parse(base).map_err(|e| ClientError::InvalidUrl(format!("{base}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(ClientError::InvalidUrl(base.to_string()));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Appends `segments` to the base URL, escaping each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str], token: &str) -> RequestBuilder {
        let builder = self.client.request(method, self.endpoint(segments));
        if token.is_empty() {
            builder
        } else {
            builder.header(AUTH_HEADER, token)
        }
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        builder: RequestBuilder,
    ) -> Result<T> {
        let res = builder.send().await.map_err(|err| {
            warn!(endpoint, error = %err, "request failed");
            ClientError::Transport(err)
        })?;
        let res = check_status(endpoint, res).await?;
        res.json::<T>().await.map_err(|err| {
            warn!(endpoint, error = %err, "response body did not decode");
            ClientError::Decode(err.to_string())
        })
    }
}

fn file_form(token: &str, file: &PendingFile) -> Form {
    let part = Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone());
    Form::new().part("file", part).text("token", token.to_string())
}

async fn check_status(endpoint: &str, res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        debug!(endpoint, %status, "request ok");
        return Ok(res);
    }
    let body = res.text().await.unwrap_or_default();
    let message = error_message(status, &body);
    warn!(endpoint, %status, error = %message, "server returned an error");
    Err(ClientError::Http { status, message })
}

/// The server's `{"error": ...}` text when present, else a generic status line.
pub(crate) fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ErrorBody>(body)
        .ok()
        .map(|b| b.error)
        .filter(|e| !e.trim().is_empty())
        .unwrap_or_else(|| format!("HTTP error! Status: {}", status.as_u16()))
}

#[async_trait]
impl FileApi for ApiClient {
    async fn register(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let req = self
            .request(Method::POST, &["api", "register"], "")
            .json(credentials);
        self.send("register", req).await
    }

    async fn login(&self, credentials: &Credentials) -> Result<TokenResponse> {
        let req = self.request(Method::POST, &["api", "login"], "").json(credentials);
        self.send("login", req).await
    }

    async fn upload(&self, token: &str, file: &PendingFile) -> Result<UploadResponse> {
        let req = self
            .request(Method::POST, &["api", "upload"], token)
            .multipart(file_form(token, file));
        self.send("upload", req).await
    }

    async fn download(&self, token: &str, file_hash: &str) -> Result<DownloadResponse> {
        let req = self.request(Method::GET, &["api", "download", file_hash], token);
        self.send("download", req).await
    }

    async fn delete(&self, token: &str, file_hash: &str) -> Result<SuccessResponse> {
        let req = self.request(Method::DELETE, &["api", "delete", file_hash], token);
        self.send("delete", req).await
    }

    async fn update(
        &self,
        token: &str,
        file_hash: &str,
        file: &PendingFile,
    ) -> Result<SuccessResponse> {
        let req = self
            .request(Method::PUT, &["api", "update", file_hash], token)
            .multipart(file_form(token, file));
        self.send("update", req).await
    }

    async fn search(&self, token: &str, query: &str) -> Result<Vec<FileEntry>> {
        let req = self
            .request(Method::GET, &["api", "search"], token)
            .query(&[("query", query)]);
        self.send("search", req).await
    }

    async fn list(&self, token: &str) -> Result<Vec<FileEntry>> {
        let req = self.request(Method::GET, &["api", "list"], token);
        self.send("list", req).await
    }
}
