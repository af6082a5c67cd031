//! HTTP access to the cloud player API.

use std::{fmt, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    header::{COOKIE, SET_COOKIE},
    Client,
};
use tracing::debug;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Post => "POST",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub cookie: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ApiResponse {
    pub status: u16,
    /// Raw `Set-Cookie` header values, in header order.
    pub set_cookies: Vec<String>,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self {
            status,
            set_cookies: Vec::new(),
            body: body.to_string().into_bytes(),
        }
    }

    pub fn with_cookie(mut self, set_cookie: impl Into<String>) -> Self {
        self.set_cookies.push(set_cookie.into());
        self
    }
}

/// Sends one request. Non-2xx statuses are returned, not raised; only a
/// failure to exchange the request at all is an error.
#[async_trait(?Send)]
pub trait HttpTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse>;
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub base_url: Url,
    pub accept_invalid_certs: bool,
    pub timeout: Option<Duration>,
}

pub struct ReqwestTransport {
    http: Client,
    base_url: Url,
}

impl ReqwestTransport {
    pub fn new(settings: TransportSettings) -> Result<Self> {
        let mut builder =
            Client::builder().danger_accept_invalid_certs(settings.accept_invalid_certs);
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: settings.base_url,
        })
    }

    /// Appends `path` to the base URL, keeping any path prefix the base has.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).with_context(|| format!("invalid API path {path}"))
    }
}

#[async_trait(?Send)]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let url = self.endpoint(&request.path)?;
        let mut builder = match request.method {
            HttpMethod::Get => self.http.get(url.clone()),
            HttpMethod::Post => self.http.post(url.clone()).body(""),
        };
        if let Some(cookie) = &request.cookie {
            builder = builder.header(COOKIE, cookie.as_str());
        }

        let response = builder
            .send()
            .await
            .with_context(|| format!("{} {url} failed", request.method))?;
        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(str::to_owned)
            .collect();
        let body = response
            .bytes()
            .await
            .with_context(|| format!("failed to read body of {url}"))?
            .to_vec();
        debug!(method = %request.method, %url, status, "api response");

        Ok(ApiResponse {
            status,
            set_cookies,
            body,
        })
    }
}

/// Folds `Set-Cookie` values into one `Cookie` header value: the leading
/// `name=value` segment of each, joined with `;`. `None` when nothing is left.
pub fn fold_set_cookies(set_cookies: &[String]) -> Option<String> {
    let folded = set_cookies
        .iter()
        .map(|header| header.split(';').next().unwrap_or_default())
        .collect::<Vec<_>>()
        .join(";");
    (!folded.is_empty()).then_some(folded)
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
