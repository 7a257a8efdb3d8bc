use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use reqwest::{header, Client};
use shared::protocol::{SetStateRequest, SetStateResponse, TransitionsMetaResponse};
use thiserror::Error;
use url::Url;

const REQUESTED_WITH: &str = "X-Requested-With";
const XML_HTTP_REQUEST: &str = "XMLHttpRequest";
const CSRF_HEADER: &str = "X-CSRFToken";
const CSRF_COOKIE: &str = "csrftoken";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid endpoint url '{url}': {message}")]
    InvalidUrl { url: String, message: String },
    #[error("request to {url} failed: {message}")]
    Request { url: String, message: String },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("malformed response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// Answer of the set-state endpoint together with its HTTP status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetStateReply {
    pub status: u16,
    pub body: SetStateResponse,
}

impl SetStateReply {
    pub fn ok(body: SetStateResponse) -> Self {
        Self { status: 200, body }
    }

    /// Non-2xx counts as a rejection no matter what the body claims.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status) && self.body.ok
    }
}

#[async_trait]
pub trait OrderStateBackend: Send + Sync {
    async fn fetch_transitions(
        &self,
        meta_url: &str,
    ) -> Result<TransitionsMetaResponse, TransportError>;

    async fn set_state(
        &self,
        set_url: &str,
        request: &SetStateRequest,
    ) -> Result<SetStateReply, TransportError>;
}

/// JSON-over-HTTP client for the admin backend endpoints.
pub struct HttpBackend {
    http: Client,
    base_url: Option<Url>,
    csrf_token: Option<String>,
}

impl HttpBackend {
    pub fn new(base_url: Option<&str>, csrf_token: Option<String>) -> Result<Self, TransportError> {
        let base_url = base_url
            .map(|raw| {
                Url::parse(raw).map_err(|err| TransportError::InvalidUrl {
                    url: raw.to_string(),
                    message: err.to_string(),
                })
            })
            .transpose()?;
        Ok(Self {
            http: Client::new(),
            base_url,
            csrf_token,
        })
    }

    /// Builds a backend whose CSRF token comes from a raw `Cookie` header value.
    pub fn from_cookie_header(
        base_url: Option<&str>,
        cookie_header: Option<&str>,
    ) -> Result<Self, TransportError> {
        Self::new(base_url, cookie_header.and_then(csrf_token_from_cookies))
    }

    fn resolve(&self, endpoint: &str) -> Result<Url, TransportError> {
        let parsed = match &self.base_url {
            Some(base) => base.join(endpoint),
            None => Url::parse(endpoint),
        };
        parsed.map_err(|err| TransportError::InvalidUrl {
            url: endpoint.to_string(),
            message: err.to_string(),
        })
    }
}

#[async_trait]
impl OrderStateBackend for HttpBackend {
    async fn fetch_transitions(
        &self,
        meta_url: &str,
    ) -> Result<TransitionsMetaResponse, TransportError> {
        let url = self.resolve(meta_url)?;
        let res = self
            .http
            .get(url.clone())
            .header(REQUESTED_WITH, XML_HTTP_REQUEST)
            .send()
            .await
            .map_err(|err| TransportError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = res.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        res.json::<TransitionsMetaResponse>()
            .await
            .map_err(|err| TransportError::Decode {
                url: url.to_string(),
                message: err.to_string(),
            })
    }

    async fn set_state(
        &self,
        set_url: &str,
        request: &SetStateRequest,
    ) -> Result<SetStateReply, TransportError> {
        let url = self.resolve(set_url)?;
        let res = self
            .http
            .post(url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .header(CSRF_HEADER, self.csrf_token.as_deref().unwrap_or_default())
            .header(REQUESTED_WITH, XML_HTTP_REQUEST)
            .json(request)
            .send()
            .await
            .map_err(|err| TransportError::Request {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = res.status();
        let bytes = res.bytes().await.map_err(|err| TransportError::Request {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        let body = match serde_json::from_slice::<SetStateResponse>(&bytes) {
            Ok(body) => body,
            // error pages from proxies or the framework are still just rejections
            Err(_) if !status.is_success() => SetStateResponse::default(),
            Err(err) => {
                return Err(TransportError::Decode {
                    url: url.to_string(),
                    message: err.to_string(),
                })
            }
        };

        Ok(SetStateReply {
            status: status.as_u16(),
            body,
        })
    }
}

/// Extracts the percent-decoded `csrftoken` value from a `Cookie` header.
///
/// A value that does not decode to UTF-8 is passed through unchanged.
pub fn csrf_token_from_cookies(cookie_header: &str) -> Option<String> {
    let raw = cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == CSRF_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())?;

    match percent_decode_str(raw).decode_utf8() {
        Ok(decoded) => Some(decoded.into_owned()),
        Err(_) => Some(raw.to_string()),
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
