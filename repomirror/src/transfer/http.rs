//! HTTP transport seam for probes and ranged fetches.
//!
//! The [`Transport`] trait lets the transfer engine run against a real
//! `reqwest` client in production and a scripted double in tests.

use std::fmt;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::{CONTENT_LENGTH, CONTENT_RANGE, RANGE};

use crate::error::{SyncError, SyncResult, TransportError};
use crate::repo::hub::user_agent;

/// HTTP 200.
pub const STATUS_OK: u16 = 200;
/// HTTP 206.
pub const STATUS_PARTIAL_CONTENT: u16 = 206;
/// HTTP 416.
pub const STATUS_RANGE_NOT_SATISFIABLE: u16 = 416;

/// Inclusive byte range for a `Range: bytes=start-end` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    /// Last byte, or open-ended when `None`.
    pub end: Option<u64>,
}

impl ByteRange {
    /// Value for the `Range` request header.
    pub fn header_value(&self) -> String {
        match self.end {
            Some(end) => format!("bytes={}-{}", self.start, end),
            None => format!("bytes={}-", self.start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.header_value())
    }
}

/// Answer to a metadata-only request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    pub content_length: Option<u64>,
}

/// Answer to a body request, with the body still unread.
pub struct FetchResponse {
    pub status: u16,
    /// First byte position from `Content-Range`, when present.
    pub content_range_start: Option<u64>,
    pub body: Box<dyn Read + Send>,
}

impl fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status", &self.status)
            .field("content_range_start", &self.content_range_start)
            .finish_non_exhaustive()
    }
}

/// Network operations needed by the transfer engine.
pub trait Transport: Send + Sync {
    /// Issue a metadata-only request for `url`.
    fn probe(&self, url: &str) -> Result<ProbeResponse, TransportError>;

    /// Request the body of `url`, optionally restricted to `range`.
    fn fetch(&self, url: &str, range: Option<ByteRange>) -> Result<FetchResponse, TransportError>;
}

/// Production transport built on a blocking `reqwest` client.
///
/// The timeout applies to connecting and to each read or write, so large
/// bodies are not cut off as long as bytes keep arriving.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    token: Option<String>,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Create a transport with the given per-operation timeout.
    pub fn new(timeout: Duration, token: Option<String>) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .user_agent(user_agent())
            .build()
            .map_err(|e| SyncError::Client(e.to_string()))?;

        Ok(Self {
            client,
            token: token.filter(|t| !t.is_empty()),
            timeout,
        })
    }

    /// The per-operation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn fetch_request(&self, url: &str, range: Option<ByteRange>) -> RequestBuilder {
        let request = self.authorize(self.client.get(url));
        match range {
            Some(range) => request.header(RANGE, range.header_value()),
            None => request,
        }
    }
}

impl Transport for ReqwestTransport {
    fn probe(&self, url: &str) -> Result<ProbeResponse, TransportError> {
        let response = self.authorize(self.client.head(url)).send()?;

        Ok(ProbeResponse {
            status: response.status().as_u16(),
            content_length: response
                .headers()
                .get(CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok()),
        })
    }

    fn fetch(&self, url: &str, range: Option<ByteRange>) -> Result<FetchResponse, TransportError> {
        let response = self.fetch_request(url, range).send()?;
        let content_range_start = response
            .headers()
            .get(CONTENT_RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range_start);

        Ok(FetchResponse {
            status: response.status().as_u16(),
            content_range_start,
            body: Box::new(response),
        })
    }
}

/// First byte position of a `Content-Range: bytes <start>-<end>/<total>` value.
pub fn parse_content_range_start(value: &str) -> Option<u64> {
    let range = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = range.split_once('-')?;
    start.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::AUTHORIZATION;

    fn transport(token: Option<&str>) -> ReqwestTransport {
        ReqwestTransport::new(Duration::from_secs(5), token.map(str::to_string)).unwrap()
    }

    #[test]
    fn test_bearer_token_is_attached_when_configured() {
        let request = transport(Some("hf_secret"))
            .fetch_request("https://hub.example/f.bin", Some(ByteRange { start: 40, end: Some(99) }))
            .build()
            .unwrap();

        assert_eq!(request.headers()[AUTHORIZATION], "Bearer hf_secret");
        assert_eq!(request.headers()[RANGE], "bytes=40-99");
    }

    #[test]
    fn test_no_authorization_without_token() {
        for token in [None, Some("")] {
            let request = transport(token)
                .fetch_request("https://hub.example/f.bin", None)
                .build()
                .unwrap();

            assert!(request.headers().get(AUTHORIZATION).is_none());
            assert!(request.headers().get(RANGE).is_none());
        }
    }

    #[test]
    fn test_range_header_values() {
        let closed = ByteRange {
            start: 100,
            end: Some(199),
        };
        assert_eq!(closed.header_value(), "bytes=100-199");

        let open = ByteRange {
            start: 5,
            end: None,
        };
        assert_eq!(open.to_string(), "bytes=5-");
    }

    #[test]
    fn test_parse_content_range_start() {
        assert_eq!(parse_content_range_start("bytes 100-199/200"), Some(100));
        assert_eq!(parse_content_range_start("bytes 0-0/*"), Some(0));
        assert_eq!(parse_content_range_start("bytes */200"), None);
        assert_eq!(parse_content_range_start("items 1-2/3"), None);
    }

    #[test]
    fn test_transport_keeps_timeout() {
        let transport = ReqwestTransport::new(Duration::from_secs(42), None).unwrap();
        assert_eq!(transport.timeout(), Duration::from_secs(42));
    }
}
