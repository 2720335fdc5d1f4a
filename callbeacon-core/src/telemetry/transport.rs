//! HTTP transport for the collection sink and the time authority
//!
//! The pipeline only sees the [`CollectionSink`] and [`TimeSource`] traits;
//! [`HttpSink`] and [`HttpClock`] are the reqwest-backed implementations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::redirect;
use serde::Deserialize;

use crate::config::TelemetryConfig;
use crate::error::{Error, Result};

/// Destination for encoded upload batches
#[async_trait]
pub trait CollectionSink: Send + Sync {
    /// Send one gzip-compressed JSON array. Success means the request was
    /// answered with a 2xx status; the response body is ignored.
    async fn post(&self, body: Vec<u8>) -> Result<()>;
}

/// Trusted source of the current UTC time
#[async_trait]
pub trait TimeSource: Send + Sync {
    async fn now(&self) -> Result<DateTime<Utc>>;
}

/// Response from the time authority. Only `datetime` is read.
#[derive(Debug, Deserialize)]
struct ClockResponse {
    datetime: String,
}

fn build_http_client(timeout_secs: u64, headers: HeaderMap) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .redirect(redirect::Policy::none())
        .default_headers(headers)
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))
}

/// POSTs upload batches to the configured collection endpoint
pub struct HttpSink {
    http_client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    /// Create a sink from configuration
    ///
    /// Returns an error if no endpoint is configured.
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        config.validate()?;

        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| Error::Config("telemetry.endpoint is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));

        Ok(Self {
            http_client: build_http_client(config.timeout_secs, headers)?,
            endpoint,
        })
    }
}

#[async_trait]
impl CollectionSink for HttpSink {
    async fn post(&self, body: Vec<u8>) -> Result<()> {
        let response = self
            .http_client
            .post(&self.endpoint)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Transport(format!("collector answered {}", status)))
        }
    }
}

/// Reads the current time from a JSON time service
pub struct HttpClock {
    http_client: reqwest::Client,
    url: String,
}

impl HttpClock {
    pub fn new(config: &TelemetryConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            http_client: build_http_client(config.timeout_secs, HeaderMap::new())?,
            url: config.clock_url.clone(),
        })
    }
}

#[async_trait]
impl TimeSource for HttpClock {
    async fn now(&self) -> Result<DateTime<Utc>> {
        let response = self
            .http_client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::ClockSource(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ClockSource(format!("time service answered {}", status)));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::ClockSource(format!("failed to read response: {}", e)))?;

        parse_clock_response(&body)
    }
}

/// Extract the `datetime` field of a time service response
///
/// RFC 3339 is expected; a timestamp without an offset is read as UTC.
fn parse_clock_response(body: &str) -> Result<DateTime<Utc>> {
    let parsed: ClockResponse = serde_json::from_str(body)
        .map_err(|e| Error::ClockSource(format!("failed to parse response: {}", e)))?;

    if let Ok(dt) = DateTime::parse_from_rfc3339(&parsed.datetime) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(&parsed.datetime, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| Utc.from_utc_datetime(&naive))
        .map_err(|e| Error::ClockSource(format!("invalid datetime {:?}: {}", parsed.datetime, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::SkewResolver;
    use crate::types::Skew;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// A request as seen by the loopback server: lowercased head and raw body
    type Received = (String, Vec<u8>);

    fn reply(status_line: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status_line,
            body.len(),
            body
        )
    }

    /// Accept exactly one connection on a loopback port, answer it with
    /// `response`, and hand back what the client sent.
    async fn serve_once(response: String) -> (String, JoinHandle<Received>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/ingest", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let head_end = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the request head");
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..head_end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .map(|value| value.trim().parse::<usize>().unwrap())
                .unwrap_or(0);

            while buf.len() < head_end + length {
                let n = stream.read(&mut chunk).await.unwrap();
                assert!(n > 0, "connection closed before the request body");
                buf.extend_from_slice(&chunk[..n]);
            }

            stream.write_all(response.as_bytes()).await.unwrap();
            let _ = stream.shutdown().await;

            (head, buf[head_end..head_end + length].to_vec())
        });

        (url, handle)
    }

    fn sink_for(endpoint: &str) -> HttpSink {
        HttpSink::new(&TelemetryConfig {
            endpoint: Some(endpoint.to_string()),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    fn clock_for(url: &str) -> HttpClock {
        HttpClock::new(&TelemetryConfig {
            clock_url: url.to_string(),
            timeout_secs: 5,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn test_sink_requires_endpoint() {
        let config = TelemetryConfig::default();
        assert!(HttpSink::new(&config).is_err());
    }

    #[test]
    fn test_sink_with_valid_config() {
        let config = TelemetryConfig {
            endpoint: Some("https://telemetry.example.com/v1/events".to_string()),
            ..Default::default()
        };
        assert!(HttpSink::new(&config).is_ok());

        let config = TelemetryConfig {
            endpoint: Some("telemetry.example.com".to_string()),
            ..Default::default()
        };
        assert!(HttpSink::new(&config).is_err());
    }

    #[test]
    fn test_clock_with_default_config() {
        assert!(HttpClock::new(&TelemetryConfig::default()).is_ok());
    }

    // ============================================
    // Collection sink over the wire
    // ============================================

    #[tokio::test]
    async fn test_sink_posts_gzip_json_body() {
        let (url, server) = serve_once(reply("200 OK", "")).await;
        let body = vec![0x1f, 0x8b, 0x08, 0x00, 0x01, 0x02, 0x03];

        sink_for(&url).post(body.clone()).await.unwrap();

        let (head, received) = server.await.unwrap();
        assert!(head.starts_with("post /ingest http/1.1\r\n"));
        assert!(head.contains("content-type: application/json\r\n"));
        assert!(head.contains("content-encoding: gzip\r\n"));
        assert_eq!(received, body);
    }

    #[tokio::test]
    async fn test_sink_does_not_follow_redirects() {
        let elsewhere = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let location = format!("http://{}/moved", elsewhere.local_addr().unwrap());
        let response = format!(
            "HTTP/1.1 302 Found\r\nLocation: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            location
        );
        let (url, server) = serve_once(response).await;

        let result = sink_for(&url).post(b"[]".to_vec()).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        server.await.unwrap();

        let followed =
            tokio::time::timeout(Duration::from_millis(200), elsewhere.accept()).await;
        assert!(followed.is_err(), "redirect target was contacted");
    }

    #[tokio::test]
    async fn test_sink_reports_server_error() {
        let (url, server) = serve_once(reply("500 Internal Server Error", "boom")).await;

        let result = sink_for(&url).post(b"[]".to_vec()).await;
        assert!(matches!(result, Err(Error::Transport(_))));
        server.await.unwrap();
    }

    // ============================================
    // Time authority over the wire
    // ============================================

    #[tokio::test]
    async fn test_clock_reads_datetime_field() {
        let body = r#"{"datetime":"2025-03-01T12:00:05.250000+00:00","unixtime":1740830405}"#;
        let (url, server) = serve_once(reply("200 OK", body)).await;

        let now = clock_for(&url).now().await.unwrap();
        assert_eq!(
            now,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 5).unwrap() + chrono::Duration::milliseconds(250)
        );

        let (head, _) = server.await.unwrap();
        assert!(head.starts_with("get /ingest http/1.1\r\n"));
    }

    #[tokio::test]
    async fn test_clock_error_status_resolves_unknown() {
        let body = r#"{"datetime":"2025-03-01T12:00:05+00:00"}"#;
        let (url, server) = serve_once(reply("500 Internal Server Error", body)).await;

        let resolver = SkewResolver::new(Arc::new(clock_for(&url)));
        assert_eq!(resolver.resolve().await, Skew::Unknown);
        server.await.unwrap();

        let (url, server) = serve_once(reply("503 Service Unavailable", "")).await;
        assert!(matches!(clock_for(&url).now().await, Err(Error::ClockSource(_))));
        server.await.unwrap();
    }

    // ============================================
    // Response parsing
    // ============================================

    #[test]
    fn test_parse_clock_response() {
        let body = r#"{"abbreviation":"UTC","datetime":"2025-03-01T12:00:05.250000+00:00","unixtime":1740830405}"#;
        let parsed = parse_clock_response(body).unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 5).unwrap() + chrono::Duration::milliseconds(250)
        );
    }

    #[test]
    fn test_parse_clock_response_with_offset() {
        let parsed = parse_clock_response(r#"{"datetime":"2025-03-01T14:00:00+02:00"}"#).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_clock_response_without_offset_is_utc() {
        let parsed = parse_clock_response(r#"{"datetime":"2025-03-01T12:00:00.123"}"#).unwrap();
        assert_eq!(
            parsed,
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap() + chrono::Duration::milliseconds(123)
        );

        let parsed = parse_clock_response(r#"{"datetime":"2025-03-01T12:00:00"}"#).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_clock_response_rejects_bad_shapes() {
        assert!(matches!(
            parse_clock_response(r#"{"time":"2025-03-01T12:00:00Z"}"#),
            Err(Error::ClockSource(_))
        ));
        assert!(matches!(
            parse_clock_response(r#"{"datetime":"yesterday"}"#),
            Err(Error::ClockSource(_))
        ));
        assert!(matches!(parse_clock_response("<html>"), Err(Error::ClockSource(_))));
    }
}
