//! Address lookups for the refresh cycle.
//!
//! This module provides:
//!
//! - `Address`: a resolved IP address or the `Unavailable` sentinel
//! - `Resolver`: the lookup seam driven by the refresh scheduler
//! - `SystemResolver`: hostname self-resolution plus an HTTPS IP-echo service
//!
//! Every failure is typed as a `LookupError` so it can be logged, then collapsed
//! into `Address::Unavailable` before it leaves this module. Callers never see
//! an error, and the resolver never retries on its own.

use std::fmt;
use std::future::Future;
use std::net::{IpAddr, ToSocketAddrs};
use std::time::Duration;

use anyhow::Result;
use serde::Deserialize;
use thiserror::Error;

use crate::config::LookupConfig;

/// User agent for echo service requests
const USER_AGENT: &str = concat!("UCIPS/", env!("CARGO_PKG_VERSION"));

/// Outcome of a single address lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Address {
    Resolved(IpAddr),
    /// Any failure to obtain an address, deliberately undifferentiated
    Unavailable,
}

impl Address {
    pub fn is_available(&self) -> bool {
        matches!(self, Address::Resolved(_))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Resolved(ip) => write!(f, "{}", ip),
            Address::Unavailable => f.write_str("Unavailable"),
        }
    }
}

/// Why a lookup produced no address
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("could not read hostname: {0}")]
    Hostname(#[source] std::io::Error),
    #[error("hostname is not valid unicode")]
    HostnameEncoding,
    #[error("could not resolve {host}: {source}")]
    Resolve {
        host: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{0} resolved to no addresses")]
    NoAddress(String),
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("echo service answered {0}")]
    Status(reqwest::StatusCode),
    #[error("malformed response body: {0}")]
    Body(#[from] serde_json::Error),
    #[error("echo service returned an invalid address {0:?}")]
    BadAddress(String),
}

/// The two lookups a refresh cycle performs.
///
/// `resolve_internal` runs inline on whichever thread triggered the cycle and
/// must stay short. `resolve_external` is network-bound and is always awaited on
/// a background task.
pub trait Resolver: Send + Sync + 'static {
    fn resolve_internal(&self) -> Address;

    fn resolve_external(&self) -> impl Future<Output = Address> + Send;
}

/// Body returned by the echo service, e.g. `{"ip":"203.0.113.7"}`
#[derive(Debug, Deserialize)]
struct IpEcho {
    ip: String,
}

/// Parse an echo service body into an address
pub fn parse_echo_body(body: &str) -> Result<IpAddr, LookupError> {
    let echo: IpEcho = serde_json::from_str(body)?;
    let ip = echo.ip.trim();
    ip.parse().map_err(|_| LookupError::BadAddress(ip.to_string()))
}

/// Resolve `host` through the OS resolver, preferring IPv4
pub fn first_address(host: &str) -> Result<IpAddr, LookupError> {
    let addrs: Vec<IpAddr> = (host, 0)
        .to_socket_addrs()
        .map_err(|source| LookupError::Resolve {
            host: host.to_string(),
            source,
        })?
        .map(|addr| addr.ip())
        .collect();

    addrs
        .iter()
        .find(|ip| ip.is_ipv4())
        .or_else(|| addrs.first())
        .copied()
        .ok_or_else(|| LookupError::NoAddress(host.to_string()))
}

fn collapse(which: &str, result: Result<IpAddr, LookupError>) -> Address {
    match result {
        Ok(ip) => Address::Resolved(ip),
        Err(e) => {
            tracing::warn!("{} address unavailable: {}", which, e);
            Address::Unavailable
        }
    }
}

/// Resolver backed by the OS hostname and a public IP-echo endpoint
#[derive(Clone)]
pub struct SystemResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl SystemResolver {
    /// Create a resolver from the lookup configuration
    pub fn new(config: &LookupConfig) -> Result<Self> {
        Self::with_timeout(&config.endpoint, config.timeout())
    }

    /// Create a resolver for an explicit endpoint and request timeout
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    fn lookup_internal(&self) -> Result<IpAddr, LookupError> {
        let host = hostname::get()
            .map_err(LookupError::Hostname)?
            .into_string()
            .map_err(|_| LookupError::HostnameEncoding)?;

        first_address(&host)
    }

    async fn lookup_external(&self) -> Result<IpAddr, LookupError> {
        let start = std::time::Instant::now();
        let response = self.client.get(&self.endpoint).send().await?;

        if !response.status().is_success() {
            return Err(LookupError::Status(response.status()));
        }

        let body = response.text().await?;
        let ip = parse_echo_body(&body)?;
        tracing::debug!(
            "External lookup answered in {:.1}s",
            start.elapsed().as_secs_f32()
        );
        Ok(ip)
    }
}

impl Resolver for SystemResolver {
    fn resolve_internal(&self) -> Address {
        collapse("Internal", self.lookup_internal())
    }

    async fn resolve_external(&self) -> Address {
        collapse("External", self.lookup_external().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve a single raw HTTP response, waiting `delay` before answering
    async fn serve_once(response: String, delay: Duration) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 2048];
            let _ = socket.read(&mut buf).await;
            tokio::time::sleep(delay).await;
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        format!("http://{}/?format=json", addr)
    }

    fn http_response(status: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            body.len(),
            body
        )
    }

    fn resolver(endpoint: &str) -> SystemResolver {
        SystemResolver::with_timeout(endpoint, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_parse_echo_body() {
        let ip = parse_echo_body(r#"{"ip":"203.0.113.7"}"#).unwrap();
        assert_eq!(ip.to_string(), "203.0.113.7");

        // Extra fields are ignored
        let ip = parse_echo_body(r#"{"ip":"2001:db8::1","country":"ZZ"}"#).unwrap();
        assert_eq!(ip.to_string(), "2001:db8::1");
    }

    #[test]
    fn test_parse_echo_body_rejects_bad_shapes() {
        assert!(matches!(parse_echo_body("203.0.113.7"), Err(LookupError::Body(_))));
        assert!(matches!(parse_echo_body("{}"), Err(LookupError::Body(_))));
        assert!(matches!(parse_echo_body(r#"{"ip":7}"#), Err(LookupError::Body(_))));
        assert!(matches!(
            parse_echo_body(r#"{"ip":"not-an-ip"}"#),
            Err(LookupError::BadAddress(_))
        ));
    }

    #[test]
    fn test_address_display() {
        let resolved = Address::Resolved("192.168.1.20".parse().unwrap());
        assert_eq!(resolved.to_string(), "192.168.1.20");
        assert!(resolved.is_available());
        assert_eq!(Address::Unavailable.to_string(), "Unavailable");
        assert!(!Address::Unavailable.is_available());
    }

    #[test]
    fn test_first_address_localhost() {
        let ip = first_address("localhost").unwrap();
        assert!(ip.is_loopback());
    }

    #[test]
    fn test_first_address_unresolvable() {
        let result = first_address("no-such-host.invalid");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_external_lookup_success() {
        let endpoint = serve_once(
            http_response("200 OK", r#"{"ip":"203.0.113.7"}"#),
            Duration::ZERO,
        )
        .await;

        let address = resolver(&endpoint).resolve_external().await;
        assert_eq!(address, Address::Resolved("203.0.113.7".parse().unwrap()));
    }

    #[tokio::test]
    async fn test_external_lookup_non_json_body() {
        let endpoint = serve_once(
            http_response("200 OK", "<html>rate limited</html>"),
            Duration::ZERO,
        )
        .await;

        let address = resolver(&endpoint).resolve_external().await;
        assert_eq!(address, Address::Unavailable);
    }

    #[tokio::test]
    async fn test_external_lookup_error_status() {
        let endpoint = serve_once(
            http_response("503 Service Unavailable", r#"{"ip":"203.0.113.7"}"#),
            Duration::ZERO,
        )
        .await;

        let address = resolver(&endpoint).resolve_external().await;
        assert_eq!(address, Address::Unavailable);
    }

    #[tokio::test]
    async fn test_external_lookup_timeout() {
        let endpoint = serve_once(
            http_response("200 OK", r#"{"ip":"203.0.113.7"}"#),
            Duration::from_secs(3),
        )
        .await;

        let resolver =
            SystemResolver::with_timeout(&endpoint, Duration::from_millis(200)).unwrap();
        let start = std::time::Instant::now();
        let address = resolver.resolve_external().await;

        assert_eq!(address, Address::Unavailable);
        assert!(start.elapsed() < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_external_lookup_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let address = resolver(&format!("http://{}/", addr)).resolve_external().await;
        assert_eq!(address, Address::Unavailable);
    }
}
