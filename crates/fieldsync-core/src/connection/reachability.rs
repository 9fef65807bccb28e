//! Link checks and server reachability probes.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::config::ProbeConfig;
use crate::remote::{normalize_base_url, RemoteError, RemoteResult};

/// Basic "is there a network at all" check, done before any probe
#[async_trait]
pub trait NetworkReachability: Send + Sync {
    async fn is_network_available(&self) -> bool;
}

/// Fixed answer; also lets an operator pin the link state
#[derive(Debug, Default)]
pub struct StaticReachability {
    available: AtomicBool,
}

impl StaticReachability {
    pub fn new(available: bool) -> Self {
        Self {
            available: AtomicBool::new(available),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }
}

#[async_trait]
impl NetworkReachability for StaticReachability {
    async fn is_network_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }
}

/// Opens a TCP connection to the server's host and port
#[derive(Debug, Clone)]
pub struct TcpReachability {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpReachability {
    pub fn for_url(url: &str, timeout: Duration) -> RemoteResult<Self> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|error| RemoteError::InvalidPayload(format!("invalid server URL: {error}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| RemoteError::InvalidPayload(format!("server URL has no host: {url}")))?
            .to_string();
        let port = parsed.port_or_known_default().unwrap_or(443);
        Ok(Self {
            host,
            port,
            timeout,
        })
    }
}

#[async_trait]
impl NetworkReachability for TcpReachability {
    async fn is_network_available(&self) -> bool {
        let attempt = TcpStream::connect((self.host.as_str(), self.port));
        match tokio::time::timeout(self.timeout, attempt).await {
            Ok(Ok(_)) => true,
            Ok(Err(error)) => {
                tracing::debug!("No link to {}:{}: {}", self.host, self.port, error);
                false
            }
            Err(_) => {
                tracing::debug!("Link check to {}:{} timed out", self.host, self.port);
                false
            }
        }
    }
}

/// Result class of a reachability probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Online,
    /// Answered, but slower than the configured threshold
    Slow,
    Offline,
    /// Answered with an unexpected status
    Error,
    Unknown,
}

impl ProbeStatus {
    /// `Online` and `Slow` both mean the server can be talked to
    pub const fn is_reachable(self) -> bool {
        matches!(self, Self::Online | Self::Slow)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Slow => "slow",
            Self::Offline => "offline",
            Self::Error => "error",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProbeReport {
    pub status: ProbeStatus,
    pub response_time: Option<Duration>,
    pub message: String,
}

impl ProbeReport {
    pub const fn is_reachable(&self) -> bool {
        self.status.is_reachable()
    }
}

/// Lightweight request that only answers "is the server responsive"
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    async fn probe(&self) -> ProbeReport;
}

/// `GET` against the health endpoint
#[derive(Debug, Clone)]
pub struct HttpHealthProbe {
    url: String,
    slow_threshold: Duration,
    client: reqwest::Client,
}

impl HttpHealthProbe {
    pub fn new(
        url: impl Into<String>,
        timeout: Duration,
        slow_threshold: Duration,
    ) -> RemoteResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| RemoteError::Transport(error.to_string()))?;
        Ok(Self {
            url: url.into(),
            slow_threshold,
            client,
        })
    }

    /// Probe `<server_url><health_path>`
    pub fn for_server(server_url: &str, config: &ProbeConfig) -> RemoteResult<Self> {
        let base = normalize_base_url(server_url.to_string())?;
        Self::new(
            format!("{base}{}", config.health_path),
            config.timeout(),
            config.slow_threshold(),
        )
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ReachabilityProbe for HttpHealthProbe {
    async fn probe(&self) -> ProbeReport {
        let started = Instant::now();
        let response = self
            .client
            .get(&self.url)
            .header("X-Health-Check", "true")
            .send()
            .await;
        let elapsed = started.elapsed();

        let report = match response {
            Ok(response) => classify(response.status(), elapsed, self.slow_threshold),
            Err(error) if error.is_timeout() => ProbeReport {
                status: ProbeStatus::Offline,
                response_time: None,
                message: "Server did not answer in time".to_string(),
            },
            Err(error) => ProbeReport {
                status: ProbeStatus::Offline,
                response_time: None,
                message: format!("Cannot reach server: {error}"),
            },
        };
        tracing::debug!(
            "Probe {} -> {} ({})",
            self.url,
            report.status,
            report.message
        );
        report
    }
}

/// Map an HTTP answer to a probe status
pub fn classify(status: StatusCode, elapsed: Duration, slow_threshold: Duration) -> ProbeReport {
    let millis = elapsed.as_millis();

    if status.is_success() {
        if elapsed >= slow_threshold {
            ProbeReport {
                status: ProbeStatus::Slow,
                response_time: Some(elapsed),
                message: format!("Slow connection ({millis}ms)"),
            }
        } else {
            ProbeReport {
                status: ProbeStatus::Online,
                response_time: Some(elapsed),
                message: format!("Server reachable ({millis}ms)"),
            }
        }
    } else if status == StatusCode::NOT_FOUND {
        // No health endpoint deployed, but something answered
        ProbeReport {
            status: ProbeStatus::Online,
            response_time: Some(elapsed),
            message: format!("Server reachable ({millis}ms)"),
        }
    } else {
        ProbeReport {
            status: ProbeStatus::Error,
            response_time: Some(elapsed),
            message: format!("Server error: HTTP {}", status.as_u16()),
        }
    }
}
