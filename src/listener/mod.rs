//! # Listener Module
//!
//! TCP ingestion service for telemetry frames.
//!
//! This module handles:
//! - Binding and listening on the configured address with a fixed backlog
//! - Accepting one connection at a time and dispatching it to the handler
//! - Graceful shutdown: a pending accept is cancelled, an in-flight frame
//!   is always finished first

pub mod handler;

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ListenerConfig;
use crate::error::{Result, TelemetryError};
use crate::telemetry::log::TelemetryLog;
use handler::{ConnectionHandler, HandlerSettings};

/// Pause after a failed accept before trying again
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Counters collected over one `run`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ServiceStats {
    /// Connections accepted
    pub accepted: u64,

    /// Frames appended to the log
    pub persisted: u64,

    /// Connections closed without a row (decode, read or write failure)
    pub rejected: u64,
}

/// Telemetry ingestion listener
///
/// Owns its socket and a handle to the telemetry log. Lifecycle is
/// `bind -> listen -> run`; [`ListenerService::start`] does the first two.
#[derive(Debug)]
pub struct ListenerService {
    config: ListenerConfig,
    handler: ConnectionHandler,
    socket: Option<TcpSocket>,
    listener: Option<TcpListener>,
    stats: ServiceStats,
}

impl ListenerService {
    /// Create a service that persists frames to `log`
    pub fn new(config: ListenerConfig, log: Arc<TelemetryLog>) -> Self {
        let handler = ConnectionHandler::new(log, HandlerSettings::from(&config));

        Self {
            config,
            handler,
            socket: None,
            listener: None,
            stats: ServiceStats::default(),
        }
    }

    /// Configured address as `host:port`
    fn configured_addr(&self) -> String {
        match self.config.host.parse::<IpAddr>() {
            Ok(IpAddr::V6(ip)) => format!("[{}]:{}", ip, self.config.port),
            _ => format!("{}:{}", self.config.host, self.config.port),
        }
    }

    /// Create the socket and bind it to the configured host and port
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::Bind` if the host is not an IP address of a
    /// local interface (or a wildcard), the port is in use, or permission is
    /// denied. The caller is expected to treat this as fatal.
    pub fn bind(&mut self) -> Result<()> {
        let addr_text = self.configured_addr();
        let bind_err = |source: std::io::Error| TelemetryError::Bind {
            addr: addr_text.clone(),
            source,
        };

        let ip: IpAddr = self.config.host.parse().map_err(|e| {
            bind_err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid listen host {:?}: {}", self.config.host, e),
            ))
        })?;
        let addr = SocketAddr::new(ip, self.config.port);

        let socket = match addr {
            SocketAddr::V4(_) => TcpSocket::new_v4(),
            SocketAddr::V6(_) => TcpSocket::new_v6(),
        }
        .map_err(bind_err)?;

        socket.bind(addr).map_err(bind_err)?;

        info!("Socket bound to {}", addr);
        self.socket = Some(socket);
        Ok(())
    }

    /// Start listening on the bound socket with the configured backlog
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::Listen` if the socket was not bound or the
    /// OS refuses to listen. Fatal, like bind errors.
    pub fn listen(&mut self) -> Result<()> {
        let backlog = self.config.backlog;
        let addr = self.configured_addr();

        let socket = self.socket.take().ok_or_else(|| TelemetryError::Listen {
            addr: addr.clone(),
            backlog,
            source: std::io::Error::new(std::io::ErrorKind::NotConnected, "socket is not bound"),
        })?;

        let listener = socket
            .listen(backlog)
            .map_err(|source| TelemetryError::Listen { addr, backlog, source })?;

        info!("Waiting for incoming connections (backlog {})", backlog);
        self.listener = Some(listener);
        Ok(())
    }

    /// Bind and listen in one step
    pub fn start(&mut self) -> Result<()> {
        self.bind()?;
        self.listen()
    }

    /// Address the listener is actually bound to
    ///
    /// Useful when the configured port is 0.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }
        if let Some(socket) = &self.socket {
            return Ok(socket.local_addr()?);
        }
        Err(TelemetryError::Io(std::io::Error::new(
            std::io::ErrorKind::NotConnected,
            "listener is not bound",
        )))
    }

    /// Counters so far
    pub fn stats(&self) -> ServiceStats {
        self.stats
    }

    /// Run the accept loop until `shutdown` is cancelled
    ///
    /// Connections are handled strictly one at a time, in accept order.
    /// Per-connection failures are logged and never end the loop.
    ///
    /// # Returns
    ///
    /// * `Result<ServiceStats>` - Counters collected during the run
    ///
    /// # Errors
    ///
    /// Returns error only if the service is not listening yet
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::sync::Arc;
    /// use telemetry_ingest::config::ListenerConfig;
    /// use telemetry_ingest::listener::ListenerService;
    /// use telemetry_ingest::telemetry::log::{HeaderPolicy, TelemetryLog};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// #[tokio::main]
    /// async fn main() -> anyhow::Result<()> {
    ///     let log = TelemetryLog::initialize("datos.csv", HeaderPolicy::IfEmpty).await?;
    ///     let mut service = ListenerService::new(ListenerConfig::default(), Arc::new(log));
    ///     service.start()?;
    ///     service.run(CancellationToken::new()).await?;
    ///     Ok(())
    /// }
    /// ```
    pub async fn run(&mut self, shutdown: CancellationToken) -> Result<ServiceStats> {
        let listener = self.listener.as_ref().ok_or_else(|| {
            TelemetryError::Io(std::io::Error::new(
                std::io::ErrorKind::NotConnected,
                "listener is not listening; call start() first",
            ))
        })?;

        loop {
            tokio::select! {
                biased;

                _ = shutdown.cancelled() => {
                    info!("Listener received shutdown signal");
                    break;
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            info!("Connection established with {}", peer);
                            self.stats.accepted += 1;

                            // In-flight frame is not interrupted by shutdown
                            match self.handler.handle(stream, &peer.to_string()).await {
                                Ok(frame) => {
                                    self.stats.persisted += 1;
                                    debug!("Frame with {} fields stored", frame.len());
                                }
                                Err(e) => {
                                    self.stats.rejected += 1;
                                    warn!("Dropped frame from {}: {}", peer, e);
                                }
                            }
                        }
                        Err(e) => {
                            warn!("Failed to accept connection: {}", e);
                            tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                        }
                    }
                }
            }
        }

        info!(
            "Listener stopped: {} accepted, {} persisted, {} rejected",
            self.stats.accepted, self.stats.persisted, self.stats.rejected
        );
        Ok(self.stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::log::HeaderPolicy;
    use tempfile::TempDir;

    fn loopback_config() -> ListenerConfig {
        ListenerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            ..ListenerConfig::default()
        }
    }

    async fn new_log(dir: &TempDir) -> Arc<TelemetryLog> {
        Arc::new(
            TelemetryLog::initialize(dir.path().join("datos.csv"), HeaderPolicy::IfEmpty)
                .await
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn test_start_on_ephemeral_port() {
        let dir = TempDir::new().unwrap();
        let mut service = ListenerService::new(loopback_config(), new_log(&dir).await);

        service.start().unwrap();

        let addr = service.local_addr().unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_ne!(addr.port(), 0);
    }

    #[tokio::test]
    async fn test_bind_rejects_hostname() {
        let dir = TempDir::new().unwrap();
        let mut config = loopback_config();
        config.host = "not-an-ip".to_string();
        let mut service = ListenerService::new(config, new_log(&dir).await);

        let err = service.bind().unwrap_err();
        match err {
            TelemetryError::Bind { addr, .. } => assert_eq!(addr, "not-an-ip:0"),
            other => panic!("Expected Bind error, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_bind_port_in_use() {
        let dir = TempDir::new().unwrap();
        let occupied = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = occupied.local_addr().unwrap().port();

        let mut config = loopback_config();
        config.port = port;
        let mut service = ListenerService::new(config, new_log(&dir).await);

        let err = service.start().unwrap_err();
        assert!(matches!(err, TelemetryError::Bind { .. }), "got: {:?}", err);
    }

    #[tokio::test]
    async fn test_listen_without_bind() {
        let dir = TempDir::new().unwrap();
        let mut service = ListenerService::new(loopback_config(), new_log(&dir).await);

        let err = service.listen().unwrap_err();
        assert!(matches!(err, TelemetryError::Listen { backlog: 5, .. }));
    }

    #[tokio::test]
    async fn test_run_without_listen() {
        let dir = TempDir::new().unwrap();
        let mut service = ListenerService::new(loopback_config(), new_log(&dir).await);

        let result = service.run(CancellationToken::new()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let dir = TempDir::new().unwrap();
        let mut service = ListenerService::new(loopback_config(), new_log(&dir).await);
        service.start().unwrap();

        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let stats = service.run(shutdown).await.unwrap();
        assert_eq!(stats, ServiceStats::default());
    }

    #[tokio::test]
    async fn test_configured_addr_formats_ipv6() {
        let dir = TempDir::new().unwrap();
        let mut config = loopback_config();
        config.host = "::1".to_string();
        config.port = 8080;

        let service = ListenerService::new(config, new_log(&dir).await);
        assert_eq!(service.configured_addr(), "[::1]:8080");
    }
}
