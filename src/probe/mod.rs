//! # Reachability Probe
//!
//! Repeatedly opens a TCP connection to a target to check that it is
//! reachable. Independent of the ingestion listener.
//!
//! Each cycle uses a fresh connection attempt. Failures are expected and
//! are followed by a fixed wait before the next attempt.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ProbeConfig;
use crate::error::{Result, TelemetryError};

/// What the probe does after a successful connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeMode {
    /// Keep probing until cancelled, reporting every outcome
    #[default]
    LoopForever,

    /// Stop after the first successful connection
    ExitOnSuccess,
}

/// Host and port to probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeTarget {
    pub host: String,
    pub port: u16,
}

impl ProbeTarget {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self { host: host.into(), port }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "[{}]:{}", self.host, self.port)
        } else {
            write!(f, "{}:{}", self.host, self.port)
        }
    }
}

/// Outcome counters of a probe run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeReport {
    pub attempts: u64,
    pub successes: u64,
    pub failures: u64,
}

/// Connectivity probe
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    target: ProbeTarget,
    retry_interval: Duration,
    connect_timeout: Duration,
    mode: ProbeMode,
}

impl ReachabilityProbe {
    /// Create a probe
    ///
    /// # Arguments
    ///
    /// * `target` - Host and port to connect to
    /// * `retry_interval` - Wait between attempts
    /// * `connect_timeout` - Upper bound for a single connect
    /// * `mode` - Loop forever or stop on first success
    pub fn new(
        target: ProbeTarget,
        retry_interval: Duration,
        connect_timeout: Duration,
        mode: ProbeMode,
    ) -> Self {
        Self {
            target,
            retry_interval,
            connect_timeout,
            mode,
        }
    }

    /// Build a probe from the `[probe]` config section
    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(
            ProbeTarget::new(config.host.clone(), config.port),
            Duration::from_millis(config.retry_interval_ms),
            Duration::from_millis(config.connect_timeout_ms),
            config.mode,
        )
    }

    pub fn target(&self) -> &ProbeTarget {
        &self.target
    }

    /// Make a single connection attempt
    ///
    /// On success the connection is closed immediately.
    ///
    /// # Errors
    ///
    /// Returns `TelemetryError::Connect` if the connection is refused, the
    /// host cannot be resolved, or the connect timeout elapses.
    pub async fn attempt(&self) -> Result<()> {
        let target = self.target.to_string();
        debug!("Connecting to {}", target);

        let connect = TcpStream::connect((self.target.host.as_str(), self.target.port));
        let stream = timeout(self.connect_timeout, connect)
            .await
            .map_err(|_| TelemetryError::Connect {
                target: target.clone(),
                reason: format!("timed out after {}ms", self.connect_timeout.as_millis()),
            })?
            .map_err(|e| TelemetryError::Connect {
                target: target.clone(),
                reason: e.to_string(),
            })?;

        drop(stream);
        Ok(())
    }

    /// Probe until cancelled (or until the first success in
    /// [`ProbeMode::ExitOnSuccess`])
    ///
    /// Both the connect and the wait between attempts are interrupted by
    /// `shutdown`. The wait also follows a success, so a reachable target is
    /// not hammered.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use std::time::Duration;
    /// use telemetry_ingest::probe::{ProbeMode, ProbeTarget, ReachabilityProbe};
    /// use tokio_util::sync::CancellationToken;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let probe = ReachabilityProbe::new(
    ///         ProbeTarget::new("192.168.70.109", 8080),
    ///         Duration::from_secs(5),
    ///         Duration::from_secs(3),
    ///         ProbeMode::ExitOnSuccess,
    ///     );
    ///     let report = probe.run(CancellationToken::new()).await;
    ///     println!("{} attempts", report.attempts);
    /// }
    /// ```
    pub async fn run(&self, shutdown: CancellationToken) -> ProbeReport {
        let mut report = ProbeReport::default();
        info!("Probing {} every {}ms", self.target, self.retry_interval.as_millis());

        loop {
            let outcome = tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                outcome = self.attempt() => outcome,
            };
            report.attempts += 1;

            match outcome {
                Ok(()) => {
                    report.successes += 1;
                    info!("Connection to {} succeeded", self.target);
                    if self.mode == ProbeMode::ExitOnSuccess {
                        break;
                    }
                }
                Err(e) => {
                    report.failures += 1;
                    warn!("{}. Retrying in {}ms...", e, self.retry_interval.as_millis());
                }
            }

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(self.retry_interval) => {}
            }
        }

        info!(
            "Probe of {} finished: {} attempts, {} succeeded, {} failed",
            self.target, report.attempts, report.successes, report.failures
        );
        report
    }
}
