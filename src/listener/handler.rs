//! # Connection Handler
//!
//! Processes a single accepted connection:
//! `Accepted -> Reading -> {Decoded -> Appended, DecodeFailed} -> Closed`.
//!
//! The handler is generic over the stream type so it can be driven by a
//! `TcpStream` in production and by in-memory streams in tests.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, info};

use crate::config::ListenerConfig;
use crate::error::{Result, TelemetryError};
use crate::frame::decoder::{decode_payload, DecodeMode};
use crate::frame::protocol::Frame;
use crate::telemetry::log::TelemetryLog;

/// How one frame is read from a connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Accumulate until the peer closes, the size limit is exceeded or the
    /// read timeout fires
    #[default]
    UntilClose,

    /// One bounded read; anything beyond the buffer is ignored
    SingleRead,
}

/// Per-connection read and decode settings
#[derive(Debug, Clone, Copy)]
pub struct HandlerSettings {
    pub max_frame_bytes: usize,
    pub read_timeout_ms: u64,
    pub framing: Framing,
    pub mode: DecodeMode,
}

impl From<&ListenerConfig> for HandlerSettings {
    fn from(config: &ListenerConfig) -> Self {
        Self {
            max_frame_bytes: config.max_frame_bytes,
            read_timeout_ms: config.read_timeout_ms,
            framing: config.framing,
            mode: if config.strict { DecodeMode::Strict } else { DecodeMode::Lenient },
        }
    }
}

/// Reads one frame per connection and appends it to the telemetry log
#[derive(Debug, Clone)]
pub struct ConnectionHandler {
    log: Arc<TelemetryLog>,
    settings: HandlerSettings,
}

impl ConnectionHandler {
    /// Create a handler writing to `log`
    pub fn new(log: Arc<TelemetryLog>, settings: HandlerSettings) -> Self {
        Self { log, settings }
    }

    fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.settings.read_timeout_ms)
    }

    /// Handle one connection to completion
    ///
    /// The stream is shut down and dropped on every path, whether the frame
    /// was persisted or not.
    ///
    /// # Arguments
    ///
    /// * `stream` - Accepted connection
    /// * `peer` - Peer description used in log lines
    ///
    /// # Returns
    ///
    /// * `Result<Frame>` - The persisted frame
    ///
    /// # Errors
    ///
    /// Returns error if reading, decoding or appending fails. Zero rows are
    /// written in that case.
    pub async fn handle<S>(&self, mut stream: S, peer: &str) -> Result<Frame>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let result = self.process(&mut stream, peer).await;

        if let Err(e) = stream.shutdown().await {
            debug!("Shutdown of connection from {} failed: {}", peer, e);
        }
        debug!("Closed connection from {}", peer);

        result
    }

    async fn process<S>(&self, stream: &mut S, peer: &str) -> Result<Frame>
    where
        S: AsyncRead + Unpin,
    {
        let payload = match self.settings.framing {
            Framing::UntilClose => self.read_until_close(stream).await?,
            Framing::SingleRead => self.read_once(stream).await?,
        };

        info!(
            "Received {} bytes from {}: {}",
            payload.len(),
            peer,
            String::from_utf8_lossy(&payload).trim()
        );

        let frame = decode_payload(&payload, self.settings.mode)?;
        self.log.append(frame.tokens()).await?;

        info!("Persisted frame from {} to {}", peer, self.log.path().display());
        if let Some(sample) = frame.sample() {
            debug!(
                "Position {:.6},{:.6} accel {:?} gyro {:?} mag {:?}",
                sample.latitude, sample.longitude, sample.accel, sample.gyro, sample.mag
            );
        }
        Ok(frame)
    }

    /// Accumulate bytes until EOF, size overflow or timeout
    ///
    /// A timeout after some bytes arrived is treated as end of frame.
    async fn read_until_close<S>(&self, stream: &mut S) -> Result<BytesMut>
    where
        S: AsyncRead + Unpin,
    {
        let max = self.settings.max_frame_bytes;
        let deadline = Instant::now() + self.read_timeout();
        let mut buf = BytesMut::with_capacity(max + 1);

        loop {
            match timeout_at(deadline, stream.read_buf(&mut buf)).await {
                Ok(Ok(0)) => break,
                Ok(Ok(n)) => {
                    debug!("Read {} bytes ({} total)", n, buf.len());
                    if buf.len() > max {
                        return Err(TelemetryError::FrameTooLarge { max });
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) if buf.is_empty() => {
                    return Err(TelemetryError::ReadTimeout {
                        timeout_ms: self.settings.read_timeout_ms,
                    });
                }
                Err(_) => {
                    debug!("Read timeout with {} bytes buffered, treating as end of frame", buf.len());
                    break;
                }
            }
        }

        Ok(buf)
    }

    /// Single bounded read
    async fn read_once<S>(&self, stream: &mut S) -> Result<BytesMut>
    where
        S: AsyncRead + Unpin,
    {
        let mut buf = BytesMut::zeroed(self.settings.max_frame_bytes);

        let n = timeout(self.read_timeout(), stream.read(&mut buf))
            .await
            .map_err(|_| TelemetryError::ReadTimeout {
                timeout_ms: self.settings.read_timeout_ms,
            })??;

        buf.truncate(n);
        Ok(buf)
    }
}
