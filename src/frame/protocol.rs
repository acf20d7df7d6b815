//! # Frame Protocol Constants and Types
//!
//! Wire and file layout shared by the device, the listener and log consumers.

use crate::error::DecodeError;

/// Field delimiter on the wire and in the persisted log
pub const FRAME_DELIMITER: char = ',';

/// Number of fields in a telemetry frame
pub const FRAME_FIELD_COUNT: usize = 11;

/// Column names, in wire order
pub const FIELD_NAMES: [&str; FRAME_FIELD_COUNT] = [
    "Latitud", "Longitud", "accx", "accy", "accz", "gyrox", "gyroy", "gyroz", "magx", "magy",
    "magz",
];

/// Header row written at the top of the telemetry log
pub const LOG_HEADER: &str = "Latitud,Longitud,accx,accy,accz,gyrox,gyroy,gyroz,magx,magy,magz";

/// Default receive buffer size for one frame (bytes)
pub const DEFAULT_MAX_FRAME_BYTES: usize = 256;

/// One received frame: the raw tokens exactly as split from the payload
///
/// Tokens are kept as text so the log persists what the device sent,
/// byte for byte. [`Frame::sample`] gives the typed view when the tokens
/// form a complete numeric reading.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    tokens: Vec<String>,
    sample: Option<TelemetrySample>,
}

impl Frame {
    /// Create a frame from already-split tokens
    pub fn new(tokens: Vec<String>) -> Self {
        let sample = parse_sample(&tokens).ok();
        Self { tokens, sample }
    }

    /// Create a frame whose tokens were already parsed into `sample`
    pub(crate) fn with_sample(tokens: Vec<String>, sample: TelemetrySample) -> Self {
        Self { tokens, sample: Some(sample) }
    }

    /// Raw tokens in wire order
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// Typed reading, if the frame has exactly 11 numeric fields
    pub fn sample(&self) -> Option<&TelemetrySample> {
        self.sample.as_ref()
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True if the frame carries no tokens
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Typed telemetry reading
///
/// Field order matches [`FIELD_NAMES`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Latitude in decimal degrees
    pub latitude: f64,

    /// Longitude in decimal degrees
    pub longitude: f64,

    /// Accelerometer X/Y/Z
    pub accel: [f64; 3],

    /// Gyroscope X/Y/Z
    pub gyro: [f64; 3],

    /// Magnetometer X/Y/Z
    pub mag: [f64; 3],
}

impl TelemetrySample {
    /// Build a sample from the 11 values in wire order
    pub fn from_values(v: [f64; FRAME_FIELD_COUNT]) -> Self {
        Self {
            latitude: v[0],
            longitude: v[1],
            accel: [v[2], v[3], v[4]],
            gyro: [v[5], v[6], v[7]],
            mag: [v[8], v[9], v[10]],
        }
    }
}

/// Parse split tokens into a typed sample
///
/// Each token is trimmed before conversion. Used by the strict decoder on
/// the wire and by the log reader on persisted rows.
///
/// # Errors
///
/// Returns error if:
/// - Token count is not 11
/// - A token does not parse as `f64` (the error carries its index)
pub fn parse_sample<S: AsRef<str>>(tokens: &[S]) -> Result<TelemetrySample, DecodeError> {
    if tokens.len() != FRAME_FIELD_COUNT {
        return Err(DecodeError::FieldCountMismatch {
            expected: FRAME_FIELD_COUNT,
            found: tokens.len(),
        });
    }

    let mut values = [0.0f64; FRAME_FIELD_COUNT];
    for (index, (value, token)) in values.iter_mut().zip(tokens).enumerate() {
        let token = token.as_ref();
        *value = token.trim().parse().map_err(|_| DecodeError::NotNumeric {
            index,
            token: token.to_string(),
        })?;
    }

    Ok(TelemetrySample::from_values(values))
}
