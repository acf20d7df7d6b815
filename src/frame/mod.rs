//! # Frame Codec Module
//!
//! Text framing used by the telemetry device.
//!
//! This module handles:
//! - Frame layout constants (field order, delimiter, log header)
//! - Decoding a received payload into raw tokens, optionally validated
//! - Encoding frames as CSV log rows

pub mod protocol;
pub mod encoder;
pub mod decoder;
