//! # Frame Decoder
//!
//! Turns a raw payload received from the device into a [`Frame`].

use super::protocol::*;
use crate::error::DecodeError;

/// How much checking the decoder applies beyond splitting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeMode {
    /// Require exactly 11 numeric fields
    #[default]
    Strict,

    /// Accept any non-empty line as raw tokens
    Lenient,
}

/// Decode a raw payload as received from the connection
///
/// # Arguments
///
/// * `payload` - Bytes read from the connection
/// * `mode` - Validation level
///
/// # Returns
///
/// * `Result<Frame, DecodeError>` - Decoded frame, or the reason it was rejected
///
/// # Errors
///
/// Returns error if:
/// - Payload is not UTF-8
/// - Payload is empty after trimming
/// - Payload contains a line break other than at either end
/// - (strict) Field count is not 11 or a field is not numeric
pub fn decode_payload(payload: &[u8], mode: DecodeMode) -> Result<Frame, DecodeError> {
    let line = std::str::from_utf8(payload).map_err(|_| DecodeError::InvalidUtf8)?;
    decode_line(line, mode)
}

/// Decode one line of comma-separated tokens
///
/// Surrounding whitespace of the whole line is trimmed before splitting.
/// Individual tokens are kept as-is so the persisted row matches the wire.
/// A line break left inside the trimmed line is rejected in both modes.
///
/// # Examples
///
/// ```
/// use telemetry_ingest::frame::decoder::{decode_line, DecodeMode};
///
/// let frame = decode_line(
///     "40.4168,-3.7038,0.1,0.2,9.8,0.01,0.02,0.03,20,21,22\r\n",
///     DecodeMode::Strict,
/// ).unwrap();
/// assert_eq!(frame.len(), 11);
/// ```
pub fn decode_line(line: &str, mode: DecodeMode) -> Result<Frame, DecodeError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(DecodeError::Empty);
    }
    // One frame is one log row
    if line.contains(['\n', '\r']) {
        return Err(DecodeError::EmbeddedNewline);
    }

    let tokens: Vec<String> = line.split(FRAME_DELIMITER).map(str::to_string).collect();

    match mode {
        DecodeMode::Strict => {
            let sample = parse_sample(&tokens)?;
            Ok(Frame::with_sample(tokens, sample))
        }
        DecodeMode::Lenient => Ok(Frame::new(tokens)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_LINE: &str = "40.4168,-3.7038,0.1,0.2,9.8,0.01,0.02,0.03,20,21,22";

    #[test]
    fn test_decode_valid_line() {
        let frame = decode_line(SAMPLE_LINE, DecodeMode::Strict).unwrap();
        assert_eq!(frame.len(), FRAME_FIELD_COUNT);
        assert_eq!(frame.tokens()[0], "40.4168");
        assert_eq!(frame.tokens()[10], "22");
    }

    #[test]
    fn test_decode_trims_whole_line() {
        let frame = decode_line("  40.4168,-3.7038,0.1,0.2,9.8,0.01,0.02,0.03,20,21,22\n", DecodeMode::Strict)
            .unwrap();
        assert_eq!(frame.tokens()[0], "40.4168");
        assert_eq!(frame.tokens()[10], "22");
    }

    #[test]
    fn test_decode_keeps_inner_token_whitespace() {
        let frame = decode_line("1, 2", DecodeMode::Lenient).unwrap();
        assert_eq!(frame.tokens(), &["1".to_string(), " 2".to_string()]);
    }

    #[test]
    fn test_decode_empty_payload() {
        assert_eq!(decode_line("", DecodeMode::Strict), Err(DecodeError::Empty));
        assert_eq!(decode_line(" \r\n", DecodeMode::Lenient), Err(DecodeError::Empty));
    }

    #[test]
    fn test_decode_field_count_mismatch() {
        let result = decode_line("40.4168,-3.7038,0.1", DecodeMode::Strict);
        assert_eq!(
            result,
            Err(DecodeError::FieldCountMismatch { expected: 11, found: 3 })
        );
    }

    #[test]
    fn test_decode_not_numeric() {
        let result = decode_line("40.4168,-3.7038,0.1,0.2,abc,0.01,0.02,0.03,20,21,22", DecodeMode::Strict);
        assert_eq!(
            result,
            Err(DecodeError::NotNumeric { index: 4, token: "abc".to_string() })
        );
    }

    #[test]
    fn test_decode_rejects_inner_line_break() {
        assert_eq!(decode_line("1,2\n3,4,5", DecodeMode::Lenient), Err(DecodeError::EmbeddedNewline));
        assert_eq!(decode_line("1,2\r3", DecodeMode::Lenient), Err(DecodeError::EmbeddedNewline));

        let two_frames = format!("{}\n{}\n", SAMPLE_LINE, SAMPLE_LINE);
        assert_eq!(decode_line(&two_frames, DecodeMode::Strict), Err(DecodeError::EmbeddedNewline));
    }

    #[test]
    fn test_decode_strict_frame_has_sample() {
        let frame = decode_line(SAMPLE_LINE, DecodeMode::Strict).unwrap();
        let sample = frame.sample().expect("strict frame carries a sample");
        assert_eq!(sample.latitude, 40.4168);
        assert_eq!(sample.mag, [20.0, 21.0, 22.0]);
    }

    #[test]
    fn test_decode_lenient_accepts_any_shape() {
        let frame = decode_line("hello,world", DecodeMode::Lenient).unwrap();
        assert_eq!(frame.len(), 2);
    }

    #[test]
    fn test_decode_payload_invalid_utf8() {
        let result = decode_payload(&[0x34, 0x30, 0xFF, 0xFE], DecodeMode::Lenient);
        assert_eq!(result, Err(DecodeError::InvalidUtf8));
    }

    #[test]
    fn test_decode_payload_bytes() {
        let frame = decode_payload(SAMPLE_LINE.as_bytes(), DecodeMode::Strict).unwrap();
        assert_eq!(frame.tokens().join(","), SAMPLE_LINE);
    }

    #[test]
    fn test_default_mode_is_strict() {
        assert_eq!(DecodeMode::default(), DecodeMode::Strict);
    }
}
