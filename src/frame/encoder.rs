//! # Frame Encoder
//!
//! Serializes frame tokens into log rows.

use super::protocol::*;

/// Encode tokens as one newline-terminated log row
///
/// Tokens are joined with the frame delimiter without quoting; a token is
/// assumed never to contain the delimiter.
///
/// # Examples
///
/// ```
/// use telemetry_ingest::frame::encoder::encode_row;
///
/// let row = encode_row(&["1.5", "2.5"]);
/// assert_eq!(row, "1.5,2.5\n");
/// ```
pub fn encode_row<S: AsRef<str>>(tokens: &[S]) -> String {
    let mut row = String::with_capacity(tokens.iter().map(|t| t.as_ref().len() + 1).sum());

    for (i, token) in tokens.iter().enumerate() {
        if i > 0 {
            row.push(FRAME_DELIMITER);
        }
        row.push_str(token.as_ref());
    }

    row.push('\n');
    row
}

/// Encode the fixed header row
pub fn encode_header() -> String {
    encode_row(&FIELD_NAMES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::decoder::{decode_line, DecodeMode};

    #[test]
    fn test_encode_row_joins_with_comma() {
        assert_eq!(encode_row(&["a", "b", "c"]), "a,b,c\n");
    }

    #[test]
    fn test_encode_single_token() {
        assert_eq!(encode_row(&["42"]), "42\n");
    }

    #[test]
    fn test_encode_header() {
        assert_eq!(encode_header(), format!("{}\n", LOG_HEADER));
    }

    #[test]
    fn test_consumer_split_recovers_tokens() {
        let line = "40.4168,-3.7038,0.1,0.2,9.8,0.01,0.02,0.03,20,21,22";
        let frame = decode_line(line, DecodeMode::Strict).unwrap();
        let row = encode_row(frame.tokens());

        let recovered: Vec<&str> = row.trim_end_matches('\n').split(FRAME_DELIMITER).collect();
        assert_eq!(recovered, frame.tokens());
    }
}
