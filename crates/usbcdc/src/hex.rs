//! Hex formatting for received bytes

use std::fmt::Write;

/// Format bytes as two-digit lowercase hex, space-separated.
pub fn hex_line(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, b) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        // Writing to a String cannot fail.
        let _ = write!(out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_line() {
        assert_eq!(hex_line(&[0xde, 0xad, 0xbe, 0xef]), "de ad be ef");
        assert_eq!(hex_line(&[0x00, 0x07]), "00 07");
    }

    #[test]
    fn test_hex_line_empty() {
        assert_eq!(hex_line(&[]), "");
    }
}
