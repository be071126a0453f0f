//! Shared encoding utilities.

use base64::Engine;

/// Decode standard (padded) base64, ignoring embedded CR and LF characters.
pub(crate) fn decode_base64(input: &str) -> Result<Vec<u8>, base64::DecodeError> {
    let compact: String = input.chars().filter(|c| *c != '\r' && *c != '\n').collect();
    base64::engine::general_purpose::STANDARD.decode(compact)
}

/// Encode bytes as standard base64 on a single line.
pub(crate) fn encode_base64(data: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(data)
}

/// Bit length of a big-endian unsigned integer.
///
/// Leading zero bits (including whole zero bytes from DER sign padding) are
/// not counted, so a 2047-bit RSA modulus reports 2047.
pub fn modulus_bits(be_bytes: &[u8]) -> u32 {
    let Some(first) = be_bytes.iter().position(|&b| b != 0) else {
        return 0;
    };
    let significant = be_bytes.len() - first;
    let top = be_bytes.get(first).copied().unwrap_or(0);
    (significant as u32 - 1) * 8 + (8 - top.leading_zeros())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn bits_of_zero_and_empty() {
        assert_eq!(modulus_bits(&[]), 0);
        assert_eq!(modulus_bits(&[0, 0, 0]), 0);
    }

    #[test]
    fn bits_skip_sign_padding() {
        assert_eq!(modulus_bits(&[0x00, 0x80, 0x00]), 16);
        assert_eq!(modulus_bits(&[0x80, 0x00]), 16);
    }

    #[test]
    fn bits_count_partial_top_byte() {
        assert_eq!(modulus_bits(&[0x01]), 1);
        assert_eq!(modulus_bits(&[0x7F, 0xFF]), 15);
        assert_eq!(modulus_bits(&[0x00, 0x00, 0x03, 0x00]), 10);
    }

    #[test]
    fn base64_ignores_line_breaks() {
        assert_eq!(decode_base64("AQID\r\nBA==\n").unwrap(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn base64_requires_standard_alphabet_and_padding() {
        assert!(decode_base64("AQID-_").is_err());
        assert!(decode_base64("AQIDBA").is_err());
        assert!(decode_base64("not base64!").is_err());
    }

    #[test]
    fn base64_roundtrips_single_line() {
        let encoded = encode_base64(&[0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(encoded, "3q2+7w==");
        assert_eq!(decode_base64(&encoded).unwrap(), vec![0xDE, 0xAD, 0xBE, 0xEF]);
    }
}
