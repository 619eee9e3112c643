//! Content-Transfer-Encoding decoding for fetched part bodies.

use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::Engine;

use crate::error::{FetchError, Result};
use crate::model::part::TransferEncoding;

/// Standard alphabet, padding optional. Servers are not consistent about it.
const BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a raw part body according to its transfer encoding.
///
/// Base64 and quoted-printable are decoded; every other encoding is returned
/// unchanged.
pub fn decode_body(encoding: &TransferEncoding, raw: &[u8]) -> Result<Vec<u8>> {
    match encoding {
        TransferEncoding::Base64 => decode_base64(raw),
        TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(raw)),
        _ => Ok(raw.to_vec()),
    }
}

/// Decode base64, ignoring the line breaks and other ASCII whitespace that
/// wrap encoded bodies.
pub fn decode_base64(raw: &[u8]) -> Result<Vec<u8>> {
    let compact: Vec<u8> = raw
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    BASE64.decode(&compact).map_err(|e| FetchError::Decode {
        encoding: TransferEncoding::Base64.to_string(),
        reason: e.to_string(),
    })
}

/// Decode quoted-printable (RFC 2045 §6.7).
///
/// `=XX` becomes the byte, soft line breaks (`=` at end of line) are removed.
/// Malformed `=` sequences are kept as they are.
pub fn decode_quoted_printable(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] != b'=' {
            result.push(raw[i]);
            i += 1;
            continue;
        }

        let rest = &raw[i + 1..];
        if rest.starts_with(b"\r\n") {
            i += 3;
        } else if rest.starts_with(b"\n") {
            i += 2;
        } else if let Some(byte) = rest.get(..2).and_then(hex_pair) {
            result.push(byte);
            i += 3;
        } else {
            result.push(b'=');
            i += 1;
        }
    }
    result
}

fn hex_pair(pair: &[u8]) -> Option<u8> {
    let hi = (pair[0] as char).to_digit(16)?;
    let lo = (pair[1] as char).to_digit(16)?;
    Some((hi * 16 + lo) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base64_exact_bytes() {
        let original: Vec<u8> = (0u8..=255).collect();
        let encoded = base64::engine::general_purpose::STANDARD.encode(&original);
        // wrap at 76 columns like a mail body
        let wrapped: Vec<u8> = encoded
            .as_bytes()
            .chunks(76)
            .flat_map(|line| line.iter().copied().chain(*b"\r\n"))
            .collect();
        assert_eq!(decode_base64(&wrapped).unwrap(), original);
    }

    #[test]
    fn test_base64_without_padding() {
        assert_eq!(decode_base64(b"aGk").unwrap(), b"hi");
        assert_eq!(decode_base64(b"aGk=").unwrap(), b"hi");
    }

    #[test]
    fn test_base64_invalid() {
        let err = decode_base64(b"not*base64").unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[test]
    fn test_quoted_printable() {
        let raw = b"Caf=C3=A9 con le=c3=b1a=\r\n and more=\nsoft\r\nhard";
        assert_eq!(
            decode_quoted_printable(raw),
            "Café con leña and moresoft\r\nhard".as_bytes()
        );
    }

    #[test]
    fn test_quoted_printable_malformed_is_kept() {
        assert_eq!(decode_quoted_printable(b"a=ZZb="), b"a=ZZb=");
        assert_eq!(decode_quoted_printable(b"1+1=2"), b"1+1=2");
    }

    #[test]
    fn test_identity_encodings() {
        let raw = b"plain =41 text";
        for encoding in [
            TransferEncoding::SevenBit,
            TransferEncoding::EightBit,
            TransferEncoding::Binary,
            TransferEncoding::Other("x-custom".into()),
        ] {
            assert_eq!(decode_body(&encoding, raw).unwrap(), raw);
        }
        assert_eq!(
            decode_body(&TransferEncoding::QuotedPrintable, raw).unwrap(),
            b"plain A text"
        );
    }
}
