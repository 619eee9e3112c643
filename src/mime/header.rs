//! Decoding of MIME parameter values: encoded-words (RFC 2047) and
//! extended values (RFC 2231).
//!
//! Servers hand back `BODYSTRUCTURE` parameters verbatim, so attachment names
//! frequently arrive as `=?UTF-8?B?...?=` or `utf-8''na%C3%AFve.pdf`.

use tracing::warn;

use super::decode::{decode_base64, decode_quoted_printable};

/// Decode a parameter value.
///
/// `key` is the parameter name as sent; a trailing `*` marks an RFC 2231
/// extended value (`charset'language'percent-encoded`).
pub fn decode_param_value(key: &str, value: &str) -> String {
    if key.ends_with('*') {
        if let Some(decoded) = decode_extended_value(value) {
            return decoded;
        }
    }
    decode_encoded_words(value)
}

/// Decode an RFC 2231 extended value: `utf-8'en'%C3%A9t%C3%A9.txt`.
fn decode_extended_value(value: &str) -> Option<String> {
    let (charset, encoded) = split_extended(value)?;
    Some(decode_charset(charset, &percent_decode(encoded)))
}

/// Split `charset'language'encoded` into the charset and the encoded text.
fn split_extended(value: &str) -> Option<(&str, &str)> {
    let mut pieces = value.splitn(3, '\'');
    let charset = pieces.next()?;
    let _language = pieces.next()?;
    let encoded = pieces.next()?;
    let charset = if charset.is_empty() { "us-ascii" } else { charset };
    Some((charset, encoded))
}

/// Join an RFC 2231 continuation (`filename*0*`, `filename*1*`, ...).
///
/// Each segment is `(index, extended, value)`. Segments are joined in index
/// order; extended segments are percent-decoded and the charset comes from
/// segment 0.
pub fn decode_param_segments(mut segments: Vec<(u32, bool, &str)>) -> String {
    segments.sort_by_key(|&(index, _, _)| index);

    let mut charset = None;
    let mut bytes = Vec::new();
    for (i, &(_, extended, value)) in segments.iter().enumerate() {
        if !extended {
            bytes.extend_from_slice(value.as_bytes());
            continue;
        }
        let encoded = match split_extended(value) {
            Some((cs, encoded)) if i == 0 => {
                charset = Some(cs);
                encoded
            }
            _ => value,
        };
        bytes.extend(percent_decode(encoded));
    }

    match charset {
        Some(charset) => decode_charset(charset, &bytes),
        None => decode_encoded_words(&String::from_utf8_lossy(&bytes)),
    }
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut result = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if let Some(byte) = bytes.get(i + 1..i + 3).and_then(hex_byte) {
                result.push(byte);
                i += 3;
                continue;
            }
        }
        result.push(bytes[i]);
        i += 1;
    }
    result
}

fn hex_byte(pair: &[u8]) -> Option<u8> {
    std::str::from_utf8(pair)
        .ok()
        .and_then(|s| u8::from_str_radix(s, 16).ok())
}

/// Decode the RFC 2047 encoded-words in `input`.
///
/// `=?UTF-8?B?SG9sYQ==?= =?UTF-8?B?IG11bmRv?=` decodes to `Hola mundo`.
/// Whitespace separating two encoded words is dropped; anything that does not
/// parse as an encoded word is copied through unchanged.
pub fn decode_encoded_words(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (text, candidate) = rest.split_at(start);
        match parse_encoded_word(candidate) {
            Some((decoded, tail)) => {
                if !(after_word && text.trim().is_empty()) {
                    out.push_str(text);
                }
                out.push_str(&decoded);
                rest = tail;
                after_word = true;
            }
            None => {
                out.push_str(text);
                out.push_str("=?");
                rest = &candidate[2..];
                after_word = false;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Parse one `=?charset?scheme?payload?=` word at the start of `s`, returning
/// the decoded text and whatever follows the word.
fn parse_encoded_word(s: &str) -> Option<(String, &str)> {
    let body = s.strip_prefix("=?")?;
    let (charset, body) = body.split_once('?')?;
    let (scheme, body) = body.split_once('?')?;
    let (payload, tail) = body.split_once("?=")?;

    let bytes = match scheme {
        "B" | "b" => decode_base64(payload.as_bytes()).ok()?,
        "Q" | "q" => decode_quoted_printable(payload.replace('_', " ").as_bytes()),
        _ => return None,
    };

    // UTF-8*en: drop the RFC 2231 language tag
    let charset = charset.split_once('*').map_or(charset, |(cs, _)| cs);
    Some((decode_charset(charset, &bytes), tail))
}

/// Decode `bytes` from the charset named by `label`.
fn decode_charset(label: &str, bytes: &[u8]) -> String {
    match encoding_rs::Encoding::for_label(label.trim().as_bytes()) {
        Some(encoding) => encoding.decode(bytes).0.into_owned(),
        None => {
            warn!(charset = label, "Unknown charset, decoding as lossy UTF-8");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}
