//! MIME structure of a message, as reported by the server.
//!
//! This is a small owned mirror of an IMAP `BODYSTRUCTURE` response. Only what
//! attachment extraction needs is kept.

use std::fmt;

use crate::mime::header::{decode_param_segments, decode_param_value};

/// Content-Transfer-Encoding of a single part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TransferEncoding {
    #[default]
    SevenBit,
    EightBit,
    Binary,
    Base64,
    QuotedPrintable,
    /// Any other token, kept verbatim. Content is passed through undecoded.
    Other(String),
}

impl TransferEncoding {
    /// Parse a Content-Transfer-Encoding token (case-insensitive).
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "7bit" => Self::SevenBit,
            "8bit" => Self::EightBit,
            "binary" => Self::Binary,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            _ => Self::Other(token.trim().to_string()),
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Binary => write!(f, "binary"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Other(token) => write!(f, "{token}"),
        }
    }
}

/// A leaf (non-multipart) MIME part.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessagePart {
    /// IMAP section path, e.g. `[2]` or `[2, 1]`.
    pub section: Vec<u32>,

    /// Lowercase MIME type (e.g. `"application/pdf"`).
    pub content_type: String,

    /// Content-Type parameters, in server order.
    pub params: Vec<(String, String)>,

    /// Lowercase Content-Disposition type (`"attachment"`, `"inline"`), if any.
    pub disposition: Option<String>,

    /// Content-Disposition parameters, in server order.
    pub disposition_params: Vec<(String, String)>,

    pub encoding: TransferEncoding,

    /// Size of the encoded body in octets.
    pub size: u32,
}

impl MessagePart {
    /// The Content-Disposition `filename` parameter, decoded.
    pub fn filename(&self) -> Option<String> {
        find_param(&self.disposition_params, "filename")
    }

    /// The Content-Type `name` parameter, decoded.
    pub fn name(&self) -> Option<String> {
        find_param(&self.params, "name")
    }

    /// A part is an attachment iff it declares a `filename` or a `name`.
    pub fn is_attachment(&self) -> bool {
        self.filename().is_some() || self.name().is_some()
    }

    /// Dotted section path for `BODY[...]`, e.g. `"2.1"`.
    pub fn section_spec(&self) -> String {
        section_spec(&self.section)
    }
}

/// Render a section path as used inside `BODY[...]`.
pub fn section_spec(section: &[u32]) -> String {
    let parts: Vec<String> = section.iter().map(|n| n.to_string()).collect();
    parts.join(".")
}

/// Look up a parameter by name, accepting the RFC 2231 forms `name*` and
/// `name*0`, `name*1*`, ... (continuations).
fn find_param(params: &[(String, String)], wanted: &str) -> Option<String> {
    let mut segments = Vec::new();
    for (key, value) in params {
        let key = key.to_ascii_lowercase();
        let Some(rest) = key.strip_prefix(wanted) else {
            continue;
        };
        if rest.is_empty() || rest == "*" {
            return Some(decode_param_value(&key, value));
        }
        if let Some((index, extended)) = continuation_index(rest) {
            segments.push((index, extended, value.as_str()));
        }
    }

    if segments.is_empty() {
        None
    } else {
        Some(decode_param_segments(segments))
    }
}

/// Parse the `*N` or `*N*` suffix of a continuation key.
fn continuation_index(suffix: &str) -> Option<(u32, bool)> {
    let suffix = suffix.strip_prefix('*')?;
    let (digits, extended) = match suffix.strip_suffix('*') {
        Some(digits) => (digits, true),
        None => (suffix, false),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    Some((digits.parse().ok()?, extended))
}

/// The MIME tree of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartTree {
    /// A single part. A non-multipart message is one `Single` at section `1`.
    Single(MessagePart),
    /// A multipart container with its children in order.
    Multipart {
        /// Lowercase subtype, e.g. `"mixed"`.
        subtype: String,
        parts: Vec<PartTree>,
    },
}

impl PartTree {
    /// Leaf parts directly below a multipart root.
    ///
    /// A single-part message has no top-level parts.
    pub fn top_level_parts(&self) -> Vec<&MessagePart> {
        match self {
            PartTree::Single(_) => Vec::new(),
            PartTree::Multipart { parts, .. } => parts
                .iter()
                .filter_map(|p| match p {
                    PartTree::Single(part) => Some(part),
                    PartTree::Multipart { .. } => None,
                })
                .collect(),
        }
    }

    /// Every leaf part, depth first.
    pub fn leaf_parts(&self) -> Vec<&MessagePart> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a MessagePart>) {
        match self {
            PartTree::Single(part) => out.push(part),
            PartTree::Multipart { parts, .. } => {
                for p in parts {
                    p.collect_leaves(out);
                }
            }
        }
    }
}
