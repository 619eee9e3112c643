//! [`Connector`] and [`MailSession`] over the `imap` crate with `native-tls`.

use std::net::TcpStream;

use imap_proto::types::{BodyStructure, ContentEncoding, SectionPath};
use native_tls::{TlsConnector, TlsStream};
use tracing::{debug, trace};

use crate::error::{FetchError, Result};
use crate::model::part::{section_spec, MessagePart, PartTree, TransferEncoding};

use super::connection::{ConnectionSettings, Transport};
use super::{Connector, MailSession};

/// Opens TLS-secured IMAP sessions.
#[derive(Debug, Clone)]
pub struct ImapConnector {
    settings: ConnectionSettings,
}

impl ImapConnector {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &ConnectionSettings {
        &self.settings
    }
}

impl Connector for ImapConnector {
    type Session = ImapSession;

    fn open(&self) -> Result<ImapSession> {
        let s = &self.settings;

        let tls = TlsConnector::builder()
            .danger_accept_invalid_certs(!s.validate_certs)
            .build()
            .map_err(|e| FetchError::connection(&s.host, e))?;

        let addr = (s.host.as_str(), s.port);
        let client = match s.transport {
            Transport::Tls => ::imap::connect(addr, &s.host, &tls),
            Transport::StartTls => ::imap::connect_starttls(addr, &s.host, &tls),
        }
        .map_err(|e| FetchError::connection(&s.host, e))?;

        let mut session = client.login(&s.user, &s.password).map_err(|(e, _client)| {
            FetchError::connection(&s.host, format!("login as '{}' failed: {e}", s.user))
        })?;

        // EXAMINE opens the mailbox read-only: fetching never changes flags.
        let mailbox = session.examine(&s.mailbox).map_err(|e| {
            FetchError::connection(
                &s.host,
                format!("cannot open mailbox '{}': {e}", s.mailbox),
            )
        })?;
        debug!(mailbox = %s.mailbox, exists = mailbox.exists, "Mailbox examined");

        Ok(ImapSession { inner: session })
    }

    fn describe(&self) -> String {
        self.settings.describe()
    }
}

/// A logged-in session with a mailbox examined.
pub struct ImapSession {
    inner: ::imap::Session<TlsStream<TcpStream>>,
}

impl MailSession for ImapSession {
    fn search(&mut self, query: &str, charset: &str) -> Result<Vec<u32>> {
        let command = if charset.is_empty() {
            query.to_string()
        } else {
            format!("CHARSET {charset} {query}")
        };
        trace!(command = %command, "SEARCH");

        let found = self
            .inner
            .search(&command)
            .map_err(|e| command_error("SEARCH", e))?;
        let mut ids: Vec<u32> = found.into_iter().collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch_structure(&mut self, message: u32) -> Result<PartTree> {
        let fetches = self
            .inner
            .fetch(message.to_string(), "BODYSTRUCTURE")
            .map_err(|e| command_error("FETCH", e))?;

        let structure = fetches
            .iter()
            .filter(|f| f.message == message)
            .find_map(|f| f.bodystructure())
            .ok_or_else(|| {
                FetchError::protocol(
                    "FETCH",
                    format!("no BODYSTRUCTURE returned for message {message}"),
                )
            })?;

        Ok(part_tree(structure, Vec::new()))
    }

    fn fetch_body(&mut self, message: u32, section: &[u32]) -> Result<Vec<u8>> {
        let spec = section_spec(section);
        // PEEK leaves \Seen alone
        let fetches = self
            .inner
            .fetch(message.to_string(), format!("BODY.PEEK[{spec}]"))
            .map_err(|e| command_error("FETCH", e))?;

        let path = SectionPath::Part(section.to_vec(), None);
        let body = fetches
            .iter()
            .filter(|f| f.message == message)
            .find_map(|f| f.section(&path))
            .ok_or_else(|| {
                FetchError::protocol(
                    "FETCH",
                    format!("no BODY[{spec}] returned for message {message}"),
                )
            })?;

        Ok(body.to_vec())
    }

    fn close(&mut self) -> Result<()> {
        self.inner
            .logout()
            .map_err(|e| command_error("LOGOUT", e))
    }
}

/// Map an `imap` error: server rejections become `Protocol`, the rest `Transport`.
fn command_error(command: &str, err: ::imap::error::Error) -> FetchError {
    match err {
        ::imap::error::Error::Bad(reason) | ::imap::error::Error::No(reason) => {
            FetchError::protocol(command, reason)
        }
        other => FetchError::transport(command, other),
    }
}

/// Convert a `BODYSTRUCTURE` into a [`PartTree`], numbering sections as
/// IMAP does: children of a multipart are `1`, `2`, ...; a non-multipart
/// message body is section `1`.
fn part_tree(structure: &BodyStructure<'_>, section: Vec<u32>) -> PartTree {
    match structure {
        BodyStructure::Multipart { common, bodies, .. } => PartTree::Multipart {
            subtype: common.ty.subtype.to_ascii_lowercase(),
            parts: bodies
                .iter()
                .enumerate()
                .map(|(i, body)| {
                    let mut child = section.clone();
                    child.push(i as u32 + 1);
                    part_tree(body, child)
                })
                .collect(),
        },
        BodyStructure::Basic { common, other, .. }
        | BodyStructure::Text { common, other, .. }
        | BodyStructure::Message { common, other, .. } => {
            let section = if section.is_empty() { vec![1] } else { section };
            let disposition = common.disposition.as_ref();

            PartTree::Single(MessagePart {
                section,
                content_type: format!("{}/{}", common.ty.ty, common.ty.subtype)
                    .to_ascii_lowercase(),
                params: common
                    .ty
                    .params
                    .iter()
                    .flatten()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                disposition: disposition.map(|d| d.ty.to_ascii_lowercase()),
                disposition_params: disposition
                    .and_then(|d| d.params.as_ref())
                    .into_iter()
                    .flatten()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                encoding: transfer_encoding(&other.transfer_encoding),
                size: other.octets,
            })
        }
    }
}

fn transfer_encoding(encoding: &ContentEncoding<'_>) -> TransferEncoding {
    match encoding {
        ContentEncoding::SevenBit => TransferEncoding::SevenBit,
        ContentEncoding::EightBit => TransferEncoding::EightBit,
        ContentEncoding::Binary => TransferEncoding::Binary,
        ContentEncoding::Base64 => TransferEncoding::Base64,
        ContentEncoding::QuotedPrintable => TransferEncoding::QuotedPrintable,
        ContentEncoding::Other(token) => TransferEncoding::from_token(token),
    }
}
