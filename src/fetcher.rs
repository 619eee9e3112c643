//! Fetch the attachments of every message matching some search criteria.

use std::path::PathBuf;

use tracing::{debug, info};

use crate::error::{FetchError, Result};
use crate::export::attachment::AttachmentWriter;
use crate::imap::{Connector, MailSession, ReadOnlyConnection};
use crate::mime::decode::decode_body;
use crate::model::attachment::SavedAttachment;
use crate::model::part::MessagePart;
use crate::search::SearchCriteria;

/// Downloads attachments over one [`ReadOnlyConnection`] into one directory.
pub struct AttachmentFetcher<C: Connector> {
    connection: ReadOnlyConnection<C>,
    writer: AttachmentWriter,
    nested_parts: bool,
}

/// An attachment fetched and decoded, not yet written.
struct DecodedAttachment {
    name: Option<String>,
    original_filename: Option<String>,
    section: String,
    content: Vec<u8>,
}

impl<C: Connector> AttachmentFetcher<C> {
    /// Save into `save_dir`, or the system temp directory when `None`.
    pub fn new(connection: ReadOnlyConnection<C>, save_dir: Option<PathBuf>) -> Self {
        let writer = match save_dir {
            Some(dir) => AttachmentWriter::new(dir),
            None => AttachmentWriter::in_temp_dir(),
        };
        Self {
            connection,
            writer,
            nested_parts: false,
        }
    }

    /// Also look inside nested multiparts instead of only the top-level parts.
    pub fn with_nested_parts(mut self, nested: bool) -> Self {
        self.nested_parts = nested;
        self
    }

    pub fn save_dir(&self) -> &std::path::Path {
        self.writer.dir()
    }

    pub fn connection(&self) -> &ReadOnlyConnection<C> {
        &self.connection
    }

    /// Fetch, decode and save every attachment of every matching message.
    ///
    /// Records come back in message-then-part order. No match is not an error.
    pub fn fetch_attachments(&mut self, criteria: &SearchCriteria) -> Result<Vec<SavedAttachment>> {
        self.fetch_attachments_with_progress(criteria, &|_, _| {})
    }

    /// Like [`fetch_attachments`](Self::fetch_attachments), reporting
    /// `(messages done, messages total)` after the search and after each message.
    pub fn fetch_attachments_with_progress(
        &mut self,
        criteria: &SearchCriteria,
        progress: &dyn Fn(usize, usize),
    ) -> Result<Vec<SavedAttachment>> {
        let query = criteria.to_string();
        let session = self.connection.session()?;

        let messages = session
            .search(&query, criteria.charset())
            .map_err(|e| match e {
                FetchError::Protocol { reason, .. } => FetchError::UnknownSearchCriteria {
                    query: query.clone(),
                    reason,
                },
                other => other,
            })?;
        info!(query = %query, charset = criteria.charset(), matches = messages.len(), "Search finished");

        if messages.is_empty() {
            self.connection.close();
            return Ok(Vec::new());
        }

        let total = messages.len();
        progress(0, total);

        let mut saved = Vec::new();
        for (i, &message) in messages.iter().enumerate() {
            let session = self.connection.session()?;
            let attachments = collect_attachments(session, message, self.nested_parts)?;
            debug!(seq = message, attachments = attachments.len(), "Message inspected");

            for attachment in attachments {
                let filepath = self.writer.write(&attachment.content)?;
                info!(
                    seq = message,
                    section = %attachment.section,
                    filename = attachment.original_filename.as_deref().unwrap_or(""),
                    path = %filepath.display(),
                    "Attachment saved"
                );
                saved.push(SavedAttachment {
                    name: attachment.name,
                    original_filename: attachment.original_filename,
                    filepath,
                    message,
                    section: attachment.section,
                    size: attachment.content.len() as u64,
                });
            }
            progress(i + 1, total);
        }

        self.connection.close();
        Ok(saved)
    }
}

/// Find the attachment parts of one message, fetch and decode them.
fn collect_attachments<S: MailSession>(
    session: &mut S,
    message: u32,
    nested_parts: bool,
) -> Result<Vec<DecodedAttachment>> {
    let tree = session.fetch_structure(message)?;
    let candidates: Vec<&MessagePart> = if nested_parts {
        tree.leaf_parts()
    } else {
        tree.top_level_parts()
    };

    let mut attachments = Vec::new();
    for part in candidates {
        if !part.is_attachment() {
            continue;
        }
        let raw = session.fetch_body(message, &part.section)?;
        let content = decode_body(&part.encoding, &raw)?;
        attachments.push(DecodedAttachment {
            name: part.name(),
            original_filename: part.filename(),
            section: part.section_spec(),
            content,
        });
    }
    Ok(attachments)
}
