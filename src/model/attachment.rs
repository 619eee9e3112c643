//! Saved attachment records.

use std::path::PathBuf;

/// One attachment written to disk by the fetcher.
///
/// The file content is the decoded part body. Neither `name` nor
/// `original_filename` is embedded in the file; the file itself carries a
/// generated name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SavedAttachment {
    /// Content-Type `name` parameter, if the part had one.
    pub name: Option<String>,

    /// Content-Disposition `filename` parameter, if the part had one.
    pub original_filename: Option<String>,

    /// Where the decoded content was written.
    pub filepath: PathBuf,

    /// Sequence number of the message the attachment came from.
    pub message: u32,

    /// Section path of the part (e.g. `"2"`).
    pub section: String,

    /// Decoded size in bytes.
    pub size: u64,
}

impl SavedAttachment {
    /// The best human-facing name: the filename, then the content-type name.
    pub fn display_name(&self) -> &str {
        self.original_filename
            .as_deref()
            .or(self.name.as_deref())
            .unwrap_or("(unnamed)")
    }
}
