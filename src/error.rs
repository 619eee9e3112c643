//! Centralized error types for imapattach.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the imapattach library.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The IMAP session could not be opened, authenticated or pointed at the mailbox.
    #[error("Could not connect to '{host}': {reason}")]
    Connection { host: String, reason: String },

    /// "Match all" was combined with specific filters.
    #[error("Can not use ALL when there are already some specific search criteria: {0}")]
    InvalidFilterCombination(String),

    /// A filter value cannot be carried in an IMAP quoted string.
    #[error("Invalid value for {filter} filter: {value:?}")]
    InvalidFilterValue { filter: &'static str, value: String },

    /// The user-typed query could not be parsed.
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    /// The server rejected the SEARCH command.
    #[error("IMAP probably does not recognize filter '{query}'; {reason}")]
    UnknownSearchCriteria { query: String, reason: String },

    /// The server answered NO or BAD to a command.
    #[error("IMAP {command} was rejected: {reason}")]
    Protocol { command: String, reason: String },

    /// The session failed underneath a command (socket, TLS, response parsing).
    #[error("IMAP {command} failed: {reason}")]
    Transport { command: String, reason: String },

    /// A part body could not be transfer-decoded.
    #[error("Could not decode {encoding} content: {reason}")]
    Decode { encoding: String, reason: String },

    /// The save directory could not be created.
    #[error("Could not create dir to save email attachments '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The attachment file could not be created.
    #[error("Could not save an email attachment as '{path}': {source}")]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Writing the attachment bytes failed; the partial file has been removed.
    #[error("Could not write an email attachment into '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The configuration file could not be read or parsed.
    #[error("Invalid configuration in '{path}': {reason}")]
    Config { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, FetchError>`.
pub type Result<T> = std::result::Result<T, FetchError>;

impl FetchError {
    /// Create a `Connection` variant from a host and any displayable cause.
    pub fn connection(host: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Connection {
            host: host.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a `Protocol` variant for a rejected command.
    pub fn protocol(command: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Protocol {
            command: command.into(),
            reason: reason.into(),
        }
    }

    /// Create a `Transport` variant for a command that failed below the protocol level.
    pub fn transport(command: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Transport {
            command: command.into(),
            reason: reason.to_string(),
        }
    }
}
