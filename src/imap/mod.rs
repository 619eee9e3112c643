//! The mail server seam.
//!
//! [`Connector`] opens sessions and [`MailSession`] is the narrow set of
//! protocol calls the fetcher needs. [`session`] implements both over the
//! `imap` crate; tests substitute in-memory fakes.

pub mod connection;
pub mod session;

use crate::error::Result;
use crate::model::part::PartTree;

pub use self::connection::{ConnectionSettings, ReadOnlyConnection, Transport};
pub use self::session::{ImapConnector, ImapSession};

/// An open, authenticated session with a mailbox selected read-only.
pub trait MailSession {
    /// Run `SEARCH` and return the matching message sequence numbers.
    ///
    /// An empty `charset` sends no `CHARSET` argument. A server rejection
    /// must be reported as [`FetchError::Protocol`](crate::error::FetchError::Protocol).
    fn search(&mut self, query: &str, charset: &str) -> Result<Vec<u32>>;

    /// Fetch the MIME structure of a message.
    fn fetch_structure(&mut self, message: u32) -> Result<PartTree>;

    /// Fetch the raw (still transfer-encoded) body of one part.
    fn fetch_body(&mut self, message: u32, section: &[u32]) -> Result<Vec<u8>>;

    /// End the session.
    fn close(&mut self) -> Result<()>;
}

/// Opens [`MailSession`]s.
pub trait Connector {
    type Session: MailSession;

    /// Connect, authenticate and open the mailbox read-only.
    fn open(&self) -> Result<Self::Session>;

    /// Human-readable target, used in logs.
    fn describe(&self) -> String;
}
