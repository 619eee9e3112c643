//! `imapattach`: download email attachments over IMAP.
//!
//! This crate provides the core library: building IMAP `SEARCH` criteria,
//! inspecting the MIME structure of matching messages, and saving every
//! attachment to disk.

pub mod config;
pub mod error;
pub mod export;
pub mod fetcher;
pub mod imap;
pub mod mime;
pub mod model;
pub mod search;

pub use crate::error::{FetchError, Result};
pub use crate::fetcher::AttachmentFetcher;
pub use crate::model::attachment::SavedAttachment;
pub use crate::search::{SearchCriteria, SearchCriteriaBuilder};
