//! Export functionality: writing fetched attachments to disk.

pub mod attachment;

pub use self::attachment::AttachmentWriter;
