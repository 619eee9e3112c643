//! Core data model types for MIME structure and saved attachments.

pub mod attachment;
pub mod part;
