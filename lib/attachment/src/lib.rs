//! Attachment ingestion for chat-relay.
//!
//! This crate provides:
//!
//! - **Classification**: mapping declared content types and file extensions
//!   onto the accepted media types
//! - **Fetcher**: retrieval of attachment bytes into scoped temporary files
//! - **Ingestor**: turning an accepted attachment into a model-ready part

pub mod descriptor;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod media;

pub use descriptor::AttachmentDescriptor;
pub use error::{FetchError, Rejection};
pub use fetch::{Fetcher, HttpFetcher};
pub use ingest::{AttachmentConfig, AttachmentIngestor, Ingest};
pub use media::{MediaKind, MediaType};
