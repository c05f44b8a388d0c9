//! Version chains of uploaded documents.
//!
//! Every upload is a [`file_record`](crate::entity::file_record) row. The
//! first upload of a document starts a chain whose `root_id` is its own id;
//! later uploads append to the chain with the next version number and take
//! over the `is_latest` flag. Exactly one record per chain carries the flag.
//!
//! Appends run in a single transaction that row-locks the chain's root, so
//! concurrent uploads against one document are serialized and a failure can
//! never leave a chain without a head. Unique indexes on
//! `(root_id) WHERE is_latest` and `(root_id, version_number)` back this up
//! at the database level (see [`crate::database::ensure_indexes`]).

mod catalog;
mod error;
mod service;


pub use catalog::FileCatalog;
pub use error::VersionError;
pub use service::{UploadedBlob, VersionedFileStore, default_version_note};
