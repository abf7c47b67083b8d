//! Durable, incremental file index with keyword search.
//!
//! Stores each file's text, a change-detection fingerprint, and a
//! feature-hashed embedding in SQLite. Builds are incremental: unchanged
//! files are detected by fingerprint and never re-read or re-embedded.
//! Keyword search runs on an FTS5 index kept in sync with the stored text.

pub mod build;
pub mod embedding;
pub mod fingerprint;
pub mod lexical;
pub mod store;
