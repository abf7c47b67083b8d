//! Core types, configuration, and error handling for Lodestar.
//!
//! This crate provides the shared foundation used by the other Lodestar crates:
//! - [`LodestarError`]: unified error type using `thiserror` and `miette`
//! - [`LodestarConfig`]: configuration loaded from `.lodestar.toml`
//! - Shared types: [`ScoredHit`], [`HitKind`], [`SearchMode`],
//!   [`MergeStrategy`], [`IndexStats`], [`SkipReason`], [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{
    FingerprintStrategy, IndexConfig, LodestarConfig, ScanConfig, SearchConfig, DEFAULT_DIMENSIONS,
    DEFAULT_RRF_K,
};
pub use error::LodestarError;
pub use types::{
    HitKind, IndexStats, MergeStrategy, OutputFormat, ScoredHit, SearchMode, SkipReason,
    SkippedFile,
};
