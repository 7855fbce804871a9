//! # paperwatch core
//!
//! Pipeline library for the paperwatch daily digest: discovers recently
//! published CS preprints from the arXiv search API, classifies them by
//! sponsoring organization, and retrieves their PDFs into
//! per-organization folders.
//!
//! The pipeline is fetch -> time-window filter -> classify -> fallback
//! merge -> download. See [`pipeline::run`] for the composed run.

pub mod affiliation;
pub mod classify;
pub mod client;
pub mod config;
pub mod download;
pub mod error;
pub mod fallback;
pub mod feed;
pub mod fetch;
pub mod pipeline;
pub mod window;

// Re-export commonly used types at the crate root.
pub use classify::{OrgBuckets, PatternSet};
pub use client::ApiClient;
pub use config::{FallbackMode, FetchStrategy, WatchConfig, load_config};
pub use error::{PaperwatchError, Result};
pub use feed::{Entry, Link};
pub use pipeline::{OrgReport, RunSummary, run, run_at};
pub use window::TimeWindow;
