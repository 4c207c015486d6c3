//! s3tree-core: tree operations over S3-compatible object storage
//!
//! This crate holds everything that does not depend on a concrete SDK:
//! - Paginated listing ([`Lister`]) and prefix traversal ([`TreeWalker`])
//! - Bounded, fail-fast task execution ([`ConcurrencyGroup`])
//! - Request policies: read-only guard, header and query injection, and a
//!   token-bucket bandwidth limiter ([`TransportPolicy`])
//! - Transfer progress ([`ProgressTracker`])
//! - Recursive list, delete, get, cleanup and size scans ([`TransferEngine`])
//!
//! Storage access goes through the [`ObjectStore`] trait so the engine can be
//! driven by the S3 adapter or by an in-memory store in tests.

pub mod config;
pub mod engine;
pub mod error;
pub mod group;
pub mod lister;
pub mod progress;
pub mod report;
pub mod retry;
pub mod traits;
pub mod transport;
pub mod types;
pub mod walker;

#[cfg(test)]
mod test_utils;

pub use config::{
    ConfigFile, ConfigManager, OperationConfig, Profile, RateLimit, RetryConfig, TransportConfig,
};
pub use engine::{BucketUsage, CleanupConfig, CleanupSummary, TransferEngine};
pub use error::{Error, ErrorKind, Result};
pub use group::ConcurrencyGroup;
pub use lister::Lister;
pub use progress::{ProgressTracker, ProgressWriter};
pub use report::{Event, Reporter};
pub use retry::{RetryBuilder, is_retryable_error, retry_with_backoff};
pub use traits::ObjectStore;
pub use transport::{OutboundRequest, RequestDecorator, ThrottledReader, TransportPolicy};
pub use types::{
    DeleteRequest, ListRequest, MultipartUpload, ObjectEntry, ObjectVersion, Page, PageToken,
    TreeEntry, UploadPart,
};
pub use walker::{Dispatch, LeafAction, TreeWalker, WalkOptions, WalkStats};
