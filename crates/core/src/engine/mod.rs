//! Recursive list, delete and get, bucket cleanup and size scans
//!
//! All tree operations share the same traversal ([`TreeWalker`]) and differ
//! only in their leaf action. Input is validated before any store call.

mod actions;
mod paths;
mod usage;

use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::config::{OperationConfig, RetryConfig};
use crate::error::{Error, Result};
use crate::group::ConcurrencyGroup;
use crate::lister::Lister;
use crate::report::{Event, Reporter};
use crate::traits::ObjectStore;
use crate::types::DEFAULT_PAGE_SIZE;
use crate::walker::{Dispatch, LeafAction, TreeWalker, WalkOptions, WalkStats, is_single_key};

use actions::{DeleteAction, DownloadAction, ListAction, Target};

pub use paths::{destination_path, single_key_path};
pub use usage::{BucketUsage, UsageTally};

/// Settings of a bucket cleanup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanupConfig {
    pub operation: OperationConfig,
    /// Delete every object version and delete marker
    pub object_versions: bool,
    /// Abort every incomplete multipart upload
    pub multiparts: bool,
}

/// What a cleanup did (or would do in dry-run)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupSummary {
    pub versions: usize,
    pub uploads: usize,
}

pub struct TransferEngine {
    store: Arc<dyn ObjectStore>,
    reporter: Arc<dyn Reporter>,
    cancel: CancellationToken,
    retry: RetryConfig,
    verbosity: u8,
    page_size: i32,
}

impl TransferEngine {
    pub fn new(store: Arc<dyn ObjectStore>, reporter: Arc<dyn Reporter>) -> Self {
        Self {
            store,
            reporter,
            cancel: CancellationToken::new(),
            retry: RetryConfig::default(),
            verbosity: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Progress lines are printed when verbosity is at least 1
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size;
        self
    }

    fn lister(&self) -> Lister {
        Lister::new(Arc::clone(&self.store))
            .with_retry(self.retry.clone())
            .with_cancellation(self.cancel.clone())
            .with_page_size(self.page_size)
    }

    fn walker(&self) -> TreeWalker {
        TreeWalker::new(self.lister()).with_cancellation(self.cancel.clone())
    }

    /// List `prefix`, reporting keys relative to `original_prefix`.
    ///
    /// Common prefixes are reported, or expanded when `recursive` is set.
    pub async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        original_prefix: &str,
        delimiter: &str,
        recursive: bool,
    ) -> Result<WalkStats> {
        let cfg = OperationConfig {
            delimiter: delimiter.to_string(),
            concurrency: 1,
            ..OperationConfig::new(bucket)
        };
        cfg.validate()?;

        let options = WalkOptions {
            descend: recursive,
            dispatch: Dispatch::Inline,
            resolve_single_key: false,
        };
        let action = Arc::new(ListAction::new(Arc::clone(&self.reporter), original_prefix));
        self.walker().walk(&cfg, prefix, options, action).await
    }

    /// Delete a single key, or everything below a directory prefix.
    ///
    /// The whole bucket (`prefix` equal to the delimiter) requires `force`
    /// unless this is a dry run.
    pub async fn delete(&self, prefix: &str, cfg: &OperationConfig) -> Result<WalkStats> {
        cfg.validate()?;
        if prefix.is_empty() {
            return Err(Error::MissingKey);
        }
        if prefix == cfg.delimiter && !cfg.force && !cfg.dry_run {
            return Err(Error::ForceRequired);
        }
        if cfg.version_id.is_some() && !is_single_key(prefix, &cfg.delimiter) {
            return Err(Error::Config(
                "a version id can only be used with a single key".to_string(),
            ));
        }

        tracing::info!(
            bucket = %cfg.bucket,
            prefix = prefix,
            dry_run = cfg.dry_run,
            concurrency = cfg.concurrency,
            "Deleting"
        );

        let action = Arc::new(DeleteAction {
            store: Arc::clone(&self.store),
            reporter: Arc::clone(&self.reporter),
            bucket: cfg.bucket.clone(),
            dry_run: cfg.dry_run,
            bypass_governance: cfg.bypass_governance,
        });
        self.walker()
            .walk(cfg, prefix, pooled(), action)
            .await
    }

    /// Download a single key to `dest_root/<basename>`, or everything below
    /// a directory prefix into `dest_root/<last prefix segment>/...`.
    pub async fn get(
        &self,
        dest_root: &Path,
        prefix: &str,
        original_prefix: &str,
        cfg: &OperationConfig,
    ) -> Result<WalkStats> {
        cfg.validate()?;
        if prefix.is_empty() {
            return Err(Error::MissingKey);
        }

        let target = if is_single_key(prefix, &cfg.delimiter) {
            Target::SingleKey
        } else if cfg.version_id.is_some() {
            return Err(Error::Config(
                "a version id can only be used with a single key".to_string(),
            ));
        } else {
            let original_prefix = if original_prefix == cfg.delimiter {
                ""
            } else {
                original_prefix
            };
            Target::Tree {
                original_prefix: original_prefix.to_string(),
            }
        };

        tracing::info!(
            bucket = %cfg.bucket,
            prefix = prefix,
            dest = %dest_root.display(),
            dry_run = cfg.dry_run,
            "Downloading"
        );

        let action = Arc::new(DownloadAction {
            store: Arc::clone(&self.store),
            reporter: Arc::clone(&self.reporter),
            bucket: cfg.bucket.clone(),
            dest_root: dest_root.to_path_buf(),
            delimiter: cfg.delimiter.clone(),
            target,
            dry_run: cfg.dry_run,
            verbosity: self.verbosity,
        });
        self.walker()
            .walk(cfg, prefix, pooled(), action)
            .await
    }

    /// Delete every object version and/or abort every multipart upload
    pub async fn cleanup(&self, cfg: &CleanupConfig) -> Result<CleanupSummary> {
        let op = &cfg.operation;
        op.validate()?;
        if !op.force && !op.dry_run {
            return Err(Error::ForceRequired);
        }
        if !cfg.object_versions && !cfg.multiparts {
            return Err(Error::Config(
                "at least one of object versions or multipart uploads must be selected"
                    .to_string(),
            ));
        }

        let lister = self.lister();
        let mut summary = CleanupSummary::default();

        if cfg.object_versions {
            tracing::info!(bucket = %op.bucket, dry_run = op.dry_run, "Deleting all object versions");
            let action: Arc<dyn LeafAction> = Arc::new(DeleteAction {
                store: Arc::clone(&self.store),
                reporter: Arc::clone(&self.reporter),
                bucket: op.bucket.clone(),
                dry_run: op.dry_run,
                bypass_governance: op.bypass_governance,
            });
            summary.versions = self
                .fan_out(op.concurrency, lister.versions(&op.bucket, ""), |version| {
                    let action = Arc::clone(&action);
                    async move { action.on_object(version.entry).await }
                })
                .await?;
        }

        if cfg.multiparts {
            tracing::info!(bucket = %op.bucket, dry_run = op.dry_run, "Aborting all multipart uploads");
            summary.uploads = self
                .fan_out(op.concurrency, lister.uploads(&op.bucket, ""), |upload| {
                    let store = Arc::clone(&self.store);
                    let reporter = Arc::clone(&self.reporter);
                    let bucket = op.bucket.clone();
                    let dry_run = op.dry_run;
                    async move {
                        reporter.report(&Event::AbortingUpload {
                            key: upload.key.clone(),
                            upload_id: upload.upload_id.clone(),
                            dry_run,
                        });
                        if dry_run {
                            return Ok(());
                        }
                        store.abort_multipart_upload(&bucket, &upload).await
                    }
                })
                .await?;
        }

        Ok(summary)
    }

    /// Sum current, non-current and multipart bytes below `prefix`
    pub async fn bucket_size(&self, cfg: &OperationConfig, prefix: &str) -> Result<BucketUsage> {
        cfg.validate()?;

        let lister = self.lister();
        let tally = Arc::new(UsageTally::default());

        let mut versions = lister.versions(&cfg.bucket, prefix);
        while let Some(version) = versions.next().await {
            tally.add_version(&version?);
        }

        self.fan_out(cfg.concurrency, lister.uploads(&cfg.bucket, prefix), |upload| {
            let lister = lister.clone();
            let tally = Arc::clone(&tally);
            let bucket = cfg.bucket.clone();
            async move {
                let mut parts = lister.parts(&bucket, &upload);
                while let Some(part) = parts.next().await {
                    match part {
                        Ok(part) => tally.add_part(&part),
                        Err(e) => {
                            tracing::warn!(
                                key = %upload.key,
                                upload_id = %upload.upload_id,
                                error = %e,
                                "failed to list parts, skipping upload"
                            );
                            break;
                        }
                    }
                }
                Ok(())
            }
        })
        .await?;

        let usage = tally.snapshot();
        self.reporter.report(&Event::Usage(usage));
        Ok(usage)
    }

    /// Run `task` for every item of `items` through one concurrency group.
    ///
    /// Returns the number of submitted tasks.
    async fn fan_out<T, F, Fut>(
        &self,
        limit: usize,
        mut items: BoxStream<'static, Result<T>>,
        mut task: F,
    ) -> Result<usize>
    where
        F: FnMut(T) -> Fut,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let mut group = ConcurrencyGroup::new(limit).with_cancellation(self.cancel.clone());
        let mut submitted = 0;
        let mut traversal = Ok(());

        while let Some(item) = items.next().await {
            let item = match item {
                Ok(item) => item,
                Err(e) => {
                    traversal = Err(e);
                    break;
                }
            };
            if !group.submit(task(item)).await {
                break;
            }
            submitted += 1;
        }

        let drained = group.wait().await;
        traversal?;
        drained?;
        Ok(submitted)
    }
}

fn pooled() -> WalkOptions {
    WalkOptions {
        descend: true,
        dispatch: Dispatch::Pooled,
        resolve_single_key: true,
    }
}
