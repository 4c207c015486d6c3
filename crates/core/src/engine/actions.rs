//! Leaf actions for list, delete and get

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use super::paths::{destination_path, single_key_path};
use crate::error::Result;
use crate::progress::{ProgressTracker, ProgressWriter};
use crate::report::{Event, Reporter};
use crate::traits::ObjectStore;
use crate::types::{DeleteRequest, ObjectEntry};
use crate::walker::LeafAction;

/// Reports entries, relative to the prefix the user asked for
pub(crate) struct ListAction {
    reporter: Arc<dyn Reporter>,
    original_prefix: String,
}

impl ListAction {
    pub fn new(reporter: Arc<dyn Reporter>, original_prefix: &str) -> Self {
        Self {
            reporter,
            original_prefix: original_prefix.to_string(),
        }
    }
}

#[async_trait]
impl LeafAction for ListAction {
    fn on_prefix(&self, prefix: &str) -> Result<()> {
        self.reporter.report(&Event::ListedPrefix {
            prefix: prefix.to_string(),
        });
        Ok(())
    }

    async fn on_object(&self, object: ObjectEntry) -> Result<()> {
        let display_key = match object.key.strip_prefix(&self.original_prefix) {
            Some(rest) if !rest.is_empty() => rest.to_string(),
            _ => object.key.clone(),
        };
        self.reporter.report(&Event::ListedObject {
            display_key,
            object,
        });
        Ok(())
    }
}

/// Deletes one object or object version
pub(crate) struct DeleteAction {
    pub store: Arc<dyn ObjectStore>,
    pub reporter: Arc<dyn Reporter>,
    pub bucket: String,
    pub dry_run: bool,
    pub bypass_governance: bool,
}

#[async_trait]
impl LeafAction for DeleteAction {
    async fn on_object(&self, object: ObjectEntry) -> Result<()> {
        self.reporter.report(&Event::Deleting {
            key: object.key.clone(),
            version_id: object.version_id.clone(),
            size: object.size,
            dry_run: self.dry_run,
        });

        if self.dry_run {
            return Ok(());
        }

        self.store
            .delete_object(&DeleteRequest {
                bucket: self.bucket.clone(),
                key: object.key,
                version_id: object.version_id,
                bypass_governance: self.bypass_governance,
            })
            .await
    }
}

/// Where a downloaded key lands
pub(crate) enum Target {
    /// `dest_root/<basename>`
    SingleKey,
    /// `dest_root/<last prefix segment>/<relative key>`
    Tree { original_prefix: String },
}

/// Downloads one object to the local filesystem with a progress tracker
pub(crate) struct DownloadAction {
    pub store: Arc<dyn ObjectStore>,
    pub reporter: Arc<dyn Reporter>,
    pub bucket: String,
    pub dest_root: PathBuf,
    pub delimiter: String,
    pub target: Target,
    pub dry_run: bool,
    pub verbosity: u8,
}

impl DownloadAction {
    fn target_path(&self, key: &str) -> Result<PathBuf> {
        match &self.target {
            Target::SingleKey => single_key_path(&self.dest_root, key, &self.delimiter),
            Target::Tree { original_prefix } => {
                destination_path(&self.dest_root, original_prefix, key, &self.delimiter)
            }
        }
    }
}

#[async_trait]
impl LeafAction for DownloadAction {
    async fn on_object(&self, object: ObjectEntry) -> Result<()> {
        if matches!(self.target, Target::Tree { .. })
            && !self.delimiter.is_empty()
            && object.key.ends_with(&self.delimiter)
        {
            tracing::debug!(key = %object.key, "Skipping folder marker");
            return Ok(());
        }

        let target = self.target_path(&object.key)?;
        let tracker = Arc::new(
            ProgressTracker::new(
                target.display().to_string(),
                object.size_bytes(),
                self.verbosity,
            )
            .with_output(self.reporter.progress_output()),
        );

        if self.dry_run {
            // keep dry-run output shaped like a real transfer
            tracker.finish();
            let bytes = object.size_bytes();
            self.reporter.report(&Event::Downloaded {
                key: object.key,
                target,
                bytes,
                dry_run: true,
            });
            return Ok(());
        }

        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(&target).await?;
        let mut writer = ProgressWriter::new(file, Arc::clone(&tracker));

        let bytes = self
            .store
            .download(
                &self.bucket,
                &object.key,
                object.version_id.as_deref(),
                &mut writer,
            )
            .await?;
        writer.flush().await?;
        tracker.finish();

        tracing::debug!(key = %object.key, target = %target.display(), bytes, "Downloaded");
        self.reporter.report(&Event::Downloaded {
            key: object.key,
            target,
            bytes,
            dry_run: false,
        });
        Ok(())
    }
}
