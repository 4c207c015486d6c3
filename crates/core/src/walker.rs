//! Traversal of the virtual prefix hierarchy
//!
//! A prefix that does not end with the delimiter names a single key (or, for
//! listings, a one-level match). Anything else is a directory: it is listed
//! and its common prefixes are expanded depth first, using an explicit stack
//! of open listings instead of recursion. Leaf objects go to the caller's
//! [`LeafAction`], either inline or through one [`ConcurrencyGroup`] shared by
//! the whole walk so the configured bound holds across all levels.

use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use tokio_util::sync::CancellationToken;

use crate::config::OperationConfig;
use crate::error::Result;
use crate::group::ConcurrencyGroup;
use crate::lister::Lister;
use crate::types::{ObjectEntry, TreeEntry};

/// What to do with the entries a walk discovers
#[async_trait]
pub trait LeafAction: Send + Sync + 'static {
    /// A common prefix that is not descended into
    fn on_prefix(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }

    /// A leaf object
    async fn on_object(&self, object: ObjectEntry) -> Result<()>;
}

/// How leaf actions are executed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Awaited in discovery order on the walking task
    Inline,
    /// Spawned through the concurrency group
    Pooled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkOptions {
    /// Expand common prefixes instead of reporting them
    pub descend: bool,
    pub dispatch: Dispatch,
    /// Treat a file-style prefix as one key (head, then act) instead of
    /// listing it
    pub resolve_single_key: bool,
}

/// Counters for one walk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WalkStats {
    pub listings: usize,
    pub prefixes: usize,
    pub objects: usize,
}

struct Frame {
    prefix: String,
    entries: BoxStream<'static, Result<TreeEntry>>,
}

pub struct TreeWalker {
    lister: Lister,
    cancel: CancellationToken,
}

impl TreeWalker {
    pub fn new(lister: Lister) -> Self {
        Self {
            lister,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Walk `prefix` and hand every discovered entry to `action`.
    ///
    /// Returns after every dispatched action has finished. A traversal error
    /// takes precedence over a leaf failure; otherwise the first leaf failure
    /// is returned.
    pub async fn walk(
        &self,
        cfg: &OperationConfig,
        prefix: &str,
        options: WalkOptions,
        action: Arc<dyn LeafAction>,
    ) -> Result<WalkStats> {
        let limit = match options.dispatch {
            Dispatch::Inline => 1,
            Dispatch::Pooled => cfg.concurrency,
        };
        let mut group = ConcurrencyGroup::new(limit).with_cancellation(self.cancel.clone());
        let mut stats = WalkStats::default();

        let traversal = if is_single_key(prefix, &cfg.delimiter) && options.resolve_single_key {
            let object = self.resolve(cfg, prefix).await;
            stats.objects += 1;
            dispatch(&mut group, options.dispatch, &action, object)
                .await
                .map(|_| ())
        } else if is_single_key(prefix, &cfg.delimiter) {
            let single_level = WalkOptions {
                descend: false,
                ..options
            };
            self.traverse(cfg, prefix, single_level, &action, &mut group, &mut stats)
                .await
        } else {
            let root = if prefix == cfg.delimiter { "" } else { prefix };
            self.traverse(cfg, root, options, &action, &mut group, &mut stats)
                .await
        };

        let drained = group.wait().await;
        traversal?;
        drained?;

        tracing::debug!(
            prefix = prefix,
            listings = stats.listings,
            prefixes = stats.prefixes,
            objects = stats.objects,
            "Walk finished"
        );
        Ok(stats)
    }

    async fn traverse(
        &self,
        cfg: &OperationConfig,
        root: &str,
        options: WalkOptions,
        action: &Arc<dyn LeafAction>,
        group: &mut ConcurrencyGroup,
        stats: &mut WalkStats,
    ) -> Result<()> {
        let mut stack = vec![self.open(cfg, root, stats)];

        while let Some(frame) = stack.last_mut() {
            if group.has_failed() {
                tracing::debug!(prefix = %frame.prefix, "Stopping walk after failure");
                break;
            }

            let Some(entry) = frame.entries.next().await else {
                stack.pop();
                continue;
            };

            match entry? {
                TreeEntry::Prefix { path } => {
                    // some stores echo the listed prefix back
                    if path == frame.prefix {
                        continue;
                    }
                    stats.prefixes += 1;
                    if options.descend {
                        if options.dispatch == Dispatch::Pooled {
                            // let finished leaves report before listing deeper
                            tokio::task::yield_now().await;
                            if group.has_failed() {
                                tracing::debug!(prefix = %path, "Not descending after failure");
                                break;
                            }
                        }
                        let child = self.open(cfg, &path, stats);
                        stack.push(child);
                    } else {
                        action.on_prefix(&path)?;
                    }
                }
                TreeEntry::Object(object) => {
                    stats.objects += 1;
                    if !dispatch(group, options.dispatch, action, object).await? {
                        break;
                    }
                }
            }
        }

        Ok(())
    }

    fn open(&self, cfg: &OperationConfig, prefix: &str, stats: &mut WalkStats) -> Frame {
        stats.listings += 1;
        Frame {
            prefix: prefix.to_string(),
            entries: self.lister.entries(&cfg.bucket, prefix, &cfg.delimiter),
        }
    }

    /// Head a single key. Failure is advisory: the action still runs with
    /// whatever is known about the key.
    async fn resolve(&self, cfg: &OperationConfig, key: &str) -> ObjectEntry {
        let head = self
            .lister
            .store()
            .head_object(&cfg.bucket, key, cfg.version_id.as_deref())
            .await;

        match head {
            Ok(object) => object,
            Err(e) => {
                tracing::warn!(key = key, error = %e, "failed to head object, continuing");
                let object = ObjectEntry::new(key, 0);
                match &cfg.version_id {
                    Some(version) => object.with_version(version.clone()),
                    None => object,
                }
            }
        }
    }
}

/// A non-empty prefix that does not end with the delimiter
pub fn is_single_key(prefix: &str, delimiter: &str) -> bool {
    !prefix.is_empty() && !delimiter.is_empty() && !prefix.ends_with(delimiter)
}

/// Run one leaf action. Returns `false` when the group declined the work.
async fn dispatch(
    group: &mut ConcurrencyGroup,
    mode: Dispatch,
    action: &Arc<dyn LeafAction>,
    object: ObjectEntry,
) -> Result<bool> {
    match mode {
        Dispatch::Inline => {
            action.on_object(object).await?;
            Ok(true)
        }
        Dispatch::Pooled => {
            let action = Arc::clone(action);
            Ok(group
                .submit(async move { action.on_object(object).await })
                .await)
        }
    }
}
