//! Storage usage accounting for `du`

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::types::{ObjectVersion, UploadPart};

/// Byte and object counts of one size scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketUsage {
    pub current_bytes: u64,
    pub current_count: u64,
    pub versioned_bytes: u64,
    pub versioned_count: u64,
    pub multipart_bytes: u64,
    pub multipart_count: u64,
}

impl BucketUsage {
    pub fn total_bytes(&self) -> u64 {
        self.current_bytes + self.versioned_bytes + self.multipart_bytes
    }

    pub fn total_count(&self) -> u64 {
        self.current_count + self.versioned_count + self.multipart_count
    }
}

/// Usage accumulator that many scanning tasks can add to at once
#[derive(Debug, Default)]
pub struct UsageTally {
    current_bytes: AtomicU64,
    current_count: AtomicU64,
    versioned_bytes: AtomicU64,
    versioned_count: AtomicU64,
    multipart_bytes: AtomicU64,
    multipart_count: AtomicU64,
}

impl UsageTally {
    /// Count one listed version. Delete markers hold no data and are skipped.
    pub fn add_version(&self, version: &ObjectVersion) {
        if version.is_delete_marker {
            return;
        }
        let size = version.entry.size_bytes();
        if version.is_latest {
            self.current_bytes.fetch_add(size, Ordering::Relaxed);
            self.current_count.fetch_add(1, Ordering::Relaxed);
        } else {
            self.versioned_bytes.fetch_add(size, Ordering::Relaxed);
            self.versioned_count.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn add_part(&self, part: &UploadPart) {
        self.multipart_bytes
            .fetch_add(part.size.max(0) as u64, Ordering::Relaxed);
        self.multipart_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> BucketUsage {
        BucketUsage {
            current_bytes: self.current_bytes.load(Ordering::Relaxed),
            current_count: self.current_count.load(Ordering::Relaxed),
            versioned_bytes: self.versioned_bytes.load(Ordering::Relaxed),
            versioned_count: self.versioned_count.load(Ordering::Relaxed),
            multipart_bytes: self.multipart_bytes.load(Ordering::Relaxed),
            multipart_count: self.multipart_count.load(Ordering::Relaxed),
        }
    }
}
