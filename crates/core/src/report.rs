//! Events emitted by the transfer engine
//!
//! The engine never prints directly. Every listed entry and every (real or
//! simulated) mutation is handed to a [`Reporter`], which the CLI renders as
//! human-readable lines or JSON lines.

use std::io::Write;
use std::path::PathBuf;

use serde::Serialize;

use crate::engine::BucketUsage;
use crate::types::ObjectEntry;

/// One observable step of an operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    /// A common prefix shown without descending
    ListedPrefix {
        prefix: String,
    },
    /// A listed object
    ListedObject {
        #[serde(rename = "displayKey")]
        display_key: String,
        #[serde(flatten)]
        object: ObjectEntry,
    },
    /// An object (version) deleted, or that would be deleted in dry-run
    Deleting {
        key: String,
        #[serde(rename = "versionId", skip_serializing_if = "Option::is_none")]
        version_id: Option<String>,
        size: i64,
        #[serde(rename = "dryRun")]
        dry_run: bool,
    },
    /// An object downloaded, or that would be downloaded in dry-run
    Downloaded {
        key: String,
        target: PathBuf,
        bytes: u64,
        #[serde(rename = "dryRun")]
        dry_run: bool,
    },
    /// An incomplete multipart upload aborted, or that would be aborted
    AbortingUpload {
        key: String,
        #[serde(rename = "uploadId")]
        upload_id: String,
        #[serde(rename = "dryRun")]
        dry_run: bool,
    },
    /// Totals computed by a size scan
    Usage(BucketUsage),
}

/// Sink for engine events
pub trait Reporter: Send + Sync {
    fn report(&self, event: &Event);

    /// Destination for progress lines of individual transfers
    fn progress_output(&self) -> Box<dyn Write + Send> {
        Box::new(std::io::stdout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = Event::ListedObject {
            display_key: "b".into(),
            object: ObjectEntry::new("dir/b", 4),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(
            json,
            r#"{"event":"listed_object","displayKey":"b","key":"dir/b","size":4}"#
        );

        let event = Event::Deleting {
            key: "a".into(),
            version_id: None,
            size: 1,
            dry_run: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"event":"deleting","key":"a","size":1,"dryRun":true}"#);
    }
}
