//! Data model shared between the engine and object store implementations

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// Default page size for listing requests
pub const DEFAULT_PAGE_SIZE: i32 = 100;

/// A single listed object (a leaf of the virtual hierarchy)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectEntry {
    /// Full object key
    pub key: String,

    /// Size in bytes (0 when unknown)
    pub size: i64,

    /// Last modification time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<Timestamp>,

    /// Version ID when the entry refers to a specific version
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version_id: Option<String>,

    /// ETag with surrounding quotes removed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
}

impl ObjectEntry {
    /// Create an entry with a key and size
    pub fn new(key: impl Into<String>, size: i64) -> Self {
        Self {
            key: key.into(),
            size,
            last_modified: None,
            version_id: None,
            etag: None,
        }
    }

    /// Set the version ID
    pub fn with_version(mut self, version_id: impl Into<String>) -> Self {
        self.version_id = Some(version_id.into());
        self
    }

    /// Set the last modification time
    pub fn with_last_modified(mut self, ts: Timestamp) -> Self {
        self.last_modified = Some(ts);
        self
    }

    /// Size as an unsigned byte count, clamping negative values to zero
    pub fn size_bytes(&self) -> u64 {
        self.size.max(0) as u64
    }
}

/// One entry of a delimited listing: either a common prefix or an object.
///
/// The enum makes "both populated" unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeEntry {
    /// Virtual directory boundary under the current delimiter
    Prefix { path: String },
    /// Leaf object
    Object(ObjectEntry),
}

impl TreeEntry {
    /// Shorthand for a prefix entry
    pub fn prefix(path: impl Into<String>) -> Self {
        TreeEntry::Prefix { path: path.into() }
    }

    /// Returns true for common-prefix entries
    pub fn is_prefix(&self) -> bool {
        matches!(self, TreeEntry::Prefix { .. })
    }
}

/// One version of an object, including delete markers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectVersion {
    #[serde(flatten)]
    pub entry: ObjectEntry,
    pub is_latest: bool,
    pub is_delete_marker: bool,
}

/// An incomplete multipart upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartUpload {
    pub key: String,
    pub upload_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub initiated: Option<Timestamp>,
}

/// One uploaded part of a multipart upload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadPart {
    pub part_number: i32,
    pub size: i64,
}

/// Opaque pagination cursor.
///
/// Object listings only use `marker` (the continuation token). Version and
/// upload listings need a second marker (version-id / upload-id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageToken {
    pub marker: String,
    pub secondary: Option<String>,
}

impl PageToken {
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            secondary: None,
        }
    }

    pub fn with_secondary(marker: impl Into<String>, secondary: Option<String>) -> Self {
        Self {
            marker: marker.into(),
            secondary,
        }
    }
}

/// One page returned by a listing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    /// Common prefixes of this page, in store order
    pub prefixes: Vec<String>,
    /// Leaf items of this page, in store order
    pub items: Vec<T>,
    /// Cursor for the next page, `None` when this was the last page
    pub next: Option<PageToken>,
}

impl<T> Page<T> {
    /// A final page with no prefixes
    pub fn last(items: Vec<T>) -> Self {
        Self {
            prefixes: Vec::new(),
            items,
            next: None,
        }
    }
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            prefixes: Vec::new(),
            items: Vec::new(),
            next: None,
        }
    }
}

/// Parameters of a single listing page request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRequest {
    pub bucket: String,
    pub prefix: String,
    /// `None` lists flat without common prefixes
    pub delimiter: Option<String>,
    pub max_keys: i32,
    pub token: Option<PageToken>,
}

impl ListRequest {
    pub fn new(bucket: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            prefix: prefix.into(),
            delimiter: None,
            max_keys: DEFAULT_PAGE_SIZE,
            token: None,
        }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        let d = delimiter.into();
        self.delimiter = if d.is_empty() { None } else { Some(d) };
        self
    }
}

/// Parameters of a single object deletion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteRequest {
    pub bucket: String,
    pub key: String,
    pub version_id: Option<String>,
    pub bypass_governance: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tree_entry_json_shape() {
        let json = serde_json::to_string(&TreeEntry::prefix("dir/")).unwrap();
        assert_eq!(json, r#"{"type":"prefix","path":"dir/"}"#);

        let json = serde_json::to_string(&TreeEntry::Object(ObjectEntry::new("a", 3))).unwrap();
        assert_eq!(json, r#"{"type":"object","key":"a","size":3}"#);
    }

    #[test]
    fn test_empty_delimiter_lists_flat() {
        let req = ListRequest::new("b", "p/").delimiter("");
        assert!(req.delimiter.is_none());
        let req = ListRequest::new("b", "p/").delimiter("/");
        assert_eq!(req.delimiter.as_deref(), Some("/"));
    }

    #[test]
    fn test_negative_size_clamps() {
        assert_eq!(ObjectEntry::new("k", -1).size_bytes(), 0);
    }
}
