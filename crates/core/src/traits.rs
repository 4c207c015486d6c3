//! Storage collaborator trait
//!
//! The engine only needs a handful of primitives from the object store. Keeping
//! them behind a trait lets the core stay independent of any specific S3 SDK
//! and lets tests run against an in-memory store.

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::Result;
use crate::types::{
    DeleteRequest, ListRequest, MultipartUpload, ObjectEntry, ObjectVersion, Page, PageToken,
    UploadPart,
};

/// Primitives consumed by the tree operations
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of a (possibly delimited) object listing
    async fn list_objects_page(&self, request: &ListRequest) -> Result<Page<ObjectEntry>>;

    /// Fetch one page of an object version listing
    async fn list_versions_page(&self, request: &ListRequest) -> Result<Page<ObjectVersion>>;

    /// Fetch one page of incomplete multipart uploads
    async fn list_uploads_page(&self, request: &ListRequest) -> Result<Page<MultipartUpload>>;

    /// Fetch one page of the parts uploaded so far for a multipart upload
    async fn list_parts_page(
        &self,
        bucket: &str,
        upload: &MultipartUpload,
        token: Option<&PageToken>,
    ) -> Result<Page<UploadPart>>;

    /// Fetch size and modification time of one object
    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectEntry>;

    /// Delete one object (or one version of it)
    async fn delete_object(&self, request: &DeleteRequest) -> Result<()>;

    /// Abort an incomplete multipart upload
    async fn abort_multipart_upload(&self, bucket: &str, upload: &MultipartUpload) -> Result<()>;

    /// Stream an object's body into `sink`, returning the number of bytes written
    async fn download(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64>;
}
