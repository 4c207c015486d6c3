//! In-memory collaborators for unit tests

use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::{Error, Result};
use crate::report::{Event, Reporter};
use crate::traits::ObjectStore;
use crate::types::{
    DeleteRequest, ListRequest, MultipartUpload, ObjectEntry, ObjectVersion, Page, PageToken,
    UploadPart,
};

pub(crate) fn init_dummy_tracing_subscriber() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("dummy=trace")
        .with_test_writer()
        .try_init();
}

/// Object store backed by ordered maps, following S3 listing semantics:
/// keys and common prefixes are merged in lexicographic order, `max_keys`
/// counts both, and the continuation marker is the last unit returned.
#[derive(Default)]
pub(crate) struct MemoryStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    versions: Mutex<Vec<ObjectVersion>>,
    uploads: Mutex<Vec<(MultipartUpload, Vec<UploadPart>)>>,

    failing_keys: Mutex<BTreeSet<String>>,
    fail_head: bool,
    fail_list_at: Option<usize>,
    delay: Duration,

    list_calls: AtomicUsize,
    head_calls: AtomicUsize,
    download_calls: AtomicUsize,
    deleted: Mutex<Vec<(String, Option<String>)>>,
    aborted: Mutex<Vec<String>>,

    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_objects<'a>(keys: impl IntoIterator<Item = &'a str>) -> Self {
        let store = Self::new();
        for key in keys {
            store.put(key, key.as_bytes());
        }
        store
    }

    pub fn put(&self, key: &str, data: &[u8]) {
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
    }

    pub fn add_version(&self, key: &str, version_id: &str, size: i64, delete_marker: bool) {
        self.versions.lock().unwrap().push(ObjectVersion {
            entry: ObjectEntry::new(key, size).with_version(version_id),
            is_latest: false,
            is_delete_marker: delete_marker,
        });
    }

    pub fn add_upload(&self, key: &str, upload_id: &str, part_sizes: &[i64]) {
        let parts = part_sizes
            .iter()
            .enumerate()
            .map(|(i, size)| UploadPart {
                part_number: i as i32 + 1,
                size: *size,
            })
            .collect();
        self.uploads.lock().unwrap().push((
            MultipartUpload {
                key: key.to_string(),
                upload_id: upload_id.to_string(),
                initiated: None,
            },
            parts,
        ));
    }

    /// Fail delete and download calls for `key`
    pub fn fail_key(&self, key: &str) {
        self.failing_keys.lock().unwrap().insert(key.to_string());
    }

    pub fn with_failing_head(mut self) -> Self {
        self.fail_head = true;
        self
    }

    /// Fail the n-th listing call (0-based)
    pub fn with_failing_list_at(mut self, call: usize) -> Self {
        self.fail_list_at = Some(call);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn keys(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn head_calls(&self) -> usize {
        self.head_calls.load(Ordering::SeqCst)
    }

    pub fn download_calls(&self) -> usize {
        self.download_calls.load(Ordering::SeqCst)
    }

    pub fn deleted_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .deleted
            .lock()
            .unwrap()
            .iter()
            .map(|(k, _)| k.clone())
            .collect();
        keys.sort();
        keys
    }

    pub fn deleted(&self) -> Vec<(String, Option<String>)> {
        self.deleted.lock().unwrap().clone()
    }

    pub fn aborted(&self) -> Vec<String> {
        self.aborted.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn check_list_failure(&self) -> Result<()> {
        let call = self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list_at == Some(call) {
            return Err(Error::Auth("list denied".to_string()));
        }
        Ok(())
    }

    fn check_key(&self, key: &str) -> Result<()> {
        if self.failing_keys.lock().unwrap().contains(key) {
            return Err(Error::Storage(format!("injected failure for {key}")));
        }
        Ok(())
    }

    async fn occupy(&self) -> InFlight<'_> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        let slot = InFlight(&self.in_flight);
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        slot
    }
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Offset-based marker used by the flat listings of the store
fn offset(token: Option<&PageToken>) -> usize {
    token.and_then(|t| t.marker.parse().ok()).unwrap_or(0)
}

fn slice_page<T: Clone>(all: &[T], start: usize, max_keys: i32) -> Page<T> {
    let end = (start + max_keys.max(1) as usize).min(all.len());
    let start = start.min(end);
    Page {
        prefixes: Vec::new(),
        items: all[start..end].to_vec(),
        next: (end < all.len()).then(|| PageToken::new(end.to_string())),
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects_page(&self, request: &ListRequest) -> Result<Page<ObjectEntry>> {
        self.check_list_failure()?;

        enum Unit {
            Prefix(String),
            Object(ObjectEntry),
        }

        let objects = self.objects.lock().unwrap();
        let mut units: Vec<(String, Unit)> = Vec::new();
        for (key, data) in objects.range(request.prefix.clone()..) {
            let Some(rest) = key.strip_prefix(&request.prefix) else {
                break;
            };
            let common = request
                .delimiter
                .as_deref()
                .and_then(|d| rest.find(d).map(|i| &key[..request.prefix.len() + i + d.len()]));
            match common {
                Some(cp) => {
                    if units.last().map(|(name, _)| name.as_str()) != Some(cp) {
                        units.push((cp.to_string(), Unit::Prefix(cp.to_string())));
                    }
                }
                None => units.push((
                    key.clone(),
                    Unit::Object(ObjectEntry::new(key.clone(), data.len() as i64)),
                )),
            }
        }
        drop(objects);

        let marker = request.token.as_ref().map(|t| t.marker.clone());
        let remaining: Vec<(String, Unit)> = units
            .into_iter()
            .filter(|(name, _)| marker.as_ref().is_none_or(|m| name > m))
            .collect();

        let max_keys = request.max_keys.max(1) as usize;
        let truncated = remaining.len() > max_keys;

        let mut page = Page::default();
        let mut last = None;
        for (name, unit) in remaining.into_iter().take(max_keys) {
            match unit {
                Unit::Prefix(p) => page.prefixes.push(p),
                Unit::Object(o) => page.items.push(o),
            }
            last = Some(name);
        }
        if truncated {
            page.next = last.map(PageToken::new);
        }
        Ok(page)
    }

    async fn list_versions_page(&self, request: &ListRequest) -> Result<Page<ObjectVersion>> {
        self.check_list_failure()?;
        let versions: Vec<ObjectVersion> = self
            .versions
            .lock()
            .unwrap()
            .iter()
            .filter(|v| v.entry.key.starts_with(&request.prefix))
            .cloned()
            .collect();
        Ok(slice_page(
            &versions,
            offset(request.token.as_ref()),
            request.max_keys,
        ))
    }

    async fn list_uploads_page(&self, request: &ListRequest) -> Result<Page<MultipartUpload>> {
        self.check_list_failure()?;
        let uploads: Vec<MultipartUpload> = self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .filter(|(u, _)| u.key.starts_with(&request.prefix))
            .map(|(u, _)| u.clone())
            .collect();
        Ok(slice_page(
            &uploads,
            offset(request.token.as_ref()),
            request.max_keys,
        ))
    }

    async fn list_parts_page(
        &self,
        _bucket: &str,
        upload: &MultipartUpload,
        token: Option<&PageToken>,
    ) -> Result<Page<UploadPart>> {
        self.check_list_failure()?;
        let parts = self
            .uploads
            .lock()
            .unwrap()
            .iter()
            .find(|(u, _)| u.upload_id == upload.upload_id)
            .map(|(_, parts)| parts.clone())
            .ok_or_else(|| Error::NotFound(upload.upload_id.clone()))?;
        Ok(slice_page(&parts, offset(token), 2))
    }

    async fn head_object(
        &self,
        _bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectEntry> {
        self.head_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_head {
            return Err(Error::Network("head timed out".to_string()));
        }
        let size = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .map(|d| d.len() as i64)
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        let entry = ObjectEntry::new(key, size);
        Ok(match version_id {
            Some(v) => entry.with_version(v),
            None => entry,
        })
    }

    async fn delete_object(&self, request: &DeleteRequest) -> Result<()> {
        let _slot = self.occupy().await;
        self.check_key(&request.key)?;

        match &request.version_id {
            Some(v) => self
                .versions
                .lock()
                .unwrap()
                .retain(|ver| {
                    !(ver.entry.key == request.key && ver.entry.version_id.as_deref() == Some(v))
                }),
            None => {
                self.objects.lock().unwrap().remove(&request.key);
            }
        }
        self.deleted
            .lock()
            .unwrap()
            .push((request.key.clone(), request.version_id.clone()));
        Ok(())
    }

    async fn abort_multipart_upload(&self, _bucket: &str, upload: &MultipartUpload) -> Result<()> {
        let _slot = self.occupy().await;
        self.uploads
            .lock()
            .unwrap()
            .retain(|(u, _)| u.upload_id != upload.upload_id);
        self.aborted.lock().unwrap().push(upload.upload_id.clone());
        Ok(())
    }

    async fn download(
        &self,
        _bucket: &str,
        key: &str,
        _version_id: Option<&str>,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        let _slot = self.occupy().await;
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.check_key(key)?;

        let data = self
            .objects
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(key.to_string()))?;
        sink.write_all(&data).await?;
        sink.flush().await?;
        Ok(data.len() as u64)
    }
}

/// Reporter that keeps every event in memory
#[derive(Default)]
pub(crate) struct RecordingReporter {
    events: Mutex<Vec<Event>>,
    progress: SharedBuffer,
}

impl RecordingReporter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn progress_text(&self) -> String {
        self.progress.contents()
    }
}

impl Reporter for RecordingReporter {
    fn report(&self, event: &Event) {
        self.events.lock().unwrap().push(event.clone());
    }

    fn progress_output(&self) -> Box<dyn Write + Send> {
        Box::new(self.progress.clone())
    }
}

/// Cloneable in-memory `Write` target
#[derive(Clone, Default)]
pub(crate) struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store_delimiter_and_pagination() {
        let store = MemoryStore::with_objects(["a", "dir/b", "dir/c", "dir/sub/d", "e"]);

        let mut req = ListRequest::new("bucket", "").delimiter("/");
        req.max_keys = 2;
        let page = store.list_objects_page(&req).await.unwrap();
        assert_eq!(page.items, vec![ObjectEntry::new("a", 1)]);
        assert_eq!(page.prefixes, vec!["dir/".to_string()]);

        req.token = page.next;
        let page = store.list_objects_page(&req).await.unwrap();
        assert_eq!(page.items, vec![ObjectEntry::new("e", 1)]);
        assert!(page.prefixes.is_empty());
        assert!(page.next.is_none());

        let req = ListRequest::new("bucket", "dir/").delimiter("/");
        let page = store.list_objects_page(&req).await.unwrap();
        let keys: Vec<_> = page.items.iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["dir/b", "dir/c"]);
        assert_eq!(page.prefixes, vec!["dir/sub/".to_string()]);
    }
}
