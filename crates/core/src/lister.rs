//! Lazy paginated listings
//!
//! Each listing is a stream that fetches one page at a time and only when the
//! consumer asks for more. Within a page, common prefixes are yielded before
//! objects. A failed page fetch (after retries) is yielded as the last item.

use std::collections::VecDeque;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::stream::{self, BoxStream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::{Error, Result};
use crate::retry::{is_retryable_error, retry_with_backoff};
use crate::traits::ObjectStore;
use crate::types::{
    DEFAULT_PAGE_SIZE, ListRequest, MultipartUpload, ObjectVersion, PageToken, TreeEntry,
    UploadPart,
};

/// Items of one page plus the cursor for the next one
type Batch<T> = (Vec<T>, Option<PageToken>);

/// Wraps the store's paginated listing calls into lazy streams
#[derive(Clone)]
pub struct Lister {
    store: Arc<dyn ObjectStore>,
    retry: RetryConfig,
    cancel: CancellationToken,
    page_size: i32,
}

impl Lister {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            retry: RetryConfig::default(),
            cancel: CancellationToken::new(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_page_size(mut self, page_size: i32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Delimited listing of `prefix`. An empty delimiter lists flat.
    pub fn entries(
        &self,
        bucket: &str,
        prefix: &str,
        delimiter: &str,
    ) -> BoxStream<'static, Result<TreeEntry>> {
        let store = Arc::clone(&self.store);
        let retry = self.retry.clone();
        let base = self.request(bucket, prefix).delimiter(delimiter);

        paginate(self.cancel.clone(), move |token| {
            let store = Arc::clone(&store);
            let retry = retry.clone();
            let request = ListRequest {
                token,
                ..base.clone()
            };
            Box::pin(async move {
                let page = retry_with_backoff(
                    &retry,
                    || store.list_objects_page(&request),
                    is_retryable_error,
                )
                .await?;

                tracing::debug!(
                    prefix = %request.prefix,
                    prefixes = page.prefixes.len(),
                    objects = page.items.len(),
                    truncated = page.next.is_some(),
                    "Listed page"
                );

                let entries: Vec<TreeEntry> = page
                    .prefixes
                    .into_iter()
                    .map(TreeEntry::prefix)
                    .chain(page.items.into_iter().map(TreeEntry::Object))
                    .collect();
                Ok::<_, Error>((entries, page.next))
            })
        })
    }

    /// Every version and delete marker under `prefix`
    pub fn versions(&self, bucket: &str, prefix: &str) -> BoxStream<'static, Result<ObjectVersion>> {
        let store = Arc::clone(&self.store);
        let retry = self.retry.clone();
        let base = self.request(bucket, prefix);

        paginate(self.cancel.clone(), move |token| {
            let store = Arc::clone(&store);
            let retry = retry.clone();
            let request = ListRequest {
                token,
                ..base.clone()
            };
            Box::pin(async move {
                let page = retry_with_backoff(
                    &retry,
                    || store.list_versions_page(&request),
                    is_retryable_error,
                )
                .await?;
                Ok::<_, Error>((page.items, page.next))
            })
        })
    }

    /// Every incomplete multipart upload under `prefix`
    pub fn uploads(
        &self,
        bucket: &str,
        prefix: &str,
    ) -> BoxStream<'static, Result<MultipartUpload>> {
        let store = Arc::clone(&self.store);
        let retry = self.retry.clone();
        let base = self.request(bucket, prefix);

        paginate(self.cancel.clone(), move |token| {
            let store = Arc::clone(&store);
            let retry = retry.clone();
            let request = ListRequest {
                token,
                ..base.clone()
            };
            Box::pin(async move {
                let page = retry_with_backoff(
                    &retry,
                    || store.list_uploads_page(&request),
                    is_retryable_error,
                )
                .await?;
                Ok::<_, Error>((page.items, page.next))
            })
        })
    }

    /// Parts uploaded so far for one multipart upload
    pub fn parts(
        &self,
        bucket: &str,
        upload: &MultipartUpload,
    ) -> BoxStream<'static, Result<UploadPart>> {
        let store = Arc::clone(&self.store);
        let retry = self.retry.clone();
        let bucket = bucket.to_string();
        let upload = upload.clone();

        paginate(self.cancel.clone(), move |token| {
            let store = Arc::clone(&store);
            let retry = retry.clone();
            let bucket = bucket.clone();
            let upload = upload.clone();
            Box::pin(async move {
                let page = retry_with_backoff(
                    &retry,
                    || store.list_parts_page(&bucket, &upload, token.as_ref()),
                    is_retryable_error,
                )
                .await?;
                Ok::<_, Error>((page.items, page.next))
            })
        })
    }

    fn request(&self, bucket: &str, prefix: &str) -> ListRequest {
        ListRequest {
            max_keys: self.page_size,
            ..ListRequest::new(bucket, prefix)
        }
    }
}

enum Cursor {
    Start,
    Next(PageToken),
    Done,
}

struct PageState<T, F> {
    fetch: F,
    buffer: VecDeque<T>,
    cursor: Cursor,
    cancel: CancellationToken,
}

/// Turn a page-fetching closure into a lazy stream of items.
///
/// The next page is only requested once the buffered items of the previous
/// page are consumed, so dropping the stream stops pagination.
fn paginate<T, F>(cancel: CancellationToken, fetch: F) -> BoxStream<'static, Result<T>>
where
    T: Send + 'static,
    F: FnMut(Option<PageToken>) -> BoxFuture<'static, Result<Batch<T>>> + Send + 'static,
{
    let state = PageState {
        fetch,
        buffer: VecDeque::new(),
        cursor: Cursor::Start,
        cancel,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.buffer.pop_front() {
                return Some((Ok(item), state));
            }

            let token = match std::mem::replace(&mut state.cursor, Cursor::Done) {
                Cursor::Done => return None,
                Cursor::Start => None,
                Cursor::Next(token) => Some(token),
            };

            let page = (state.fetch)(token);
            let outcome = tokio::select! {
                biased;
                _ = state.cancel.cancelled() => Err(Error::Cancelled),
                outcome = page => outcome,
            };

            match outcome {
                Ok((items, next)) => {
                    state.buffer.extend(items);
                    if let Some(next) = next {
                        state.cursor = Cursor::Next(next);
                    }
                }
                // cursor is already Done, so this is the last item
                Err(e) => return Some((Err(e), state)),
            }
        }
    })
    .boxed()
}
