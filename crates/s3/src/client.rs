//! S3 client implementation
//!
//! Wraps aws-sdk-s3 and implements the ObjectStore trait from s3tree-core.

use std::error::Error as StdError;

use async_trait::async_trait;
use aws_sdk_s3::error::{ProvideErrorMetadata, SdkError};
use aws_smithy_runtime_api::client::orchestrator::HttpResponse;
use jiff::Timestamp;
use s3tree_core::{
    DeleteRequest, Error, ListRequest, MultipartUpload, ObjectEntry, ObjectStore, ObjectVersion,
    Page, PageToken, Profile, Result, TransportConfig, TransportPolicy, UploadPart,
};
use tokio::io::AsyncWrite;
use tokio_util::sync::CancellationToken;

use crate::interceptor::PolicyInterceptor;

const DEFAULT_REGION: &str = "us-east-1";

/// S3 client wrapper
pub struct S3Client {
    inner: aws_sdk_s3::Client,
    policy: TransportPolicy,
    cancel: CancellationToken,
}

impl S3Client {
    /// Create a new S3 client from a connection profile.
    ///
    /// Static credentials are used when the profile has an access key,
    /// otherwise the SDK default provider chain applies.
    pub async fn new(
        profile: &Profile,
        transport: TransportConfig,
        cancel: CancellationToken,
    ) -> Result<Self> {
        let region = if profile.region.is_empty() {
            DEFAULT_REGION.to_string()
        } else {
            profile.region.clone()
        };

        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(region));

        if !profile.access_key.is_empty() {
            let credentials = aws_credential_types::Credentials::new(
                profile.access_key.clone(),
                profile.secret_key.clone(),
                None,
                None,
                "s3tree-static-credentials",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint) = profile.endpoint_url()? {
            loader = loader.endpoint_url(endpoint.as_str());
        }

        let config = loader.load().await;
        let policy = TransportPolicy::from_config(&transport);

        tracing::debug!(
            endpoint = %profile.endpoint,
            path_style = profile.path_style,
            decorators = ?policy.decorator_names(),
            "Building S3 client"
        );

        let s3_config = aws_sdk_s3::config::Builder::from(&config)
            .force_path_style(profile.path_style)
            .interceptor(PolicyInterceptor::new(policy.clone()))
            .build();

        Ok(Self {
            inner: aws_sdk_s3::Client::from_conf(s3_config),
            policy,
            cancel,
        })
    }

    /// Get the underlying aws-sdk-s3 client
    pub fn inner(&self) -> &aws_sdk_s3::Client {
        &self.inner
    }
}

/// Map an SDK error to the core error taxonomy.
///
/// Errors raised by the transport policy travel through the SDK as the
/// source of a dispatch or construction failure and are recovered as-is.
fn map_sdk_error<E>(context: &str, error: SdkError<E, HttpResponse>) -> Error
where
    E: ProvideErrorMetadata + StdError + Send + Sync + 'static,
{
    if let Some(core) = find_core_error(&error) {
        return core;
    }

    match &error {
        SdkError::ServiceError(service_err) => {
            let err = service_err.err();
            let status = service_err.raw().status().as_u16();
            let code = err.code().unwrap_or_default();
            let message = match err.message() {
                Some(m) => format!("{context}: {code} {m}"),
                None => format!("{context}: {code}"),
            };
            match (code, status) {
                ("NoSuchKey" | "NotFound" | "NoSuchBucket" | "NoSuchUpload", _) | (_, 404) => {
                    Error::NotFound(message)
                }
                (
                    "AccessDenied" | "InvalidAccessKeyId" | "SignatureDoesNotMatch"
                    | "ExpiredToken",
                    _,
                )
                | (_, 401 | 403) => Error::Auth(message),
                _ => Error::Service { status, message },
            }
        }
        SdkError::TimeoutError(_) => Error::Network(format!("{context}: request timeout")),
        SdkError::DispatchFailure(err) => {
            Error::Network(format!("{context}: network dispatch error: {err:?}"))
        }
        SdkError::ResponseError(err) => {
            Error::Network(format!("{context}: response error: {err:?}"))
        }
        SdkError::ConstructionFailure(err) => {
            Error::General(format!("{context}: request construction failed: {err:?}"))
        }
        _ => Error::General(format!("{context}: {error}")),
    }
}

fn find_core_error(error: &(dyn StdError + 'static)) -> Option<Error> {
    let mut source = error.source();
    while let Some(err) = source {
        if let Some(core) = err.downcast_ref::<Error>() {
            return Some(core.duplicate());
        }
        source = err.source();
    }
    None
}

fn timestamp(dt: Option<&aws_smithy_types::DateTime>) -> Option<Timestamp> {
    dt.and_then(|dt| Timestamp::from_second(dt.secs()).ok())
}

fn trim_etag(etag: Option<&str>) -> Option<String> {
    etag.map(|s| s.trim_matches('"').to_string())
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[async_trait]
impl ObjectStore for S3Client {
    async fn list_objects_page(&self, request: &ListRequest) -> Result<Page<ObjectEntry>> {
        let response = self
            .inner
            .list_objects_v2()
            .bucket(&request.bucket)
            .set_prefix(non_empty(&request.prefix))
            .set_delimiter(request.delimiter.clone())
            .max_keys(request.max_keys)
            .set_continuation_token(request.token.as_ref().map(|t| t.marker.clone()))
            .send()
            .await
            .map_err(|e| map_sdk_error("list objects", e))?;

        let prefixes = response
            .common_prefixes()
            .iter()
            .filter_map(|p| p.prefix().map(str::to_string))
            .collect();

        let items = response
            .contents()
            .iter()
            .map(|object| ObjectEntry {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or(0),
                last_modified: timestamp(object.last_modified()),
                version_id: None,
                etag: trim_etag(object.e_tag()),
            })
            .collect();

        let next = if response.is_truncated().unwrap_or(false) {
            response.next_continuation_token().map(PageToken::new)
        } else {
            None
        };

        Ok(Page {
            prefixes,
            items,
            next,
        })
    }

    async fn list_versions_page(&self, request: &ListRequest) -> Result<Page<ObjectVersion>> {
        let response = self
            .inner
            .list_object_versions()
            .bucket(&request.bucket)
            .set_prefix(non_empty(&request.prefix))
            .max_keys(request.max_keys)
            .set_key_marker(request.token.as_ref().map(|t| t.marker.clone()))
            .set_version_id_marker(request.token.as_ref().and_then(|t| t.secondary.clone()))
            .send()
            .await
            .map_err(|e| map_sdk_error("list object versions", e))?;

        let mut items: Vec<ObjectVersion> = response
            .versions()
            .iter()
            .map(|v| ObjectVersion {
                entry: ObjectEntry {
                    key: v.key().unwrap_or_default().to_string(),
                    size: v.size().unwrap_or(0),
                    last_modified: timestamp(v.last_modified()),
                    version_id: Some(v.version_id().unwrap_or("null").to_string()),
                    etag: trim_etag(v.e_tag()),
                },
                is_latest: v.is_latest().unwrap_or(false),
                is_delete_marker: false,
            })
            .collect();

        items.extend(response.delete_markers().iter().map(|m| ObjectVersion {
            entry: ObjectEntry {
                key: m.key().unwrap_or_default().to_string(),
                size: 0,
                last_modified: timestamp(m.last_modified()),
                version_id: Some(m.version_id().unwrap_or("null").to_string()),
                etag: None,
            },
            is_latest: m.is_latest().unwrap_or(false),
            is_delete_marker: true,
        }));

        // versions and markers come back as two lists; merge them per key
        items.sort_by(|a, b| {
            a.entry
                .key
                .cmp(&b.entry.key)
                .then_with(|| b.entry.last_modified.cmp(&a.entry.last_modified))
        });

        let next = if response.is_truncated().unwrap_or(false) {
            response.next_key_marker().map(|marker| {
                PageToken::with_secondary(
                    marker,
                    response.next_version_id_marker().map(str::to_string),
                )
            })
        } else {
            None
        };

        Ok(Page {
            prefixes: Vec::new(),
            items,
            next,
        })
    }

    async fn list_uploads_page(&self, request: &ListRequest) -> Result<Page<MultipartUpload>> {
        let response = self
            .inner
            .list_multipart_uploads()
            .bucket(&request.bucket)
            .set_prefix(non_empty(&request.prefix))
            .max_uploads(request.max_keys)
            .set_key_marker(request.token.as_ref().map(|t| t.marker.clone()))
            .set_upload_id_marker(request.token.as_ref().and_then(|t| t.secondary.clone()))
            .send()
            .await
            .map_err(|e| map_sdk_error("list multipart uploads", e))?;

        let items = response
            .uploads()
            .iter()
            .map(|u| MultipartUpload {
                key: u.key().unwrap_or_default().to_string(),
                upload_id: u.upload_id().unwrap_or_default().to_string(),
                initiated: timestamp(u.initiated()),
            })
            .collect();

        let next = if response.is_truncated().unwrap_or(false) {
            response.next_key_marker().map(|marker| {
                PageToken::with_secondary(
                    marker,
                    response.next_upload_id_marker().map(str::to_string),
                )
            })
        } else {
            None
        };

        Ok(Page {
            prefixes: Vec::new(),
            items,
            next,
        })
    }

    async fn list_parts_page(
        &self,
        bucket: &str,
        upload: &MultipartUpload,
        token: Option<&PageToken>,
    ) -> Result<Page<UploadPart>> {
        let response = self
            .inner
            .list_parts()
            .bucket(bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .set_part_number_marker(token.map(|t| t.marker.clone()))
            .send()
            .await
            .map_err(|e| map_sdk_error("list parts", e))?;

        let items = response
            .parts()
            .iter()
            .map(|p| UploadPart {
                part_number: p.part_number().unwrap_or(0),
                size: p.size().unwrap_or(0),
            })
            .collect();

        let next = if response.is_truncated().unwrap_or(false) {
            response.next_part_number_marker().map(PageToken::new)
        } else {
            None
        };

        Ok(Page {
            prefixes: Vec::new(),
            items,
            next,
        })
    }

    async fn head_object(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
    ) -> Result<ObjectEntry> {
        let response = self
            .inner
            .head_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| map_sdk_error("head object", e))?;

        Ok(ObjectEntry {
            key: key.to_string(),
            size: response.content_length().unwrap_or(0),
            last_modified: timestamp(response.last_modified()),
            version_id: version_id
                .map(str::to_string)
                .or_else(|| response.version_id().map(str::to_string)),
            etag: trim_etag(response.e_tag()),
        })
    }

    async fn delete_object(&self, request: &DeleteRequest) -> Result<()> {
        let mut builder = self
            .inner
            .delete_object()
            .bucket(&request.bucket)
            .key(&request.key)
            .set_version_id(request.version_id.clone());

        if request.bypass_governance {
            builder = builder.bypass_governance_retention(true);
        }

        builder
            .send()
            .await
            .map_err(|e| map_sdk_error("delete object", e))?;

        Ok(())
    }

    async fn abort_multipart_upload(&self, bucket: &str, upload: &MultipartUpload) -> Result<()> {
        self.inner
            .abort_multipart_upload()
            .bucket(bucket)
            .key(&upload.key)
            .upload_id(&upload.upload_id)
            .send()
            .await
            .map_err(|e| map_sdk_error("abort multipart upload", e))?;

        Ok(())
    }

    async fn download(
        &self,
        bucket: &str,
        key: &str,
        version_id: Option<&str>,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> Result<u64> {
        let response = self
            .inner
            .get_object()
            .bucket(bucket)
            .key(key)
            .set_version_id(version_id.map(str::to_string))
            .send()
            .await
            .map_err(|e| map_sdk_error("get object", e))?;

        let body = Box::pin(response.body.into_async_read());
        let mut reader = self.policy.throttle(body, self.cancel.clone());

        tokio::io::copy(&mut reader, sink)
            .await
            .map_err(Error::from_io)
    }
}
