//! Transport policy applied to every outbound request
//!
//! The policy is an ordered list of stateless request decorators plus an
//! optional bandwidth budget shared by request and response bodies:
//!
//! 1. read-only guard (rejects unsafe methods before anything is sent)
//! 2. bandwidth limiter (applied to body streams, see [`RateBudget`])
//! 3. header injection
//! 4. query parameter injection
//!
//! Decorators run before signing, so injected values are covered by the
//! request signature. The SDK adapter is responsible for calling
//! [`TransportPolicy::apply`] on each request.

mod limiter;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::TransportConfig;
use crate::error::{Error, Result};

pub use limiter::{RateBudget, ThrottledReader};

/// Methods allowed while the client is in read-only mode
pub const SAFE_METHODS: [&str; 4] = ["HEAD", "GET", "OPTIONS", "TRACE"];

/// Mutable view of an outbound HTTP request
pub trait OutboundRequest {
    /// HTTP method, e.g. `GET`
    fn method(&self) -> &str;

    /// Full request URI including the query string
    fn uri(&self) -> &str;

    /// Set a header, replacing any existing value
    fn set_header(&mut self, name: &str, value: &str) -> Result<()>;

    /// Replace the request URI
    fn set_uri(&mut self, uri: String) -> Result<()>;
}

/// One stateless step of the policy chain
pub trait RequestDecorator: Send + Sync + fmt::Debug {
    /// Short identifier used in logs
    fn name(&self) -> &'static str;

    /// Inspect or modify the request; an error aborts it before transmission
    fn decorate(&self, request: &mut dyn OutboundRequest) -> Result<()>;
}

/// Rejects every request whose method is not in [`SAFE_METHODS`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOnlyGuard;

impl RequestDecorator for ReadOnlyGuard {
    fn name(&self) -> &'static str {
        "read-only-guard"
    }

    fn decorate(&self, request: &mut dyn OutboundRequest) -> Result<()> {
        let method = request.method();
        if SAFE_METHODS.iter().any(|m| m.eq_ignore_ascii_case(method)) {
            return Ok(());
        }
        tracing::debug!(method = method, "Request blocked by read-only mode");
        Err(Error::ReadOnly {
            method: method.to_string(),
        })
    }
}

/// Sets a fixed set of headers on every request
#[derive(Debug, Clone)]
pub struct HeaderInjector {
    headers: BTreeMap<String, String>,
}

impl HeaderInjector {
    pub fn new(headers: BTreeMap<String, String>) -> Self {
        Self { headers }
    }
}

impl RequestDecorator for HeaderInjector {
    fn name(&self) -> &'static str {
        "header-injector"
    }

    fn decorate(&self, request: &mut dyn OutboundRequest) -> Result<()> {
        for (name, value) in &self.headers {
            request.set_header(name, value)?;
        }
        Ok(())
    }
}

/// Sets a fixed set of query parameters on every request
#[derive(Debug, Clone)]
pub struct QueryParamInjector {
    params: BTreeMap<String, String>,
}

impl QueryParamInjector {
    pub fn new(params: BTreeMap<String, String>) -> Self {
        Self { params }
    }
}

impl RequestDecorator for QueryParamInjector {
    fn name(&self) -> &'static str {
        "query-param-injector"
    }

    fn decorate(&self, request: &mut dyn OutboundRequest) -> Result<()> {
        let uri = merge_query(request.uri(), &self.params);
        request.set_uri(uri)
    }
}

/// Overwrite (not append) `params` in the query string of `uri`.
///
/// Existing pairs are kept byte for byte so the SDK's own encoding is not
/// disturbed; only pairs whose key is being injected are dropped.
pub fn merge_query(uri: &str, params: &BTreeMap<String, String>) -> String {
    if params.is_empty() {
        return uri.to_string();
    }

    let (base, query) = match uri.split_once('?') {
        Some((base, query)) => (base, query),
        None => (uri, ""),
    };

    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let raw_key = pair.split_once('=').map_or(*pair, |(k, _)| k);
            let key = urlencoding::decode(raw_key).map_or_else(|_| raw_key.into(), |k| k);
            !params.contains_key(key.as_ref())
        })
        .map(str::to_string)
        .collect();

    pairs.extend(
        params
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v))),
    );

    format!("{base}?{}", pairs.join("&"))
}

/// The composed decorator chain and bandwidth budget of one client
#[derive(Debug, Clone, Default)]
pub struct TransportPolicy {
    decorators: Vec<Arc<dyn RequestDecorator>>,
    limiter: Option<Arc<RateBudget>>,
}

impl TransportPolicy {
    /// A policy that changes nothing
    pub fn passthrough() -> Self {
        Self::default()
    }

    /// Compose the chain for a transport configuration
    pub fn from_config(config: &TransportConfig) -> Self {
        let mut decorators: Vec<Arc<dyn RequestDecorator>> = Vec::new();

        if config.read_only {
            decorators.push(Arc::new(ReadOnlyGuard));
        }
        if !config.headers.is_empty() {
            decorators.push(Arc::new(HeaderInjector::new(config.headers.clone())));
        }
        if !config.query_params.is_empty() {
            decorators.push(Arc::new(QueryParamInjector::new(
                config.query_params.clone(),
            )));
        }

        Self {
            decorators,
            limiter: config.rate_limit.map(|l| Arc::new(RateBudget::new(l))),
        }
    }

    /// Run every decorator in order; the first error aborts the request
    pub fn apply(&self, request: &mut dyn OutboundRequest) -> Result<()> {
        for decorator in &self.decorators {
            decorator.decorate(request)?;
        }
        Ok(())
    }

    /// Names of the active decorators, in application order
    pub fn decorator_names(&self) -> Vec<&'static str> {
        self.decorators.iter().map(|d| d.name()).collect()
    }

    /// Shared bandwidth budget, if a limit is configured
    pub fn limiter(&self) -> Option<&Arc<RateBudget>> {
        self.limiter.as_ref()
    }

    /// Wrap a body stream with the bandwidth budget.
    ///
    /// Without a configured limit the returned reader forwards reads directly.
    pub fn throttle<R>(&self, reader: R, cancel: CancellationToken) -> ThrottledReader<R> {
        ThrottledReader::new(reader, self.limiter.clone(), cancel)
    }
}
