//! Bridges the core transport policy into the SDK request pipeline

use aws_smithy_runtime_api::box_error::BoxError;
use aws_smithy_runtime_api::client::interceptors::Intercept;
use aws_smithy_runtime_api::client::interceptors::context::BeforeTransmitInterceptorContextMut;
use aws_smithy_runtime_api::client::orchestrator::HttpRequest;
use aws_smithy_runtime_api::client::runtime_components::RuntimeComponents;
use aws_smithy_types::config_bag::ConfigBag;
use s3tree_core::{Error, OutboundRequest, Result, TransportPolicy};

/// Runs the [`TransportPolicy`] decorators on every request before signing
#[derive(Debug, Clone)]
pub struct PolicyInterceptor {
    policy: TransportPolicy,
}

impl PolicyInterceptor {
    pub fn new(policy: TransportPolicy) -> Self {
        Self { policy }
    }

    fn apply(&self, request: &mut HttpRequest) -> Result<()> {
        self.policy.apply(&mut SdkRequest(request))
    }
}

impl Intercept for PolicyInterceptor {
    fn name(&self) -> &'static str {
        "s3tree-transport-policy"
    }

    fn modify_before_signing(
        &self,
        context: &mut BeforeTransmitInterceptorContextMut<'_>,
        _runtime_components: &RuntimeComponents,
        _cfg: &mut ConfigBag,
    ) -> std::result::Result<(), BoxError> {
        self.apply(context.request_mut())?;
        Ok(())
    }
}

struct SdkRequest<'a>(&'a mut HttpRequest);

impl OutboundRequest for SdkRequest<'_> {
    fn method(&self) -> &str {
        self.0.method()
    }

    fn uri(&self) -> &str {
        self.0.uri()
    }

    fn set_header(&mut self, name: &str, value: &str) -> Result<()> {
        self.0
            .headers_mut()
            .try_insert(name.to_string(), value.to_string())
            .map_err(|e| Error::Config(format!("invalid header '{name}': {e}")))?;
        Ok(())
    }

    fn set_uri(&mut self, uri: String) -> Result<()> {
        self.0
            .set_uri(uri)
            .map_err(|e| Error::Config(format!("invalid request uri: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_smithy_types::body::SdkBody;
    use s3tree_core::TransportConfig;
    use std::collections::BTreeMap;

    fn request(uri: &str) -> HttpRequest {
        let mut request = HttpRequest::new(SdkBody::empty());
        request.set_uri(uri).unwrap();
        request
    }

    #[test]
    fn test_injects_headers_and_params() {
        let config = TransportConfig {
            headers: BTreeMap::from([("x-tenant".to_string(), "acme".to_string())]),
            query_params: BTreeMap::from([("trace".to_string(), "on".to_string())]),
            ..Default::default()
        };
        let interceptor = PolicyInterceptor::new(TransportPolicy::from_config(&config));

        let mut req = request("https://s3.local/bucket?list-type=2&prefix=dir%2F");
        interceptor.apply(&mut req).unwrap();

        assert_eq!(req.headers().get("x-tenant"), Some("acme"));
        assert_eq!(
            req.uri(),
            "https://s3.local/bucket?list-type=2&prefix=dir%2F&trace=on"
        );
    }

    #[test]
    fn test_read_only_lets_get_through() {
        let config = TransportConfig {
            read_only: true,
            ..Default::default()
        };
        let interceptor = PolicyInterceptor::new(TransportPolicy::from_config(&config));

        let mut req = request("https://s3.local/bucket/key");
        interceptor.apply(&mut req).unwrap();
        assert_eq!(req.uri(), "https://s3.local/bucket/key");
    }

    #[test]
    fn test_invalid_header_is_a_config_error() {
        let config = TransportConfig {
            headers: BTreeMap::from([("bad header".to_string(), "v".to_string())]),
            ..Default::default()
        };
        let interceptor = PolicyInterceptor::new(TransportPolicy::from_config(&config));

        let mut req = request("https://s3.local/bucket");
        let err = interceptor.apply(&mut req).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
