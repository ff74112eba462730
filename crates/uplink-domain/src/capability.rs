use crate::error::DomainResult;
use crate::types::{Device, ParserDefinition, StoredMessage};
use async_trait::async_trait;

/// Trait for decoding raw uplink payloads with a device-bound parser.
///
/// Implementations should:
/// - Run the parser definition's decoding function against the payload
/// - Return the decoded JSON value on success
/// - Return PayloadDecodeError on failure
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayloadParser: Send + Sync {
    async fn decode(
        &self,
        parser: &ParserDefinition,
        payload: &str,
    ) -> DomainResult<serde_json::Value>;
}

/// Trait for evaluating alert rules after a message is decoded.
/// Failures are logged by the caller, never propagated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AlertNotifier: Send + Sync {
    async fn evaluate(
        &self,
        decoded: Option<serde_json::Value>,
        device: &Device,
    ) -> DomainResult<()>;
}

/// Trait for extracting geolocation from a stored message during
/// post-processing. Fire-and-forget; failures are logged by the caller.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GeolocationExtractor: Send + Sync {
    async fn extract_from_message(&self, message: &StoredMessage) -> DomainResult<()>;
}
