//! Capability implementations for the self-contained demo service.

use async_trait::async_trait;
use tracing::info;
use uplink_domain::{
    AlertNotifier, Device, DomainError, DomainResult, GeolocationExtractor, ParserDefinition,
    PayloadParser, StoredMessage,
};

/// Decodes hex-encoded tenths-of-a-degree temperature frames, e.g. "011a" → 28.2
pub struct HexTemperatureParser;

#[async_trait]
impl PayloadParser for HexTemperatureParser {
    async fn decode(
        &self,
        _parser: &ParserDefinition,
        payload: &str,
    ) -> DomainResult<serde_json::Value> {
        let raw = u16::from_str_radix(payload, 16).map_err(|e| {
            DomainError::PayloadDecodeError(format!("not a hex frame '{}': {}", payload, e))
        })?;
        Ok(serde_json::json!({ "temperature": f64::from(raw) / 10.0 }))
    }
}

/// Logs evaluations instead of running alert rules
pub struct LoggingAlertNotifier;

#[async_trait]
impl AlertNotifier for LoggingAlertNotifier {
    async fn evaluate(
        &self,
        decoded: Option<serde_json::Value>,
        device: &Device,
    ) -> DomainResult<()> {
        info!(
            device_id = %device.id,
            decoded = decoded.is_some(),
            "alert evaluation triggered"
        );
        Ok(())
    }
}

/// Logs extraction requests instead of parsing coordinates
pub struct LoggingGeolocationExtractor;

#[async_trait]
impl GeolocationExtractor for LoggingGeolocationExtractor {
    async fn extract_from_message(&self, message: &StoredMessage) -> DomainResult<()> {
        info!(
            message_id = %message.id,
            has_decoded_data = message.decoded_data.is_some(),
            "geolocation extraction triggered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser_definition() -> ParserDefinition {
        ParserDefinition {
            id: "hex-temperature".to_string(),
            name: "hex temperature".to_string(),
            function: "builtin".to_string(),
        }
    }

    #[tokio::test]
    async fn test_hex_frame_decodes_to_tenths() {
        let parser = HexTemperatureParser;
        let decoded = parser.decode(&parser_definition(), "011a").await.unwrap();
        assert_eq!(decoded, serde_json::json!({ "temperature": 28.2 }));
    }

    #[tokio::test]
    async fn test_non_hex_frame_is_a_decode_error() {
        let parser = HexTemperatureParser;
        let result = parser.decode(&parser_definition(), "zz").await;
        assert!(matches!(result, Err(DomainError::PayloadDecodeError(_))));
    }
}
