use crate::capability::{AlertNotifier, PayloadParser};
use crate::error::{DomainError, DomainResult};
use crate::repository::DeviceRepository;
use crate::types::{Device, DeviceWithParser, ParserDefinition};
use std::sync::Arc;
use tracing::{debug, warn};

/// Best-effort result of running a payload through the device's parser.
/// A decode failure never blocks message creation: the message persists with
/// `decoded_data` empty and the error travels back in the ingestion outcome.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodeOutcome {
    pub decoded: Option<serde_json::Value>,
    pub decode_error: Option<String>,
}

/// Decodes raw payloads through the device-bound parser and triggers alert
/// evaluation on the result
pub struct PayloadDecodePipeline {
    devices: Arc<dyn DeviceRepository>,
    parser: Arc<dyn PayloadParser>,
    alerts: Arc<dyn AlertNotifier>,
}

impl PayloadDecodePipeline {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        parser: Arc<dyn PayloadParser>,
        alerts: Arc<dyn AlertNotifier>,
    ) -> Self {
        Self {
            devices,
            parser,
            alerts,
        }
    }

    /// Decode `payload` for `device`, binding a hinted parser first when the
    /// device has none yet.
    ///
    /// Storage failures while binding or re-fetching abort ingestion; decode
    /// failures are recorded in the outcome instead. Alert evaluation runs
    /// after decode with whatever decoded data exists, and its failures are
    /// only logged.
    pub async fn run(
        &self,
        device: &Device,
        payload: &str,
        parser_hint: Option<&str>,
    ) -> DomainResult<DecodeOutcome> {
        let (device, parser) = self.resolve_parser(device, parser_hint).await?;

        let mut outcome = DecodeOutcome::default();

        match parser {
            Some(definition) => {
                debug!(
                    device_id = %device.id,
                    parser_id = %definition.id,
                    payload_len = payload.len(),
                    "decoding payload"
                );
                match self.parser.decode(&definition, payload).await {
                    Ok(decoded) => outcome.decoded = Some(decoded),
                    Err(e) => {
                        warn!(
                            device_id = %device.id,
                            parser_id = %definition.id,
                            error = %e,
                            "payload decode failed, message will persist undecoded"
                        );
                        outcome.decode_error = Some(e.to_string());
                    }
                }
            }
            None => {
                // parser_id points at a definition that no longer exists
                warn!(device_id = %device.id, "no parser definition resolved for device");
                outcome.decode_error = Some(format!(
                    "no parser definition resolved for device {}",
                    device.id
                ));
            }
        }

        if let Err(e) = self.alerts.evaluate(outcome.decoded.clone(), &device).await {
            warn!(device_id = %device.id, error = %e, "alert evaluation failed");
        }

        Ok(outcome)
    }

    /// Fetch the device's parser definition, persisting a hinted binding
    /// first when the device has no parser yet.
    async fn resolve_parser(
        &self,
        device: &Device,
        parser_hint: Option<&str>,
    ) -> DomainResult<(Device, Option<ParserDefinition>)> {
        let with_parser = self
            .devices
            .find_with_parser(&device.id)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device.id.clone()))?;

        if with_parser.parser.is_some() {
            return Ok((with_parser.device, with_parser.parser));
        }

        let hint = match parser_hint {
            Some(hint) if !hint.is_empty() => hint,
            _ => return Ok((with_parser.device, None)),
        };

        debug!(device_id = %device.id, parser_id = %hint, "binding hinted parser to device");
        self.devices.bind_parser(&device.id, hint).await?;

        let DeviceWithParser { device, parser } = self
            .devices
            .find_with_parser(&device.id)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device.id.clone()))?;

        Ok((device, parser))
    }
}
