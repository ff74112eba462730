use crate::error::DomainResult;
use crate::repository::DeviceRepository;
use crate::types::{Device, NewDevice, UplinkRequest};
use std::sync::Arc;
use tracing::{debug, info};

/// Provisioning hints carried on an uplink, honored only when the device is
/// first created. Hints arriving for an already-known device are dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisioningHints {
    pub device_name_prefix: Option<String>,
    pub parser_id: Option<String>,
    pub category_id: Option<String>,
    pub downlink_payload: Option<serde_json::Value>,
}

impl ProvisioningHints {
    pub fn from_request(request: &UplinkRequest) -> Self {
        Self {
            device_name_prefix: request.device_name_prefix.clone(),
            parser_id: request.parser_id.clone(),
            category_id: request.category_id.clone(),
            downlink_payload: request.downlink_payload.clone(),
        }
    }

    fn any_set(&self) -> bool {
        self.device_name_prefix.is_some()
            || self.parser_id.is_some()
            || self.category_id.is_some()
            || self.downlink_payload.is_some()
    }
}

/// Finds or auto-provisions the device a message belongs to
pub struct DeviceResolver {
    devices: Arc<dyn DeviceRepository>,
}

impl DeviceResolver {
    pub fn new(devices: Arc<dyn DeviceRepository>) -> Self {
        Self { devices }
    }

    /// Resolve the device for an inbound message, creating it on first
    /// contact. Returns the stored device and whether this call created it.
    ///
    /// On creation the device is seeded from the user and the non-empty
    /// hints; the name becomes `<prefix>_<device_id>` when a prefix hint is
    /// present, otherwise the device id itself. On an existing device the
    /// hints are ignored: identity fields are first-write-wins.
    pub async fn resolve_or_create(
        &self,
        device_id: &str,
        user_id: &str,
        hints: ProvisioningHints,
    ) -> DomainResult<(Device, bool)> {
        let name = match hints.device_name_prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => format!("{}_{}", prefix, device_id),
            _ => device_id.to_string(),
        };

        let hints_present = hints.any_set();
        let candidate = NewDevice {
            id: device_id.to_string(),
            user_id: user_id.to_string(),
            name,
            parser_id: hints.parser_id,
            category_id: hints.category_id,
            downlink_payload: hints.downlink_payload,
        };

        let (device, created) = self.devices.find_or_create(candidate).await?;

        if created {
            info!(device_id = %device.id, user_id = %user_id, "created device on first contact");
        } else {
            debug!(device_id = %device.id, "found existing device");
            if hints_present {
                debug!(device_id = %device.id, "provisioning hints ignored for existing device");
            }
        }

        Ok((device, created))
    }
}
