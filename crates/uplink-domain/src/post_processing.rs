use crate::capability::GeolocationExtractor;
use crate::device_locks::DeviceLockRegistry;
use crate::error::{DomainError, DomainResult};
use crate::repository::{DeviceRepository, MessageRepository, OrganizationLinkRepository};
use crate::sequence_window::{compute_success_rate, SUCCESS_RATE_WINDOW};
use crate::types::StoredMessage;
use std::sync::Arc;
use tracing::{debug, warn};

/// Fire-and-forget work after a message is persisted and the response sent:
/// geolocation extraction, success-rate recompute, organization fan-out.
/// Every failure here is logged and dropped; the caller's response is
/// already decided.
pub struct PostProcessor {
    devices: Arc<dyn DeviceRepository>,
    messages: Arc<dyn MessageRepository>,
    organizations: Arc<dyn OrganizationLinkRepository>,
    geolocation: Arc<dyn GeolocationExtractor>,
    locks: Arc<DeviceLockRegistry>,
}

impl PostProcessor {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        messages: Arc<dyn MessageRepository>,
        organizations: Arc<dyn OrganizationLinkRepository>,
        geolocation: Arc<dyn GeolocationExtractor>,
        locks: Arc<DeviceLockRegistry>,
    ) -> Self {
        Self {
            devices,
            messages,
            organizations,
            geolocation,
            locks,
        }
    }

    /// Run all post-processing tasks for a freshly stored message
    pub async fn run(&self, message: StoredMessage) {
        if let Err(e) = self.geolocation.extract_from_message(&message).await {
            warn!(
                message_id = %message.id,
                error = %e,
                "geolocation extraction failed"
            );
        }

        if let Err(e) = self.recompute_success_rate(&message.device_id).await {
            warn!(
                device_id = %message.device_id,
                error = %e,
                "success-rate recompute failed"
            );
        }

        if let Err(e) = self.fan_out_to_organizations(&message).await {
            warn!(
                message_id = %message.id,
                error = %e,
                "organization fan-out failed"
            );
        }
    }

    /// Recompute the device's delivery success-rate from its most recent
    /// messages. Writes run under the device lock so concurrent recomputes
    /// for the same device cannot interleave.
    pub async fn recompute_success_rate(&self, device_id: &str) -> DomainResult<()> {
        let lock = self.locks.acquire(device_id);
        let _guard = lock.lock().await;

        let recent = self
            .messages
            .recent_by_device(device_id, SUCCESS_RATE_WINDOW)
            .await?;

        let window: Vec<u16> = recent.iter().map(|m| m.seq_number).collect();

        let rate = match compute_success_rate(&window) {
            Ok(rate) => rate,
            Err(DomainError::InsufficientWindow(n)) => {
                debug!(device_id = %device_id, window = n, "window too short for success-rate");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut device = self
            .devices
            .find_by_id(device_id)
            .await?
            .ok_or_else(|| DomainError::DeviceNotFound(device_id.to_string()))?;

        device.success_rate = Some(rate);
        self.devices.update_device(device).await?;

        debug!(device_id = %device_id, success_rate = rate, "updated device success-rate");
        Ok(())
    }

    /// Attach the message to every organization its device is shared with
    pub async fn fan_out_to_organizations(&self, message: &StoredMessage) -> DomainResult<()> {
        let organization_ids = self
            .organizations
            .organizations_for_device(&message.device_id)
            .await?;

        for organization_id in &organization_ids {
            self.organizations
                .attach_message(&message.id, organization_id)
                .await?;
        }

        if !organization_ids.is_empty() {
            debug!(
                message_id = %message.id,
                organizations = organization_ids.len(),
                "attached message to organizations"
            );
        }

        Ok(())
    }
}
