use crate::ack::build_ack_result;
use crate::capability::{AlertNotifier, GeolocationExtractor, PayloadParser};
use crate::decode_pipeline::{DecodeOutcome, PayloadDecodePipeline};
use crate::dedup::{DedupAction, DedupEngine};
use crate::device_locks::DeviceLockRegistry;
use crate::device_resolver::{DeviceResolver, ProvisioningHints};
use crate::error::{DomainError, DomainResult};
use crate::post_processing::PostProcessor;
use crate::repository::{DeviceRepository, MessageRepository, OrganizationLinkRepository};
use crate::types::{IngestionOutcome, StoredMessage, UplinkRequest};
use crate::validate;
use std::sync::Arc;
use tracing::{debug, info};

/// End-to-end "receive uplink message" operation.
///
/// Synchronous path: validate, resolve the device, branch on the duplicate
/// flag, optionally decode, persist, optionally build the ack response.
/// Everything after the response (geolocation, success-rate recompute,
/// organization fan-out) runs detached and can never change the outcome.
pub struct IngestionService {
    messages: Arc<dyn MessageRepository>,
    resolver: DeviceResolver,
    dedup: DedupEngine,
    decode: PayloadDecodePipeline,
    post: Arc<PostProcessor>,
    locks: Arc<DeviceLockRegistry>,
}

impl IngestionService {
    pub fn new(
        devices: Arc<dyn DeviceRepository>,
        messages: Arc<dyn MessageRepository>,
        organizations: Arc<dyn OrganizationLinkRepository>,
        parser: Arc<dyn PayloadParser>,
        alerts: Arc<dyn AlertNotifier>,
        geolocation: Arc<dyn GeolocationExtractor>,
    ) -> Self {
        let locks = Arc::new(DeviceLockRegistry::new());
        let post = Arc::new(PostProcessor::new(
            devices.clone(),
            messages.clone(),
            organizations,
            geolocation,
            locks.clone(),
        ));

        Self {
            resolver: DeviceResolver::new(devices.clone()),
            dedup: DedupEngine::new(messages.clone()),
            decode: PayloadDecodePipeline::new(devices, parser, alerts),
            messages,
            post,
            locks,
        }
    }

    /// Ingest one uplink delivery for the authenticated user.
    ///
    /// Returns the stored or merged message, or the ack response for
    /// bidirectional devices. Duplicate deliveries with no prior primary
    /// message fail with `OrphanDuplicate` and write nothing.
    pub async fn ingest(
        &self,
        user_id: &str,
        request: UplinkRequest,
    ) -> DomainResult<IngestionOutcome> {
        validate::validate_struct(&request)?;

        debug!(
            device_id = %request.device_id,
            seq_number = request.seq_number,
            duplicate = request.duplicate,
            ack = request.ack,
            "ingesting uplink delivery"
        );

        // Serialize the whole synchronous path per device: find-or-create and
        // duplicate-merge are read-modify-write against shared device state.
        let lock = self.locks.acquire(&request.device_id);
        let _guard = lock.lock().await;

        let hints = ProvisioningHints::from_request(&request);
        let (device, _created) = self
            .resolver
            .resolve_or_create(&request.device_id, user_id, hints)
            .await?;

        match self.dedup.classify(&request).await? {
            DedupAction::MergeIntoExisting(existing) => {
                let merged = self.dedup.merge(existing, &request).await?;
                info!(
                    device_id = %request.device_id,
                    message_id = %merged.id,
                    receptions = merged.reception.len(),
                    "merged duplicate delivery"
                );
                // Early return: merged duplicates skip decode, ack-building
                // and post-processing
                return Ok(IngestionOutcome::Merged { message: merged });
            }
            DedupAction::RejectNoPrior => {
                return Err(DomainError::OrphanDuplicate(request.device_id.clone()));
            }
            DedupAction::CreateNew => {}
        }

        let parser_hint = request.parser_id.as_deref();
        let parser_available = device.parser_id.is_some() || parser_hint.is_some();
        let decode_outcome = match request.data.as_deref() {
            Some(payload) if parser_available && !payload.is_empty() => {
                self.decode.run(&device, payload, parser_hint).await?
            }
            _ => DecodeOutcome::default(),
        };

        let mut message = self.build_message(user_id, &request)?;
        message.decoded_data = decode_outcome.decoded.clone();

        // For bidirectional devices the downlink payload rides on the stored
        // message and in the synchronous response.
        let ack_response = if request.ack {
            message.downlink_payload = device.downlink_payload.clone();
            Some(build_ack_result(&device))
        } else {
            None
        };

        let message = self.messages.create(message).await?;
        info!(
            device_id = %message.device_id,
            message_id = %message.id,
            seq_number = message.seq_number,
            decoded = message.decoded_data.is_some(),
            "stored uplink message"
        );

        self.spawn_post_processing(message.clone());

        Ok(match ack_response {
            Some(response) => IngestionOutcome::Acked {
                message,
                response,
                decode_error: decode_outcome.decode_error,
            },
            None => IngestionOutcome::Created {
                message,
                decode_error: decode_outcome.decode_error,
            },
        })
    }

    fn build_message(&self, user_id: &str, request: &UplinkRequest) -> DomainResult<StoredMessage> {
        let created_at = chrono::DateTime::from_timestamp(request.time, 0).ok_or_else(|| {
            DomainError::ValidationError(format!("time out of range: {}", request.time))
        })?;

        Ok(StoredMessage {
            id: xid::new().to_string(),
            device_id: request.device_id.clone(),
            user_id: user_id.to_string(),
            created_at,
            time: request.time,
            seq_number: request.seq_number,
            reception: request.reception.clone(),
            data: request.data.clone(),
            decoded_data: None,
            downlink_payload: None,
        })
    }

    /// Detached post-processing; never awaited by the caller, so a hung
    /// collaborator cannot wedge future ingestion calls.
    fn spawn_post_processing(&self, message: StoredMessage) {
        let post = self.post.clone();
        tokio::spawn(async move {
            post.run(message).await;
        });
    }
}
