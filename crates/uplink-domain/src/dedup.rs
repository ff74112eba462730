use crate::error::DomainResult;
use crate::repository::MessageRepository;
use crate::types::{StoredMessage, UplinkRequest};
use std::sync::Arc;
use tracing::{debug, warn};

/// Classification of an inbound delivery against stored messages
#[derive(Debug, Clone, PartialEq)]
pub enum DedupAction {
    /// First delivery of a new logical message
    CreateNew,
    /// Re-delivery of a message already stored; merge the reception into it
    MergeIntoExisting(StoredMessage),
    /// Flagged duplicate but no primary message exists; the caller must
    /// reject with OrphanDuplicate and write nothing
    RejectNoPrior,
}

/// Classifies deliveries as new or duplicate and merges reception records
pub struct DedupEngine {
    messages: Arc<dyn MessageRepository>,
}

impl DedupEngine {
    pub fn new(messages: Arc<dyn MessageRepository>) -> Self {
        Self { messages }
    }

    /// Classify a delivery. Duplicates are matched exactly on
    /// (device_id, time, seq_number), the identity of a logical message.
    pub async fn classify(&self, request: &UplinkRequest) -> DomainResult<DedupAction> {
        if !request.duplicate {
            return Ok(DedupAction::CreateNew);
        }

        let existing = self
            .messages
            .find_logical(&request.device_id, request.time, request.seq_number)
            .await?;

        match existing {
            Some(message) => {
                debug!(
                    device_id = %request.device_id,
                    message_id = %message.id,
                    seq_number = request.seq_number,
                    "duplicate delivery matches a stored message"
                );
                Ok(DedupAction::MergeIntoExisting(message))
            }
            None => {
                warn!(
                    device_id = %request.device_id,
                    seq_number = request.seq_number,
                    "duplicate delivery with no prior primary message"
                );
                Ok(DedupAction::RejectNoPrior)
            }
        }
    }

    /// Append the incoming reception entry to the existing message and
    /// persist the merge. Append-only: every other field stays untouched.
    pub async fn merge(
        &self,
        mut existing: StoredMessage,
        request: &UplinkRequest,
    ) -> DomainResult<StoredMessage> {
        if let Some(entry) = request.reception.first() {
            existing.reception.push(entry.clone());
        }

        let merged = self.messages.upsert(existing).await?;

        debug!(
            message_id = %merged.id,
            receptions = merged.reception.len(),
            "merged duplicate reception into stored message"
        );

        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockMessageRepository;
    use crate::types::Reception;

    fn base_request(duplicate: bool) -> UplinkRequest {
        UplinkRequest {
            device_id: "ABC123".to_string(),
            time: 1_700_000_000,
            seq_number: 17,
            duplicate,
            reception: vec![Reception {
                gateway_id: "gw-2".to_string(),
                rssi: Some(-120.5),
                snr: Some(8.1),
            }],
            data: None,
            ack: false,
            device_name_prefix: None,
            parser_id: None,
            category_id: None,
            downlink_payload: None,
        }
    }

    fn stored_message() -> StoredMessage {
        StoredMessage {
            id: "msg-1".to_string(),
            device_id: "ABC123".to_string(),
            user_id: "user-1".to_string(),
            created_at: chrono::DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            time: 1_700_000_000,
            seq_number: 17,
            reception: vec![Reception {
                gateway_id: "gw-1".to_string(),
                rssi: Some(-115.0),
                snr: Some(10.2),
            }],
            data: None,
            decoded_data: None,
            downlink_payload: None,
        }
    }

    #[tokio::test]
    async fn test_non_duplicate_is_create_new() {
        let mock_messages = MockMessageRepository::new();
        let engine = DedupEngine::new(Arc::new(mock_messages));

        let action = engine.classify(&base_request(false)).await.unwrap();
        assert_eq!(action, DedupAction::CreateNew);
    }

    #[tokio::test]
    async fn test_duplicate_with_prior_message_merges() {
        let mut mock_messages = MockMessageRepository::new();

        let existing = stored_message();
        mock_messages
            .expect_find_logical()
            .withf(|device_id, time, seq| {
                device_id == "ABC123" && *time == 1_700_000_000 && *seq == 17
            })
            .times(1)
            .return_once(move |_, _, _| Ok(Some(existing)));

        let engine = DedupEngine::new(Arc::new(mock_messages));

        let action = engine.classify(&base_request(true)).await.unwrap();
        assert!(matches!(action, DedupAction::MergeIntoExisting(_)));
    }

    #[tokio::test]
    async fn test_duplicate_without_prior_is_rejected() {
        let mut mock_messages = MockMessageRepository::new();

        mock_messages
            .expect_find_logical()
            .times(1)
            .return_once(|_, _, _| Ok(None));

        let engine = DedupEngine::new(Arc::new(mock_messages));

        let action = engine.classify(&base_request(true)).await.unwrap();
        assert_eq!(action, DedupAction::RejectNoPrior);
    }

    #[tokio::test]
    async fn test_merge_appends_exactly_one_reception() {
        let mut mock_messages = MockMessageRepository::new();

        mock_messages
            .expect_upsert()
            .withf(|message: &StoredMessage| {
                message.id == "msg-1"
                    && message.reception.len() == 2
                    && message.reception[1].gateway_id == "gw-2"
            })
            .times(1)
            .return_once(|message| Ok(message));

        let engine = DedupEngine::new(Arc::new(mock_messages));

        let merged = engine
            .merge(stored_message(), &base_request(true))
            .await
            .unwrap();

        assert_eq!(merged.id, "msg-1");
        assert_eq!(merged.reception.len(), 2);
        assert_eq!(merged.seq_number, 17);
    }

    #[tokio::test]
    async fn test_merge_without_reception_entry_keeps_message_intact() {
        let mut mock_messages = MockMessageRepository::new();

        mock_messages
            .expect_upsert()
            .withf(|message: &StoredMessage| message.reception.len() == 1)
            .times(1)
            .return_once(|message| Ok(message));

        let engine = DedupEngine::new(Arc::new(mock_messages));

        let mut request = base_request(true);
        request.reception.clear();

        let merged = engine.merge(stored_message(), &request).await.unwrap();
        assert_eq!(merged.reception.len(), 1);
    }
}
