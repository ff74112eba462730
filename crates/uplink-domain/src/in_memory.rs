//! In-memory store implementations backing tests and the all-in-one binary.

use crate::error::DomainResult;
use crate::repository::{DeviceRepository, MessageRepository, OrganizationLinkRepository};
use crate::types::{Device, DeviceWithParser, NewDevice, ParserDefinition, StoredMessage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// HashMap-backed device store. `find_or_create` is atomic under the store
/// lock, so a race for the same device id yields a single record.
#[derive(Default)]
pub struct InMemoryDeviceStore {
    devices: Mutex<HashMap<String, Device>>,
    parsers: Mutex<HashMap<String, ParserDefinition>>,
}

impl InMemoryDeviceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a parser definition devices can bind to
    pub fn add_parser(&self, parser: ParserDefinition) {
        let mut parsers = self.parsers.lock().unwrap();
        parsers.insert(parser.id.clone(), parser);
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap().len()
    }
}

#[async_trait]
impl DeviceRepository for InMemoryDeviceStore {
    async fn find_by_id(&self, device_id: &str) -> DomainResult<Option<Device>> {
        let devices = self.devices.lock().unwrap();
        Ok(devices.get(device_id).cloned())
    }

    async fn find_with_parser(&self, device_id: &str) -> DomainResult<Option<DeviceWithParser>> {
        let devices = self.devices.lock().unwrap();
        let Some(device) = devices.get(device_id).cloned() else {
            return Ok(None);
        };

        let parsers = self.parsers.lock().unwrap();
        let parser = device
            .parser_id
            .as_deref()
            .and_then(|parser_id| parsers.get(parser_id).cloned());

        Ok(Some(DeviceWithParser { device, parser }))
    }

    async fn find_or_create(&self, candidate: NewDevice) -> DomainResult<(Device, bool)> {
        let mut devices = self.devices.lock().unwrap();

        if let Some(existing) = devices.get(&candidate.id) {
            return Ok((existing.clone(), false));
        }

        let now = chrono::Utc::now();
        let device = Device {
            id: candidate.id.clone(),
            user_id: candidate.user_id,
            name: candidate.name,
            parser_id: candidate.parser_id,
            category_id: candidate.category_id,
            downlink_payload: candidate.downlink_payload,
            success_rate: None,
            created_at: Some(now),
            updated_at: Some(now),
        };
        devices.insert(candidate.id, device.clone());

        Ok((device, true))
    }

    async fn bind_parser(&self, device_id: &str, parser_id: &str) -> DomainResult<()> {
        let mut devices = self.devices.lock().unwrap();
        if let Some(device) = devices.get_mut(device_id) {
            device.parser_id = Some(parser_id.to_string());
            device.updated_at = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn update_device(&self, mut device: Device) -> DomainResult<Device> {
        let mut devices = self.devices.lock().unwrap();
        device.updated_at = Some(chrono::Utc::now());
        devices.insert(device.id.clone(), device.clone());
        Ok(device)
    }
}

/// Vec-backed message store preserving insertion order for recency ties
#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<StoredMessage>>,
}

impl InMemoryMessageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageRepository for InMemoryMessageStore {
    async fn find_logical(
        &self,
        device_id: &str,
        time: i64,
        seq_number: u16,
    ) -> DomainResult<Option<StoredMessage>> {
        let messages = self.messages.lock().unwrap();
        Ok(messages
            .iter()
            .find(|m| m.device_id == device_id && m.time == time && m.seq_number == seq_number)
            .cloned())
    }

    async fn create(&self, message: StoredMessage) -> DomainResult<StoredMessage> {
        let mut messages = self.messages.lock().unwrap();
        messages.push(message.clone());
        Ok(message)
    }

    async fn upsert(&self, message: StoredMessage) -> DomainResult<StoredMessage> {
        let mut messages = self.messages.lock().unwrap();
        match messages.iter_mut().find(|m| m.id == message.id) {
            Some(existing) => *existing = message.clone(),
            None => messages.push(message.clone()),
        }
        Ok(message)
    }

    async fn recent_by_device(
        &self,
        device_id: &str,
        limit: usize,
    ) -> DomainResult<Vec<StoredMessage>> {
        let messages = self.messages.lock().unwrap();

        // Newest first by creation time; insertion order breaks ties
        let mut recent: Vec<(usize, &StoredMessage)> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.device_id == device_id)
            .collect();
        recent.sort_by(|(idx_a, a), (idx_b, b)| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| idx_b.cmp(idx_a))
        });

        Ok(recent
            .into_iter()
            .take(limit)
            .map(|(_, m)| m.clone())
            .collect())
    }
}

/// Device ↔ organization sharing links plus the message attachments made
/// during post-processing fan-out
#[derive(Default)]
pub struct InMemoryOrganizationLinkStore {
    device_organizations: Mutex<HashMap<String, Vec<String>>>,
    message_attachments: Mutex<Vec<(String, String)>>,
}

impl InMemoryOrganizationLinkStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Share a device with an organization
    pub fn link_device(&self, device_id: &str, organization_id: &str) {
        let mut links = self.device_organizations.lock().unwrap();
        links
            .entry(device_id.to_string())
            .or_default()
            .push(organization_id.to_string());
    }

    /// (message_id, organization_id) pairs attached so far
    pub fn attachments(&self) -> Vec<(String, String)> {
        self.message_attachments.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrganizationLinkRepository for InMemoryOrganizationLinkStore {
    async fn organizations_for_device(&self, device_id: &str) -> DomainResult<Vec<String>> {
        let links = self.device_organizations.lock().unwrap();
        Ok(links.get(device_id).cloned().unwrap_or_default())
    }

    async fn attach_message(&self, message_id: &str, organization_id: &str) -> DomainResult<()> {
        let mut attachments = self.message_attachments.lock().unwrap();
        attachments.push((message_id.to_string(), organization_id.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str) -> NewDevice {
        NewDevice {
            id: id.to_string(),
            user_id: "user-1".to_string(),
            name: id.to_string(),
            parser_id: None,
            category_id: None,
            downlink_payload: None,
        }
    }

    fn message(id: &str, time: i64, seq_number: u16) -> StoredMessage {
        StoredMessage {
            id: id.to_string(),
            device_id: "ABC123".to_string(),
            user_id: "user-1".to_string(),
            created_at: chrono::DateTime::from_timestamp(time, 0).unwrap(),
            time,
            seq_number,
            reception: Vec::new(),
            data: None,
            decoded_data: None,
            downlink_payload: None,
        }
    }

    #[tokio::test]
    async fn test_find_or_create_is_idempotent() {
        let store = InMemoryDeviceStore::new();

        let (first, created) = store.find_or_create(candidate("ABC123")).await.unwrap();
        assert!(created);

        let mut second_candidate = candidate("ABC123");
        second_candidate.name = "other-name".to_string();
        let (second, created) = store.find_or_create(second_candidate).await.unwrap();
        assert!(!created);
        assert_eq!(second, first);
        assert_eq!(store.device_count(), 1);
    }

    #[tokio::test]
    async fn test_find_with_parser_resolves_binding() {
        let store = InMemoryDeviceStore::new();
        store.add_parser(ParserDefinition {
            id: "parser-7".to_string(),
            name: "temperature".to_string(),
            function: "var temp = parseInt(payload, 16) / 10;".to_string(),
        });

        store.find_or_create(candidate("ABC123")).await.unwrap();
        store.bind_parser("ABC123", "parser-7").await.unwrap();

        let with_parser = store.find_with_parser("ABC123").await.unwrap().unwrap();
        assert_eq!(with_parser.device.parser_id.as_deref(), Some("parser-7"));
        assert_eq!(with_parser.parser.unwrap().name, "temperature");
    }

    #[tokio::test]
    async fn test_recent_by_device_orders_newest_first_with_limit() {
        let store = InMemoryMessageStore::new();

        store.create(message("m1", 100, 1)).await.unwrap();
        store.create(message("m2", 300, 3)).await.unwrap();
        store.create(message("m3", 200, 2)).await.unwrap();

        let recent = store.recent_by_device("ABC123", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, "m2");
        assert_eq!(recent[1].id, "m3");
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_id() {
        let store = InMemoryMessageStore::new();

        store.create(message("m1", 100, 1)).await.unwrap();

        let mut updated = message("m1", 100, 1);
        updated.reception.push(crate::types::Reception {
            gateway_id: "gw-2".to_string(),
            rssi: None,
            snr: None,
        });
        store.upsert(updated).await.unwrap();

        assert_eq!(store.message_count(), 1);
        let found = store.find_logical("ABC123", 100, 1).await.unwrap().unwrap();
        assert_eq!(found.reception.len(), 1);
    }

    #[tokio::test]
    async fn test_organization_links_round_trip() {
        let store = InMemoryOrganizationLinkStore::new();
        store.link_device("ABC123", "org-1");
        store.link_device("ABC123", "org-2");

        let orgs = store.organizations_for_device("ABC123").await.unwrap();
        assert_eq!(orgs, vec!["org-1".to_string(), "org-2".to_string()]);

        store.attach_message("m1", "org-1").await.unwrap();
        assert_eq!(store.attachments(), vec![("m1".to_string(), "org-1".to_string())]);
    }
}
