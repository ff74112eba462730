use crate::error::DomainResult;
use crate::types::{Device, DeviceWithParser, NewDevice, StoredMessage};
use async_trait::async_trait;

/// Repository trait for device storage operations.
/// Infrastructure implements this; the in-memory store backs tests and the
/// all-in-one binary.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Get a device by ID
    async fn find_by_id(&self, device_id: &str) -> DomainResult<Option<Device>>;

    /// Get a device joined with its parser definition, when one is bound
    async fn find_with_parser(&self, device_id: &str) -> DomainResult<Option<DeviceWithParser>>;

    /// Atomic find-or-create: returns the stored device and whether this call
    /// created it. A concurrent race for the same ID must yield one row.
    async fn find_or_create(&self, candidate: NewDevice) -> DomainResult<(Device, bool)>;

    /// Bind a parser to a device that has none
    async fn bind_parser(&self, device_id: &str, parser_id: &str) -> DomainResult<()>;

    /// Persist updated device fields
    async fn update_device(&self, device: Device) -> DomainResult<Device>;
}

/// Repository trait for stored uplink messages
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Exact-match lookup of the logical message (device_id, time, seq_number)
    async fn find_logical(
        &self,
        device_id: &str,
        time: i64,
        seq_number: u16,
    ) -> DomainResult<Option<StoredMessage>>;

    /// Store a new message
    async fn create(&self, message: StoredMessage) -> DomainResult<StoredMessage>;

    /// Replace an existing message (duplicate-merge reception append)
    async fn upsert(&self, message: StoredMessage) -> DomainResult<StoredMessage>;

    /// Most recent messages for a device, newest first by creation time
    async fn recent_by_device(
        &self,
        device_id: &str,
        limit: usize,
    ) -> DomainResult<Vec<StoredMessage>>;
}

/// Repository trait for the device ↔ organization sharing links
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait OrganizationLinkRepository: Send + Sync {
    /// Organizations the device is shared with
    async fn organizations_for_device(&self, device_id: &str) -> DomainResult<Vec<String>>;

    /// Attach a stored message to an organization
    async fn attach_message(&self, message_id: &str, organization_id: &str) -> DomainResult<()>;
}
