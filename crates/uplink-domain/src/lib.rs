pub mod ack;
pub mod capability;
pub mod decode_pipeline;
pub mod dedup;
pub mod device_locks;
pub mod device_resolver;
pub mod error;
pub mod in_memory;
pub mod ingestion;
pub mod post_processing;
pub mod repository;
pub mod sequence_window;
pub mod types;
pub mod validate;

pub use ack::build_ack_result;
pub use capability::{AlertNotifier, GeolocationExtractor, PayloadParser};
pub use decode_pipeline::{DecodeOutcome, PayloadDecodePipeline};
pub use dedup::{DedupAction, DedupEngine};
pub use device_locks::DeviceLockRegistry;
pub use device_resolver::{DeviceResolver, ProvisioningHints};
pub use error::{DomainError, DomainResult};
pub use in_memory::{InMemoryDeviceStore, InMemoryMessageStore, InMemoryOrganizationLinkStore};
pub use ingestion::IngestionService;
pub use post_processing::PostProcessor;
pub use repository::{DeviceRepository, MessageRepository, OrganizationLinkRepository};
pub use sequence_window::{compute_success_rate, SUCCESS_RATE_WINDOW};
pub use types::*;
