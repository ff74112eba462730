use garde::Validate;
use serde::{Deserialize, Serialize};

/// Highest valid sequence number; uplink counters wrap past this back to 0.
pub const SEQUENCE_NUMBER_MAX: u16 = 4095;

/// One radio gateway's record of receiving an uplink frame.
/// A single logical message can be heard by several gateways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reception {
    pub gateway_id: String,
    #[serde(default)]
    pub rssi: Option<f64>,
    #[serde(default)]
    pub snr: Option<f64>,
}

/// Inbound uplink frame as handed over by the network backend.
/// Immutable once received; one instance per inbound call.
#[derive(Debug, Clone, PartialEq, Validate, Serialize, Deserialize)]
pub struct UplinkRequest {
    #[garde(length(min = 1))]
    pub device_id: String,
    /// Frame timestamp in unix seconds
    #[garde(skip)]
    pub time: i64,
    #[garde(range(max = 4095))]
    pub seq_number: u16,
    /// True when the backend re-delivers a frame another gateway already reported
    #[garde(skip)]
    pub duplicate: bool,
    #[garde(skip)]
    #[serde(default)]
    pub reception: Vec<Reception>,
    /// Raw payload; absent for keep-alive frames
    #[garde(skip)]
    #[serde(default)]
    pub data: Option<String>,
    /// True when the device expects a synchronous downlink answer
    #[garde(skip)]
    #[serde(default)]
    pub ack: bool,
    // Provisioning hints, applied only when the device is first created
    #[garde(skip)]
    #[serde(default)]
    pub device_name_prefix: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub parser_id: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub category_id: Option<String>,
    #[garde(skip)]
    #[serde(default)]
    pub downlink_payload: Option<serde_json::Value>,
}

/// Stored uplink message. Created exactly once per logical message
/// (device_id, time, seq_number); duplicate deliveries merge into `reception`.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: String,
    pub device_id: String,
    pub user_id: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub time: i64,
    pub seq_number: u16,
    pub reception: Vec<Reception>,
    pub data: Option<String>,
    pub decoded_data: Option<serde_json::Value>,
    pub downlink_payload: Option<serde_json::Value>,
}

/// Domain representation of a field device
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub parser_id: Option<String>,
    pub category_id: Option<String>,
    pub downlink_payload: Option<serde_json::Value>,
    pub success_rate: Option<f64>,
    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Candidate row for the atomic find-or-create on first contact
#[derive(Debug, Clone, PartialEq)]
pub struct NewDevice {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub parser_id: Option<String>,
    pub category_id: Option<String>,
    pub downlink_payload: Option<serde_json::Value>,
}

/// Decoder bound to a device via `Device::parser_id`
#[derive(Debug, Clone, PartialEq)]
pub struct ParserDefinition {
    pub id: String,
    pub name: String,
    /// Decoder source handed verbatim to the parser capability
    pub function: String,
}

/// Device joined with its parser definition, when one is bound
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceWithParser {
    pub device: Device,
    pub parser: Option<ParserDefinition>,
}

/// Result of one ingestion call, returned synchronously to the caller
#[derive(Debug, Clone, PartialEq)]
pub enum IngestionOutcome {
    /// First-seen message was stored
    Created {
        message: StoredMessage,
        decode_error: Option<String>,
    },
    /// Duplicate delivery merged into an existing message
    Merged { message: StoredMessage },
    /// First-seen message stored and an ack response built for a
    /// bidirectional device
    Acked {
        message: StoredMessage,
        response: serde_json::Value,
        decode_error: Option<String>,
    },
}

impl IngestionOutcome {
    pub fn message(&self) -> &StoredMessage {
        match self {
            IngestionOutcome::Created { message, .. } => message,
            IngestionOutcome::Merged { message } => message,
            IngestionOutcome::Acked { message, .. } => message,
        }
    }

    pub fn decode_error(&self) -> Option<&str> {
        match self {
            IngestionOutcome::Created { decode_error, .. }
            | IngestionOutcome::Acked { decode_error, .. } => decode_error.as_deref(),
            IngestionOutcome::Merged { .. } => None,
        }
    }
}
