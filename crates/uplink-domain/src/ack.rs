use crate::types::Device;
use serde_json::json;

/// Build the synchronous ack response for a bidirectional device.
///
/// The response is keyed by device id: devices with pending downlink data get
/// it under `data_downlink`, devices without get `{"noData": true}`. The
/// caller attaches the same downlink payload to the stored message and must
/// return this response independent of any post-processing.
pub fn build_ack_result(device: &Device) -> serde_json::Value {
    let inner = match &device.downlink_payload {
        Some(payload) => json!({ "data_downlink": payload }),
        None => json!({ "noData": true }),
    };

    let mut result = serde_json::Map::new();
    result.insert(device.id.clone(), inner);
    serde_json::Value::Object(result)
}
