use serde_json::Value;
use thiserror::Error;

use crate::types::{CameraId, FrameId, ModuleError, Notification};

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("invalid telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("telemetry packet is not a JSON object")]
    NotAnObject,
}

/// Analysis output tied to one frame of one camera.
#[derive(Clone, Debug, PartialEq)]
pub struct FrameResult {
    pub camera_id: CameraId,
    pub frame_id: FrameId,
    pub results: Option<Value>,
    pub errors: Vec<ModuleError>,
    pub active_plugins: Value,
    pub camera_config: Value,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TelemetryPacket {
    Broadcast { plugin_id: String, data: Value },
    FrameResult(FrameResult),
    WidgetUpdate { widget_id: String, data: Value },
    Notification(Notification),
}

/// Inbound messages are a single packet or an array of packets.
pub fn normalize(text: &str) -> Result<Vec<Value>, PacketError> {
    Ok(match serde_json::from_str::<Value>(text)? {
        Value::Array(packets) => packets,
        single => vec![single],
    })
}

/// Splits one raw packet into every typed packet it carries.
///
/// A single object may hold a frame result, widget updates and notifications at
/// once; each is reported independently.
pub fn classify(raw: &Value) -> Result<Vec<TelemetryPacket>, PacketError> {
    let object = raw.as_object().ok_or(PacketError::NotAnObject)?;
    let mut packets = Vec::new();

    if object.get("type").and_then(Value::as_str) == Some("plugin_data") {
        let payload = object.get("payload");
        if let Some(plugin_id) = payload
            .and_then(|p| p.get("plugin"))
            .and_then(Value::as_str)
        {
            let data = payload
                .and_then(|p| p.get("data"))
                .cloned()
                .unwrap_or(Value::Null);
            packets.push(TelemetryPacket::Broadcast {
                plugin_id: plugin_id.to_string(),
                data,
            });
        }
    }

    if let Some(frame_id) = object.get("frame_id").and_then(Value::as_u64) {
        let errors = object
            .get("errors")
            .and_then(Value::as_array)
            .map(|list| {
                list.iter()
                    .filter_map(|e| serde_json::from_value::<ModuleError>(e.clone()).ok())
                    .collect()
            })
            .unwrap_or_default();
        packets.push(TelemetryPacket::FrameResult(FrameResult {
            camera_id: object
                .get("camera_id")
                .and_then(Value::as_i64)
                .unwrap_or_default(),
            frame_id,
            results: object.get("results").filter(|v| !v.is_null()).cloned(),
            errors,
            active_plugins: object
                .get("active_plugins")
                .cloned()
                .unwrap_or(Value::Null),
            camera_config: object
                .get("camera_config")
                .cloned()
                .unwrap_or(Value::Null),
        }));
    }

    if let Some(widgets) = object.get("widgets").and_then(Value::as_array) {
        for widget in widgets {
            match widget.get("widget_id").and_then(Value::as_str) {
                Some(widget_id) => packets.push(TelemetryPacket::WidgetUpdate {
                    widget_id: widget_id.to_string(),
                    data: widget.clone(),
                }),
                None => log::warn!("dropping widget update without widget_id"),
            }
        }
    }

    if let Some(notifications) = object.get("notifications").and_then(Value::as_array) {
        for raw in notifications {
            match serde_json::from_value::<Notification>(raw.clone()) {
                Ok(notification) => packets.push(TelemetryPacket::Notification(notification)),
                Err(err) => log::warn!("dropping malformed notification: {err}"),
            }
        }
    }

    Ok(packets)
}
