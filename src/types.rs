use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

pub type CameraId = i64;
pub type FrameId = u64;

/// A decoded video frame ready for compositing.
#[derive(Clone, Debug)]
pub struct Frame {
    pub camera_id: CameraId,
    pub frame_id: FrameId,
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const BLACK: Color = Color([0, 0, 0, 255]);
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const POINT_DEFAULT: Color = Color([0, 255, 0, 255]);
    pub const TOOL_DEFAULT: Color = Color([250, 204, 21, 255]);
    pub const TOOL_CREATED: Color = Color([251, 191, 36, 255]);

    /// Parses `#rgb`, `#rrggbb` and `#rrggbbaa`.
    pub fn from_css(value: &str) -> Option<Color> {
        let hex = value.trim().strip_prefix('#')?;
        if !hex.is_ascii() {
            return None;
        }
        let channel = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8, 0, 0, 255];
                for (idx, ch) in hex.chars().enumerate() {
                    let v = ch.to_digit(16)? as u8;
                    out[idx] = v * 17;
                }
                Some(Color(out))
            }
            6 | 8 => {
                let r = channel(&hex[0..2])?;
                let g = channel(&hex[2..4])?;
                let b = channel(&hex[4..6])?;
                let a = if hex.len() == 8 {
                    channel(&hex[6..8])?
                } else {
                    255
                };
                Some(Color([r, g, b, a]))
            }
            _ => None,
        }
    }

    pub fn to_css(self) -> String {
        let [r, g, b, _] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

/// A keypoint in video pixel space, rebuilt on every render tick.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayPoint {
    pub id: String,
    /// The id exactly as the analysis service sent it; echoed back in commands.
    pub source_id: Value,
    pub x: f32,
    pub y: f32,
    pub color: Color,
    pub label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolKind {
    Distance,
    Angle,
}

impl ToolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolKind::Distance => "distance",
            ToolKind::Angle => "angle",
        }
    }

    pub fn parse(value: &str) -> Option<ToolKind> {
        match value {
            "distance" => Some(ToolKind::Distance),
            "angle" => Some(ToolKind::Angle),
            _ => None,
        }
    }

    pub fn required_points(&self) -> usize {
        match self {
            ToolKind::Distance => 2,
            ToolKind::Angle => 3,
        }
    }
}

/// A measurement owned by the remote geometry service. Rendered, never computed here.
#[derive(Clone, Debug, PartialEq)]
pub struct GeometryTool {
    pub id: String,
    pub kind: ToolKind,
    pub point_ids: Vec<String>,
    pub color: Color,
    pub current_value: f64,
    pub unit: String,
}

impl OverlayPoint {
    pub fn new(id: &str, x: f32, y: f32) -> Self {
        Self {
            id: id.to_string(),
            source_id: Value::String(id.to_string()),
            x,
            y,
            color: Color::POINT_DEFAULT,
            label: id.to_string(),
        }
    }
}

impl GeometryTool {
    pub fn references(&self, point_id: &str) -> bool {
        self.point_ids.iter().any(|id| id == point_id)
    }
}

/// Per-stage failure reported alongside a frame result.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct ModuleError {
    pub source: String,
    pub message: String,
    #[serde(default = "default_error_severity")]
    pub severity: String,
}

fn default_error_severity() -> String {
    "error".to_string()
}

#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn icon(&self) -> &'static str {
        match self {
            Severity::Info => "ℹ",
            Severity::Success => "✓",
            Severity::Warning => "⚠",
            Severity::Error => "✗",
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Notification {
    pub id: String,
    #[serde(default)]
    pub title: String,
    pub message: String,
    #[serde(rename = "type", default)]
    pub severity: Severity,
    #[serde(rename = "duration", default = "default_duration_seconds")]
    pub duration_seconds: f32,
}

fn default_duration_seconds() -> f32 {
    3.0
}

impl Notification {
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f32(self.duration_seconds.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_css_colors() {
        assert_eq!(Color::from_css("#fbbf24"), Some(Color([251, 191, 36, 255])));
        assert_eq!(Color::from_css("#0f0"), Some(Color([0, 255, 0, 255])));
        assert_eq!(
            Color::from_css("#ff000080"),
            Some(Color([255, 0, 0, 128]))
        );
        assert_eq!(Color::from_css("red"), None);
        assert_eq!(Color::from_css("#12345"), None);
        assert_eq!(Color::TOOL_CREATED.to_css(), "#fbbf24");
    }

    #[test]
    fn notification_defaults() {
        let n: Notification =
            serde_json::from_value(serde_json::json!({"id": "n1", "message": "hi"})).unwrap();
        assert_eq!(n.severity, Severity::Info);
        assert_eq!(n.duration(), Duration::from_secs(3));

        let n: Notification = serde_json::from_value(serde_json::json!({
            "id": "n2", "title": "Calib", "message": "failed", "type": "error", "duration": 5.0
        }))
        .unwrap();
        assert_eq!(n.severity, Severity::Error);
        assert_eq!(n.duration_seconds, 5.0);
    }
}
