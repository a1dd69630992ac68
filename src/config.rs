use std::time::Duration;

use clap::Parser;

use crate::stream::StreamSettings;
use crate::types::CameraId;

#[derive(Parser, Debug, Clone)]
#[command(name = "vision-console", about = "Operator console for a multi-camera vision rig")]
pub struct ConsoleConfig {
    /// Base URL of the analysis service's HTTP API.
    #[arg(long, env = "VISION_CONSOLE_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Telemetry WebSocket endpoint.
    #[arg(long, env = "VISION_CONSOLE_WS_URL", default_value = "ws://localhost:8000/ws/stream")]
    pub ws_url: String,

    /// Camera shown at startup.
    #[arg(long, env = "VISION_CONSOLE_CAMERA", default_value_t = 0)]
    pub camera: CameraId,

    /// Seconds without stream bytes before reconnecting; 0 disables.
    #[arg(long, env = "VISION_CONSOLE_STALL_TIMEOUT", default_value_t = 5)]
    pub stall_timeout_secs: u64,

    #[arg(long, default_value_t = 1920)]
    pub surface_width: u32,

    #[arg(long, default_value_t = 1200)]
    pub surface_height: u32,

    /// Keep the surface at the configured size instead of each frame's size.
    #[arg(long, env = "VISION_CONSOLE_FIXED_SURFACE")]
    pub fixed_surface: bool,
}

impl ConsoleConfig {
    pub fn stream_settings(&self) -> StreamSettings {
        StreamSettings {
            api_url: self.api_url.trim_end_matches('/').to_string(),
            stall_timeout: (self.stall_timeout_secs > 0)
                .then(|| Duration::from_secs(self.stall_timeout_secs)),
        }
    }
}
