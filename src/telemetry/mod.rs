pub mod buffer;
pub mod connection;
pub mod dispatch;
pub mod packet;
pub mod store;

// Re-exports for convenience
pub use buffer::{FrameBuffers, SharedFrameBuffers};
pub use connection::{
    CommandSender, CommandSink, ConnectionStatus, TelemetryConnection, start_telemetry,
};
pub use dispatch::Dispatcher;
pub use packet::FrameResult;
pub use store::{CameraInfo, SYSTEM_MONITOR_SLOT, TelemetryStore, cameras_from_monitor};
