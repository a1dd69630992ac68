pub mod camera;
pub mod decode;
pub mod demux;
pub mod latest;

// Re-exports for convenience
pub use camera::{CameraStream, StreamSettings, start_camera_stream};
pub use latest::LatestFrame;
