pub mod compositor;
pub mod overlay;
pub mod raster;
pub mod text;
pub mod viewport;

pub use compositor::CompositeRenderer;
pub use overlay::OverlayFrame;
pub use viewport::Letterbox;
