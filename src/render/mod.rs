//! Garment geometry and compositing.

pub mod anchors;
pub mod compositor;
pub mod fabric;
pub mod style;
pub mod surface;

pub use anchors::{control_points, ControlPoints};
pub use compositor::{CompositeMode, Compositor, CompositorOptions};
pub use style::{builtin_styles, style_by_id, Color, FabricKind, GarmentStyle};
pub use surface::RenderSurface;
