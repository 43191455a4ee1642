pub mod locate;
pub mod overlay;
pub mod picking;
pub mod projection;
pub mod tooltips;

pub use locate::locate;
pub use overlay::OverlayLayer;
pub use picking::{click_payload, pick, ClickPayload};
pub use projection::{canvas_bounds, canvas_to_graph, Viewport};
