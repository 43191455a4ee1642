pub mod fleet;
pub mod live;
pub mod model;
pub mod monitor;
pub mod roles;

pub use fleet::FleetView;
pub use live::{LiveKey, LiveSnapshot, LiveState, LiveStateTable};
pub use model::WarehouseGraph;
pub use monitor::MonitorBoard;
pub use roles::NodeRole;
