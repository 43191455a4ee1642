//! Wire and data-model types shared by the link and viewer crates.

pub mod camera;
pub mod dispatch;
pub mod map;
pub mod monitor;
pub mod task;
pub mod telemetry;
mod value;

pub use camera::{CameraBinding, RoiMapping};
pub use dispatch::{DispatchPayload, PayloadTemplate, TIMESTAMP_FIELD};
pub use map::{DecodeReport, EntryIssue, Line, MapDocument, Node, PathPoint, RawMapDocument};
pub use monitor::{MonitorMsg, OrderEntry};
pub use task::{ApiEnvelope, ConfigUpload, GridConfig, TaskCell, TaskOrderDetail, TaskValue, Zone};
pub use telemetry::{AgvSnapshot, CameraStatus, PointStatus, TelemetryMsg};
