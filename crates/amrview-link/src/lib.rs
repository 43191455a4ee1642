//! Network plumbing: live WebSocket channels, the REST backend, grid configuration
//! and the task-dispatch grid controller.

pub mod backend;
pub mod backoff;
pub mod channel;
pub mod dispatch;
pub mod error;
pub mod grid_config;
pub mod protocol;
pub mod transport;

pub use backend::{Backend, BackendEndpoints};
pub use backoff::Backoff;
pub use channel::{Channel, ChannelSettings, ChannelStatus, ConnState};
pub use dispatch::{
    CellState, DispatchRecord, DispatchTransport, GridController, HistoryEntry, PairedError,
};
pub use error::{BackendError, ConnectionError, DispatchError};
pub use grid_config::{ConfigSource, GridConfigStore};
pub use protocol::{ChannelKind, Incoming, IncomingKind};
pub use transport::{Connector, Frame, Socket, WsConnector};
