use amrview_core::Zone;
use thiserror::Error;

/// Transient channel failure. Recovered by reconnecting, never returned to callers.
#[derive(Debug, Clone, Error)]
pub enum ConnectionError {
    #[error("connect to {url} failed: {reason}")]
    Connect { url: String, reason: String },
    #[error("transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("invalid url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("{endpoint} returned HTTP {status}")]
    Status { endpoint: String, status: u16 },
    #[error("{endpoint} rejected the request: {message}")]
    Rejected { endpoint: String, message: String },
}

/// Failure of one dispatch attempt. Fatal to the attempt, never to the controller.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("another dispatch is in flight")]
    Busy,
    #[error("{zone} has no task rows; backend data may not be synchronized yet")]
    NoRowsInZone { zone: Zone, cell: u32 },
    #[error("{zone} has {rows} task rows but none for cell-{cell}")]
    NoRowForCell { zone: Zone, cell: u32, rows: usize },
    #[error("task row for cell-{cell} in {zone} has no taskPath")]
    MissingTaskPath { zone: Zone, cell: u32 },
    #[error("dispatch transport failed: {0}")]
    Transport(String),
}

impl DispatchError {
    /// Lookup failures, as opposed to send failures.
    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoRowsInZone { .. } | Self::NoRowForCell { .. })
    }
}
