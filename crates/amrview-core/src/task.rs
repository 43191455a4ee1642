use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Task queue with its own grid of dispatchable cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Zone {
    Supply,
    Demand,
}

impl Zone {
    pub const ALL: [Zone; 2] = [Zone::Supply, Zone::Demand];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Supply => "Supply",
            Self::Demand => "Demand",
        }
    }

    /// Lower-cased name carried in the `collection` payload field.
    pub fn collection(self) -> &'static str {
        match self {
            Self::Supply => "supply",
            Self::Demand => "demand",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "supply" => Some(Self::Supply),
            "demand" => Some(Self::Demand),
            _ => None,
        }
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskOrderDetail {
    #[serde(rename = "taskPath", default)]
    pub task_path: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskValue {
    #[serde(rename = "taskOrderDetail", default)]
    pub task_order_detail: Vec<TaskOrderDetail>,
}

/// One row of `/get-task-data/{zone}`: the pending task bound to a grid cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskCell {
    pub cell: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<Zone>,
    #[serde(default)]
    pub value: TaskValue,
}

impl TaskCell {
    pub fn cell_key(cell: u32) -> String {
        format!("cell-{cell}")
    }

    pub fn task_path(&self) -> Option<&str> {
        self.value
            .task_order_detail
            .first()
            .and_then(|d| d.task_path.as_deref())
            .filter(|p| !p.is_empty())
    }
}

/// `{status, data, message}` wrapper used by the REST backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

/// Per-user, per-server grid configuration. Unknown keys are carried verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    #[serde(rename = "serverIP", default)]
    pub server_ip: String,
    #[serde(default)]
    pub username: String,
    #[serde(rename = "supplyCells", default, skip_serializing_if = "Option::is_none")]
    pub supply_cells: Option<u32>,
    #[serde(rename = "demandCells", default, skip_serializing_if = "Option::is_none")]
    pub demand_cells: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl GridConfig {
    pub fn cell_count(&self, zone: Zone) -> Option<u32> {
        match zone {
            Zone::Supply => self.supply_cells,
            Zone::Demand => self.demand_cells,
        }
    }
}

/// Body of `POST /config`.
#[derive(Debug, Serialize)]
pub struct ConfigUpload<'a> {
    #[serde(rename = "configData")]
    pub config_data: &'a GridConfig,
    pub username: &'a str,
}
