use serde::{Deserialize, Serialize};

/// Region of interest in image pixel space tied to one grid position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiMapping {
    /// `[x, y, w, h]`
    pub roi: [f64; 4],
    pub position: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraBinding {
    #[serde(default)]
    pub camera_id: i64,
    #[serde(default)]
    pub camera_name: String,
    #[serde(default)]
    pub camera_path: String,
    #[serde(default)]
    pub mapping: Vec<RoiMapping>,
}

impl CameraBinding {
    pub fn positions(&self) -> impl Iterator<Item = i64> + '_ {
        self.mapping.iter().map(|m| m.position)
    }
}
