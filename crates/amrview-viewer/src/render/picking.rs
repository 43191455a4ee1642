use amrview_core::{CameraBinding, Node};
use serde::Serialize;

use crate::graph::{NodeRole, WarehouseGraph};
use crate::render::overlay::{Marker, MarkerId, OverlayLayer};
use crate::render::projection::{CanvasPoint, Viewport};

pub const PICK_RADIUS_PX: f64 = 14.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PointKind {
    Supply,
    Return,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CameraClick {
    pub camera_index: u32,
    pub camera_name: String,
    pub camera_path: String,
    pub camera_data: Option<CameraBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PointClick {
    pub id: u32,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PointKind,
    pub position: CanvasPoint,
    pub is_locked: bool,
    pub node_data: Node,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClickPayload {
    Camera(CameraClick),
    Point(PointClick),
}

pub fn click_payload(graph: &WarehouseGraph, marker: &Marker) -> Option<ClickPayload> {
    let node = graph.node(marker.node_index)?;
    let payload = match marker.role {
        NodeRole::Camera(index) => {
            let binding = graph.camera_binding(index);
            ClickPayload::Camera(CameraClick {
                camera_index: index,
                camera_name: binding
                    .map(|b| b.camera_name.clone())
                    .filter(|n| !n.is_empty())
                    .unwrap_or_else(|| node.name.clone()),
                camera_path: binding.map(|b| b.camera_path.clone()).unwrap_or_default(),
                camera_data: binding.cloned(),
            })
        }
        NodeRole::Supply(id) | NodeRole::Return(id) => ClickPayload::Point(PointClick {
            id,
            name: node.name.clone(),
            kind: if matches!(marker.role, NodeRole::Supply(_)) {
                PointKind::Supply
            } else {
                PointKind::Return
            },
            position: marker.position,
            is_locked: marker.live.lock.unwrap_or(false),
            node_data: node.clone(),
        }),
        NodeRole::Plain => return None,
    };
    Some(payload)
}

pub fn pick(layer: &OverlayLayer, viewport: &Viewport, screen: [f64; 2]) -> Option<MarkerId> {
    let mut best: Option<(f64, MarkerId)> = None;
    for marker in layer.markers() {
        let [x, y] = viewport.to_screen(marker.position);
        let d = (x - screen[0]).hypot(y - screen[1]);
        if d < PICK_RADIUS_PX && best.map(|(bd, _)| d < bd).unwrap_or(true) {
            best = Some((d, marker.id));
        }
    }
    best.map(|(_, id)| id)
}
