use std::collections::BTreeMap;

use crate::graph::{LiveSnapshot, LiveState, NodeRole, WarehouseGraph};
use crate::render::projection::{graph_to_canvas, CanvasPoint};
use crate::render::tooltips::{tooltip_for, Tooltip};

const ICON_BASE_PX: f64 = 24.0;
const ICON_MIN_PX: f64 = 16.0;
const ICON_MAX_PX: f64 = 64.0;

/// Camera icon edge length in pixels: `clamp(round(24 * 2^zoom), 16, 64)`.
pub fn camera_icon_size(zoom: f64) -> u32 {
    let size = (ICON_BASE_PX * 2f64.powf(zoom)).round();
    if size.is_nan() {
        return ICON_MIN_PX as u32;
    }
    size.clamp(ICON_MIN_PX, ICON_MAX_PX) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MarkerId(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraIcon {
    pub size: u32,
    pub anchor: [u32; 2],
    pub build: u64,
}

#[derive(Debug, Clone)]
pub struct Marker {
    pub id: MarkerId,
    pub role: NodeRole,
    pub node_index: usize,
    pub position: CanvasPoint,
    pub icon: Option<CameraIcon>,
    pub live: LiveState,
    pub tooltip: Tooltip,
    listener: Option<ListenerId>,
}

#[derive(Debug, Default)]
struct ZoomListeners {
    next: u64,
    by_id: BTreeMap<ListenerId, MarkerId>,
}

impl ZoomListeners {
    fn register(&mut self, marker: MarkerId) -> ListenerId {
        self.next += 1;
        let id = ListenerId(self.next);
        self.by_id.insert(id, marker);
        id
    }

    fn unregister(&mut self, id: ListenerId) {
        self.by_id.remove(&id);
    }
}

#[derive(Debug, Default)]
pub struct OverlayLayer {
    markers: Vec<Marker>,
    listeners: ZoomListeners,
    zoom: f64,
    next_marker: u64,
    icon_builds: u64,
}

impl OverlayLayer {
    pub fn new(zoom: f64) -> Self {
        Self {
            zoom,
            ..Self::default()
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn marker(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.iter().find(|m| m.id == id)
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.by_id.len()
    }

    pub fn icon_builds(&self) -> u64 {
        self.icon_builds
    }

    fn build_icon(&mut self) -> CameraIcon {
        self.icon_builds += 1;
        let size = camera_icon_size(self.zoom);
        CameraIcon {
            size,
            anchor: [size / 2, size / 2],
            build: self.icon_builds,
        }
    }

    pub fn render(&mut self, graph: &WarehouseGraph, live: &LiveSnapshot, zoom: f64) {
        self.teardown();
        self.zoom = zoom;

        for (node_index, role, node) in graph.markers() {
            self.next_marker += 1;
            let id = MarkerId(self.next_marker);
            let state = live.for_role(role);
            let binding = match role {
                NodeRole::Camera(n) => graph.camera_binding(n),
                _ => None,
            };
            let (icon, listener) = match role {
                NodeRole::Camera(_) => (Some(self.build_icon()), Some(self.listeners.register(id))),
                _ => (None, None),
            };
            self.markers.push(Marker {
                id,
                role,
                node_index,
                position: graph_to_canvas(node.x, node.y),
                icon,
                live: state,
                tooltip: tooltip_for(role, node, binding, state),
                listener,
            });
        }
        tracing::debug!(
            markers = self.markers.len(),
            listeners = self.listener_count(),
            zoom,
            "overlay rendered"
        );
    }

    /// Zoom-change event: every registered camera marker gets a new icon.
    pub fn set_zoom(&mut self, zoom: f64) {
        self.zoom = zoom;
        let targets: Vec<MarkerId> = self.listeners.by_id.values().copied().collect();
        for id in targets {
            let icon = self.build_icon();
            if let Some(marker) = self.markers.iter_mut().find(|m| m.id == id) {
                marker.icon = Some(icon);
            }
        }
    }

    pub fn teardown(&mut self) {
        for marker in self.markers.drain(..) {
            if let Some(listener) = marker.listener {
                self.listeners.unregister(listener);
            }
        }
    }
}
