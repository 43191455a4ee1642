use amrview_core::TelemetryMsg;
use std::collections::HashMap;
use std::sync::Arc;

use crate::graph::roles::NodeRole;

/// Live-state key. Supply and return points with the same number share one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LiveKey {
    Camera(u32),
    Point(u32),
}

impl LiveKey {
    pub fn for_role(role: NodeRole) -> Option<Self> {
        match role {
            NodeRole::Camera(id) => Some(Self::Camera(id)),
            NodeRole::Supply(id) | NodeRole::Return(id) => Some(Self::Point(id)),
            NodeRole::Plain => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveState {
    pub online: Option<bool>,
    pub lock: Option<bool>,
}

impl LiveState {
    fn merge(&mut self, patch: LiveState) -> bool {
        let before = *self;
        if patch.online.is_some() {
            self.online = patch.online;
        }
        if patch.lock.is_some() {
            self.lock = patch.lock;
        }
        before != *self
    }
}

#[derive(Debug, Clone, Default)]
pub struct LiveSnapshot(Arc<HashMap<LiveKey, LiveState>>);

impl LiveSnapshot {
    pub fn get(&self, key: LiveKey) -> LiveState {
        self.0.get(&key).copied().unwrap_or_default()
    }

    pub fn for_role(&self, role: NodeRole) -> LiveState {
        LiveKey::for_role(role).map(|k| self.get(k)).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Side table of out-of-band state. Unknown ids are accepted.
#[derive(Debug, Default)]
pub struct LiveStateTable {
    entries: Arc<HashMap<LiveKey, LiveState>>,
}

impl LiveStateTable {
    pub fn apply(&mut self, key: LiveKey, patch: LiveState) -> bool {
        Arc::make_mut(&mut self.entries)
            .entry(key)
            .or_default()
            .merge(patch)
    }

    pub fn apply_telemetry(&mut self, msg: &TelemetryMsg) -> bool {
        let mut changed = false;
        for cam in &msg.cameras {
            let patch = LiveState {
                online: cam.online,
                lock: None,
            };
            changed |= self.apply(LiveKey::Camera(cam.id), patch);
        }
        for point in &msg.points {
            let patch = LiveState {
                online: None,
                lock: point.lock,
            };
            changed |= self.apply(LiveKey::Point(point.id), patch);
        }
        changed
    }

    pub fn snapshot(&self) -> LiveSnapshot {
        LiveSnapshot(Arc::clone(&self.entries))
    }

    pub fn clear(&mut self) {
        self.entries = Arc::default();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use amrview_core::{CameraStatus, PointStatus};

    #[test]
    fn patches_merge_field_by_field() {
        let mut table = LiveStateTable::default();
        assert!(table.apply(LiveKey::Point(3), LiveState { online: Some(true), lock: None }));
        assert!(table.apply(LiveKey::Point(3), LiveState { online: None, lock: Some(true) }));
        assert!(!table.apply(LiveKey::Point(3), LiveState::default()));

        let snap = table.snapshot();
        assert_eq!(snap.get(LiveKey::Point(3)), LiveState { online: Some(true), lock: Some(true) });
        assert_eq!(snap.get(LiveKey::Camera(3)), LiveState::default());
    }

    #[test]
    fn snapshot_is_unaffected_by_later_writes() {
        let mut table = LiveStateTable::default();
        table.apply(LiveKey::Camera(1), LiveState { online: Some(true), lock: None });
        let snap = table.snapshot();

        table.apply(LiveKey::Camera(1), LiveState { online: Some(false), lock: None });
        table.clear();

        assert_eq!(snap.get(LiveKey::Camera(1)).online, Some(true));
        assert!(table.is_empty());
    }

    #[test]
    fn supply_and_return_share_a_point_entry() {
        let mut table = LiveStateTable::default();
        let msg = TelemetryMsg {
            agvs: vec![],
            cameras: vec![CameraStatus { id: 2, online: Some(false) }],
            points: vec![PointStatus { id: 7, lock: Some(true) }],
        };
        assert!(table.apply_telemetry(&msg));
        assert!(!table.apply_telemetry(&msg));

        let snap = table.snapshot();
        assert_eq!(snap.for_role(NodeRole::Supply(7)).lock, Some(true));
        assert_eq!(snap.for_role(NodeRole::Return(7)).lock, Some(true));
        assert_eq!(snap.for_role(NodeRole::Camera(2)).online, Some(false));
        assert_eq!(snap.for_role(NodeRole::Plain), LiveState::default());
    }
}
