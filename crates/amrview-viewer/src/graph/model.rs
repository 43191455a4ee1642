use amrview_core::{CameraBinding, Line, MapDocument, Node};
use std::collections::HashMap;

use crate::graph::roles::{classify, NodeRole};

#[derive(Debug, Clone)]
pub struct WarehouseGraph {
    doc: MapDocument,
    roles: Vec<NodeRole>,
    by_role: HashMap<NodeRole, usize>,
    by_key: HashMap<String, usize>,
    cameras: Vec<CameraBinding>,
}

impl WarehouseGraph {
    pub fn build(doc: MapDocument) -> Self {
        let roles: Vec<NodeRole> = doc.nodes.iter().map(|n| classify(&n.name)).collect();
        let mut by_role = HashMap::new();
        let mut by_key = HashMap::new();
        for (index, (node, role)) in doc.nodes.iter().zip(&roles).enumerate() {
            if role.is_interactive() {
                if by_role.contains_key(role) {
                    tracing::warn!(name = %node.name, "duplicate marker name ignored");
                } else {
                    by_role.insert(*role, index);
                }
            }
            by_key.entry(node.key.clone()).or_insert(index);
        }
        tracing::debug!(
            nodes = doc.nodes.len(),
            markers = by_role.len(),
            "graph indexed"
        );
        Self {
            doc,
            roles,
            by_role,
            by_key,
            cameras: Vec::new(),
        }
    }

    pub fn document(&self) -> &MapDocument {
        &self.doc
    }

    pub fn width(&self) -> f64 {
        self.doc.width
    }

    pub fn height(&self) -> f64 {
        self.doc.height
    }

    pub fn nodes(&self) -> &[Node] {
        &self.doc.nodes
    }

    pub fn lines(&self) -> &[Line] {
        &self.doc.lines
    }

    pub fn node(&self, index: usize) -> Option<&Node> {
        self.doc.nodes.get(index)
    }

    pub fn role(&self, index: usize) -> NodeRole {
        self.roles.get(index).copied().unwrap_or(NodeRole::Plain)
    }

    pub fn node_by_key(&self, key: &str) -> Option<&Node> {
        self.by_key.get(key).and_then(|&i| self.node(i))
    }

    pub fn index_of(&self, role: NodeRole) -> Option<usize> {
        self.by_role.get(&role).copied()
    }

    pub fn markers(&self) -> impl Iterator<Item = (usize, NodeRole, &Node)> + '_ {
        self.doc
            .nodes
            .iter()
            .zip(&self.roles)
            .enumerate()
            .filter(|(i, (_, role))| self.index_of(**role) == Some(*i))
            .map(|(i, (node, role))| (i, *role, node))
    }

    pub fn count(&self, pred: impl Fn(NodeRole) -> bool) -> usize {
        self.roles.iter().filter(|r| pred(**r)).count()
    }

    /// Replaces the area's camera list. `Camera<N>` binds to the N-th record.
    pub fn bind_cameras(&mut self, cameras: Vec<CameraBinding>) {
        let unbound = self
            .roles
            .iter()
            .filter_map(|r| match r {
                NodeRole::Camera(id) => Some(*id),
                _ => None,
            })
            .filter(|&id| id == 0 || id as usize > cameras.len())
            .count();
        if unbound > 0 {
            tracing::warn!(unbound, cameras = cameras.len(), "camera nodes without a binding");
        }
        self.cameras = cameras;
    }

    pub fn cameras(&self) -> &[CameraBinding] {
        &self.cameras
    }

    pub fn camera_binding(&self, camera: u32) -> Option<&CameraBinding> {
        let ordinal = usize::try_from(camera).ok()?.checked_sub(1)?;
        self.cameras.get(ordinal)
    }
}
