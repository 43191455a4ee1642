use crate::graph::{NodeRole, WarehouseGraph};
use crate::render::overlay::{Marker, OverlayLayer};

/// Finds a marker by name. Keys are tried in a fixed order and compared exactly:
/// a bound camera record's name, `Camera<id>` for a numeric query, the query as given,
/// the query without whitespace, the query lower-cased.
pub fn locate<'a>(
    layer: &'a OverlayLayer,
    graph: &WarehouseGraph,
    query: &str,
) -> Option<&'a Marker> {
    let by_camera_name = layer.markers().iter().find(|m| match m.role {
        NodeRole::Camera(n) => graph
            .camera_binding(n)
            .is_some_and(|b| b.camera_name == query),
        _ => false,
    });
    if by_camera_name.is_some() {
        return by_camera_name;
    }

    let trimmed = query.trim();
    let mut keys = Vec::with_capacity(4);
    if let Ok(id) = trimmed.parse::<u32>() {
        keys.push(format!("Camera{id}"));
    }
    keys.push(query.to_string());
    keys.push(query.chars().filter(|c| !c.is_whitespace()).collect());
    keys.push(query.to_lowercase());

    keys.iter().find_map(|key| {
        layer.markers().iter().find(|m| {
            graph
                .node(m.node_index)
                .is_some_and(|node| node.name == *key)
        })
    })
}
