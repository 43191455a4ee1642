use amrview_core::{CameraBinding, Node};
use smallvec::{smallvec, SmallVec};

use crate::graph::{LiveState, NodeRole};

#[derive(Debug, Clone, PartialEq)]
pub struct Tooltip {
    pub title: String,
    pub lines: SmallVec<[String; 4]>,
}

impl Tooltip {
    pub fn render(&self) -> String {
        let mut out = self.title.clone();
        for line in &self.lines {
            out.push_str("\n  ");
            out.push_str(line);
        }
        out
    }
}

fn flag(v: Option<bool>, yes: &str, no: &str) -> String {
    match v {
        Some(true) => yes.to_string(),
        Some(false) => no.to_string(),
        None => "unknown".to_string(),
    }
}

pub fn tooltip_for(
    role: NodeRole,
    node: &Node,
    binding: Option<&CameraBinding>,
    live: LiveState,
) -> Tooltip {
    match role {
        NodeRole::Camera(id) => {
            let title = binding
                .map(|b| b.camera_name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| node.name.clone());
            let mut lines: SmallVec<[String; 4]> = smallvec![
                format!("camera #{id}"),
                format!("status: {}", flag(live.online, "online", "offline")),
            ];
            match binding {
                Some(b) => {
                    lines.push(format!("stream: {}", b.camera_path));
                    lines.push(format!("roi positions: {}", b.mapping.len()));
                }
                None => lines.push("no camera record bound".to_string()),
            }
            Tooltip { title, lines }
        }
        NodeRole::Supply(id) | NodeRole::Return(id) => Tooltip {
            title: node.name.clone(),
            lines: smallvec![
                format!("{} point #{id}", role.name()),
                format!("lock: {}", flag(live.lock, "locked", "free")),
                format!("at ({:.1}, {:.1})", node.x, node.y),
            ],
        },
        NodeRole::Plain => Tooltip {
            title: node.name.clone(),
            lines: SmallVec::new(),
        },
    }
}
