use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeRole {
    Camera(u32),
    Supply(u32),
    Return(u32),
    Plain,
}

impl NodeRole {
    pub fn derived_id(self) -> Option<u32> {
        match self {
            Self::Camera(id) | Self::Supply(id) | Self::Return(id) => Some(id),
            Self::Plain => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Camera(_) => "camera",
            Self::Supply(_) => "supply",
            Self::Return(_) => "return",
            Self::Plain => "plain",
        }
    }

    pub fn is_interactive(self) -> bool {
        self != Self::Plain
    }
}

impl fmt::Display for NodeRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.derived_id() {
            Some(id) => write!(f, "{}#{id}", self.name()),
            None => f.write_str(self.name()),
        }
    }
}

fn patterns() -> &'static [(Regex, fn(u32) -> NodeRole); 3] {
    static PATTERNS: OnceLock<[(Regex, fn(u32) -> NodeRole); 3]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let rule = |p: &str, role: fn(u32) -> NodeRole| (Regex::new(p).expect("literal pattern"), role);
        [
            rule(r"(?i)^Camera(\d+)$", NodeRole::Camera),
            rule(r"(?i)^DiemC(\d+)$", NodeRole::Supply),
            rule(r"(?i)^DiemT(\d+)$", NodeRole::Return),
        ]
    })
}

/// Ids too large for `u32` classify as plain.
pub fn classify(name: &str) -> NodeRole {
    for (re, role) in patterns() {
        if let Some(caps) = re.captures(name) {
            return caps[1].parse::<u32>().map(role).unwrap_or(NodeRole::Plain);
        }
    }
    NodeRole::Plain
}
