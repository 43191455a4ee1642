use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::value::{integer, number, text};

/// Positional layout of one node entry in `nodeArr`.
pub const NODE_FIELDS: [&str; 8] = [
    "x",
    "y",
    "type",
    "content",
    "name",
    "isTurn",
    "shelfIsTurn",
    "extraTypes",
];
/// Positional layout of one line entry in `lineArr`.
pub const LINE_FIELDS: [&str; 7] = [
    "startNode",
    "endNode",
    "leftWidth",
    "rightWidth",
    "startExpandDistance",
    "endExpandDistance",
    "path",
];

static NULL: Value = Value::Null;

const NODE_MIN_FIELDS: usize = 4;
const LINE_MIN_FIELDS: usize = 4;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub key: String,
    pub name: String,
    pub x: f64,
    pub y: f64,
    #[serde(rename = "type")]
    pub kind: i64,
    pub is_turn: bool,
    pub shelf_is_turn: bool,
    pub extra_types: Vec<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PathPoint {
    pub x: f64,
    pub y: f64,
}

/// Directed path segment with lateral clearance. An empty `path` is a straight segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub start_node: String,
    pub end_node: String,
    pub left_width: f64,
    pub right_width: f64,
    pub start_expand_distance: f64,
    pub end_expand_distance: f64,
    pub path: Vec<PathPoint>,
}

/// Map payload exactly as stored in the container: nodes and lines are positional arrays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMapDocument {
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub node_keys: Vec<String>,
    #[serde(default)]
    pub line_keys: Vec<String>,
    pub node_arr: Vec<Value>,
    #[serde(default)]
    pub line_arr: Vec<Value>,
}

/// Imported map with named fields. `width`/`height` fix the `[0,width] x [0,height]` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapDocument {
    pub width: f64,
    pub height: f64,
    pub node_keys: Vec<String>,
    pub line_keys: Vec<String>,
    pub nodes: Vec<Node>,
    pub lines: Vec<Line>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntryIssue {
    #[error("entry is not an array")]
    NotArray,
    #[error("entry has {len} fields, at least {min} required")]
    TooShort { len: usize, min: usize },
    #[error("field `{0}` has an unexpected type")]
    BadField(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{which} header field {index} is `{found}`, expected `{expected}`")]
pub struct HeaderMismatch {
    pub which: &'static str,
    pub index: usize,
    pub found: String,
    pub expected: &'static str,
}

/// Entries skipped while converting positional arrays, plus headers that disagree with
/// the layout the entries are read with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodeReport {
    pub dropped_nodes: Vec<(usize, EntryIssue)>,
    pub dropped_lines: Vec<(usize, EntryIssue)>,
    pub header_mismatches: Vec<HeaderMismatch>,
}

impl DecodeReport {
    pub fn dropped_total(&self) -> usize {
        self.dropped_nodes.len() + self.dropped_lines.len()
    }
}

impl MapDocument {
    /// Converts the container form into named records. Short or malformed entries are
    /// dropped and reported. Entries are always read in the documented layout.
    pub fn from_raw(raw: RawMapDocument) -> (Self, DecodeReport) {
        let mut report = DecodeReport::default();
        report
            .header_mismatches
            .extend(check_header("nodeKeys", &raw.node_keys, &NODE_FIELDS));
        report
            .header_mismatches
            .extend(check_header("lineKeys", &raw.line_keys, &LINE_FIELDS));

        let mut nodes = Vec::with_capacity(raw.node_arr.len());
        for (index, entry) in raw.node_arr.iter().enumerate() {
            match decode_node(entry) {
                Ok(node) => nodes.push(node),
                Err(issue) => report.dropped_nodes.push((index, issue)),
            }
        }
        let mut lines = Vec::with_capacity(raw.line_arr.len());
        for (index, entry) in raw.line_arr.iter().enumerate() {
            match decode_line(entry) {
                Ok(line) => lines.push(line),
                Err(issue) => report.dropped_lines.push((index, issue)),
            }
        }

        let doc = Self {
            width: raw.width,
            height: raw.height,
            node_keys: raw.node_keys,
            line_keys: raw.line_keys,
            nodes,
            lines,
        };
        (doc, report)
    }

    pub fn to_raw(&self) -> RawMapDocument {
        RawMapDocument {
            width: self.width,
            height: self.height,
            node_keys: NODE_FIELDS.iter().map(|s| s.to_string()).collect(),
            line_keys: LINE_FIELDS.iter().map(|s| s.to_string()).collect(),
            node_arr: self.nodes.iter().map(encode_node).collect(),
            line_arr: self.lines.iter().map(encode_line).collect(),
        }
    }
}

/// First position where `keys` disagrees with `layout`.
fn check_header(
    which: &'static str,
    keys: &[String],
    layout: &[&'static str],
) -> Option<HeaderMismatch> {
    // an empty header is the legacy form: layout implied
    keys.iter()
        .zip(layout.iter())
        .enumerate()
        .find(|(_, (found, expected))| found != *expected)
        .map(|(index, (found, expected))| HeaderMismatch {
            which,
            index,
            found: found.clone(),
            expected,
        })
}

pub fn decode_node(entry: &Value) -> Result<Node, EntryIssue> {
    let fields = entry.as_array().ok_or(EntryIssue::NotArray)?;
    if fields.len() < NODE_MIN_FIELDS {
        return Err(EntryIssue::TooShort {
            len: fields.len(),
            min: NODE_MIN_FIELDS,
        });
    }
    let field = |i: usize| fields.get(i).unwrap_or(&NULL);

    Ok(Node {
        x: number(field(0)).ok_or(EntryIssue::BadField("x"))?,
        y: number(field(1)).ok_or(EntryIssue::BadField("y"))?,
        kind: integer(field(2)).ok_or(EntryIssue::BadField("type"))?,
        key: text(field(3)).ok_or(EntryIssue::BadField("content"))?,
        name: optional_text(field(4)).ok_or(EntryIssue::BadField("name"))?,
        is_turn: flag(field(5)).ok_or(EntryIssue::BadField("isTurn"))?,
        shelf_is_turn: flag(field(6)).ok_or(EntryIssue::BadField("shelfIsTurn"))?,
        extra_types: integers(field(7)).ok_or(EntryIssue::BadField("extraTypes"))?,
    })
}

pub fn encode_node(node: &Node) -> Value {
    json!([
        node.x,
        node.y,
        node.kind,
        node.key,
        node.name,
        node.is_turn,
        node.shelf_is_turn,
        node.extra_types
    ])
}

pub fn decode_line(entry: &Value) -> Result<Line, EntryIssue> {
    let fields = entry.as_array().ok_or(EntryIssue::NotArray)?;
    if fields.len() < LINE_MIN_FIELDS {
        return Err(EntryIssue::TooShort {
            len: fields.len(),
            min: LINE_MIN_FIELDS,
        });
    }
    let field = |i: usize| fields.get(i).unwrap_or(&NULL);
    let distance = |i: usize, name: &'static str| match field(i) {
        Value::Null => Ok(0.0),
        v => number(v).ok_or(EntryIssue::BadField(name)),
    };

    Ok(Line {
        start_node: text(field(0)).ok_or(EntryIssue::BadField("startNode"))?,
        end_node: text(field(1)).ok_or(EntryIssue::BadField("endNode"))?,
        left_width: number(field(2)).ok_or(EntryIssue::BadField("leftWidth"))?,
        right_width: number(field(3)).ok_or(EntryIssue::BadField("rightWidth"))?,
        start_expand_distance: distance(4, "startExpandDistance")?,
        end_expand_distance: distance(5, "endExpandDistance")?,
        path: polyline(field(6)).ok_or(EntryIssue::BadField("path"))?,
    })
}

pub fn encode_line(line: &Line) -> Value {
    let path: Vec<Value> = line.path.iter().map(|p| json!([p.x, p.y])).collect();
    json!([
        line.start_node,
        line.end_node,
        line.left_width,
        line.right_width,
        line.start_expand_distance,
        line.end_expand_distance,
        path
    ])
}

fn optional_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => Some(String::new()),
        other => text(other),
    }
}

fn flag(v: &Value) -> Option<bool> {
    match v {
        Value::Null => Some(false),
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    }
}

fn integers(v: &Value) -> Option<Vec<i64>> {
    match v {
        Value::Null => Some(Vec::new()),
        Value::Array(items) => items.iter().map(integer).collect(),
        _ => None,
    }
}

fn polyline(v: &Value) -> Option<Vec<PathPoint>> {
    let items = match v {
        Value::Null => return Some(Vec::new()),
        Value::Array(items) => items,
        _ => return None,
    };
    items
        .iter()
        .map(|p| match p {
            Value::Array(xy) if xy.len() >= 2 => Some(PathPoint {
                x: number(&xy[0])?,
                y: number(&xy[1])?,
            }),
            Value::Object(obj) => Some(PathPoint {
                x: number(obj.get("x")?)?,
                y: number(obj.get("y")?)?,
            }),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(key: &str, name: &str, x: f64, y: f64) -> Node {
        Node {
            key: key.to_string(),
            name: name.to_string(),
            x,
            y,
            kind: 1,
            is_turn: false,
            shelf_is_turn: true,
            extra_types: vec![3, 9],
        }
    }

    fn line(start: &str, end: &str, path: Vec<PathPoint>) -> Line {
        Line {
            start_node: start.to_string(),
            end_node: end.to_string(),
            left_width: 0.5,
            right_width: 0.75,
            start_expand_distance: 1.0,
            end_expand_distance: 2.0,
            path,
        }
    }

    #[test]
    fn node_array_uses_documented_field_order() {
        let encoded = encode_node(&node("n1", "DiemC1", 10.0, 20.0));
        assert_eq!(
            encoded,
            json!([10.0, 20.0, 1, "n1", "DiemC1", false, true, [3, 9]])
        );
    }

    #[test]
    fn line_array_uses_documented_field_order() {
        let encoded = encode_line(&line("a", "b", vec![PathPoint { x: 1.0, y: 2.0 }]));
        assert_eq!(
            encoded,
            json!(["a", "b", 0.5, 0.75, 1.0, 2.0, [[1.0, 2.0]]])
        );
    }

    #[test]
    fn fixtures_survive_positional_form_and_short_entries_are_counted() {
        let doc = MapDocument {
            width: 100.0,
            height: 50.0,
            node_keys: NODE_FIELDS.iter().map(|s| s.to_string()).collect(),
            line_keys: LINE_FIELDS.iter().map(|s| s.to_string()).collect(),
            nodes: vec![node("n1", "DiemC1", 10.0, 20.0), node("n2", "DiemT1", 30.0, 40.0)],
            lines: vec![
                line("n1", "n2", Vec::new()),
                line("n2", "n1", vec![PathPoint { x: 20.0, y: 30.0 }]),
            ],
        };
        let mut raw = doc.to_raw();
        raw.node_arr.push(json!([1.0, 2.0, 0]));
        raw.line_arr.push(json!(["n1"]));

        let (decoded, report) = MapDocument::from_raw(raw);

        assert_eq!(decoded, doc);
        assert_eq!(report.dropped_nodes, vec![(2, EntryIssue::TooShort { len: 3, min: 4 })]);
        assert_eq!(report.dropped_lines.len(), 1);
        assert_eq!(report.dropped_total(), 2);
    }

    #[test]
    fn minimal_node_defaults_optional_fields() {
        let decoded = decode_node(&json!([5, 6, 2, 17])).expect("four fields are enough");
        assert_eq!(decoded.key, "17");
        assert_eq!(decoded.name, "");
        assert!(!decoded.is_turn);
        assert!(decoded.extra_types.is_empty());
    }

    #[test]
    fn line_path_accepts_object_points() {
        let decoded = decode_line(&json!(["a", "b", 1, 1, null, null, [{"x": 3, "y": 4}]]))
            .expect("valid line");
        assert_eq!(decoded.path, vec![PathPoint { x: 3.0, y: 4.0 }]);
        assert_eq!(decoded.start_expand_distance, 0.0);
    }

    #[test]
    fn malformed_field_type_drops_entry() {
        let issue = decode_node(&json!([{"x": 1}, 2, 3, "k"])).unwrap_err();
        assert_eq!(issue, EntryIssue::BadField("x"));
        assert_eq!(decode_node(&json!("n1")).unwrap_err(), EntryIssue::NotArray);
    }

    #[test]
    fn mismatching_header_is_reported_not_fatal() {
        let raw = RawMapDocument {
            width: 1.0,
            height: 1.0,
            node_keys: vec!["y".into(), "x".into()],
            line_keys: vec!["startNode".into()],
            node_arr: vec![json!([1.0, 2.0, 1, "k", "DiemC1"])],
            line_arr: Vec::new(),
        };
        let (doc, report) = MapDocument::from_raw(raw);
        assert_eq!(doc.nodes.len(), 1);
        assert_eq!(doc.nodes[0].x, 1.0);
        assert_eq!(report.dropped_total(), 0);
        assert_eq!(report.header_mismatches.len(), 1);
        let mismatch = &report.header_mismatches[0];
        assert_eq!((mismatch.which, mismatch.index), ("nodeKeys", 0));
        assert_eq!(mismatch.expected, "x");
    }
}
