use serde_json::Value;

use crate::value::{number, text};

/// Best-effort view of one AGV. Every field may be unknown.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgvSnapshot {
    pub id: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub heading: Option<f64>,
    pub battery: Option<f64>,
    pub speed: Option<f64>,
    pub loaded: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraStatus {
    pub id: u32,
    pub online: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointStatus {
    pub id: u32,
    pub lock: Option<bool>,
}

/// One telemetry frame. Construction never fails once the text is valid JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryMsg {
    pub agvs: Vec<AgvSnapshot>,
    pub cameras: Vec<CameraStatus>,
    pub points: Vec<PointStatus>,
}

const AGV_LIST_KEYS: [&str; 3] = ["agvs", "agvList", "data"];

impl TelemetryMsg {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Value>(raw).map(|v| Self::from_value(&v))
    }

    pub fn from_value(v: &Value) -> Self {
        let list = |key: &str| v.get(key).and_then(Value::as_array);
        let agvs = AGV_LIST_KEYS
            .iter()
            .find_map(|&key| list(key))
            .map(|items| items.iter().map(AgvSnapshot::from_value).collect())
            .unwrap_or_default();
        let cameras = list("cameras")
            .map(|items| {
                items
                    .iter()
                    .filter_map(|c| {
                        Some(CameraStatus {
                            id: id_of(c)?,
                            online: bool_at(c, &["online"]),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        let points = list("points")
            .map(|items| {
                items
                    .iter()
                    .filter_map(|p| {
                        Some(PointStatus {
                            id: id_of(p)?,
                            lock: bool_at(p, &["lock", "locked"]),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        Self {
            agvs,
            cameras,
            points,
        }
    }
}

impl AgvSnapshot {
    pub fn from_value(v: &Value) -> Self {
        let (x, y) = position(v);
        Self {
            id: ["id", "agvId", "name"].iter().find_map(|k| text(v.get(*k)?)),
            x,
            y,
            heading: number_at(v, &["heading", "angle", "theta"]),
            battery: number_at(v, &["battery", "power"]),
            speed: number_at(v, &["speed", "velocity"]),
            loaded: bool_at(v, &["loaded", "hasPayload", "payload"]),
        }
    }
}

fn position(v: &Value) -> (Option<f64>, Option<f64>) {
    match v.get("position") {
        Some(Value::Array(xy)) => (
            xy.first().and_then(number),
            xy.get(1).and_then(number),
        ),
        Some(p @ Value::Object(_)) => (number_at(p, &["x"]), number_at(p, &["y"])),
        _ => (number_at(v, &["x"]), number_at(v, &["y"])),
    }
}

fn id_of(v: &Value) -> Option<u32> {
    match v.get("id")? {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn number_at(v: &Value, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|k| number(v.get(*k)?))
}

fn bool_at(v: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter().find_map(|k| match v.get(*k)? {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|i| i != 0),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_unknown() {
        let msg = TelemetryMsg::parse(r#"{"agvs": [{"id": 7}, {}]}"#).expect("json");
        assert_eq!(msg.agvs.len(), 2);
        assert_eq!(msg.agvs[0].id.as_deref(), Some("7"));
        assert_eq!(msg.agvs[0].battery, None);
        assert_eq!(msg.agvs[1], AgvSnapshot::default());
    }

    #[test]
    fn reads_field_aliases_and_nested_position() {
        let msg = TelemetryMsg::parse(
            r#"{"agvList": [{"agvId": "A1", "position": {"x": 1.5, "y": "2"}, "angle": 90,
                "power": 55, "velocity": 0.4, "hasPayload": 1}]}"#,
        )
        .expect("json");
        let agv = &msg.agvs[0];
        assert_eq!(agv.id.as_deref(), Some("A1"));
        assert_eq!((agv.x, agv.y), (Some(1.5), Some(2.0)));
        assert_eq!(agv.heading, Some(90.0));
        assert_eq!(agv.battery, Some(55.0));
        assert_eq!(agv.speed, Some(0.4));
        assert_eq!(agv.loaded, Some(true));
    }

    #[test]
    fn non_object_frames_carry_nothing() {
        assert_eq!(TelemetryMsg::parse("[1, 2]").expect("json"), TelemetryMsg::default());
        assert!(TelemetryMsg::parse("{oops").is_err());
    }

    #[test]
    fn live_state_lists_skip_entries_without_numeric_id() {
        let msg = TelemetryMsg::parse(
            r#"{"cameras": [{"id": 3, "online": true}, {"id": "x"}],
                "points": [{"id": "12", "lock": false}, {"lock": true}]}"#,
        )
        .expect("json");
        assert_eq!(msg.cameras, vec![CameraStatus { id: 3, online: Some(true) }]);
        assert_eq!(msg.points, vec![PointStatus { id: 12, lock: Some(false) }]);
    }
}
