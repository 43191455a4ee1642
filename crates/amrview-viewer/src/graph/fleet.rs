use amrview_core::{AgvSnapshot, TelemetryMsg};
use std::collections::BTreeMap;

/// Latest known state per AGV. Fields missing from a frame keep their previous value.
#[derive(Debug, Default)]
pub struct FleetView {
    agvs: BTreeMap<String, AgvSnapshot>,
    anonymous: usize,
}

impl FleetView {
    pub fn apply(&mut self, msg: &TelemetryMsg) {
        for snap in &msg.agvs {
            let Some(id) = snap.id.clone() else {
                self.anonymous += 1;
                continue;
            };
            let entry = self.agvs.entry(id.clone()).or_insert_with(|| AgvSnapshot {
                id: Some(id),
                ..AgvSnapshot::default()
            });
            merge(entry, snap);
        }
    }

    pub fn get(&self, id: &str) -> Option<&AgvSnapshot> {
        self.agvs.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgvSnapshot> {
        self.agvs.values()
    }

    pub fn len(&self) -> usize {
        self.agvs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agvs.is_empty()
    }

    pub fn anonymous(&self) -> usize {
        self.anonymous
    }

    pub fn clear(&mut self) {
        self.agvs.clear();
    }
}

fn merge(into: &mut AgvSnapshot, from: &AgvSnapshot) {
    fn keep<T: Copy>(slot: &mut Option<T>, new: Option<T>) {
        if new.is_some() {
            *slot = new;
        }
    }
    keep(&mut into.x, from.x);
    keep(&mut into.y, from.y);
    keep(&mut into.heading, from.heading);
    keep(&mut into.battery, from.battery);
    keep(&mut into.speed, from.speed);
    keep(&mut into.loaded, from.loaded);
}

pub fn describe(agv: &AgvSnapshot) -> String {
    fn opt(v: Option<f64>, digits: usize) -> String {
        v.map(|v| format!("{v:.digits$}")).unwrap_or_else(|| "?".to_string())
    }
    let loaded = match agv.loaded {
        Some(true) => "loaded",
        Some(false) => "empty",
        None => "?",
    };
    format!(
        "{} pos=({}, {}) heading={} battery={} speed={} {}",
        agv.id.as_deref().unwrap_or("?"),
        opt(agv.x, 1),
        opt(agv.y, 1),
        opt(agv.heading, 1),
        opt(agv.battery, 0),
        opt(agv.speed, 2),
        loaded
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_fields_keep_the_last_known_value() {
        let mut fleet = FleetView::default();
        fleet.apply(&TelemetryMsg::from_value(&json!({
            "agvs": [{"id": "A1", "x": 1.0, "y": 2.0, "battery": 80}]
        })));
        fleet.apply(&TelemetryMsg::from_value(&json!({
            "agvs": [{"id": "A1", "x": 5.0}, {"x": 9.0}]
        })));

        let a1 = fleet.get("A1").expect("A1");
        assert_eq!(a1.x, Some(5.0));
        assert_eq!(a1.y, Some(2.0));
        assert_eq!(a1.battery, Some(80.0));
        assert_eq!(fleet.len(), 1);
        assert_eq!(fleet.anonymous(), 1);
    }

    #[test]
    fn describe_marks_unknowns() {
        let agv = AgvSnapshot {
            id: Some("A2".into()),
            x: Some(1.0),
            ..AgvSnapshot::default()
        };
        assert_eq!(describe(&agv), "A2 pos=(1.0, ?) heading=? battery=? speed=? ?");
    }
}
