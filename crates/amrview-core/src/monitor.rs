use serde_json::Value;

use crate::value::text;

/// One order as shown in a group's task view.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderEntry {
    pub order_id: String,
    pub status: Option<String>,
    pub raw: Value,
}

/// Monitor-channel frame, discriminated by the `type` field or by being a bare array.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorMsg {
    /// Full snapshot for one group.
    Initial {
        group_id: Option<String>,
        orders: Vec<OrderEntry>,
    },
    /// Remove one order from one group's view.
    Clear {
        group_id: Option<String>,
        order_id: String,
    },
    /// Bulk task-status replace.
    TaskBatch(Vec<Value>),
    /// Anything else, stored verbatim.
    Unknown(Value),
}

impl MonitorMsg {
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str::<Value>(raw).map(Self::from_value)
    }

    pub fn from_value(v: Value) -> Self {
        if let Value::Array(items) = v {
            return Self::TaskBatch(items);
        }
        let kind = v.get("type").and_then(Value::as_str).map(str::to_owned);
        match kind.as_deref() {
            Some("Initial") => {
                let group_id = v.get("group_id").and_then(text);
                let orders = ["data", "orders"]
                    .iter()
                    .find_map(|k| v.get(*k).and_then(Value::as_array))
                    .map(|items| items.iter().filter_map(OrderEntry::from_value).collect())
                    .unwrap_or_default();
                Self::Initial { group_id, orders }
            }
            Some("Clear") => match v.get("order_id").and_then(text) {
                Some(order_id) => Self::Clear {
                    group_id: v.get("group_id").and_then(text),
                    order_id,
                },
                None => Self::Unknown(v),
            },
            _ => Self::Unknown(v),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Initial { .. } => "initial",
            Self::Clear { .. } => "clear",
            Self::TaskBatch(_) => "task_batch",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl OrderEntry {
    pub fn from_value(v: &Value) -> Option<Self> {
        let order_id = ["order_id", "orderId", "id"]
            .iter()
            .find_map(|k| text(v.get(*k)?))?;
        Some(Self {
            order_id,
            status: v.get("status").and_then(text),
            raw: v.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn clear_with_string_group() {
        let msg = MonitorMsg::parse(r#"{"type":"Clear","order_id":"X","group_id":"5"}"#).expect("json");
        assert_eq!(
            msg,
            MonitorMsg::Clear {
                group_id: Some("5".into()),
                order_id: "X".into()
            }
        );
    }

    #[test]
    fn initial_collects_orders_with_ids() {
        let msg = MonitorMsg::from_value(json!({
            "type": "Initial",
            "group_id": 5,
            "data": [{"order_id": "A", "status": "running"}, {"status": "orphan"}, {"orderId": 9}]
        }));
        let MonitorMsg::Initial { group_id, orders } = msg else {
            panic!("expected initial");
        };
        assert_eq!(group_id.as_deref(), Some("5"));
        let ids: Vec<_> = orders.iter().map(|o| o.order_id.as_str()).collect();
        assert_eq!(ids, vec!["A", "9"]);
        assert_eq!(orders[0].status.as_deref(), Some("running"));
    }

    #[test]
    fn bare_array_is_task_batch() {
        let msg = MonitorMsg::parse(r#"[{"order_id":"A","status":"done"}]"#).expect("json");
        assert_eq!(msg.kind_name(), "task_batch");
    }

    #[test]
    fn unrecognized_shapes_pass_through() {
        let raw = json!({"type": "Heartbeat", "n": 1});
        assert_eq!(MonitorMsg::from_value(raw.clone()), MonitorMsg::Unknown(raw));

        let clear_without_order = json!({"type": "Clear", "group_id": "1"});
        assert_eq!(
            MonitorMsg::from_value(clear_without_order.clone()),
            MonitorMsg::Unknown(clear_without_order)
        );
        assert_eq!(MonitorMsg::from_value(json!(42)).kind_name(), "unknown");
    }
}
