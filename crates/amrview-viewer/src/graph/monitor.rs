use amrview_core::{MonitorMsg, OrderEntry};
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};

const UNKNOWN_KEPT: usize = 64;

#[derive(Debug, Default)]
pub struct MonitorBoard {
    groups: BTreeMap<String, Vec<OrderEntry>>,
    tasks: Vec<Value>,
    unknown: VecDeque<Value>,
}

impl MonitorBoard {
    /// `channel_group` is the group the frame arrived on; a `group_id` in the frame wins.
    pub fn apply(&mut self, channel_group: &str, msg: MonitorMsg) {
        match msg {
            MonitorMsg::Initial { group_id, orders } => {
                let group = group_id.unwrap_or_else(|| channel_group.to_string());
                tracing::debug!(%group, orders = orders.len(), "group snapshot");
                self.groups.insert(group, orders);
            }
            MonitorMsg::Clear { group_id, order_id } => {
                let group = group_id.as_deref().unwrap_or(channel_group);
                if let Some(orders) = self.groups.get_mut(group) {
                    orders.retain(|o| o.order_id != order_id);
                }
            }
            MonitorMsg::TaskBatch(items) => self.tasks = items,
            MonitorMsg::Unknown(raw) => {
                if self.unknown.len() == UNKNOWN_KEPT {
                    self.unknown.pop_front();
                }
                self.unknown.push_back(raw);
            }
        }
    }

    pub fn reset_group(&mut self, group: &str) {
        self.groups.remove(group);
    }

    pub fn visible(&self, group: &str) -> &[OrderEntry] {
        self.groups.get(group).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn groups(&self) -> impl Iterator<Item = (&str, &[OrderEntry])> {
        self.groups.iter().map(|(g, o)| (g.as_str(), o.as_slice()))
    }

    pub fn tasks(&self) -> &[Value] {
        &self.tasks
    }

    pub fn unknown(&self) -> impl Iterator<Item = &Value> {
        self.unknown.iter()
    }
}
