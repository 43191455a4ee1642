use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Zone;

/// Name of the only payload field that varies between otherwise identical dispatches.
pub const TIMESTAMP_FIELD: &str = "createTime";

/// Fixed parts of every task-order payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadTemplate {
    pub process_code: String,
    pub origin_system: String,
}

impl Default for PayloadTemplate {
    fn default() -> Self {
        Self {
            process_code: "GRID_TRANSPORT".to_string(),
            origin_system: "WCS".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadDetail {
    pub task_path: String,
}

/// Body of `POST /ics/taskOrder/addTask`. Field order is part of the wire contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchPayload {
    pub model_process_code: String,
    pub from_system: String,
    pub cell: u32,
    pub zone: Zone,
    pub task_path: String,
    pub collection: String,
    pub create_time: String,
    pub task_order_detail: Vec<PayloadDetail>,
}

impl DispatchPayload {
    pub fn build(
        template: &PayloadTemplate,
        cell: u32,
        zone: Zone,
        task_path: &str,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            model_process_code: template.process_code.clone(),
            from_system: template.origin_system.clone(),
            cell,
            zone,
            task_path: task_path.to_string(),
            collection: zone.collection().to_string(),
            create_time: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            task_order_detail: vec![PayloadDetail {
                task_path: task_path.to_string(),
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
    }

    #[test]
    fn payload_bytes_match_wire_layout() {
        let payload = DispatchPayload::build(&PayloadTemplate::default(), 1, Zone::Supply, "P1", at(0));
        let bytes = serde_json::to_string(&payload).expect("encode");
        assert_eq!(
            bytes,
            r#"{"modelProcessCode":"GRID_TRANSPORT","fromSystem":"WCS","cell":1,"zone":"Supply","taskPath":"P1","collection":"supply","createTime":"1970-01-01T00:00:00.000Z","taskOrderDetail":[{"taskPath":"P1"}]}"#
        );
    }

    #[test]
    fn payload_is_deterministic_apart_from_timestamp() {
        let template = PayloadTemplate::default();
        let strip = |secs| {
            let payload = DispatchPayload::build(&template, 4, Zone::Demand, "A-B", at(secs));
            let mut value = serde_json::to_value(&payload).expect("encode");
            value
                .as_object_mut()
                .expect("object")
                .remove(TIMESTAMP_FIELD)
                .expect("timestamp present");
            serde_json::to_vec(&value).expect("encode")
        };
        assert_eq!(strip(10), strip(99_999));
    }
}
