use amrview_core::{MonitorMsg, TelemetryMsg};
use std::fmt;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelKind {
    Telemetry,
    Monitor { group: String },
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Telemetry => f.write_str("telemetry"),
            Self::Monitor { group } => write!(f, "monitor:{group}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Incoming {
    pub channel: ChannelKind,
    pub kind: IncomingKind,
}

#[derive(Debug, Clone)]
pub enum IncomingKind {
    Connected,
    Disconnected,
    Reconnecting { delay: Duration },
    Telemetry(TelemetryMsg),
    Monitor(MonitorMsg),
    Error(String),
}

impl Incoming {
    pub fn connected(channel: ChannelKind) -> Self {
        Self {
            channel,
            kind: IncomingKind::Connected,
        }
    }

    pub fn disconnected(channel: ChannelKind) -> Self {
        Self {
            channel,
            kind: IncomingKind::Disconnected,
        }
    }

    pub fn reconnecting(channel: ChannelKind, delay: Duration) -> Self {
        Self {
            channel,
            kind: IncomingKind::Reconnecting { delay },
        }
    }

    pub fn error(channel: ChannelKind, msg: String) -> Self {
        Self {
            channel,
            kind: IncomingKind::Error(msg),
        }
    }

    /// Decodes one text frame according to the channel's message taxonomy.
    pub fn decode(channel: ChannelKind, text: &str) -> serde_json::Result<Self> {
        let kind = match channel {
            ChannelKind::Telemetry => IncomingKind::Telemetry(TelemetryMsg::parse(text)?),
            ChannelKind::Monitor { .. } => IncomingKind::Monitor(MonitorMsg::parse(text)?),
        };
        Ok(Self { channel, kind })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_follows_channel_taxonomy() {
        let group = ChannelKind::Monitor { group: "5".into() };
        let inc = Incoming::decode(group.clone(), "[]").expect("json");
        assert!(matches!(inc.kind, IncomingKind::Monitor(MonitorMsg::TaskBatch(_))));
        assert_eq!(inc.channel.to_string(), "monitor:5");

        let inc = Incoming::decode(ChannelKind::Telemetry, "[]").expect("json");
        assert!(matches!(inc.kind, IncomingKind::Telemetry(_)));
        assert!(Incoming::decode(group, "not json").is_err());
    }
}
