use amrview_core::{CameraBinding, MapDocument};
use amrview_link::{ChannelKind, Incoming, IncomingKind};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::graph::{FleetView, LiveStateTable, MonitorBoard, WarehouseGraph};
use crate::render::tooltips::Tooltip;
use crate::render::{locate, pick, ClickPayload, OverlayLayer, Viewport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Badge {
    Offline,
    Connected,
    Reconnecting { delay: Duration },
}

impl fmt::Display for Badge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Offline => f.write_str("offline"),
            Self::Connected => f.write_str("connected"),
            Self::Reconnecting { delay } => write!(f, "reconnecting in {:.1}s", delay.as_secs_f64()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelBadge {
    pub badge: Badge,
    pub last_error: Option<String>,
}

pub struct FloorState {
    pub graph: Option<WarehouseGraph>,
    pub live: LiveStateTable,
    pub board: MonitorBoard,
    pub fleet: FleetView,
    pub overlay: OverlayLayer,
    pub viewport: Viewport,
    badges: HashMap<ChannelKind, ChannelBadge>,
    needs_redraw: bool,
}

impl FloorState {
    pub fn new(zoom: f64) -> Self {
        Self {
            graph: None,
            live: LiveStateTable::default(),
            board: MonitorBoard::default(),
            fleet: FleetView::default(),
            overlay: OverlayLayer::new(zoom),
            viewport: Viewport::new(zoom),
            badges: HashMap::new(),
            needs_redraw: false,
        }
    }

    pub fn install_map(&mut self, doc: MapDocument, cameras: Vec<CameraBinding>) {
        let mut graph = WarehouseGraph::build(doc);
        graph.bind_cameras(cameras);
        self.graph = Some(graph);
        self.needs_redraw = true;
        self.redraw();
    }

    pub fn apply(&mut self, inc: Incoming) {
        let Incoming { channel, kind } = inc;
        match kind {
            IncomingKind::Connected => {
                tracing::info!(channel = %channel, "channel connected");
                match &channel {
                    ChannelKind::Telemetry => {
                        self.live.clear();
                        self.fleet.clear();
                        self.needs_redraw = true;
                    }
                    ChannelKind::Monitor { group } => self.board.reset_group(group),
                }
                let badge = self.badge_mut(channel);
                badge.badge = Badge::Connected;
                badge.last_error = None;
            }
            IncomingKind::Disconnected => {
                tracing::info!(channel = %channel, "channel offline");
                self.badge_mut(channel).badge = Badge::Offline;
            }
            IncomingKind::Reconnecting { delay } => {
                tracing::info!(channel = %channel, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
                self.badge_mut(channel).badge = Badge::Reconnecting { delay };
            }
            IncomingKind::Error(msg) => {
                tracing::warn!(channel = %channel, error = %msg, "channel error");
                self.badge_mut(channel).last_error = Some(msg);
            }
            IncomingKind::Telemetry(msg) => {
                self.fleet.apply(&msg);
                if self.live.apply_telemetry(&msg) {
                    self.needs_redraw = true;
                }
            }
            IncomingKind::Monitor(msg) => {
                let group = match &channel {
                    ChannelKind::Monitor { group } => group.as_str(),
                    ChannelKind::Telemetry => "",
                };
                tracing::debug!(%group, kind = msg.kind_name(), "monitor frame");
                self.board.apply(group, msg);
            }
        }
    }

    fn badge_mut(&mut self, channel: ChannelKind) -> &mut ChannelBadge {
        self.badges.entry(channel).or_insert(ChannelBadge {
            badge: Badge::Offline,
            last_error: None,
        })
    }

    pub fn badge(&self, channel: &ChannelKind) -> Option<&ChannelBadge> {
        self.badges.get(channel)
    }

    pub fn badges(&self) -> Vec<(String, &ChannelBadge)> {
        let mut out: Vec<_> = self.badges.iter().map(|(k, b)| (k.to_string(), b)).collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn redraw(&mut self) -> bool {
        if !std::mem::take(&mut self.needs_redraw) {
            return false;
        }
        let Some(graph) = &self.graph else {
            return false;
        };
        self.overlay.render(graph, &self.live.snapshot(), self.viewport.zoom);
        true
    }

    pub fn set_zoom(&mut self, zoom: f64) {
        self.viewport.zoom = zoom;
        self.overlay.set_zoom(zoom);
    }

    pub fn locate(&self, query: &str) -> Option<ClickPayload> {
        let graph = self.graph.as_ref()?;
        let marker = locate(&self.overlay, graph, query)?;
        crate::render::click_payload(graph, marker)
    }

    pub fn hover(&self, screen: [f64; 2]) -> Option<&Tooltip> {
        let id = pick(&self.overlay, &self.viewport, screen)?;
        self.overlay.marker(id).map(|m| &m.tooltip)
    }

    pub fn click_at(&self, screen: [f64; 2]) -> Option<ClickPayload> {
        let graph = self.graph.as_ref()?;
        let id = pick(&self.overlay, &self.viewport, screen)?;
        crate::render::click_payload(graph, self.overlay.marker(id)?)
    }
}
