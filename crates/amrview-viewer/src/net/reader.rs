use amrview_link::{
    Backoff, BackendEndpoints, Channel, ChannelKind, ChannelSettings, Connector, Incoming,
    WsConnector,
};
use anyhow::{Context, Result};
use crossbeam_channel::Sender;
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const CLOSE_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct LinkPlan {
    pub channels: Vec<ChannelSettings>,
}

impl LinkPlan {
    pub fn new(
        endpoints: &BackendEndpoints,
        groups: &[String],
        backoff: Backoff,
        watch_interval: Duration,
    ) -> Result<Self> {
        let mut channels = Vec::with_capacity(groups.len() + 1);
        let url = endpoints.telemetry_ws_url()?;
        channels.push(ChannelSettings::new(ChannelKind::Telemetry, url.as_str()));
        for group in groups {
            let url = endpoints.monitor_ws_url(group)?;
            channels.push(ChannelSettings::new(
                ChannelKind::Monitor {
                    group: group.clone(),
                },
                url.as_str(),
            ));
        }
        for settings in &mut channels {
            settings.backoff = backoff;
            settings.watch_interval = watch_interval;
        }
        Ok(Self { channels })
    }
}

/// Owns the network thread. Dropping the handle does not stop it; call [`LinkHandle::stop`].
pub struct LinkHandle {
    cancel: CancellationToken,
    thread: Option<JoinHandle<()>>,
}

impl LinkHandle {
    pub fn stop(mut self) {
        self.cancel.cancel();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("network thread panicked");
            }
        }
    }
}

pub fn spawn_reader(plan: LinkPlan, tx: Sender<Incoming>) -> Result<LinkHandle> {
    spawn_reader_with(plan, Arc::new(WsConnector), tx)
}

pub fn spawn_reader_with(
    plan: LinkPlan,
    connector: Arc<dyn Connector>,
    tx: Sender<Incoming>,
) -> Result<LinkHandle> {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let thread = std::thread::Builder::new()
        .name("amrview-link".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Runtime::new() {
                Ok(rt) => rt,
                Err(e) => {
                    tracing::error!(error = %e, "failed to start network runtime");
                    return;
                }
            };
            rt.block_on(run(plan, connector, tx, token));
        })
        .context("spawn network thread")?;
    Ok(LinkHandle {
        cancel,
        thread: Some(thread),
    })
}

async fn run(
    plan: LinkPlan,
    connector: Arc<dyn Connector>,
    tx: Sender<Incoming>,
    cancel: CancellationToken,
) {
    let channels: Vec<Channel> = plan
        .channels
        .into_iter()
        .map(|settings| Channel::spawn(settings, Arc::clone(&connector), tx.clone(), &cancel))
        .collect();
    for ch in &channels {
        tracing::info!(channel = %ch.kind(), "connecting");
        ch.connect();
    }

    tokio::select! {
        _ = cancel.cancelled() => {}
        res = tokio::signal::ctrl_c() => {
            if let Err(e) = res {
                tracing::warn!(error = %e, "ctrl-c handler unavailable");
                cancel.cancelled().await;
            } else {
                tracing::info!("interrupted");
            }
        }
    }

    for ch in &channels {
        ch.shutdown();
    }
    tokio::time::sleep(CLOSE_GRACE).await;
    cancel.cancel();
}
