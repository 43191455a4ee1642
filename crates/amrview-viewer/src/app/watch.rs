use amrview_core::CameraBinding;
use anyhow::Result;
use crossbeam_channel::RecvTimeoutError;
use std::time::{Duration, Instant};

use crate::app::AppCtx;
use crate::graph::fleet::describe;
use crate::import::ImportStore;
use crate::net::{spawn_reader, LinkPlan};
use crate::state::FloorState;

const POLL: Duration = Duration::from_millis(200);
const SUMMARY_EVERY: Duration = Duration::from_secs(5);

fn summarize(st: &FloorState) {
    for (name, badge) in st.badges() {
        match &badge.last_error {
            Some(err) => tracing::info!(channel = %name, state = %badge.badge, last_error = %err, "channel"),
            None => tracing::info!(channel = %name, state = %badge.badge, "channel"),
        }
    }
    for agv in st.fleet.iter() {
        tracing::info!("{}", describe(agv));
    }
    if st.fleet.anonymous() > 0 {
        tracing::debug!(dropped = st.fleet.anonymous(), "agv snapshots without an id");
    }
    for (group, orders) in st.board.groups() {
        tracing::info!(group, orders = orders.len(), "monitor board");
    }
    if !st.board.tasks().is_empty() {
        tracing::info!(tasks = st.board.tasks().len(), "task list");
    }
    let unknown = st.board.unknown().count();
    if unknown > 0 {
        tracing::debug!(unknown, "unrecognised monitor frames kept");
    }
    if st.graph.is_some() {
        let locked = st.overlay.markers().iter().filter(|m| m.live.lock == Some(true)).count();
        tracing::info!(markers = st.overlay.markers().len(), locked, "overlay");
    }
}

/// Installs the stored map, if any. Cameras are only fetched when there is a map to bind them to.
fn initial_floor(
    store: &ImportStore,
    zoom: f64,
    cameras: impl FnOnce() -> Result<Vec<CameraBinding>>,
) -> Result<FloorState> {
    let mut st = FloorState::new(zoom);
    match store.load_map()? {
        Some(stored) => {
            tracing::info!(file = %stored.filename, "showing stored map");
            st.install_map(stored.document, cameras()?);
        }
        None => tracing::info!("no stored map; following channels only"),
    }
    Ok(st)
}

pub fn run_watch(ctx: &AppCtx, groups: Vec<String>) -> Result<()> {
    let groups = if groups.is_empty() {
        ctx.cfg.monitor_groups.clone()
    } else {
        groups
    };
    let endpoints = ctx.cfg.backend.endpoints()?;
    let plan = LinkPlan::new(
        &endpoints,
        &groups,
        ctx.cfg.channels.backoff(),
        ctx.cfg.channels.watch_interval(),
    )?;

    let mut st = initial_floor(&ctx.store, ctx.cfg.render.initial_zoom, || {
        Ok(super::runtime()?.block_on(ctx.cameras(None)))
    })?;

    let (tx, rx) = crossbeam_channel::unbounded();
    let handle = spawn_reader(plan, tx)?;
    let mut last_summary = Instant::now();

    loop {
        match rx.recv_timeout(POLL) {
            Ok(event) => {
                st.apply(event);
                for event in rx.try_iter() {
                    st.apply(event);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        st.redraw();
        if last_summary.elapsed() >= SUMMARY_EVERY {
            summarize(&st);
            last_summary = Instant::now();
        }
    }

    handle.stop();
    summarize(&st);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::fixtures::{document, node};
    use serde_json::json;
    use tempfile::tempdir;

    #[test]
    fn stored_map_binds_fetched_cameras() {
        let dir = tempdir().unwrap();
        let store = ImportStore::at(dir.path());
        let doc = document(vec![node("c1", "Camera1", 10.0, 20.0)], vec![]);
        store.save_map("floor.zip", &doc).unwrap();

        let mut st = initial_floor(&store, 0.0, || {
            Ok(vec![serde_json::from_value(json!({
                "camera_id": 7, "camera_name": "dock", "camera_path": "rtsp://dock"
            }))
            .unwrap()])
        })
        .unwrap();

        let graph = st.graph.as_ref().unwrap();
        assert_eq!(graph.camera_binding(1).unwrap().camera_id, 7);
        let v = serde_json::to_value(st.locate("Camera1").unwrap()).unwrap();
        assert_eq!(v["cameraName"], "dock");
    }

    #[test]
    fn no_stored_map_skips_the_camera_fetch() {
        let dir = tempdir().unwrap();
        let store = ImportStore::at(dir.path());
        let mut st = initial_floor(&store, 0.0, || panic!("fetched cameras without a map")).unwrap();
        assert!(st.graph.is_none());
    }
}
