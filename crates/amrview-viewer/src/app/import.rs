use anyhow::{Context, Result};
use std::path::Path;

use crate::app::AppCtx;
use crate::graph::{NodeRole, WarehouseGraph};
use crate::import::{decode, ImportedDocument};
use crate::render::{canvas_bounds, canvas_to_graph};
use crate::state::FloorState;

fn print_summary(graph: &WarehouseGraph) {
    let [_, far] = canvas_bounds(graph.width(), graph.height());
    println!(
        "  frame {} x {} (canvas bounds [[0, 0], [{}, {}]])",
        graph.width(),
        graph.height(),
        far.row,
        far.col
    );
    let dangling = graph
        .lines()
        .iter()
        .filter(|l| graph.node_by_key(&l.start_node).is_none() || graph.node_by_key(&l.end_node).is_none())
        .count();
    println!(
        "  nodes {}  lines {}  dangling lines {}",
        graph.nodes().len(),
        graph.lines().len(),
        dangling
    );
    println!(
        "  supply {}  return {}  camera {} ({} bound)",
        graph.count(|r| matches!(r, NodeRole::Supply(_))),
        graph.count(|r| matches!(r, NodeRole::Return(_))),
        graph.count(|r| matches!(r, NodeRole::Camera(_))),
        graph.cameras().len(),
    );
}

pub async fn run_import(ctx: &AppCtx, archive: &Path, area: Option<i64>) -> Result<()> {
    let bytes = tokio::fs::read(archive)
        .await
        .with_context(|| format!("failed to read {}", archive.display()))?;
    let filename = archive
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| archive.display().to_string());

    match decode(&bytes)? {
        ImportedDocument::Map { document, report } => {
            ctx.store.save_map(&filename, &document)?;
            let mut st = FloorState::new(ctx.cfg.render.initial_zoom);
            st.install_map(document, ctx.cameras(area).await);
            if let Some(area) = area {
                ctx.remember_area(area)?;
            }

            println!("imported map from {filename}");
            if let Some(graph) = &st.graph {
                print_summary(graph);
            }
            if report.dropped_total() > 0 {
                println!(
                    "  dropped {} node and {} line entries",
                    report.dropped_nodes.len(),
                    report.dropped_lines.len()
                );
            }
            for mismatch in &report.header_mismatches {
                println!("  warning: {mismatch}");
            }
        }
        ImportedDocument::Security(document) => {
            ctx.store.save_security(&filename, &document)?;
            println!("imported security configuration from {filename}");
        }
    }
    Ok(())
}

async fn stored_floor(ctx: &AppCtx, zoom: Option<f64>) -> Result<(String, FloorState)> {
    let Some(stored) = ctx.store.load_map()? else {
        anyhow::bail!("no map imported yet; run `amrview import <archive>` first");
    };
    let mut st = FloorState::new(zoom.unwrap_or(ctx.cfg.render.initial_zoom));
    st.install_map(stored.document, ctx.cameras(None).await);
    Ok((stored.filename, st))
}

pub fn run_show(ctx: &AppCtx) -> Result<()> {
    match ctx.store.load_map()? {
        Some(stored) => {
            println!("map: {}", stored.filename);
            print_summary(&WarehouseGraph::build(stored.document));
        }
        None => println!("map: none"),
    }
    match ctx.store.load_security()? {
        Some(stored) => {
            let sets = stored
                .document
                .get("AvoidSceneSet")
                .and_then(|v| v.as_array())
                .map_or(0, |a| a.len());
            println!("security: {} ({sets} avoid scene sets)", stored.filename);
        }
        None => println!("security: none"),
    }
    Ok(())
}

pub async fn run_locate(ctx: &AppCtx, query: &str, zoom: Option<f64>) -> Result<()> {
    let (filename, st) = stored_floor(ctx, zoom).await?;
    let Some(payload) = st.locate(query) else {
        anyhow::bail!("no marker matches {query:?} on {filename}");
    };
    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}

pub async fn run_click(ctx: &AppCtx, screen: [f64; 2], zoom: Option<f64>) -> Result<()> {
    let (_, st) = stored_floor(ctx, zoom).await?;
    let (x, y) = canvas_to_graph(st.viewport.from_screen(screen));
    match st.click_at(screen) {
        Some(payload) => {
            if let Some(tip) = st.hover(screen) {
                println!("{}", tip.render());
            }
            println!("{}", serde_json::to_string_pretty(&payload)?);
        }
        None => println!("no marker at ({x:.1}, {y:.1})"),
    }
    Ok(())
}
