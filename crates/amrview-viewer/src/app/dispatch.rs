use amrview_core::{GridConfig, Zone};
use amrview_link::{Backend, DispatchRecord, GridConfigStore, GridController, HistoryEntry};
use anyhow::Result;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::app::AppCtx;

fn controller(ctx: &AppCtx, backend: &Backend, cancel: &CancellationToken) -> GridController {
    GridController::new(
        Arc::new(backend.clone()),
        ctx.cfg.dispatch.template(),
        ctx.cfg.dispatch.cooldown(),
        cancel,
    )
}

/// Rejects cells outside the configured grid. A missing config or count allows any cell.
async fn check_cell(store: &mut GridConfigStore, username: &str, zone: Zone, cell: u32) -> Result<()> {
    let config = match store.get(username).await {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "grid config unavailable; cell range not checked");
            return Ok(());
        }
    };
    if let Some(count) = config.cell_count(zone) {
        if cell == 0 || cell > count {
            anyhow::bail!("{zone} cell {cell} is outside the configured grid (1..={count})");
        }
    }
    Ok(())
}

fn print_record(record: &DispatchRecord) -> Result<()> {
    println!("dispatched {} cell {}", record.zone, record.cell);
    println!("{}", serde_json::to_string_pretty(&record.payload)?);
    Ok(())
}

fn print_history(history: &[HistoryEntry]) {
    for entry in history {
        let outcome = match &entry.outcome {
            Ok(path) => format!("ok {path}"),
            Err(e) => format!("failed: {e}"),
        };
        println!(
            "  {} {} cell {} {}",
            entry.at.format("%H:%M:%S"),
            entry.zone,
            entry.cell,
            outcome
        );
    }
}

pub async fn run_dispatch(ctx: &AppCtx, zone: Zone, cell: u32) -> Result<()> {
    let backend = ctx.backend()?;
    let username = ctx.cfg.username.as_str();
    let mut store = GridConfigStore::new(Arc::new(backend.clone()));
    check_cell(&mut store, username, zone, cell).await?;

    let rows = backend.fetch_task_rows(zone, username).await?;
    let cancel = CancellationToken::new();
    let grid = controller(ctx, &backend, &cancel);
    let outcome = grid.dispatch(cell, zone, &rows).await;
    print_history(&grid.history());
    grid.shutdown();
    print_record(&outcome?)
}

pub async fn run_paired(ctx: &AppCtx, supply: u32, demand: u32) -> Result<()> {
    let backend = ctx.backend()?;
    let username = ctx.cfg.username.as_str();
    let mut store = GridConfigStore::new(Arc::new(backend.clone()));
    check_cell(&mut store, username, Zone::Supply, supply).await?;
    check_cell(&mut store, username, Zone::Demand, demand).await?;

    let (supply_rows, demand_rows) = tokio::try_join!(
        backend.fetch_task_rows(Zone::Supply, username),
        backend.fetch_task_rows(Zone::Demand, username),
    )?;
    let cancel = CancellationToken::new();
    let grid = controller(ctx, &backend, &cancel);
    let outcome = grid
        .dispatch_paired(supply, &supply_rows, demand, &demand_rows)
        .await;
    print_history(&grid.history());
    grid.shutdown();

    let (supply, demand) = outcome?;
    print_record(&supply)?;
    print_record(&demand)
}

fn print_config(config: &GridConfig) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

pub async fn run_grid_config(ctx: &AppCtx, supply: Option<u32>, demand: Option<u32>) -> Result<()> {
    let backend = ctx.backend()?;
    let username = ctx.cfg.username.as_str();
    let mut store = GridConfigStore::new(Arc::new(backend));

    let mut config = store.get(username).await?.clone();
    if supply.is_none() && demand.is_none() {
        return print_config(&config);
    }
    if supply.is_some() {
        config.supply_cells = supply;
    }
    if demand.is_some() {
        config.demand_cells = demand;
    }
    store.save(config, username).await?;
    tracing::info!(username, "grid config saved");
    match store.cached(username) {
        Some(saved) => print_config(saved),
        None => Ok(()),
    }
}
