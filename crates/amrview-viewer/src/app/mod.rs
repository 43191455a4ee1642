use amrview_core::CameraBinding;
use amrview_link::Backend;
use anyhow::Result;
use std::path::PathBuf;

use crate::import::ImportStore;
use crate::util::args::{Args, Command};
use crate::util::config::{self, AppConfig};

pub mod dispatch;
pub mod import;
pub mod watch;

pub struct AppCtx {
    pub cfg: AppConfig,
    pub config_path: Option<PathBuf>,
    pub store: ImportStore,
}

impl AppCtx {
    pub fn remember_area(&self, area: i64) -> Result<()> {
        if self.cfg.area_id == Some(area) {
            return Ok(());
        }
        let Some(path) = &self.config_path else {
            anyhow::bail!("no config file location to remember area {area} in");
        };
        // Reload so command-line overrides are not written back.
        let mut cfg = config::load(path);
        cfg.area_id = Some(area);
        config::store(&cfg, path)?;
        tracing::info!(area, path = %path.display(), "default area saved");
        Ok(())
    }

    pub fn backend(&self) -> Result<Backend> {
        let endpoints = self.cfg.backend.endpoints()?;
        Ok(Backend::new(endpoints, self.cfg.backend.timeout())?)
    }

    pub async fn cameras(&self, area: Option<i64>) -> Vec<CameraBinding> {
        let Some(area) = area.or(self.cfg.area_id) else {
            return Vec::new();
        };
        let backend = match self.backend() {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(error = %e, "camera list skipped");
                return Vec::new();
            }
        };
        match backend.fetch_cameras(area).await {
            Ok(list) => {
                tracing::info!(area, cameras = list.len(), "camera list fetched");
                list
            }
            Err(e) => {
                tracing::warn!(area, error = %e, "camera list unavailable");
                Vec::new()
            }
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

pub fn run(args: Args) -> Result<()> {
    let config_path = match config::resolve_path(args.config.as_deref()) {
        Ok(path) => Some(path),
        Err(e) => {
            tracing::warn!(error = %e, "using default configuration");
            None
        }
    };
    let mut cfg = config_path.as_deref().map(config::load).unwrap_or_default();
    if let Some(username) = args.username {
        cfg.username = username;
    }
    let ctx = AppCtx {
        cfg,
        config_path,
        store: ImportStore::open_default()?,
    };

    match args.command {
        Command::Import { archive, area } => runtime()?.block_on(import::run_import(&ctx, &archive, area)),
        Command::Show => import::run_show(&ctx),
        Command::Locate { query, zoom } => runtime()?.block_on(import::run_locate(&ctx, &query, zoom)),
        Command::Click { screen, zoom } => runtime()?.block_on(import::run_click(&ctx, screen, zoom)),
        Command::Watch { groups } => watch::run_watch(&ctx, groups),
        Command::Dispatch { zone, cell } => runtime()?.block_on(dispatch::run_dispatch(&ctx, zone, cell)),
        Command::DispatchPaired { supply, demand } => {
            runtime()?.block_on(dispatch::run_paired(&ctx, supply, demand))
        }
        Command::GridConfig { supply, demand } => {
            runtime()?.block_on(dispatch::run_grid_config(&ctx, supply, demand))
        }
    }
}
