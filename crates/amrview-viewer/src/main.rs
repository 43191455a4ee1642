mod app;
mod graph;
mod import;
mod net;
mod render;
mod state;
mod util;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::util::args::parse_args;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn main() -> Result<()> {
    init_tracing();
    let args = parse_args()?;
    app::run(args)
}
