mod core;
mod util;
mod window;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::core::context::Context;
use crate::window::manager::WindowManager;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// X display to manage (defaults to $DISPLAY)
    #[arg(long)]
    display: Option<String>,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    info!("Starting winm...");

    let ctx = Context::new(args.display.as_deref())?;
    info!("Screen: {}, Root Window: {}", ctx.screen_num, ctx.root_window);

    let mut wm = WindowManager::new(ctx)?;
    wm.scan_windows()?;

    if let Err(e) = wm.run() {
        error!("Fatal error, shutting down: {}", e);
        return Err(e.into());
    }

    Ok(())
}
