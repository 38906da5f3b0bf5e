mod error;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use panelsync_core::Reconciler;

use crate::error::AppError;

#[tokio::main]
async fn main() {
    init_tracing();

    if let Err(err) = run().await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

async fn run() -> Result<(), AppError> {
    // Everything is validated before the first connection attempt.
    let config = panelsync_config::load_service_config()?;
    info!(
        feed = %config.feed.url,
        device = %config.device.base_url,
        entities = config.entities.len(),
        "configuration loaded"
    );

    let cancel = CancellationToken::new();
    let mut reconciler = Reconciler::from_config(config, cancel.clone())?;

    tokio::spawn(cancel_on_interrupt(cancel));
    reconciler.run().await;

    info!("shut down");
    Ok(())
}

async fn cancel_on_interrupt(cancel: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
        return;
    }
    info!("interrupt received, shutting down");
    cancel.cancel();
}
