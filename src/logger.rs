use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

/// Install a stdout subscriber. `RUST_LOG` overrides `level`.
pub fn init_logger(level: &str) {
    let filter = EnvFilter::builder()
        .with_default_directive(level.parse::<Level>().unwrap_or(Level::INFO).into())
        .from_env_lossy();
    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();
    if installed {
        info!(%level, "Logging initialized");
    }
}
