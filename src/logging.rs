use tracing_subscriber::EnvFilter;

use crate::config::AppConfig;

/// Initializes the global tracing subscriber from configuration. `RUST_LOG`
/// wins over the configured level. Safe to call more than once; later calls
/// are no-ops.
pub fn init(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone()));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log_json {
        let _ = builder.json().try_init();
    } else {
        let _ = builder.try_init();
    }
}
