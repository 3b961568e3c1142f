//! Logging utilities and structured logging support

pub use log::{debug, error, info, trace, warn};

/// Initialize the logging system from `RUST_LOG`
pub fn init() {
    env_logger::init();
}

/// Initialize the logging system with an explicit filter such as
/// `"info"` or `"scene_raster=debug,warn"`.
///
/// Returns `false` when a logger was already installed.
pub fn init_with_filter(filter: &str) -> bool {
    env_logger::Builder::new()
        .parse_filters(filter)
        .format_timestamp_millis()
        .try_init()
        .is_ok()
}
