//! Logging setup for binaries built on the runtime

pub use log::{debug, error, info, trace, warn};
use log::LevelFilter;

/// Initialize the logging system at `Info`
pub fn init() {
    init_with_level(LevelFilter::Info);
}

/// Initialize the logging system with an explicit level
///
/// Repeated calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let _ = env_logger::Builder::from_default_env()
        .filter_level(level)
        .try_init();
}
