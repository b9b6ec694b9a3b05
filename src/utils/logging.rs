//! Logging setup plus macros for chatty modules.
//!
//! The macros check a module-level `ENABLE_LOGS` flag so loops that run
//! several times a second can be silenced without touching `RUST_LOG`:
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//! use crate::log_debug;
//!
//! log_debug!("tick {}", n);
//! ```

/// Installs `env_logger` at `info` unless `RUST_LOG` says otherwise.
/// Safe to call more than once.
pub fn init_logging() {
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .try_init();
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::debug!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::info!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
