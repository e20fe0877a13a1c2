//! `log` wrappers gated on a per-module `ENABLE_LOGS` const.
//!
//! The skip and pending polls run every 50-100ms, so noisy modules can be
//! muted at the source without touching `RUST_LOG`:
//!
//! ```ignore
//! const ENABLE_LOGS: bool = false;
//!
//! use crate::{log_info, log_warn};
//!
//! log_info!("[Engine] skipped {}ms -> {}ms", from, to);
//! ```
//!
//! Messages carry a bracketed context tag (`[Engine]`, `[Bridge]`,
//! `[Background]`, ...) so one log stream can be read across contexts.

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

/// Recoverable problems: a failed seek, an unreachable tab, a storage write
/// that only the in-memory tier saw.
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::warn!($($arg)*);
        }
    };
}

/// Failures that end up in a `{ success: false }` reply.
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        if ENABLE_LOGS {
            log::error!($($arg)*);
        }
    };
}
