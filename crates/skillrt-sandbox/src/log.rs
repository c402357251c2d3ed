//! `info_log!`: `tracing::info!` that goes silent under SKILLRT_QUIET.
//!
//! Progress lines (bootstrap steps, installs, auto-install rounds) use it; warnings
//! and errors always go through `tracing` directly.

#[doc(hidden)]
pub use tracing as __tracing;

#[macro_export]
macro_rules! info_log {
    ($($arg:tt)*) => {{
        if !$crate::log::is_quiet() {
            $crate::log::__tracing::info!($($arg)*);
        }
    }};
}

pub fn is_quiet() -> bool {
    skillrt_core::config::ObservabilityConfig::from_env().quiet
}
