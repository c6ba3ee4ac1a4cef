//! Utility library for the FaSTrack planning core

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod logger;
pub mod maths;
pub mod params;
pub mod session;
pub mod time;

// ---------------------------------------------------------------------------
// MACROS
// ---------------------------------------------------------------------------

/// Emit a log record at most once per `period_s` seconds per call site.
///
/// # Notes
/// - The first record at a call site is always emitted.
/// - Suppressed records are dropped, not queued.
#[macro_export]
macro_rules! log_throttle {
    ($level:expr, $period_s:expr, $($arg:tt)+) => {{
        static LAST_EMIT_US: ::std::sync::atomic::AtomicU64 =
            ::std::sync::atomic::AtomicU64::new(u64::MAX);

        let now_us = ($crate::time::monotonic_s() * 1e6) as u64;
        let period_us = (($period_s) as f64 * 1e6) as u64;
        let last_us = LAST_EMIT_US.load(::std::sync::atomic::Ordering::Relaxed);

        if last_us == u64::MAX || now_us.wrapping_sub(last_us) >= period_us {
            LAST_EMIT_US.store(now_us, ::std::sync::atomic::Ordering::Relaxed);
            ::log::log!($level, $($arg)+);
        }
    }};
}
