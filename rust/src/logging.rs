//! Verbosity-gated stderr logging for the engine.
//!
//! Every engine component carries the `verbosity` from `SimulationConfig`
//! and logs through the macros below. Nothing is formatted unless the level
//! is enabled. Lines carry a short tag naming their level:
//!
//! | level | tag     | what gets logged                                   |
//! |-------|---------|----------------------------------------------------|
//! | 0     |         | nothing                                            |
//! | 1     | `[run]` | starts, completions, rejections, clock moves       |
//! | 2     | `[why]` | eligibility, crew candidates, shrinks, batch skips |
//! | 3     | `[dbg]` | team occupancy after each start                    |

pub const VERBOSITY_SILENT: u8 = 0;
pub const VERBOSITY_TRANSITIONS: u8 = 1;
pub const VERBOSITY_DECISIONS: u8 = 2;
pub const VERBOSITY_DEBUG: u8 = 3;

/// Whether a message at `level` is emitted under `verbosity`.
#[inline]
pub fn enabled(verbosity: u8, level: u8) -> bool {
    level > VERBOSITY_SILENT && verbosity >= level
}

/// Line prefix for a level.
pub fn level_tag(level: u8) -> &'static str {
    match level {
        VERBOSITY_SILENT => "",
        VERBOSITY_TRANSITIONS => "[run]",
        VERBOSITY_DECISIONS => "[why]",
        _ => "[dbg]",
    }
}

#[doc(hidden)]
#[macro_export]
macro_rules! log_at {
    ($level:expr, $verbosity:expr, $($arg:tt)*) => {
        if $crate::logging::enabled($verbosity, $level) {
            eprintln!("{} {}", $crate::logging::level_tag($level), format_args!($($arg)*));
        }
    };
}

/// Stage lifecycle and clock changes.
#[macro_export]
macro_rules! log_transitions {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_TRANSITIONS, $verbosity, $($arg)*)
    };
}

/// Why an action was offered, shrunk or skipped.
#[macro_export]
macro_rules! log_decisions {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_DECISIONS, $verbosity, $($arg)*)
    };
}

#[macro_export]
macro_rules! log_debug {
    ($verbosity:expr, $($arg:tt)*) => {
        $crate::log_at!($crate::logging::VERBOSITY_DEBUG, $verbosity, $($arg)*)
    };
}
