//! Logging macros that forward to [defmt] when it is enabled.
//!
//! This module must be declared first in `lib.rs` with `#[macro_use]`.

// without defmt, arguments are borrowed inside a closure that is never
// called, so they don't trigger unused warnings and are never evaluated.

macro_rules! trace {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::trace!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = || __log_ignore!($($arg)*);
    }};
}

macro_rules! debug {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::debug!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = || __log_ignore!($($arg)*);
    }};
}

macro_rules! warn {
    ($($arg:tt)*) => {{
        #[cfg(feature = "defmt")]
        ::defmt::warn!($($arg)*);
        #[cfg(not(feature = "defmt"))]
        let _ = || __log_ignore!($($arg)*);
    }};
}

#[allow(unused_macros)]
macro_rules! __log_ignore {
    ($fmt:literal $(, $arg:expr)* $(,)?) => {{
        $(let _ = &$arg;)*
    }};
}
