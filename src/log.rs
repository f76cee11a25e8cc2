//! `no_std`-friendly logging shim.
//!
//! Calls straight through to `defmt`, but keeps the call sites usable when
//! the `defmt-logging` feature is off (the common case for host-side
//! simulation and tests): each macro expands to the matching `defmt` macro
//! when the feature is enabled, and to nothing otherwise, so log
//! statements never gate on `cfg` at the call site.

#[cfg(feature = "defmt-logging")]
macro_rules! trace {
    ($($arg:tt)*) => { defmt::trace!($($arg)*) };
}
#[cfg(not(feature = "defmt-logging"))]
macro_rules! trace {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "defmt-logging")]
macro_rules! debug {
    ($($arg:tt)*) => { defmt::debug!($($arg)*) };
}
#[cfg(not(feature = "defmt-logging"))]
macro_rules! debug {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "defmt-logging")]
macro_rules! warn {
    ($($arg:tt)*) => { defmt::warn!($($arg)*) };
}
#[cfg(not(feature = "defmt-logging"))]
macro_rules! warn {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "defmt-logging")]
macro_rules! error {
    ($($arg:tt)*) => { defmt::error!($($arg)*) };
}
#[cfg(not(feature = "defmt-logging"))]
macro_rules! error {
    ($($arg:tt)*) => {};
}

pub(crate) use debug;
pub(crate) use error;
pub(crate) use trace;
pub(crate) use warn;
