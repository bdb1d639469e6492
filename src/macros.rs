//! General macros.

//---------------------------------------------------------------------------------------------------- Logging
// Thin wrappers around `tracing`'s macros so call sites go through one name
// per log level instead of referencing the `tracing` crate directly.

/// [`tracing::warn_span`].
macro_rules! warn_span2 {
    ($($token:tt)*) => {
        tracing::warn_span!($($token)*)
    };
}
pub(crate) use warn_span2;

/// [`tracing::warn`].
macro_rules! warn2 {
    ($($token:tt)*) => {
        tracing::warn!($($token)*)
    };
}
pub(crate) use warn2;

/// [`tracing::trace_span`].
macro_rules! trace_span2 {
    ($($token:tt)*) => {
        tracing::trace_span!($($token)*)
    };
}
pub(crate) use trace_span2;

/// [`tracing::trace`].
macro_rules! trace2 {
    ($($token:tt)*) => {
        tracing::trace!($($token)*)
    };
}
pub(crate) use trace2;

/// [`tracing::info_span`].
macro_rules! info_span2 {
    ($($token:tt)*) => {
        tracing::info_span!($($token)*)
    };
}
pub(crate) use info_span2;

/// [`tracing::info`].
macro_rules! info2 {
    ($($token:tt)*) => {
        tracing::info!($($token)*)
    };
}
pub(crate) use info2;

/// [`tracing::error_span`].
macro_rules! error_span2 {
    ($($token:tt)*) => {
        tracing::error_span!($($token)*)
    };
}
pub(crate) use error_span2;

/// [`tracing::error`].
macro_rules! error2 {
    ($($token:tt)*) => {
        tracing::error!($($token)*)
    };
}
pub(crate) use error2;

/// [`tracing::debug_span`].
macro_rules! debug_span2 {
    ($($token:tt)*) => {
        tracing::debug_span!($($token)*)
    };
}
pub(crate) use debug_span2;

/// [`tracing::debug`].
macro_rules! debug2 {
    ($($token:tt)*) => {
        tracing::debug!($($token)*)
    };
}
pub(crate) use debug2;
