//! Database backend.

pub(crate) mod mdbx;
pub use mdbx::{ConcreteEnv, MdbxCursor};
