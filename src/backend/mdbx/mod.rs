//! `libmdbx`-backed implementation of [`crate::env::Env`].

mod env;
mod table;
mod txn;

pub use env::ConcreteEnv;
pub use table::MdbxCursor;
