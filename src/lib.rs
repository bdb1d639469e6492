// Copyright (C) 2023 Cuprate Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! `fastpt` is an embedded, transactional, schema-aware tabular storage
//! engine built on top of a copy-on-write mmap B+tree (`libmdbx`).
//!
//! A table is described once, up front, as a [`schema::TableDescriptor`]: a
//! primary key column plus zero or more secondary index columns, each with
//! its own direction, uniqueness, and duplicate-key policy. Every row is
//! stored once under its primary key and mirrored into each secondary
//! index's own sub-database as an `index key -> primary key` pointer;
//! [`ops`] computes the minimal diff of index writes a row mutation needs,
//! and [`txn`]/[`db`] apply that diff inside one `libmdbx` transaction.
//!
//! Reading back out, [`cursor::Cursor`] wraps a backend cursor with range
//! bounds, sort order, and a boolean predicate tree so callers can express
//! "all rows where column 2 is 3, descending" without hand-rolling a scan.
//!
//! [`Db`](db::Db) is the crate's single entry point: open a directory,
//! create tables against its live [`schema::Catalog`], and insert/update/
//! delete/get rows by table name.
//!
//! At the moment, the only storage engine available is MDBX, via [`backend`].

#![deny(unused_attributes)]
#![forbid(unsafe_code)]
#![allow(non_camel_case_types)]
#![deny(clippy::expect_used, clippy::panic)]

pub mod backend;
pub mod comparator;
pub mod composite;
pub mod config;
pub mod constants;
pub mod cursor;
pub mod db;
pub mod env;
pub mod error;
pub mod keycode;
pub mod ops;
pub mod row;
pub mod schema;
pub mod thread;
pub mod transaction;
pub mod txn;

mod macros;

pub use db::Db;
pub use error::{Error, Result};
