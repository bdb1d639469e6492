//! Cursor engine: range construction, positioning, dup navigation, and
//! predicate-tree filtering over an ordered key/value sub-database.
//!
//! [`RawCursor`] is the seam between this module's range/filter logic and
//! the actual backend: [`crate::backend::mdbx`] implements it against a
//! real `libmdbx` cursor, and this module's own tests implement it against
//! a plain in-memory `Vec` to exercise the positioning/filter logic without
//! needing a live environment.

use std::{cmp::Ordering, rc::Rc};

use crate::{
    error::{Error, Result},
    keycode::Value,
    ops,
    row::Row,
    schema::{ColumnDescriptor, TableDescriptor},
};

//---------------------------------------------------------------------------------------------------- RawCursor
/// The raw positioning primitives a backend cursor must provide. All
/// methods return the `(key, value)` pair now under the cursor, or `None`
/// if the move landed past either end of the sub-database.
pub trait RawCursor {
    fn first(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    fn last(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    fn prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    /// Position at the first entry whose key is `>= key`.
    fn set_range(&mut self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    /// The entry currently under the cursor, if positioned.
    fn current(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    /// Advance to the next dup value sharing the current key (`DUP_SORT`
    /// sub-databases only); `None` if no further dup exists.
    fn dup_next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    /// Step back to the previous dup value sharing the current key.
    fn dup_prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    /// The first dup value of the current key.
    fn dup_first(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    /// The last dup value of the current key.
    fn dup_last(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>>;
    /// Overwrite the value at the cursor's current position.
    fn put_at_current(&mut self, value: &[u8]) -> Result<()>;
    /// Remove the entry at the cursor's current position.
    fn del_at_current(&mut self) -> Result<()>;
}

//---------------------------------------------------------------------------------------------------- RangeBound / Order
/// One side of a [`Range`]. [`RangeBound::Epsilon`] is the caller-facing
/// "one element" endpoint: [`Range::new`] normalizes it away into a
/// concrete `start`/`end` pair plus an internal one-row marker, per
/// `SPEC_FULL.md` 4.G — it never appears in a constructed [`Range`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RangeBound {
    Unbounded,
    Included(Vec<u8>),
    Excluded(Vec<u8>),
    Epsilon,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Order {
    Ascending,
    Descending,
    /// No positional guarantee; only valid over an unordered (hashed)
    /// index, where `begin`/`end` bounds are meaningless.
    Unsorted,
}

/// Which side, if either, an input [`RangeBound::Epsilon`] normalized to —
/// the range matches at most one entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum OneRow {
    No,
    /// `begin,epsilon` / `value,epsilon`: the one entry [`Cursor::first`]'s
    /// ordinary walk lands on first.
    FromStart,
    /// `epsilon,end`: the mirror of `FromStart` — the one entry the
    /// opposite end's walk lands on first.
    FromEnd,
}

/// A key range plus iteration order, as constructed against one index.
#[derive(Clone, Debug)]
pub struct Range {
    pub start: RangeBound,
    pub end: RangeBound,
    pub order: Order,
    /// When `true`, a range whose `start == end` (both `Included`) is
    /// treated as a single-point lookup rather than an empty range.
    pub zero_len_is_point: bool,
    /// When `true`, opening a cursor over this range defers the initial
    /// positioning call — the cursor starts unset until a caller explicitly
    /// positions it.
    pub dont_fetch: bool,
    one_row: OneRow,
}

impl Range {
    /// The whole sub-database, ascending.
    #[must_use]
    pub fn full() -> Self {
        Self {
            start: RangeBound::Unbounded,
            end: RangeBound::Unbounded,
            order: Order::Ascending,
            zero_len_is_point: false,
            dont_fetch: false,
            one_row: OneRow::No,
        }
    }

    /// Build a range from the caller-facing bound vocabulary, normalizing
    /// an [`RangeBound::Epsilon`] endpoint into a concrete one-row range:
    /// `begin,epsilon` (the first row in `order`'s direction), `value,
    /// epsilon` (only rows at that exact key), or `epsilon,end` (the
    /// mirror of `begin,epsilon`, from the opposite end).
    #[must_use]
    pub fn new(start: RangeBound, end: RangeBound, order: Order, zero_len_is_point: bool, dont_fetch: bool) -> Self {
        let (start, end, one_row) = match (start, end) {
            (RangeBound::Epsilon, RangeBound::Epsilon) => (RangeBound::Unbounded, RangeBound::Unbounded, OneRow::FromStart),
            (bound @ (RangeBound::Included(_) | RangeBound::Excluded(_)), RangeBound::Epsilon) => {
                let key = bound_key(&bound);
                (bound, RangeBound::Included(key), OneRow::FromStart)
            }
            (RangeBound::Epsilon, bound @ (RangeBound::Included(_) | RangeBound::Excluded(_))) => {
                let key = bound_key(&bound);
                (RangeBound::Included(key), bound, OneRow::FromStart)
            }
            (RangeBound::Unbounded, RangeBound::Epsilon) => (RangeBound::Unbounded, RangeBound::Unbounded, OneRow::FromStart),
            (RangeBound::Epsilon, RangeBound::Unbounded) => (RangeBound::Unbounded, RangeBound::Unbounded, OneRow::FromEnd),
            (start, end) => (start, end, OneRow::No),
        };
        Self { start, end, order, zero_len_is_point, dont_fetch, one_row }
    }

    fn is_point(&self) -> bool {
        self.one_row != OneRow::No
            || (self.zero_len_is_point
                && matches!((&self.start, &self.end), (RangeBound::Included(a), RangeBound::Included(b)) if a == b))
    }

    fn below_start(&self, key: &[u8]) -> bool {
        match &self.start {
            RangeBound::Unbounded | RangeBound::Epsilon => false,
            RangeBound::Included(b) => key < b.as_slice(),
            RangeBound::Excluded(b) => key <= b.as_slice(),
        }
    }

    fn above_end(&self, key: &[u8]) -> bool {
        match &self.end {
            RangeBound::Unbounded | RangeBound::Epsilon => false,
            RangeBound::Included(b) => key > b.as_slice(),
            RangeBound::Excluded(b) => key >= b.as_slice(),
        }
    }

    fn in_bounds(&self, key: &[u8]) -> bool {
        !self.below_start(key) && !self.above_end(key)
    }
}

fn bound_key(bound: &RangeBound) -> Vec<u8> {
    match bound {
        RangeBound::Included(k) | RangeBound::Excluded(k) => k.clone(),
        RangeBound::Unbounded | RangeBound::Epsilon => unreachable!("caller only passes a concrete bound"),
    }
}

//---------------------------------------------------------------------------------------------------- Filter predicate tree
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A leaf test against a decoded row.
#[derive(Clone)]
pub enum Predicate {
    /// Compare the value at `slot` against `value` via `op`; a row missing
    /// `slot` never matches.
    Column { slot: u16, op: CmpOp, value: Value },
    /// An arbitrary caller-supplied row predicate.
    FnRow(Rc<dyn Fn(&Row) -> bool>),
}

impl std::fmt::Debug for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Column { slot, op, value } => {
                f.debug_struct("Column").field("slot", slot).field("op", op).field("value", value).finish()
            }
            Self::FnRow(_) => f.write_str("FnRow(..)"),
        }
    }
}

impl Predicate {
    fn eval(&self, row: &Row) -> bool {
        match self {
            Self::Column { slot, op, value } => {
                let Some(actual) = row.get_column(*slot) else { return false };
                let Some(ordering) = compare_values(actual, value) else { return false };
                match op {
                    CmpOp::Eq => ordering == Ordering::Equal,
                    CmpOp::Ne => ordering != Ordering::Equal,
                    CmpOp::Lt => ordering == Ordering::Less,
                    CmpOp::Le => ordering != Ordering::Greater,
                    CmpOp::Gt => ordering == Ordering::Greater,
                    CmpOp::Ge => ordering != Ordering::Less,
                }
            }
            Self::FnRow(f) => f(row),
        }
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::U16(a), Value::U16(b)) => Some(a.cmp(b)),
        (Value::U32(a), Value::U32(b)) => Some(a.cmp(b)),
        (Value::U64(a), Value::U64(b)) => Some(a.cmp(b)),
        (Value::I32(a), Value::I32(b)) => Some(a.cmp(b)),
        (Value::I64(a), Value::I64(b)) => Some(a.cmp(b)),
        (Value::F32(a), Value::F32(b)) => a.partial_cmp(b),
        (Value::F64(a), Value::F64(b)) => a.partial_cmp(b),
        (Value::DateTime(a), Value::DateTime(b)) => Some(a.cmp(b)),
        (Value::Bin96(a), Value::Bin96(b)) => Some(a.cmp(b)),
        (Value::Bin128(a), Value::Bin128(b)) => Some(a.cmp(b)),
        (Value::Bin160(a), Value::Bin160(b)) => Some(a.cmp(b)),
        (Value::Bin256(a), Value::Bin256(b)) => Some(a.cmp(b)),
        (Value::BinVar(a), Value::BinVar(b)) | (Value::CstrVar(a), Value::CstrVar(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// A boolean tree of [`Predicate`] leaves.
#[derive(Clone, Debug)]
pub enum FilterNode {
    Leaf(Predicate),
    And(Vec<FilterNode>),
    Or(Vec<FilterNode>),
    Not(Box<FilterNode>),
}

impl FilterNode {
    fn eval(&self, row: &Row) -> bool {
        match self {
            Self::Leaf(p) => p.eval(row),
            Self::And(nodes) => nodes.iter().all(|n| n.eval(row)),
            Self::Or(nodes) => nodes.iter().any(|n| n.eval(row)),
            Self::Not(node) => !node.eval(row),
        }
    }
}

//---------------------------------------------------------------------------------------------------- Cursor
/// A cursor over one index's sub-database, range- and filter-aware.
///
/// Per `SPEC_FULL.md` 9 open question 1, a cursor positioned on a row that
/// is then deleted out from under it goes **unset**: the next positioning
/// call must re-seek (`first`/`last`/`locate`) rather than silently
/// resuming from a neighboring entry.
pub struct Cursor<C: RawCursor> {
    raw: C,
    range: Range,
    filter: Option<FilterNode>,
    current: Option<(Vec<u8>, Vec<u8>)>,
}

impl<C: RawCursor> Cursor<C> {
    #[must_use]
    pub fn new(raw: C, range: Range, filter: Option<FilterNode>) -> Self {
        Self { raw, range, filter, current: None }
    }

    fn accept(&self, key: &[u8], value: &[u8]) -> Result<bool> {
        if !self.range.in_bounds(key) {
            return Ok(false);
        }
        let Some(filter) = &self.filter else { return Ok(true) };
        let row = Row::from_bytes(value)?;
        Ok(filter.eval(&row))
    }

    /// Position at the range's first entry (respecting [`Order`]) that
    /// also satisfies the filter, if any. On an `epsilon,end` range (see
    /// [`Range::new`]) this is the mirror case: delegate to the walk
    /// [`Cursor::last`] would otherwise perform, since the range matches
    /// at most that one entry either way.
    pub fn first(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.range.one_row == OneRow::FromEnd {
            return self.last();
        }

        let descending = self.range.order == Order::Descending;
        let mut entry = match &self.range.start {
            RangeBound::Unbounded | RangeBound::Epsilon if !descending => self.raw.first()?,
            RangeBound::Unbounded | RangeBound::Epsilon if descending => self.raw.last()?,
            bound => {
                let seek_key = match bound {
                    RangeBound::Included(k) | RangeBound::Excluded(k) => k.clone(),
                    RangeBound::Unbounded | RangeBound::Epsilon => unreachable!(),
                };
                if descending {
                    self.raw.last()?
                } else {
                    self.raw.set_range(&seek_key)?
                }
            }
        };

        loop {
            match entry {
                None => break,
                Some((key, value)) => {
                    if self.accept(&key, &value)? {
                        entry = Some((key, value));
                        break;
                    }
                    entry = if descending { self.raw.prev()? } else { self.raw.next()? };
                }
            }
        }

        self.current = entry;
        Ok(self.current.as_ref())
    }

    /// Advance to the next accepted entry in range order.
    pub fn next(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.current.is_none() {
            return self.first();
        }
        if self.range.is_point() {
            self.current = None;
            return Ok(None);
        }

        let descending = self.range.order == Order::Descending;
        loop {
            let entry = if descending { self.raw.prev()? } else { self.raw.next()? };
            match entry {
                None => {
                    self.current = None;
                    break;
                }
                Some((key, value)) => {
                    if !self.range.in_bounds(&key) {
                        self.current = None;
                        break;
                    }
                    if self.accept(&key, &value)? {
                        self.current = Some((key, value));
                        break;
                    }
                }
            }
        }
        Ok(self.current.as_ref())
    }

    /// Position at the range's last entry (respecting [`Order`]) that also
    /// satisfies the filter — the mirror of [`Cursor::first`]: it walks
    /// from the opposite physical end and steps in the opposite direction,
    /// converging via the same accept-loop.
    pub fn last(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        let descending = self.range.order == Order::Descending;
        let mut entry = if descending { self.raw.first()? } else { self.raw.last()? };

        loop {
            match entry {
                None => break,
                Some((key, value)) => {
                    if self.accept(&key, &value)? {
                        entry = Some((key, value));
                        break;
                    }
                    entry = if descending { self.raw.next()? } else { self.raw.prev()? };
                }
            }
        }

        self.current = entry;
        Ok(self.current.as_ref())
    }

    /// Step back to the previous accepted entry in range order — the
    /// mirror of [`Cursor::next`].
    pub fn prev(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.current.is_none() {
            return self.last();
        }
        if self.range.is_point() {
            self.current = None;
            return Ok(None);
        }

        let descending = self.range.order == Order::Descending;
        loop {
            let entry = if descending { self.raw.next()? } else { self.raw.prev()? };
            match entry {
                None => {
                    self.current = None;
                    break;
                }
                Some((key, value)) => {
                    if !self.range.in_bounds(&key) {
                        self.current = None;
                        break;
                    }
                    if self.accept(&key, &value)? {
                        self.current = Some((key, value));
                        break;
                    }
                }
            }
        }
        Ok(self.current.as_ref())
    }

    /// Skip past every remaining duplicate of the current key, landing on
    /// the next distinct key's entry in range order (or `None` past the end
    /// of the range). Plain scalar and unique indexes have exactly one
    /// entry per key, so this behaves like [`Cursor::next`] on those.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset.
    pub fn key_next(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.current.is_none() {
            return Err(Error::Cursor);
        }
        let descending = self.range.order == Order::Descending;
        // Position the raw cursor at the dup `next`/`prev` would otherwise
        // step from, so a single step lands past every dup of this key.
        let _ = if descending { self.raw.dup_first()? } else { self.raw.dup_last()? };
        self.next()
    }

    /// Skip back past every preceding duplicate of the current key, landing
    /// on the previous distinct key's entry in range order.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset.
    pub fn key_prev(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.current.is_none() {
            return Err(Error::Cursor);
        }
        let descending = self.range.order == Order::Descending;
        let _ = if descending { self.raw.dup_last()? } else { self.raw.dup_first()? };
        self.prev()
    }

    /// Position at the first accepted entry whose key is exactly `key`
    /// (`exactly = true`), or at the first accepted entry `>= key`
    /// (`exactly = false`, only meaningful over an ordered index).
    ///
    /// # Errors
    /// [`Error::NoIndex`] if `exactly` is `false` and `self.range.order`
    /// is [`Order::Unsorted`].
    pub fn locate(&mut self, key: &[u8], exactly: bool) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if !exactly && self.range.order == Order::Unsorted {
            return Err(Error::NoIndex);
        }

        let mut entry = self.raw.set_range(key)?;
        if exactly {
            entry = entry.filter(|(k, _)| k == key);
        }

        self.current = match entry {
            Some((k, v)) if self.accept(&k, &v)? => Some((k, v)),
            _ => None,
        };
        Ok(self.current.as_ref())
    }

    /// Advance to the current key's next dup value.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset.
    pub fn dup_next(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.current.is_none() {
            return Err(Error::Cursor);
        }
        self.current = self.raw.dup_next()?;
        Ok(self.current.as_ref())
    }

    /// Step back to the current key's previous dup value.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset.
    pub fn dup_prev(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.current.is_none() {
            return Err(Error::Cursor);
        }
        self.current = self.raw.dup_prev()?;
        Ok(self.current.as_ref())
    }

    /// Jump to the first dup value of the current key.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset.
    pub fn dup_first(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.current.is_none() {
            return Err(Error::Cursor);
        }
        self.current = self.raw.dup_first()?;
        Ok(self.current.as_ref())
    }

    /// Jump to the last dup value of the current key.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset.
    pub fn dup_last(&mut self) -> Result<Option<&(Vec<u8>, Vec<u8>)>> {
        if self.current.is_none() {
            return Err(Error::Cursor);
        }
        self.current = self.raw.dup_last()?;
        Ok(self.current.as_ref())
    }

    /// The key at the current position.
    #[must_use]
    pub fn key(&self) -> Option<&[u8]> {
        self.current.as_ref().map(|(k, _)| k.as_slice())
    }

    /// The row decoded from the current position's value.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset; propagates [`Row::from_bytes`]'s errors.
    pub fn get(&self) -> Result<Row> {
        let (_, value) = self.current.as_ref().ok_or(Error::Cursor)?;
        Row::from_bytes(value)
    }

    /// Whether the cursor has run past the end of its range.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.current.is_none()
    }

    /// The number of duplicates sharing the current key (1 on a unique
    /// index, where every key has exactly one value). Leaves the cursor
    /// positioned on the same entry it started on.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset.
    pub fn dups(&mut self) -> Result<usize> {
        let (current_key, current_value) = self.current.clone().ok_or(Error::Cursor)?;

        let mut n = 0;
        let mut entry = self.raw.dup_first()?;
        while let Some((k, _)) = &entry {
            if k.as_slice() != current_key.as_slice() {
                break;
            }
            n += 1;
            entry = self.raw.dup_next()?;
        }

        // Counting walked the raw cursor past the entry this `Cursor` still
        // considers current; walk back to it so a subsequent `next`/`prev`
        // resumes from the right physical position.
        let mut restore = self.raw.dup_first()?;
        while let Some((k, v)) = &restore {
            if k.as_slice() == current_key.as_slice() && v.as_slice() == current_value.as_slice() {
                break;
            }
            restore = self.raw.dup_next()?;
        }

        Ok(n)
    }

    /// Count entries the range+filter currently accepts, up to `limit` (if
    /// given), consuming and resetting this cursor's position in the
    /// process.
    pub fn count(&mut self, limit: Option<usize>) -> Result<usize> {
        let mut n = 0;
        let mut entry = self.first()?.is_some();
        while entry {
            n += 1;
            if limit.is_some_and(|limit| n >= limit) {
                break;
            }
            entry = self.next()?.is_some();
        }
        Ok(n)
    }

    /// Overwrite the current entry's value, provided `new_row` still
    /// derives the same key for `column` under `table` — only valid over a
    /// cursor iterating a single index's sub-database.
    ///
    /// # Errors
    /// - [`Error::Cursor`] if unset.
    /// - [`Error::KeyMismatch`] if `new_row` would derive a different key
    ///   for `column`.
    pub fn update(&mut self, table: &TableDescriptor, column: &ColumnDescriptor, new_row: &Row) -> Result<()> {
        let (current_key, _) = self.current.clone().ok_or(Error::Cursor)?;
        let derived = ops::index_key(table, column, new_row)?;
        if derived != current_key {
            return Err(Error::KeyMismatch);
        }
        let bytes = new_row.to_bytes();
        self.raw.put_at_current(&bytes)?;
        self.current = Some((current_key, bytes));
        Ok(())
    }

    /// Delete the entry at the current position. Per the unset-on-delete
    /// policy, the cursor is left unset: call a positioning method again
    /// before further navigation.
    ///
    /// # Errors
    /// [`Error::Cursor`] if unset.
    pub fn delete(&mut self) -> Result<()> {
        if self.current.is_none() {
            return Err(Error::Cursor);
        }
        self.raw.del_at_current()?;
        self.current = None;
        Ok(())
    }
}

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        keycode::{ColumnType, Direction},
        row::RowBuilder,
        schema::{Catalog, ColumnDescriptor as CD, IndexDescriptor},
    };

    /// An in-memory `RawCursor` over a sorted `Vec`, standing in for a
    /// real `libmdbx` cursor in these tests.
    struct VecCursor {
        entries: Vec<(Vec<u8>, Vec<u8>)>,
        pos: Option<usize>,
    }

    impl VecCursor {
        fn new(mut entries: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Self { entries, pos: None }
        }

        fn at(&self, i: usize) -> Option<(Vec<u8>, Vec<u8>)> {
            self.entries.get(i).cloned()
        }
    }

    impl RawCursor for VecCursor {
        fn first(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            self.pos = if self.entries.is_empty() { None } else { Some(0) };
            Ok(self.pos.and_then(|i| self.at(i)))
        }
        fn last(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            self.pos = self.entries.len().checked_sub(1);
            Ok(self.pos.and_then(|i| self.at(i)))
        }
        fn next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            let next = self.pos.map_or(0, |p| p + 1);
            self.pos = if next < self.entries.len() { Some(next) } else { None };
            Ok(self.pos.and_then(|i| self.at(i)))
        }
        fn prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            self.pos = match self.pos {
                Some(0) | None => None,
                Some(p) => Some(p - 1),
            };
            Ok(self.pos.and_then(|i| self.at(i)))
        }
        fn set_range(&mut self, key: &[u8]) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            let found = self.entries.iter().position(|(k, _)| k.as_slice() >= key);
            self.pos = found;
            Ok(self.pos.and_then(|i| self.at(i)))
        }
        fn current(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            Ok(self.pos.and_then(|i| self.at(i)))
        }
        fn dup_next(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            self.next()
        }
        fn dup_prev(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            self.prev()
        }
        fn dup_first(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            self.current()
        }
        fn dup_last(&mut self) -> Result<Option<(Vec<u8>, Vec<u8>)>> {
            self.current()
        }
        fn put_at_current(&mut self, value: &[u8]) -> Result<()> {
            let i = self.pos.ok_or(Error::Cursor)?;
            self.entries[i].1 = value.to_vec();
            Ok(())
        }
        fn del_at_current(&mut self) -> Result<()> {
            let i = self.pos.ok_or(Error::Cursor)?;
            self.entries.remove(i);
            self.pos = None;
            Ok(())
        }
    }

    fn row_with_col2(col2: u64) -> Vec<u8> {
        let mut builder = RowBuilder::new();
        builder.upsert_column(0, crate::keycode::Value::U64(col2)).unwrap();
        builder.upsert_column(2, crate::keycode::Value::U64(col2)).unwrap();
        builder.finalize().to_bytes()
    }

    fn entries_with_varied_col2() -> Vec<(Vec<u8>, Vec<u8>)> {
        (0..20_u64).map(|i| (i.to_be_bytes().to_vec(), row_with_col2(i % 4))).collect()
    }

    #[test]
    fn ascending_iteration_visits_everything_in_order() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let mut cursor = Cursor::new(raw, Range::full(), None);
        let mut keys = Vec::new();
        let mut entry = cursor.first().unwrap().cloned();
        while let Some((k, _)) = entry {
            keys.push(k);
            entry = cursor.next().unwrap().cloned();
        }
        assert_eq!(keys.len(), 20);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn filter_col_eq_yields_expected_subset() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let filter = FilterNode::Leaf(Predicate::Column {
            slot: 2,
            op: CmpOp::Eq,
            value: crate::keycode::Value::U64(3),
        });
        let mut cursor = Cursor::new(raw, Range::full(), Some(filter));
        assert_eq!(cursor.count(None).unwrap(), 5);
    }

    /// Scenario 4: `col_1 ∈ [0,41]`, `col_2 = (n+3) mod 5`; filtering
    /// `col_2 == 3` over the full range yields exactly the 9 rows where
    /// `(n+3) % 5 == 3`.
    #[test]
    fn scenario_filter_col2_eq_three_over_full_range() {
        let entries: Vec<(Vec<u8>, Vec<u8>)> = (0..42_u64)
            .map(|n| {
                let col2 = (n + 3) % 5;
                let mut builder = RowBuilder::new();
                builder.upsert_column(1, crate::keycode::Value::U64(n)).unwrap();
                builder.upsert_column(2, crate::keycode::Value::U64(col2)).unwrap();
                (n.to_be_bytes().to_vec(), builder.finalize().to_bytes())
            })
            .collect();
        let expected = (0..42_u64).filter(|n| (n + 3) % 5 == 3).count();
        assert_eq!(expected, 9);

        let raw = VecCursor::new(entries);
        let filter = FilterNode::Leaf(Predicate::Column {
            slot: 2,
            op: CmpOp::Eq,
            value: crate::keycode::Value::U64(3),
        });
        let mut cursor = Cursor::new(raw, Range::full(), Some(filter));
        assert_eq!(cursor.count(None).unwrap(), 9);
    }

    #[test]
    fn descending_order_reverses_iteration() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let range = Range { order: Order::Descending, ..Range::full() };
        let mut cursor = Cursor::new(raw, range, None);
        let first = cursor.first().unwrap().unwrap().0.clone();
        assert_eq!(first, 19_u64.to_be_bytes().to_vec());
    }

    #[test]
    fn locate_exactly_false_seeks_lower_bound() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let mut cursor = Cursor::new(raw, Range::full(), None);
        let found = cursor.locate(&7_u64.to_be_bytes(), false).unwrap().unwrap().0.clone();
        assert_eq!(found, 7_u64.to_be_bytes().to_vec());
    }

    #[test]
    fn delete_then_navigate_requires_reseek() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let mut cursor = Cursor::new(raw, Range::full(), None);
        cursor.first().unwrap();
        cursor.delete().unwrap();
        assert!(cursor.eof());
        assert!(matches!(cursor.get(), Err(Error::Cursor)));
        assert!(cursor.first().unwrap().is_some(), "reseek succeeds after delete");
    }

    #[test]
    fn update_rejects_key_changing_value() {
        let mut catalog = Catalog::new();
        let columns = vec![CD {
            name: "pk".into(),
            slot: 0,
            column_type: ColumnType::U64,
            index: Some(IndexDescriptor {
                primary: true,
                unique: true,
                ordered: true,
                direction: Direction::Obverse,
                nullable: false,
                composite_components: None,
                tersely: false,
            }),
        }];
        let table = catalog.create_table("t", columns).unwrap().clone();
        let pk_column = table.primary_column().clone();

        let raw = VecCursor::new(vec![(0_u64.to_be_bytes().to_vec(), row_with_col2(0))]);
        let mut cursor = Cursor::new(raw, Range::full(), None);
        cursor.first().unwrap();

        let mut builder = RowBuilder::new();
        builder.upsert_column(0, crate::keycode::Value::U64(1)).unwrap();
        let mismatched = builder.finalize();

        assert!(matches!(cursor.update(&table, &pk_column, &mismatched), Err(Error::KeyMismatch)));
    }

    #[test]
    fn last_and_prev_mirror_first_and_next() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let mut cursor = Cursor::new(raw, Range::full(), None);
        let last = cursor.last().unwrap().unwrap().0.clone();
        assert_eq!(last, 19_u64.to_be_bytes().to_vec());

        let mut keys = Vec::new();
        let mut entry = cursor.current.clone();
        while let Some((k, _)) = entry {
            keys.push(k);
            entry = cursor.prev().unwrap().cloned();
        }
        assert_eq!(keys.len(), 20);
        assert!(keys.windows(2).all(|w| w[0] > w[1]), "prev() walks strictly descending");
    }

    #[test]
    fn last_and_prev_over_descending_range_mirror_ascending_walk() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let range = Range { order: Order::Descending, ..Range::full() };
        let mut cursor = Cursor::new(raw, range, None);
        let last = cursor.last().unwrap().unwrap().0.clone();
        assert_eq!(last, 0_u64.to_be_bytes().to_vec(), "descending order's last is the smallest key");

        let next_after_last = cursor.prev().unwrap().unwrap().0.clone();
        assert_eq!(next_after_last, 1_u64.to_be_bytes().to_vec());
    }

    #[test]
    fn prev_without_prior_position_behaves_like_last() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let mut cursor = Cursor::new(raw, Range::full(), None);
        let via_prev = cursor.prev().unwrap().unwrap().0.clone();
        assert_eq!(via_prev, 19_u64.to_be_bytes().to_vec());
    }

    /// `VecCursor` has no duplicate-key groups (every row's PK is unique),
    /// so `dups()` degenerates to 1 and `key_next`/`key_prev` degenerate to
    /// plain `next`/`prev` — exactly the unique-index case the spec calls
    /// out.
    #[test]
    fn dups_is_one_and_key_moves_match_plain_moves_on_a_unique_index() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let mut cursor = Cursor::new(raw, Range::full(), None);
        cursor.first().unwrap();
        assert_eq!(cursor.dups().unwrap(), 1);

        let via_key_next = cursor.key_next().unwrap().unwrap().0.clone();
        assert_eq!(via_key_next, 1_u64.to_be_bytes().to_vec());

        let via_key_prev = cursor.key_prev().unwrap().unwrap().0.clone();
        assert_eq!(via_key_prev, 0_u64.to_be_bytes().to_vec());
    }

    #[test]
    fn dup_prev_steps_back_within_current_key_group() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let mut cursor = Cursor::new(raw, Range::full(), None);
        cursor.first().unwrap();
        let first_key = cursor.current.as_ref().unwrap().0.clone();
        // VecCursor's stand-in for dup navigation walks plain next/prev, so
        // stepping forward then back within "the same key's dups" returns
        // to the entry `dup_prev` started from.
        cursor.dup_next().unwrap();
        let back = cursor.dup_prev().unwrap().unwrap().0.clone();
        assert_eq!(back, first_key);
    }

    #[test]
    fn count_respects_limit() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let mut cursor = Cursor::new(raw, Range::full(), None);
        assert_eq!(cursor.count(Some(3)).unwrap(), 3);

        let raw = VecCursor::new(entries_with_varied_col2());
        let mut unbounded = Cursor::new(raw, Range::full(), None);
        assert_eq!(unbounded.count(None).unwrap(), 20);
    }

    /// `begin,epsilon` ascending: just the first row in key order.
    #[test]
    fn epsilon_begin_yields_only_first_row_ascending() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let range = Range::new(RangeBound::Unbounded, RangeBound::Epsilon, Order::Ascending, false, false);
        let mut cursor = Cursor::new(raw, range, None);
        assert_eq!(cursor.first().unwrap().unwrap().0, 0_u64.to_be_bytes().to_vec());
        assert!(cursor.next().unwrap().is_none());
    }

    /// `begin,epsilon` descending: just the first row walking backward, i.e.
    /// the largest key.
    #[test]
    fn epsilon_begin_yields_only_first_row_descending() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let range = Range::new(RangeBound::Unbounded, RangeBound::Epsilon, Order::Descending, false, false);
        let mut cursor = Cursor::new(raw, range, None);
        assert_eq!(cursor.first().unwrap().unwrap().0, 19_u64.to_be_bytes().to_vec());
        assert!(cursor.next().unwrap().is_none());
    }

    /// `value,epsilon`: only the row at that exact key, regardless of what
    /// else is in range.
    #[test]
    fn epsilon_value_matches_only_the_exact_key() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let key = 7_u64.to_be_bytes().to_vec();
        let range = Range::new(RangeBound::Included(key.clone()), RangeBound::Epsilon, Order::Ascending, false, false);
        let mut cursor = Cursor::new(raw, range, None);
        assert_eq!(cursor.first().unwrap().unwrap().0, key);
        assert!(cursor.next().unwrap().is_none());
    }

    /// `value,epsilon` against a key that doesn't exist finds nothing.
    #[test]
    fn epsilon_value_missing_key_yields_nothing() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let key = 9999_u64.to_be_bytes().to_vec();
        let range = Range::new(RangeBound::Included(key), RangeBound::Epsilon, Order::Ascending, false, false);
        let mut cursor = Cursor::new(raw, range, None);
        assert!(cursor.first().unwrap().is_none());
    }

    /// `epsilon,end`: the mirror of `begin,epsilon` — just the last row in
    /// key order, reachable via either `first()` or `last()`.
    #[test]
    fn epsilon_end_yields_only_last_row() {
        let raw = VecCursor::new(entries_with_varied_col2());
        let range = Range::new(RangeBound::Epsilon, RangeBound::Unbounded, Order::Ascending, false, false);
        let mut cursor = Cursor::new(raw, range, None);
        assert_eq!(cursor.first().unwrap().unwrap().0, 19_u64.to_be_bytes().to_vec());
        assert!(cursor.next().unwrap().is_none());

        let raw = VecCursor::new(entries_with_varied_col2());
        let range = Range::new(RangeBound::Epsilon, RangeBound::Unbounded, Order::Ascending, false, false);
        let mut via_last = Cursor::new(raw, range, None);
        assert_eq!(via_last.last().unwrap().unwrap().0, 19_u64.to_be_bytes().to_vec());
    }
}
