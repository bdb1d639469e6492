//! Value-to-key codec.
//!
//! Encodes typed column values into byte strings whose `memcmp` order
//! matches the logical order declared by an index's
//! [`Direction`]/ordered-ness. This is the only place in the crate that
//! knows how to turn a [`Value`] into bytes suitable for a `libmdbx` key.
//!
//! ## Nullable fixed-width columns
//!
//! A nullable fixed-width integer/datetime/fixed-binary column reserves
//! the all-zero raw pattern for NULL and shifts every real value up by
//! one (a safe big-endian increment, [`Error::OutOfDomain`] if the value
//! was already at the type's natural maximum — that one value becomes
//! unrepresentable in a nullable column, a deliberate, documented domain
//! reduction rather than a silent overflow). This places NULL below every
//! real value pre-direction, so the existing obverse/reverse transform
//! (which already inverts order correctly) puts NULL first under
//! [`Direction::Obverse`] and last under [`Direction::Reverse`] with no
//! extra casework.
//!
//! Floats don't need this: [`DENIL_F32_BITS`]/[`DENIL_F64_BITS`] are NaN
//! payloads ordinary arithmetic never produces, and already sort below
//! every finite/infinite value once run through [`float_order_bits_u32`]/
//! [`float_order_bits_u64`] — no domain reduction required.
//!
//! Nullable variable-length columns (`bin_var`/`cstr_var`) encode NULL as
//! zero bytes, identical to a present-but-empty value — an accepted
//! ambiguity at this layer; [`crate::composite`] adds an explicit
//! presence marker where the distinction matters.
//!
//! [`DENIL_F32_BITS`]: crate::constants::DENIL_F32_BITS
//! [`DENIL_F64_BITS`]: crate::constants::DENIL_F64_BITS

use crate::{
    constants::{DENIL_F32_BITS, DENIL_F64_BITS, LONG_KEY_HASH_BYTES, MAX_KEYLEN},
    error::{Error, Result},
};

//---------------------------------------------------------------------------------------------------- ColumnType
/// The closed set of column types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ColumnType {
    U16,
    U32,
    U64,
    I32,
    I64,
    F32,
    F64,
    DateTime,
    Bin96,
    Bin128,
    Bin160,
    Bin256,
    BinVar,
    CstrVar,
    /// A virtual column derived from >= 2 other columns; never encoded
    /// directly through this module (see [`crate::composite`]).
    Composite,
}

impl ColumnType {
    /// Fixed byte length for fixed-width types, `None` for variable-length
    /// and composite types.
    #[must_use]
    pub const fn fixed_len(self) -> Option<usize> {
        match self {
            Self::U16 => Some(2),
            Self::U32 | Self::I32 | Self::F32 => Some(4),
            Self::U64 | Self::I64 | Self::F64 | Self::DateTime => Some(8),
            Self::Bin96 => Some(12),
            Self::Bin128 => Some(16),
            Self::Bin160 => Some(20),
            Self::Bin256 => Some(32),
            Self::BinVar | Self::CstrVar | Self::Composite => None,
        }
    }
}

//---------------------------------------------------------------------------------------------------- Direction
/// Declared sort direction of an index over a column.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Ascending, natural order.
    Obverse,
    /// Descending order.
    Reverse,
}

//---------------------------------------------------------------------------------------------------- Value
/// A typed column value, as passed into [`encode`]/out of [`decode`].
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    U16(u16),
    U32(u32),
    U64(u64),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    DateTime(u64),
    Bin96([u8; 12]),
    Bin128([u8; 16]),
    Bin160([u8; 20]),
    Bin256([u8; 32]),
    BinVar(Vec<u8>),
    CstrVar(Vec<u8>),
}

impl Value {
    /// The [`ColumnType`] this value is an instance of.
    #[must_use]
    pub const fn column_type(&self) -> ColumnType {
        match self {
            Self::U16(_) => ColumnType::U16,
            Self::U32(_) => ColumnType::U32,
            Self::U64(_) => ColumnType::U64,
            Self::I32(_) => ColumnType::I32,
            Self::I64(_) => ColumnType::I64,
            Self::F32(_) => ColumnType::F32,
            Self::F64(_) => ColumnType::F64,
            Self::DateTime(_) => ColumnType::DateTime,
            Self::Bin96(_) => ColumnType::Bin96,
            Self::Bin128(_) => ColumnType::Bin128,
            Self::Bin160(_) => ColumnType::Bin160,
            Self::Bin256(_) => ColumnType::Bin256,
            Self::BinVar(_) => ColumnType::BinVar,
            Self::CstrVar(_) => ColumnType::CstrVar,
        }
    }
}

//---------------------------------------------------------------------------------------------------- helpers
/// Bitwise-complement every byte; turns an ascending `memcmp` order into a
/// descending one, for fixed-width encodings (numeric or binary) alike.
/// Unlike reversing byte *order*, this preserves per-position
/// significance: `[1,2] < [1,3]` complements to `[254,253] > [254,252]`,
/// correctly inverted. The one case it doesn't perfectly invert is a
/// variable-length string that's a strict prefix of another (the shorter
/// one still sorts first either way) — accepted rather than adding a
/// length-escaping scheme.
fn complement(mut bytes: Vec<u8>) -> Vec<u8> {
    for b in &mut bytes {
        *b = !*b;
    }
    bytes
}

fn apply_direction(bytes: Vec<u8>, direction: Direction) -> Vec<u8> {
    match direction {
        Direction::Obverse => bytes,
        Direction::Reverse => complement(bytes),
    }
}

/// Encode an `f32`/`f64`'s bits so that `memcmp` on the result matches
/// IEEE-754 total order: for positive values (sign bit clear), flip only
/// the sign bit; for negative values (sign bit set), flip every bit. This
/// places `-inf .. -0 .. +0 .. +inf` in ascending byte order, with NaNs
/// at the outer ends as ordinary (if unusual) values.
fn float_order_bits_u32(bits: u32) -> u32 {
    if bits & 0x8000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000
    }
}

fn float_order_bits_u64(bits: u64) -> u64 {
    if bits & 0x8000_0000_0000_0000 != 0 {
        !bits
    } else {
        bits | 0x8000_0000_0000_0000
    }
}

fn float_order_bits_u32_inverse(ordered: u32) -> u32 {
    if ordered & 0x8000_0000 != 0 {
        ordered & 0x7FFF_FFFF
    } else {
        !ordered
    }
}

fn float_order_bits_u64_inverse(ordered: u64) -> u64 {
    if ordered & 0x8000_0000_0000_0000 != 0 {
        ordered & 0x7FFF_FFFF_FFFF_FFFF
    } else {
        !ordered
    }
}

/// Add one to a big-endian byte array in place, treating it as an
/// unsigned integer of `bytes.len() * 8` bits.
///
/// # Errors
/// [`Error::OutOfDomain`] if `bytes` was already all `0xFF` (the addition
/// would overflow the fixed width).
fn incr_be(bytes: &mut [u8]) -> Result<()> {
    for b in bytes.iter_mut().rev() {
        if *b == 0xFF {
            *b = 0;
        } else {
            *b += 1;
            return Ok(());
        }
    }
    Err(Error::OutOfDomain)
}

/// Subtract one from a big-endian byte array in place. Caller must ensure
/// `bytes` isn't all-zero (that pattern is reserved for NULL and never
/// reaches this function).
fn decr_be(bytes: &mut [u8]) {
    for b in bytes.iter_mut().rev() {
        if *b == 0 {
            *b = 0xFF;
        } else {
            *b -= 1;
            return;
        }
    }
}

fn is_all_zero(bytes: &[u8]) -> bool {
    bytes.iter().all(|b| *b == 0)
}

/// Encode a fixed-width value already in its natural big-endian,
/// ascending, obverse raw form, reserving raw-zero for NULL when
/// `nullable` (see module docs).
///
/// # Errors
/// [`Error::OutOfDomain`] if `nullable` and `raw` is already the type's
/// maximum (the one value a nullable column can't represent).
fn encode_fixed_domain(mut raw: Vec<u8>, nullable: bool, direction: Direction) -> Result<Vec<u8>> {
    if nullable {
        incr_be(&mut raw)?;
    }
    Ok(apply_direction(raw, direction))
}

/// Truncate an overlong key to `MAX_KEYLEN - LONG_KEY_HASH_BYTES` and
/// append an 8-byte CityHash64 digest of the truncated suffix, in the
/// tail byte order matching `direction`.
pub(crate) fn truncate_long_key(mut bytes: Vec<u8>, direction: Direction) -> Vec<u8> {
    if bytes.len() <= MAX_KEYLEN {
        return bytes;
    }

    let keep = MAX_KEYLEN - LONG_KEY_HASH_BYTES;
    let suffix: Vec<u8> = bytes.split_off(keep);
    let digest = cityhash_rs::cityhash_64(&suffix).to_be_bytes();

    match direction {
        Direction::Obverse => bytes.extend_from_slice(&digest),
        Direction::Reverse => bytes.extend(digest.iter().rev()),
    }

    bytes
}

//---------------------------------------------------------------------------------------------------- encode
/// Encode `value` (or `None` for a nullable column's absent value) into a
/// `memcmp`-orderable key fragment.
///
/// # Errors
/// - [`Error::TypeMismatch`] if `value`'s type doesn't match `column_type`.
/// - [`Error::ColumnMissing`] if `value` is `None` and `nullable` is
///   `false`.
/// - [`Error::OutOfDomain`] if `nullable` and the value is the one
///   reserved for NULL (a fixed-width type's natural maximum, or the
///   exact `DENIL` NaN payload for a float).
pub fn encode(
    column_type: ColumnType,
    direction: Direction,
    nullable: bool,
    value: Option<&Value>,
) -> Result<Vec<u8>> {
    let Some(value) = value else {
        return if nullable {
            Ok(encode_null(column_type, direction))
        } else {
            Err(Error::ColumnMissing)
        };
    };

    if value.column_type() != column_type {
        return Err(Error::TypeMismatch);
    }

    match value {
        Value::U16(v) => encode_fixed_domain(v.to_be_bytes().to_vec(), nullable, direction),
        Value::U32(v) => encode_fixed_domain(v.to_be_bytes().to_vec(), nullable, direction),
        Value::U64(v) => encode_fixed_domain(v.to_be_bytes().to_vec(), nullable, direction),
        Value::DateTime(v) => encode_fixed_domain(v.to_be_bytes().to_vec(), nullable, direction),
        Value::I32(v) => {
            let biased = (*v as i64 + (1_i64 << 31)) as u32;
            encode_fixed_domain(biased.to_be_bytes().to_vec(), nullable, direction)
        }
        Value::I64(v) => {
            let biased = (*v as i128 + (1_i128 << 63)) as u64;
            encode_fixed_domain(biased.to_be_bytes().to_vec(), nullable, direction)
        }
        Value::F32(v) => {
            if nullable && v.to_bits() == DENIL_F32_BITS {
                return Err(Error::OutOfDomain);
            }
            Ok(apply_direction(float_order_bits_u32(v.to_bits()).to_be_bytes().to_vec(), direction))
        }
        Value::F64(v) => {
            if nullable && v.to_bits() == DENIL_F64_BITS {
                return Err(Error::OutOfDomain);
            }
            Ok(apply_direction(float_order_bits_u64(v.to_bits()).to_be_bytes().to_vec(), direction))
        }
        Value::Bin96(b) => encode_fixed_domain(b.to_vec(), nullable, direction),
        Value::Bin128(b) => encode_fixed_domain(b.to_vec(), nullable, direction),
        Value::Bin160(b) => encode_fixed_domain(b.to_vec(), nullable, direction),
        Value::Bin256(b) => encode_fixed_domain(b.to_vec(), nullable, direction),
        Value::BinVar(b) => Ok(truncate_long_key(apply_direction(b.clone(), direction), direction)),
        Value::CstrVar(b) => Ok(truncate_long_key(apply_direction(b.clone(), direction), direction)),
    }
}

fn encode_null(column_type: ColumnType, direction: Direction) -> Vec<u8> {
    match column_type {
        ColumnType::F32 => {
            apply_direction(float_order_bits_u32(DENIL_F32_BITS).to_be_bytes().to_vec(), direction)
        }
        ColumnType::F64 => {
            apply_direction(float_order_bits_u64(DENIL_F64_BITS).to_be_bytes().to_vec(), direction)
        }
        ColumnType::BinVar | ColumnType::CstrVar | ColumnType::Composite => Vec::new(),
        _ => {
            // Reserved all-zero raw pattern, pre-direction.
            let len = column_type.fixed_len().unwrap_or(0);
            apply_direction(vec![0_u8; len], direction)
        }
    }
}

//---------------------------------------------------------------------------------------------------- decode
/// Decode a fixed-width, obverse-direction key fragment back into a typed
/// [`Value`] (or `None` if `nullable` and the fragment is NULL's reserved
/// encoding).
///
/// Per the codec's documented contract, decoding is only lossless for
/// fixed-width types encoded in [`Direction::Obverse`] — reverse-direction
/// and variable-length encodings are one-way (the engine always recovers
/// variable-length/reverse values from the stored row, not from the key).
///
/// # Errors
/// [`Error::TypeMismatch`] if `bytes` isn't the expected length for
/// `column_type`, or `direction` is [`Direction::Reverse`].
pub fn decode(
    column_type: ColumnType,
    direction: Direction,
    nullable: bool,
    bytes: &[u8],
) -> Result<Option<Value>> {
    if direction != Direction::Obverse {
        return Err(Error::TypeMismatch);
    }

    let expect = |len: usize| -> Result<()> {
        if bytes.len() == len {
            Ok(())
        } else {
            Err(Error::TypeMismatch)
        }
    };

    // Floats carry their NULL marker in the bit pattern itself, decoded
    // alongside the rest; every other fixed type reserves raw-zero.
    if nullable && !matches!(column_type, ColumnType::F32 | ColumnType::F64) {
        if let Some(len) = column_type.fixed_len() {
            expect(len)?;
            if is_all_zero(bytes) {
                return Ok(None);
            }
        }
    }

    Ok(Some(match column_type {
        ColumnType::U16 => {
            expect(2)?;
            let mut raw: [u8; 2] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            Value::U16(u16::from_be_bytes(raw))
        }
        ColumnType::U32 => {
            expect(4)?;
            let mut raw: [u8; 4] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            Value::U32(u32::from_be_bytes(raw))
        }
        ColumnType::U64 => {
            expect(8)?;
            let mut raw: [u8; 8] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            Value::U64(u64::from_be_bytes(raw))
        }
        ColumnType::DateTime => {
            expect(8)?;
            let mut raw: [u8; 8] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            Value::DateTime(u64::from_be_bytes(raw))
        }
        ColumnType::I32 => {
            expect(4)?;
            let mut raw: [u8; 4] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            let biased = u32::from_be_bytes(raw);
            Value::I32((i64::from(biased) - (1_i64 << 31)) as i32)
        }
        ColumnType::I64 => {
            expect(8)?;
            let mut raw: [u8; 8] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            let biased = u64::from_be_bytes(raw);
            Value::I64((i128::from(biased) - (1_i128 << 63)) as i64)
        }
        ColumnType::F32 => {
            expect(4)?;
            let ordered = u32::from_be_bytes(bytes.try_into().unwrap());
            let bits = float_order_bits_u32_inverse(ordered);
            if nullable && bits == DENIL_F32_BITS {
                return Ok(None);
            }
            Value::F32(f32::from_bits(bits))
        }
        ColumnType::F64 => {
            expect(8)?;
            let ordered = u64::from_be_bytes(bytes.try_into().unwrap());
            let bits = float_order_bits_u64_inverse(ordered);
            if nullable && bits == DENIL_F64_BITS {
                return Ok(None);
            }
            Value::F64(f64::from_bits(bits))
        }
        ColumnType::Bin96 => {
            expect(12)?;
            let mut raw: [u8; 12] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            Value::Bin96(raw)
        }
        ColumnType::Bin128 => {
            expect(16)?;
            let mut raw: [u8; 16] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            Value::Bin128(raw)
        }
        ColumnType::Bin160 => {
            expect(20)?;
            let mut raw: [u8; 20] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            Value::Bin160(raw)
        }
        ColumnType::Bin256 => {
            expect(32)?;
            let mut raw: [u8; 32] = bytes.try_into().unwrap();
            if nullable {
                decr_be(&mut raw);
            }
            Value::Bin256(raw)
        }
        ColumnType::BinVar | ColumnType::CstrVar | ColumnType::Composite => {
            return Err(Error::TypeMismatch)
        }
    }))
}
