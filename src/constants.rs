//! Engine-wide constants.

//---------------------------------------------------------------------------------------------------- Paths
/// The directory that contains database-related files.
pub const FASTPT_DATABASE_DIR: &str = "database";

/// The actual database file name, within [`FASTPT_DATABASE_DIR`].
pub const FASTPT_DATABASE_FILE: &str = "data";

//---------------------------------------------------------------------------------------------------- Keys
/// Maximum encoded key length, in bytes, across every sub-database.
///
/// Keys longer than this are truncated and the truncated suffix replaced
/// with an 8-byte hash digest; see [`crate::keycode`].
pub const MAX_KEYLEN: usize = 511;

/// How many trailing bytes of a long key are reserved for the hash digest
/// appended by the truncation rule.
pub const LONG_KEY_HASH_BYTES: usize = 8;

//---------------------------------------------------------------------------------------------------- Catalog
/// Leading version tag of the serialized catalog record format.
pub const SCHEMA_FORMAT: u32 = 1;

/// Name of the reserved sub-database the schema catalog's
/// [`crate::schema::TableDescriptor`] records are persisted into, keyed by
/// each table's `table_id` (big-endian `u32`). Never collides with a
/// user table's own sub-database names, which are always 12 hex digits
/// (see [`crate::schema::TableDescriptor::subdb_name`]).
pub const CATALOG_TABLE_NAME: &str = "fastpt.catalog";

//---------------------------------------------------------------------------------------------------- DENIL / NaN bit patterns
/// `f32` DENIL sentinel bit pattern.
///
/// A negative quiet NaN, chosen to sit at the extreme "least" end of the
/// [`crate::keycode`] float total order.
pub const DENIL_F32_BITS: u32 = 0xFFC0_0000;

/// The quiet-signaling NaN immediately adjacent to [`DENIL_F32_BITS`] in
/// the float total order (one step towards the body of the domain).
pub const QSNAN_F32_BITS: u32 = DENIL_F32_BITS - 1;

/// `f64` DENIL sentinel bit pattern.
pub const DENIL_F64_BITS: u64 = 0xFFF8_0000_0000_0000;

/// The quiet-signaling NaN immediately adjacent to [`DENIL_F64_BITS`].
pub const QSNAN_F64_BITS: u64 = DENIL_F64_BITS - 1;

//---------------------------------------------------------------------------------------------------- Tests
#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn denil_widening_roundtrips() {
        // Widening DENIL_F32_BITS as an f64 must land exactly on
        // DENIL_F64_BITS, and narrowing it back must recover
        // DENIL_F32_BITS bit-for-bit.
        let f32_denil = f32::from_bits(DENIL_F32_BITS);
        let widened = f64::from(f32_denil);
        assert_eq!(widened.to_bits(), DENIL_F64_BITS);

        let narrowed = widened as f32;
        assert_eq!(narrowed.to_bits(), DENIL_F32_BITS);
    }

    #[test]
    fn qsnan_is_adjacent_to_denil() {
        assert_eq!(QSNAN_F32_BITS + 1, DENIL_F32_BITS);
        assert_eq!(QSNAN_F64_BITS + 1, DENIL_F64_BITS);
    }
}
