//! Composite-key builder.
//!
//! A composite column is a virtual column derived from >= 2 component
//! columns; its key is never stored, only derived on demand from the
//! components of a row. [`compose`] concatenates (ordered composites) or
//! hashes (unordered composites) the component encodings produced by
//! [`crate::keycode`].

use crate::{
    error::{Error, Result},
    keycode::{self, ColumnType, Direction, Value},
};

//---------------------------------------------------------------------------------------------------- CompositeComponent
/// One column participating in a composite index, in declared order.
#[derive(Clone, Debug)]
pub struct CompositeComponent {
    pub column_type: ColumnType,
    pub nullable: bool,
}

//---------------------------------------------------------------------------------------------------- CompositeDescriptor
/// A composite index's shape: its components, and the ordering/encoding
/// mode of the composite itself (not inherited from any component's own
/// index descriptor).
#[derive(Clone, Debug)]
pub struct CompositeDescriptor {
    pub components: Vec<CompositeComponent>,
    /// `true` for a range-queryable composite (`memcmp`-ordered
    /// concatenation), `false` for an unordered (hashed) composite.
    pub ordered: bool,
    pub direction: Direction,
    /// Compact mode: elides the present-marker on variable-length
    /// components, adds one for fixed-width nullable components instead.
    /// Rejects rows where every component is absent.
    pub tersely: bool,
}

//---------------------------------------------------------------------------------------------------- compose
/// Derive a composite index's key from a row's component values.
///
/// `values[i]` is the value of `descriptor.components[i]`, or `None` if
/// that column is absent from the row.
///
/// # Errors
/// - [`Error::TypeMismatch`] if `values.len() != descriptor.components.len()`.
/// - [`Error::ColumnMissing`] if a non-nullable component is absent and
///   the composite is not `tersely`.
/// - [`Error::ColumnMissing`] if `tersely` and *every* component is
///   absent (an all-absent row is rejected outright in tersely mode).
pub fn compose(descriptor: &CompositeDescriptor, values: &[Option<&Value>]) -> Result<Vec<u8>> {
    if values.len() != descriptor.components.len() {
        return Err(Error::TypeMismatch);
    }

    if descriptor.tersely && values.iter().all(Option::is_none) {
        return Err(Error::ColumnMissing);
    }

    for (component, value) in descriptor.components.iter().zip(values) {
        if value.is_none() && !component.nullable && !descriptor.tersely {
            return Err(Error::ColumnMissing);
        }
    }

    if descriptor.ordered {
        compose_ordered(descriptor, values)
    } else {
        compose_unordered(descriptor, values)
    }
}

fn compose_ordered(descriptor: &CompositeDescriptor, values: &[Option<&Value>]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();

    for (component, value) in descriptor.components.iter().zip(values) {
        // Components always encode obverse; the composite's own
        // direction is applied once, to the whole concatenation, below —
        // a composite inherits ordering from its own index descriptor,
        // never from a component's.
        let present = value.is_some();
        buf.extend(keycode::encode(component.column_type, Direction::Obverse, component.nullable, *value)?);

        let is_variable = component.column_type.fixed_len().is_none();
        let add_marker = if descriptor.tersely { !is_variable && component.nullable } else { is_variable };
        if add_marker {
            buf.push(u8::from(present));
        }
    }

    Ok(keycode::truncate_long_key(apply_composite_direction(buf, descriptor.direction), descriptor.direction))
}

fn compose_unordered(descriptor: &CompositeDescriptor, values: &[Option<&Value>]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();

    for (component, value) in descriptor.components.iter().zip(values) {
        buf.extend(keycode::encode(component.column_type, Direction::Obverse, component.nullable, *value)?);
    }

    Ok(cityhash_rs::cityhash_64(&buf).to_be_bytes().to_vec())
}

/// Bitwise-complement the whole concatenation for a reverse-direction
/// composite. Valid for the same reason per-component complement is: it
/// preserves positional significance, so inverting the *whole* buffer
/// inverts the composite's lexicographic order without disturbing which
/// component dominates the comparison.
fn apply_composite_direction(mut bytes: Vec<u8>, direction: Direction) -> Vec<u8> {
    if direction == Direction::Reverse {
        for b in &mut bytes {
            *b = !*b;
        }
    }
    bytes
}
