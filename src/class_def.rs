//! Per-message class definitions ("traits")
//!
//! An AMF3 object is preceded by a trait descriptor: a class name, an
//! encoding mode, and an ordered attribute list. Two objects that share
//! the same `(name, encoding, attrs)` share one trait-table entry within a
//! message, exactly like strings share the string table.

/// How an object's attributes are laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// Sealed attributes only, in declared order.
    Static,
    /// Sealed attributes, then zero or more dynamic key/value pairs.
    Dynamic,
    /// Opaque bytes produced/consumed by the alias's read/write hooks.
    Externalizable,
}

/// A trait descriptor: class name (empty = anonymous), encoding mode, and
/// declared attribute order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassDefinition {
    pub name: String,
    pub encoding: Encoding,
    pub attrs: Vec<String>,
}

impl ClassDefinition {
    /// The anonymous, dynamic class definition used for objects with no
    /// registered alias: empty name, `Dynamic` mode, and declared
    /// attribute names drawn straight from the instance being described
    /// (in stable iteration order).
    pub fn anonymous(attrs: Vec<String>) -> Self {
        Self {
            name: String::new(),
            encoding: Encoding::Dynamic,
            attrs,
        }
    }

    /// Whether this definition names no class (the generic property-bag
    /// fallback).
    pub fn is_anonymous(&self) -> bool {
        self.name.is_empty()
    }
}
