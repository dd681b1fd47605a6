//! Per-message reference tables
//!
//! AMF3 deduplicates strings, composite values, and class definitions
//! within a single message by giving each a table slot the first time
//! it's seen and a compact index reference afterward. `ReferenceContext`
//! is that trio of tables; it is created once per encode or decode pass
//! and must be [`clear`](ReferenceContext::clear)ed before reuse.

use std::rc::Rc;

use crate::class_def::ClassDefinition;
use crate::error::{AmfError, Result};
use crate::value::Value;

/// The per-message string, object, and class-definition tables.
#[derive(Debug, Default)]
pub struct ReferenceContext {
    strings: Vec<String>,
    objects: Vec<Value>,
    classes: Vec<ClassDefinition>,
}

/// Whether two composite values should collapse to the same object-table
/// slot. Composites compare by the identity of their shared `Rc`
/// allocation, and `Date` — a plain scalar with no allocation to share —
/// by value. `XmlString` is deliberately absent: it shares the *string*
/// table with `Value::String` instead (see `SPEC_FULL.md` §9), so it is
/// never looked up here.
fn same_identity(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Array(a), Value::Array(b)) => Rc::ptr_eq(a, b),
        (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
        (Value::ByteArray(a), Value::ByteArray(b)) => Rc::ptr_eq(a, b),
        (Value::XmlDocument(a), Value::XmlDocument(b)) => Rc::ptr_eq(a, b),
        (Value::Date(a), Value::Date(b)) => a == b,
        _ => false,
    }
}

impl ReferenceContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all three tables, as required before starting a new pass.
    pub fn clear(&mut self) {
        self.strings.clear();
        self.objects.clear();
        self.classes.clear();
    }

    // --- strings -----------------------------------------------------

    /// Add a non-empty string to the table, returning its index.
    pub fn add_string(&mut self, s: impl Into<String>) -> Result<usize> {
        let s = s.into();
        if s.is_empty() {
            return Err(AmfError::Value("cannot add empty string to string table".into()));
        }
        let idx = self.strings.len();
        self.strings.push(s);
        Ok(idx)
    }

    /// Fetch a string by table index.
    pub fn get_string(&self, index: usize) -> Result<&str> {
        self.strings
            .get(index)
            .map(String::as_str)
            .ok_or_else(|| AmfError::Reference(format!("string index {index} out of range")))
    }

    /// Find an existing string's table index without allocating.
    pub fn find_string(&self, s: &str) -> Option<usize> {
        self.strings.iter().position(|existing| existing == s)
    }

    /// Fetch a string's table index, failing if absent.
    pub fn get_string_reference(&self, s: &str) -> Result<usize> {
        self.find_string(s)
            .ok_or_else(|| AmfError::Reference(format!("string '{s}' not in reference table")))
    }

    // --- objects -------------------------------------------------------

    /// Add a reference-tracked value (array, object, date, byte array, or
    /// XML) to the table, returning its index.
    pub fn add_object(&mut self, value: Value) -> usize {
        let idx = self.objects.len();
        self.objects.push(value);
        idx
    }

    /// Fetch a value by table index.
    pub fn get_object(&self, index: usize) -> Result<Value> {
        self.objects
            .get(index)
            .cloned()
            .ok_or_else(|| AmfError::Reference(format!("object index {index} out of range")))
    }

    /// Find an existing value's table index by its identity (see
    /// [`same_identity`]).
    pub fn find_object(&self, value: &Value) -> Option<usize> {
        self.objects.iter().position(|existing| same_identity(existing, value))
    }

    /// Fetch a value's table index, failing if absent.
    pub fn get_object_reference(&self, value: &Value) -> Result<usize> {
        self.find_object(value)
            .ok_or_else(|| AmfError::Reference("value not in object reference table".into()))
    }

    // --- class definitions ---------------------------------------------

    /// Add a class definition to the table, returning its index.
    pub fn add_class(&mut self, def: ClassDefinition) -> usize {
        let idx = self.classes.len();
        self.classes.push(def);
        idx
    }

    /// Fetch a class definition by table index.
    pub fn get_class(&self, index: usize) -> Result<ClassDefinition> {
        self.classes
            .get(index)
            .cloned()
            .ok_or_else(|| AmfError::Reference(format!("class index {index} out of range")))
    }

    /// Find an existing class definition's table index by structural
    /// identity (`name`, `encoding`, `attrs`).
    pub fn find_class(&self, def: &ClassDefinition) -> Option<usize> {
        self.classes.iter().position(|existing| existing == def)
    }

    pub fn string_count(&self) -> usize {
        self.strings.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn class_count(&self) -> usize {
        self.classes.len()
    }
}
