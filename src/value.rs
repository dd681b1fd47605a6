//! The AMF3 value tree
//!
//! `Value` is the tagged sum every AMF3-carried datum decodes into and
//! every encode call consumes. Composite variants (`Array`, `Object`,
//! `ByteArray`, `XmlDocument`, `XmlString`) wrap their payload in `Rc` so
//! that cloning a `Value` shares the allocation rather than copying it —
//! the reference tables key off that shared identity (see
//! [`crate::context::ReferenceContext`]), mirroring the object-identity
//! dedup AMF3 expects without requiring a garbage-collected value graph.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::class_def::ClassDefinition;

/// Any value representable on the AMF3 wire.
#[derive(Debug, Clone)]
pub enum Value {
    Undefined,
    Null,
    Boolean(bool),
    /// A 29-bit signed integer, always within `[-2^28, 2^28-1]`.
    Integer(i32),
    Double(f64),
    String(String),
    /// Milliseconds since the Unix epoch.
    Date(f64),
    Array(Rc<RefCell<AmfArray>>),
    Object(Rc<RefCell<AmfObject>>),
    XmlDocument(Rc<String>),
    XmlString(Rc<String>),
    ByteArray(Rc<Vec<u8>>),
}

impl Value {
    pub fn array(array: AmfArray) -> Self {
        Value::Array(Rc::new(RefCell::new(array)))
    }

    pub fn object(object: AmfObject) -> Self {
        Value::Object(Rc::new(RefCell::new(object)))
    }

    pub fn byte_array(bytes: Vec<u8>) -> Self {
        Value::ByteArray(Rc::new(bytes))
    }

    pub fn xml_document(s: impl Into<String>) -> Self {
        Value::XmlDocument(Rc::new(s.into()))
    }

    pub fn xml_string(s: impl Into<String>) -> Self {
        Value::XmlString(Rc::new(s.into()))
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Integer(a), Value::Integer(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => *a.borrow() == *b.borrow(),
            (Value::Object(a), Value::Object(b)) => *a.borrow() == *b.borrow(),
            (Value::XmlDocument(a), Value::XmlDocument(b)) => a == b,
            (Value::XmlString(a), Value::XmlString(b)) => a == b,
            (Value::ByteArray(a), Value::ByteArray(b)) => a == b,
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

/// An AMF3 array: an ordered dense sequence plus an ordered keyed part.
///
/// The empty string is never a legal key in `keyed` (see
/// [`crate::encoder::Encoder`]); `normalize` folds a consecutive
/// integer-keyed prefix of `keyed` into `dense`, matching what a real
/// AMF3 encoder does before choosing the array's header.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmfArray {
    pub dense: Vec<Value>,
    pub keyed: IndexMap<String, Value>,
}

impl AmfArray {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_dense(dense: Vec<Value>) -> Self {
        Self {
            dense,
            keyed: IndexMap::new(),
        }
    }

    /// Fold any keyed entries whose keys are the consecutive integers
    /// `dense.len(), dense.len()+1, ...` into the dense part, in order.
    pub fn normalize(&mut self) {
        loop {
            let next_key = self.dense.len().to_string();
            match self.keyed.shift_remove(&next_key) {
                Some(v) => self.dense.push(v),
                None => break,
            }
        }
    }
}

/// A decoded or to-be-encoded AMF3 object: its trait descriptor plus an
/// ordered map of attribute name to value.
#[derive(Debug, Clone, PartialEq)]
pub struct AmfObject {
    pub class: ClassDefinition,
    pub attrs: IndexMap<String, Value>,
}

impl AmfObject {
    pub fn new(class: ClassDefinition, attrs: IndexMap<String, Value>) -> Self {
        Self { class, attrs }
    }

    /// An untyped object: declared attribute names are drawn from the
    /// instance's own keys, in iteration order.
    pub fn anonymous(attrs: IndexMap<String, Value>) -> Self {
        let names = attrs.keys().cloned().collect();
        Self {
            class: ClassDefinition::anonymous(names),
            attrs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_ignores_sharing() {
        let a = Value::array(AmfArray::from_dense(vec![Value::Integer(1)]));
        let b = Value::array(AmfArray::from_dense(vec![Value::Integer(1)]));
        assert_eq!(a, b);
    }

    #[test]
    fn cloning_shares_the_allocation() {
        let a = Value::array(AmfArray::from_dense(vec![Value::Integer(1)]));
        let b = a.clone();
        if let (Value::Array(ra), Value::Array(rb)) = (&a, &b) {
            assert!(Rc::ptr_eq(ra, rb));
        } else {
            panic!("expected arrays");
        }
    }

    #[test]
    fn normalize_folds_consecutive_integer_keys() {
        let mut arr = AmfArray::new();
        arr.keyed.insert("0".into(), Value::Integer(10));
        arr.keyed.insert("1".into(), Value::Integer(11));
        arr.keyed.insert("a".into(), Value::String("x".into()));
        arr.normalize();

        assert_eq!(arr.dense, vec![Value::Integer(10), Value::Integer(11)]);
        assert_eq!(arr.keyed.len(), 1);
        assert_eq!(arr.keyed.get("a"), Some(&Value::String("x".into())));
    }

    #[test]
    fn normalize_stops_at_gap() {
        let mut arr = AmfArray::new();
        arr.keyed.insert("0".into(), Value::Integer(1));
        arr.keyed.insert("2".into(), Value::Integer(2));
        arr.normalize();

        assert_eq!(arr.dense, vec![Value::Integer(1)]);
        assert_eq!(arr.keyed.len(), 1);
        assert!(arr.keyed.contains_key("2"));
    }
}
