//! AMF3 decoder
//!
//! The mirror image of [`crate::encoder::Encoder`]: reads a tagged value
//! at the cursor, advancing it, and populates a [`ReferenceContext`] in
//! the same order the encoder would have, so table indices line up.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::bytestream::ByteStream;
use crate::class_def::{ClassDefinition, Encoding};
use crate::context::ReferenceContext;
use crate::error::{AmfError, Result};
use crate::markers;
use crate::class_registry as registry;
use crate::u29;
use crate::value::{AmfArray, AmfObject, Value};

/// Upper bound on decoder recursion, matching the teacher's
/// `MAX_NESTING_DEPTH` (`amf/amf3.rs`).
const MAX_NESTING_DEPTH: usize = 64;

/// Reads values from a [`ByteStream`] through a borrowed [`ReferenceContext`].
pub struct Decoder<'a> {
    stream: &'a mut ByteStream,
    context: &'a mut ReferenceContext,
    depth: usize,
}

impl<'a> Decoder<'a> {
    pub fn new(stream: &'a mut ByteStream, context: &'a mut ReferenceContext) -> Self {
        Self { stream, context, depth: 0 }
    }

    /// Read the next type tag without otherwise consuming the value.
    pub fn read_type(&mut self) -> Result<u8> {
        let tag = self.stream.read_u8()?;
        match tag {
            markers::UNDEFINED
            | markers::NULL
            | markers::FALSE
            | markers::TRUE
            | markers::INTEGER
            | markers::DOUBLE
            | markers::STRING
            | markers::XML_DOC
            | markers::DATE
            | markers::ARRAY
            | markers::OBJECT
            | markers::XML
            | markers::BYTE_ARRAY => Ok(tag),
            other => Err(AmfError::Decode(format!("unknown AMF3 type tag {other:#04x}"))),
        }
    }

    /// Read one tagged value at the cursor, advancing past it.
    pub fn read_element(&mut self) -> Result<Value> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(AmfError::Decode("nesting depth exceeded".into()));
        }
        let result = self.read_value();
        self.depth -= 1;
        result
    }

    fn read_value(&mut self) -> Result<Value> {
        let tag = self.read_type()?;
        match tag {
            markers::UNDEFINED => Ok(Value::Undefined),
            markers::NULL => Ok(Value::Null),
            markers::FALSE => Ok(Value::Boolean(false)),
            markers::TRUE => Ok(Value::Boolean(true)),
            markers::INTEGER => Ok(Value::Integer(u29::decode_signed(self.stream)?)),
            markers::DOUBLE => Ok(Value::Double(self.stream.read_f64()?)),
            markers::STRING => Ok(Value::String(self.read_referenceable_string()?)),
            markers::XML => Ok(Value::xml_string(self.read_referenceable_string()?)),
            markers::DATE => self.read_date(),
            markers::BYTE_ARRAY => self.read_byte_array(),
            markers::XML_DOC => self.read_xml_document(),
            markers::ARRAY => self.read_array(),
            markers::OBJECT => self.read_object(),
            other => Err(AmfError::Decode(format!("unhandled AMF3 type tag {other:#04x}"))),
        }
    }

    /// Read a name/key with no leading type tag (see
    /// [`crate::encoder::Encoder::write_bare_string`]): inline or a
    /// back-reference into the same string table `Value::String` shares.
    fn read_bare_string(&mut self) -> Result<String> {
        let header = u29::decode(self.stream)?;
        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            return Ok(self.context.get_string(idx)?.to_string());
        }
        let len = (header >> 1) as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.stream.read_bytes(len)?;
        let s = String::from_utf8(bytes).map_err(|e| AmfError::Decode(format!("invalid UTF-8 in key: {e}")))?;
        self.context.add_string(s.clone())?;
        Ok(s)
    }

    /// Read a `String`/`XmlString` body (tag already consumed): inline or
    /// a back-reference into the string table.
    fn read_referenceable_string(&mut self) -> Result<String> {
        let header = u29::decode(self.stream)?;
        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            return Ok(self.context.get_string(idx)?.to_string());
        }
        let len = (header >> 1) as usize;
        if len == 0 {
            return Ok(String::new());
        }
        let bytes = self.stream.read_bytes(len)?;
        let s = String::from_utf8(bytes).map_err(|e| AmfError::Decode(format!("invalid UTF-8: {e}")))?;
        self.context.add_string(s.clone())?;
        Ok(s)
    }

    fn read_date(&mut self) -> Result<Value> {
        let header = u29::decode(self.stream)?;
        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            return match self.context.get_object(idx)? {
                v @ Value::Date(_) => Ok(v),
                _ => Err(AmfError::Reference(format!("object index {idx} is not a Date"))),
            };
        }
        let ts = self.stream.read_f64()?;
        let value = Value::Date(ts);
        self.context.add_object(value.clone());
        Ok(value)
    }

    fn read_byte_array(&mut self) -> Result<Value> {
        let header = u29::decode(self.stream)?;
        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            return match self.context.get_object(idx)? {
                v @ Value::ByteArray(_) => Ok(v),
                _ => Err(AmfError::Reference(format!("object index {idx} is not a ByteArray"))),
            };
        }
        let len = (header >> 1) as usize;
        let bytes = self.stream.read_bytes(len)?;
        let value = Value::byte_array(bytes);
        self.context.add_object(value.clone());
        Ok(value)
    }

    fn read_xml_document(&mut self) -> Result<Value> {
        let header = u29::decode(self.stream)?;
        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            return match self.context.get_object(idx)? {
                v @ Value::XmlDocument(_) => Ok(v),
                _ => Err(AmfError::Reference(format!("object index {idx} is not an XmlDocument"))),
            };
        }
        let len = (header >> 1) as usize;
        let bytes = self.stream.read_bytes(len)?;
        let s = String::from_utf8(bytes).map_err(|e| AmfError::Decode(format!("invalid UTF-8: {e}")))?;
        let value = Value::xml_document(s);
        self.context.add_object(value.clone());
        Ok(value)
    }

    fn read_array(&mut self) -> Result<Value> {
        let header = u29::decode(self.stream)?;
        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            return match self.context.get_object(idx)? {
                v @ Value::Array(_) => Ok(v),
                _ => Err(AmfError::Reference(format!("object index {idx} is not an Array"))),
            };
        }
        let dense_count = (header >> 1) as usize;

        let rc = Rc::new(RefCell::new(AmfArray::new()));
        let value = Value::Array(rc.clone());
        self.context.add_object(value.clone());

        loop {
            let key = self.read_bare_string()?;
            if key.is_empty() {
                break;
            }
            let val = self.read_element()?;
            rc.borrow_mut().keyed.insert(key, val);
        }
        for _ in 0..dense_count {
            let val = self.read_element()?;
            rc.borrow_mut().dense.push(val);
        }

        Ok(value)
    }

    fn read_object(&mut self) -> Result<Value> {
        let header = u29::decode(self.stream)?;
        if header & 1 == 0 {
            let idx = (header >> 1) as usize;
            return match self.context.get_object(idx)? {
                v @ Value::Object(_) => Ok(v),
                _ => Err(AmfError::Reference(format!("object index {idx} is not an Object"))),
            };
        }

        let rc = Rc::new(RefCell::new(AmfObject::new(ClassDefinition::anonymous(vec![]), IndexMap::new())));
        let value = Value::Object(rc.clone());
        self.context.add_object(value.clone());

        let class_inline = (header >> 1) & 1 == 1;
        let class = if !class_inline {
            let class_idx = (header >> 2) as usize;
            self.context.get_class(class_idx)?
        } else {
            let externalizable = (header >> 2) & 1 == 1;
            let dynamic = (header >> 3) & 1 == 1;
            let n_attrs = (header >> 4) as usize;

            let name = self.read_bare_string()?;
            let encoding = if externalizable {
                Encoding::Externalizable
            } else if dynamic {
                Encoding::Dynamic
            } else {
                Encoding::Static
            };
            let mut attrs = Vec::new();
            if encoding != Encoding::Externalizable {
                for _ in 0..n_attrs {
                    attrs.push(self.read_bare_string()?);
                }
            }
            let class = ClassDefinition { name, encoding, attrs };
            self.context.add_class(class.clone());
            class
        };

        if !class.is_anonymous() && class.encoding != Encoding::Externalizable {
            // A named, non-externalizable class still needs a registered
            // alias on decode so the caller's attribute expectations hold
            // (see `SPEC_FULL.md` §4.8); anonymous class defs always fall
            // back to the generic attribute bag.
            registry::require(&class.name)?;
        }

        rc.borrow_mut().class = class.clone();

        match class.encoding {
            Encoding::Static => {
                for name in &class.attrs {
                    let val = self.read_element()?;
                    rc.borrow_mut().attrs.insert(name.clone(), val);
                }
            }
            Encoding::Dynamic => {
                for name in &class.attrs {
                    let val = self.read_element()?;
                    rc.borrow_mut().attrs.insert(name.clone(), val);
                }
                loop {
                    let tag = self.read_type()?;
                    if tag != markers::STRING {
                        return Err(AmfError::Decode(format!(
                            "expected a String-tagged dynamic member key, got tag {tag:#04x}"
                        )));
                    }
                    let key = self.read_referenceable_string()?;
                    if key.is_empty() {
                        break;
                    }
                    let val = self.read_element()?;
                    rc.borrow_mut().attrs.insert(key, val);
                }
            }
            Encoding::Externalizable => {
                let entry = registry::require(&class.name)?;
                let hooks = entry
                    .hooks
                    .ok_or_else(|| AmfError::Decode(format!("'{}' has no externalizable read hook", class.name)))?;
                let mut populated = hooks.read_external(self.stream)?;
                populated.class = class.clone();
                *rc.borrow_mut() = populated;
            }
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_def::Encoding;
    use crate::encoder::Encoder;
    use crate::value::AmfObject;

    fn roundtrip(value: &Value) -> Value {
        let mut stream = ByteStream::new();
        let mut enc_ctx = ReferenceContext::new();
        Encoder::new(&mut stream, &mut enc_ctx).write_element(value).unwrap();

        stream.seek(0);
        let mut dec_ctx = ReferenceContext::new();
        Decoder::new(&mut stream, &mut dec_ctx).read_element().unwrap()
    }

    #[test]
    fn scalars_roundtrip() {
        assert_eq!(roundtrip(&Value::Null), Value::Null);
        assert_eq!(roundtrip(&Value::Boolean(true)), Value::Boolean(true));
        assert_eq!(roundtrip(&Value::Integer(-3_422_345)), Value::Integer(-3_422_345));
        assert_eq!(roundtrip(&Value::Double(0.1)), Value::Double(0.1));
        assert_eq!(roundtrip(&Value::String("hello".into())), Value::String("hello".into()));
    }

    #[test]
    fn large_integer_promotes_to_double_and_roundtrips() {
        let big = Value::Integer(1 << 30);
        let decoded = roundtrip(&big);
        assert_eq!(decoded, Value::Double((1u32 << 30) as f64));
    }

    #[test]
    fn array_roundtrips_with_mixed_parts() {
        let mut arr = AmfArray::from_dense(vec![Value::Integer(1), Value::Integer(2)]);
        arr.keyed.insert("label".into(), Value::String("x".into()));
        let value = Value::array(arr);
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn dynamic_object_roundtrips() {
        let class = ClassDefinition {
            name: "abc.xyz".into(),
            encoding: Encoding::Dynamic,
            attrs: vec!["foo".into()],
        };
        let mut attrs = IndexMap::new();
        attrs.insert("foo".into(), Value::String("bar".into()));
        attrs.insert("extra".into(), Value::Integer(7));
        let value = Value::object(AmfObject::new(class, attrs));
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn anonymous_object_roundtrips() {
        let mut attrs = IndexMap::new();
        attrs.insert("a".into(), Value::Integer(1));
        attrs.insert("b".into(), Value::String("two".into()));
        let value = Value::object(AmfObject::anonymous(attrs));
        assert_eq!(roundtrip(&value), value);
    }

    #[test]
    fn shared_array_reference_preserves_identity() {
        let shared = Value::array(AmfArray::from_dense(vec![Value::Integer(1)]));
        let mut outer = AmfArray::new();
        outer.dense.push(shared.clone());
        outer.dense.push(shared);
        let value = Value::array(outer);

        let decoded = roundtrip(&value);
        if let Value::Array(outer_rc) = decoded {
            let outer = outer_rc.borrow();
            if let (Value::Array(a), Value::Array(b)) = (&outer.dense[0], &outer.dense[1]) {
                assert!(Rc::ptr_eq(a, b), "decoder must preserve shared identity");
            } else {
                panic!("expected nested arrays");
            }
        } else {
            panic!("expected array");
        }
    }

    #[test]
    fn unknown_named_class_fails_without_registration() {
        let class = ClassDefinition {
            name: "unregistered.Thing".into(),
            encoding: Encoding::Dynamic,
            attrs: vec![],
        };
        let value = Value::object(AmfObject::new(class, IndexMap::new()));

        let mut stream = ByteStream::new();
        let mut enc_ctx = ReferenceContext::new();
        Encoder::new(&mut stream, &mut enc_ctx).write_element(&value).unwrap();

        stream.seek(0);
        let mut dec_ctx = ReferenceContext::new();
        assert!(matches!(
            Decoder::new(&mut stream, &mut dec_ctx).read_element(),
            Err(AmfError::UnknownClassAlias(_))
        ));
    }

    #[test]
    fn unknown_tag_fails() {
        let mut stream = ByteStream::from_bytes(vec![0xFF]);
        let mut ctx = ReferenceContext::new();
        assert!(matches!(
            Decoder::new(&mut stream, &mut ctx).read_element(),
            Err(AmfError::Decode(_))
        ));
    }
}
