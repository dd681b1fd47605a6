//! AMF3 encoder
//!
//! Walks a [`Value`] tree and writes its AMF3 wire form to a
//! [`ByteStream`], consulting a [`ReferenceContext`] to deduplicate
//! strings, composite values, and class definitions as it goes.

use std::collections::HashSet;
use std::rc::Rc;

use crate::bytestream::ByteStream;
use crate::class_def::{ClassDefinition, Encoding};
use crate::context::ReferenceContext;
use crate::error::{AmfError, Result};
use crate::markers;
use crate::class_registry as registry;
use crate::u29;
use crate::value::{AmfArray, AmfObject, Value};

/// Upper bound on encoder recursion, matching the teacher's
/// `MAX_NESTING_DEPTH` (`amf/amf3.rs`). A true self-referential cycle
/// resolves to a back-reference before this is ever reached (composites are
/// registered in the object table before their body is written), so this
/// only guards runaway depth on legitimately deep, non-cyclic trees.
const MAX_NESTING_DEPTH: usize = 64;

/// Writes values to a [`ByteStream`] through a borrowed [`ReferenceContext`].
pub struct Encoder<'a> {
    stream: &'a mut ByteStream,
    context: &'a mut ReferenceContext,
    depth: usize,
}

impl<'a> Encoder<'a> {
    pub fn new(stream: &'a mut ByteStream, context: &'a mut ReferenceContext) -> Self {
        Self { stream, context, depth: 0 }
    }

    /// Write one value, preferring a back-reference when the value has
    /// already been seen in this context.
    pub fn write_element(&mut self, value: &Value) -> Result<()> {
        self.write_element_as(value, true)
    }

    /// Write one value. When `write_as_reference` is false, the
    /// object-reference shortcut is suppressed for this call — the inline
    /// form is always written — but the value is still appended to the
    /// table afterward, so later calls may reference it.
    pub fn write_element_as(&mut self, value: &Value, write_as_reference: bool) -> Result<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.depth -= 1;
            return Err(AmfError::Encode("nesting depth exceeded".into()));
        }
        let result = self.write_value(value, write_as_reference);
        self.depth -= 1;
        result
    }

    fn write_value(&mut self, value: &Value, write_as_reference: bool) -> Result<()> {
        match value {
            Value::Undefined => Err(AmfError::Encode("Undefined is not emittable".into())),
            Value::Null => {
                self.stream.write_u8(markers::NULL);
                Ok(())
            }
            Value::Boolean(true) => {
                self.stream.write_u8(markers::TRUE);
                Ok(())
            }
            Value::Boolean(false) => {
                self.stream.write_u8(markers::FALSE);
                Ok(())
            }
            Value::Integer(i) if (u29::SIGNED_MIN..=u29::SIGNED_MAX).contains(i) => {
                self.stream.write_u8(markers::INTEGER);
                u29::encode_signed(self.stream, *i)
            }
            Value::Integer(i) => {
                self.stream.write_u8(markers::DOUBLE);
                self.stream.write_f64(*i as f64);
                Ok(())
            }
            Value::Double(n) => {
                self.stream.write_u8(markers::DOUBLE);
                self.stream.write_f64(*n);
                Ok(())
            }
            Value::String(s) => {
                self.write_referenceable_string(markers::STRING, s, write_as_reference)
            }
            Value::XmlString(s) => {
                self.write_referenceable_string(markers::XML, s, write_as_reference)
            }
            Value::Date(ts) => self.write_date(*ts, write_as_reference),
            Value::XmlDocument(s) => self.write_xml_document(s, write_as_reference),
            Value::ByteArray(data) => self.write_byte_array(data, write_as_reference),
            Value::Array(rc) => self.write_array(rc, write_as_reference),
            Value::Object(rc) => self.write_object(rc, write_as_reference),
        }
    }

    /// Write a name/key with no leading type tag: class names, declared
    /// attribute names, and array keyed-part keys. Untagged like the
    /// teacher's `TraitDef` names, but — like every other string on the
    /// wire — shares the single string table with `Value::String`: a
    /// repeat of a previously seen string (key or value) is written as a
    /// compact back-reference.
    fn write_bare_string(&mut self, s: &str) -> Result<()> {
        if s.is_empty() {
            return u29::encode(self.stream, 1);
        }
        if let Some(idx) = self.context.find_string(s) {
            return u29::encode(self.stream, (idx as u32) << 1);
        }
        let bytes = s.as_bytes();
        u29::encode(self.stream, ((bytes.len() as u32) << 1) | 1)?;
        self.stream.write_bytes(bytes);
        self.context.add_string(s.to_string())?;
        Ok(())
    }

    /// Write a `String`/`XmlString` value: empty is always the bare
    /// literal `0x01` and never enters the table; otherwise a fresh
    /// value is appended to the string table, and a repeat is written as
    /// a compact back-reference.
    fn write_referenceable_string(&mut self, tag: u8, s: &str, write_as_reference: bool) -> Result<()> {
        self.stream.write_u8(tag);
        if s.is_empty() {
            return u29::encode(self.stream, 1);
        }
        if write_as_reference {
            if let Some(idx) = self.context.find_string(s) {
                return u29::encode(self.stream, (idx as u32) << 1);
            }
        }
        let bytes = s.as_bytes();
        u29::encode(self.stream, ((bytes.len() as u32) << 1) | 1)?;
        self.stream.write_bytes(bytes);
        self.context.add_string(s.to_string())?;
        Ok(())
    }

    fn write_date(&mut self, ts: f64, write_as_reference: bool) -> Result<()> {
        self.stream.write_u8(markers::DATE);
        let value = Value::Date(ts);
        if write_as_reference {
            if let Some(idx) = self.context.find_object(&value) {
                return u29::encode(self.stream, (idx as u32) << 1);
            }
        }
        u29::encode(self.stream, 1)?;
        self.context.add_object(value);
        self.stream.write_f64(ts);
        Ok(())
    }

    fn write_byte_array(&mut self, data: &Rc<Vec<u8>>, write_as_reference: bool) -> Result<()> {
        self.stream.write_u8(markers::BYTE_ARRAY);
        let value = Value::ByteArray(data.clone());
        if write_as_reference {
            if let Some(idx) = self.context.find_object(&value) {
                return u29::encode(self.stream, (idx as u32) << 1);
            }
        }
        u29::encode(self.stream, ((data.len() as u32) << 1) | 1)?;
        self.context.add_object(value);
        self.stream.write_bytes(data);
        Ok(())
    }

    fn write_xml_document(&mut self, s: &Rc<String>, write_as_reference: bool) -> Result<()> {
        self.stream.write_u8(markers::XML_DOC);
        let value = Value::XmlDocument(s.clone());
        if write_as_reference {
            if let Some(idx) = self.context.find_object(&value) {
                return u29::encode(self.stream, (idx as u32) << 1);
            }
        }
        let bytes = s.as_bytes();
        u29::encode(self.stream, ((bytes.len() as u32) << 1) | 1)?;
        self.context.add_object(value);
        self.stream.write_bytes(bytes);
        Ok(())
    }

    fn write_array(&mut self, rc: &Rc<std::cell::RefCell<AmfArray>>, write_as_reference: bool) -> Result<()> {
        self.stream.write_u8(markers::ARRAY);
        let value = Value::Array(rc.clone());
        if write_as_reference {
            if let Some(idx) = self.context.find_object(&value) {
                return u29::encode(self.stream, (idx as u32) << 1);
            }
        }

        rc.borrow_mut().normalize();
        let arr = rc.borrow();

        u29::encode(self.stream, ((arr.dense.len() as u32) << 1) | 1)?;
        self.context.add_object(value.clone());

        for (key, val) in arr.keyed.iter() {
            if key.is_empty() {
                return Err(AmfError::Encode("array keyed part cannot contain an empty key".into()));
            }
            self.write_bare_string(key)?;
            self.write_element(val)?;
        }
        self.write_bare_string("")?;

        for val in &arr.dense {
            self.write_element(val)?;
        }
        Ok(())
    }

    fn write_object(&mut self, rc: &Rc<std::cell::RefCell<AmfObject>>, write_as_reference: bool) -> Result<()> {
        self.stream.write_u8(markers::OBJECT);
        let value = Value::Object(rc.clone());
        if write_as_reference {
            if let Some(idx) = self.context.find_object(&value) {
                return u29::encode(self.stream, (idx as u32) << 1);
            }
        }

        self.context.add_object(value);
        let obj = rc.borrow();
        let class = obj.class.clone();

        if let Some(class_idx) = self.context.find_class(&class) {
            u29::encode(self.stream, ((class_idx as u32) << 2) | 0b01)?;
        } else {
            self.write_class_header_and_name(&class)?;
            self.context.add_class(class.clone());
        }

        match class.encoding {
            Encoding::Static => self.write_sealed_attrs(&class, &obj.attrs),
            Encoding::Dynamic => {
                self.write_sealed_attrs(&class, &obj.attrs)?;
                let sealed: HashSet<&String> = class.attrs.iter().collect();
                for (key, val) in obj.attrs.iter() {
                    if sealed.contains(key) {
                        continue;
                    }
                    self.write_referenceable_string(markers::STRING, key, true)?;
                    self.write_element(val)?;
                }
                self.write_dynamic_terminator()
            }
            Encoding::Externalizable => {
                let entry = registry::require(&class.name)?;
                let hooks = entry
                    .hooks
                    .ok_or_else(|| AmfError::Encode(format!("'{}' has no externalizable write hook", class.name)))?;
                hooks.write_external(&obj, self.stream)
            }
        }
    }

    fn write_class_header_and_name(&mut self, class: &ClassDefinition) -> Result<()> {
        let header: u32 = match class.encoding {
            Encoding::Static => ((class.attrs.len() as u32) << 4) | 0b0011,
            Encoding::Dynamic => ((class.attrs.len() as u32) << 4) | 0b1011,
            Encoding::Externalizable => 0b0111,
        };
        u29::encode(self.stream, header)?;
        self.write_bare_string(&class.name)?;
        if class.encoding != Encoding::Externalizable {
            for name in &class.attrs {
                self.write_bare_string(name)?;
            }
        }
        Ok(())
    }

    fn write_sealed_attrs(
        &mut self,
        class: &ClassDefinition,
        attrs: &indexmap::IndexMap<String, Value>,
    ) -> Result<()> {
        for name in &class.attrs {
            let val = attrs
                .get(name)
                .ok_or_else(|| AmfError::Encode(format!("missing declared attribute '{name}'")))?;
            self.write_element(val)?;
        }
        Ok(())
    }

    /// The dynamic-properties-end marker: an empty `String` element
    /// (`0x06 0x01`), exactly the tag+header every real dynamic key is
    /// also written with — so the decoder can tell "one more key" from
    /// "done" just by checking whether the decoded string is empty,
    /// without any lookahead. See `SPEC_FULL.md` §9.
    fn write_dynamic_terminator(&mut self) -> Result<()> {
        self.write_referenceable_string(markers::STRING, "", true)
    }
}
