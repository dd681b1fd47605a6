//! A bidirectional AMF3 (Action Message Format version 3) codec.
//!
//! The three layers are: a wire-level reader/writer for AMF3's type-tagged
//! values ([`encoder`]/[`decoder`]), per-message reference-table
//! bookkeeping that deduplicates strings, composite values, and class
//! definitions ([`context`]), and a process-wide class-alias registry that
//! maps external class names to their encoding mode and attribute layout
//! ([`class_registry`]).
//!
//! ```
//! use amf3::{ByteStream, Decoder, Encoder, ReferenceContext, Value};
//!
//! let mut stream = ByteStream::new();
//! let mut ctx = ReferenceContext::new();
//! Encoder::new(&mut stream, &mut ctx)
//!     .write_element(&Value::String("hello".into()))
//!     .unwrap();
//!
//! stream.seek(0);
//! let mut ctx = ReferenceContext::new();
//! let value = Decoder::new(&mut stream, &mut ctx).read_element().unwrap();
//! assert_eq!(value, Value::String("hello".into()));
//! ```

pub mod bytestream;
pub mod class_def;
pub mod class_registry;
pub mod context;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod markers;
pub mod u29;
pub mod utf8_modified;
pub mod value;

pub use bytestream::ByteStream;
pub use class_def::{ClassDefinition, Encoding};
pub use class_registry::{AliasEntry, ExternalizableHooks};
pub use context::ReferenceContext;
pub use decoder::Decoder;
pub use encoder::Encoder;
pub use error::{AmfError, Result};
pub use value::{AmfArray, AmfObject, Value};
