//! Process-wide class-alias registry
//!
//! Maps an external alias string ("foo.bar") to the encoding mode and
//! attribute list that govern how objects of that alias serialize. This
//! mirrors the shape of `rtmp-rs`'s stream registry
//! (`registry/store.rs`): a map guarded by a reader-writer lock behind a
//! lazily-initialized global, read on every encode/decode of a class and
//! written only at registration time.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;

use crate::bytestream::ByteStream;
use crate::class_def::Encoding;
use crate::error::{AmfError, Result};
use crate::value::AmfObject;

/// Hooks for an externalizable class: the alias owns the wire
/// representation of its instances completely, writing directly to (and
/// reading directly from) the stream rather than through a length-framed
/// byte buffer — mirroring AMF3's own `IExternalizable` contract, where
/// there is no length prefix to skip past a hook that misbehaves.
pub trait ExternalizableHooks: Send + Sync {
    /// Write the opaque body following the class name.
    fn write_external(&self, obj: &AmfObject, stream: &mut ByteStream) -> Result<()>;
    /// Read the opaque body following the class name, reconstructing the
    /// object's attributes. The returned value's `class` field is
    /// overwritten by the caller, so hooks need not set it.
    fn read_external(&self, stream: &mut ByteStream) -> Result<AmfObject>;
}

/// A registered class's metadata: its encoding mode, its declared
/// attribute order (when applicable), and externalizable hooks (when
/// applicable).
#[derive(Clone)]
pub struct AliasEntry {
    pub alias: String,
    pub encoding: Encoding,
    /// Declared attribute order for `Static`/`Dynamic` classes. `None`
    /// means "derive from the instance being encoded" — the stable
    /// iteration order of its own attribute map.
    pub attrs: Option<Vec<String>>,
    pub hooks: Option<Arc<dyn ExternalizableHooks>>,
}

impl std::fmt::Debug for AliasEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AliasEntry")
            .field("alias", &self.alias)
            .field("encoding", &self.encoding)
            .field("attrs", &self.attrs)
            .field("hooks", &self.hooks.is_some())
            .finish()
    }
}

static REGISTRY: Lazy<RwLock<HashMap<String, AliasEntry>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Register a class alias. Overwrites any existing registration for the
/// same alias.
pub fn register(
    alias: impl Into<String>,
    encoding: Encoding,
    attrs: Option<Vec<String>>,
    hooks: Option<Arc<dyn ExternalizableHooks>>,
) {
    let alias = alias.into();
    if encoding == Encoding::Externalizable && hooks.is_none() {
        tracing::warn!(alias = %alias, "registering externalizable class with no hooks");
    }
    let entry = AliasEntry {
        alias: alias.clone(),
        encoding,
        attrs,
        hooks,
    };
    tracing::debug!(alias = %alias, encoding = ?entry.encoding, "registering class alias");
    REGISTRY
        .write()
        .expect("class alias registry poisoned")
        .insert(alias, entry);
}

/// Remove a class alias's registration, if present.
pub fn unregister(alias: &str) {
    tracing::debug!(alias, "unregistering class alias");
    REGISTRY
        .write()
        .expect("class alias registry poisoned")
        .remove(alias);
}

/// Look up a registered alias, returning an owned snapshot so a
/// concurrent `unregister` cannot tear a message mid-encode.
pub fn get(alias: &str) -> Option<AliasEntry> {
    REGISTRY
        .read()
        .expect("class alias registry poisoned")
        .get(alias)
        .cloned()
}

/// Look up a registered alias, failing with [`AmfError::UnknownClassAlias`]
/// when absent.
pub fn require(alias: &str) -> Result<AliasEntry> {
    get(alias).ok_or_else(|| AmfError::UnknownClassAlias(alias.to_string()))
}

/// Remove every registered alias. Primarily for test isolation, since the
/// registry is process-wide.
pub fn clear_all() {
    REGISTRY
        .write()
        .expect("class alias registry poisoned")
        .clear();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // The registry is process-wide global state; serialize tests that
    // touch it so they don't race each other's register/unregister calls.
    static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn register_then_lookup() {
        let _guard = TEST_LOCK.lock().unwrap();
        clear_all();
        register(
            "abc.xyz",
            Encoding::Static,
            Some(vec!["foo".into()]),
            None,
        );

        let entry = require("abc.xyz").unwrap();
        assert_eq!(entry.alias, "abc.xyz");
        assert_eq!(entry.encoding, Encoding::Static);
        assert_eq!(entry.attrs, Some(vec!["foo".into()]));

        unregister("abc.xyz");
        assert!(matches!(require("abc.xyz"), Err(AmfError::UnknownClassAlias(_))));
    }

    #[test]
    fn unknown_alias_fails() {
        let _guard = TEST_LOCK.lock().unwrap();
        clear_all();
        assert!(matches!(
            require("no.such.alias"),
            Err(AmfError::UnknownClassAlias(_))
        ));
    }
}
