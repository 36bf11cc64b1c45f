//! Persistence abstraction: a minimal namespaced key-value store.
//!
//! The on-device backend is NVS (see `nvs_store.rs` in the binary);
//! hosts and tests use [`MemStore`]. The trait mirrors NVS semantics:
//! `open` selects a namespace, typed getters return a caller-supplied
//! default when the key is absent, writes are buffered until `commit`.
//!
//! Writes are issued only at defined commit points (point captures,
//! fit completion, settings save) so their frequency and worst-case
//! latency impact stay bounded.

use heapless::{FnvIndexMap, String};

use crate::error::{Error, Result};

/// Maximum stored string length (SSIDs, hostnames, topics).
pub const MAX_VALUE_STR: usize = 64;

/// A stored string value.
pub type ValueString = String<MAX_VALUE_STR>;

/// Namespaced key-value store with `open/get/put/commit` semantics.
///
/// Getters are infallible by design: a missing key or a read error
/// yields the default, which is how boot-time recovery from stale
/// persistence works.
pub trait KvStore {
    /// Select the namespace subsequent calls operate on.
    fn open(&mut self, namespace: &str) -> Result<()>;

    fn get_f32(&mut self, key: &str, default: f32) -> f32;
    fn get_bool(&mut self, key: &str, default: bool) -> bool;
    fn get_u8(&mut self, key: &str, default: u8) -> u8;
    fn get_u16(&mut self, key: &str, default: u16) -> u16;
    fn get_str(&mut self, key: &str, default: &str) -> ValueString;

    fn put_f32(&mut self, key: &str, value: f32) -> Result<()>;
    fn put_bool(&mut self, key: &str, value: bool) -> Result<()>;
    fn put_u8(&mut self, key: &str, value: u8) -> Result<()>;
    fn put_u16(&mut self, key: &str, value: u16) -> Result<()>;
    fn put_str(&mut self, key: &str, value: &str) -> Result<()>;

    /// Erase every key in the current namespace.
    fn clear(&mut self) -> Result<()>;

    /// Flush buffered writes to the backing medium.
    fn commit(&mut self) -> Result<()>;
}

/// Maximum entries the in-memory store can hold (power of two,
/// required by `FnvIndexMap`).
const MEM_STORE_CAPACITY: usize = 64;

#[derive(Clone, Debug, PartialEq)]
enum Value {
    F32(f32),
    Bool(bool),
    U8(u8),
    U16(u16),
    Str(ValueString),
}

/// In-memory [`KvStore`] for host tests and simulation.
///
/// Keys are flattened to `namespace/key`. `commit` is a no-op.
#[derive(Default)]
pub struct MemStore {
    entries: FnvIndexMap<String<80>, Value, MEM_STORE_CAPACITY>,
    namespace: String<16>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn full_key(&self, key: &str) -> String<80> {
        let mut k: String<80> = String::new();
        let _ = k.push_str(self.namespace.as_str());
        let _ = k.push('/');
        let _ = k.push_str(key);
        k
    }

    fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&self.full_key(key))
    }

    fn put(&mut self, key: &str, value: Value) -> Result<()> {
        let k = self.full_key(key);
        match self.entries.insert(k, value) {
            Ok(_) => Ok(()),
            Err(_) => Err(Error::Storage),
        }
    }
}

impl KvStore for MemStore {
    fn open(&mut self, namespace: &str) -> Result<()> {
        self.namespace.clear();
        self.namespace
            .push_str(namespace)
            .map_err(|_| Error::Storage)
    }

    fn get_f32(&mut self, key: &str, default: f32) -> f32 {
        match self.get(key) {
            Some(Value::F32(v)) => *v,
            _ => default,
        }
    }

    fn get_bool(&mut self, key: &str, default: bool) -> bool {
        match self.get(key) {
            Some(Value::Bool(v)) => *v,
            _ => default,
        }
    }

    fn get_u8(&mut self, key: &str, default: u8) -> u8 {
        match self.get(key) {
            Some(Value::U8(v)) => *v,
            _ => default,
        }
    }

    fn get_u16(&mut self, key: &str, default: u16) -> u16 {
        match self.get(key) {
            Some(Value::U16(v)) => *v,
            _ => default,
        }
    }

    fn get_str(&mut self, key: &str, default: &str) -> ValueString {
        match self.get(key) {
            Some(Value::Str(v)) => v.clone(),
            _ => {
                let mut s = ValueString::new();
                let _ = s.push_str(default);
                s
            }
        }
    }

    fn put_f32(&mut self, key: &str, value: f32) -> Result<()> {
        self.put(key, Value::F32(value))
    }

    fn put_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.put(key, Value::Bool(value))
    }

    fn put_u8(&mut self, key: &str, value: u8) -> Result<()> {
        self.put(key, Value::U8(value))
    }

    fn put_u16(&mut self, key: &str, value: u16) -> Result<()> {
        self.put(key, Value::U16(value))
    }

    fn put_str(&mut self, key: &str, value: &str) -> Result<()> {
        let mut s = ValueString::new();
        s.push_str(value).map_err(|_| Error::Storage)?;
        self.put(key, Value::Str(s))
    }

    fn clear(&mut self) -> Result<()> {
        let mut prefix: String<80> = String::new();
        let _ = prefix.push_str(self.namespace.as_str());
        let _ = prefix.push('/');

        // FnvIndexMap has no retain; rebuild without the namespace.
        let mut kept: FnvIndexMap<String<80>, Value, MEM_STORE_CAPACITY> = FnvIndexMap::new();
        for (k, v) in self.entries.iter() {
            if !k.as_str().starts_with(prefix.as_str()) {
                let _ = kept.insert(k.clone(), v.clone());
            }
        }
        self.entries = kept;
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        Ok(())
    }
}
