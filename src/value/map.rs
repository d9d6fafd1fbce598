//! Insertion-ordered map storage with SameValueZero keys

use std::rc::Rc;

use indexmap::IndexMap;
use rustc_hash::FxBuildHasher;

use super::{JsString, JsSymbol, JsValue};

/// Hashable projection of a [`JsValue`] under SameValueZero.
///
/// NaN collapses to a single key, -0 and +0 coincide, strings compare by
/// content, symbols and objects by identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MapKey {
    Undefined,
    Null,
    Boolean(bool),
    Number(u64),
    String(JsString),
    Symbol(JsSymbol),
    /// Object address; the entry keeps the object alive, so it stays unique
    Object(usize),
}

impl MapKey {
    pub fn from_value(value: &JsValue) -> Self {
        match value {
            JsValue::Undefined => MapKey::Undefined,
            JsValue::Null => MapKey::Null,
            JsValue::Boolean(b) => MapKey::Boolean(*b),
            JsValue::Number(n) => MapKey::Number(canonical_bits(*n)),
            JsValue::String(s) => MapKey::String(s.clone()),
            JsValue::Symbol(sym) => MapKey::Symbol(sym.clone()),
            JsValue::Object(obj) => MapKey::Object(Rc::as_ptr(obj) as *const () as usize),
        }
    }
}

fn canonical_bits(n: f64) -> u64 {
    if n.is_nan() {
        f64::NAN.to_bits()
    } else if n == 0.0 {
        0.0f64.to_bits()
    } else {
        n.to_bits()
    }
}

/// Backing store of a `Map` object
#[derive(Default)]
pub struct MapStore {
    entries: IndexMap<MapKey, (JsValue, JsValue), FxBuildHasher>,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &JsValue) -> Option<JsValue> {
        self.entries
            .get(&MapKey::from_value(key))
            .map(|(_, value)| value.clone())
    }

    pub fn has(&self, key: &JsValue) -> bool {
        self.entries.contains_key(&MapKey::from_value(key))
    }

    /// Insert or overwrite; an existing key keeps its position
    pub fn set(&mut self, key: JsValue, value: JsValue) {
        // -0 is stored as +0
        let key = match key {
            JsValue::Number(n) if n == 0.0 => JsValue::Number(0.0),
            other => other,
        };
        let map_key = MapKey::from_value(&key);
        match self.entries.get_mut(&map_key) {
            Some(entry) => entry.1 = value,
            None => {
                self.entries.insert(map_key, (key, value));
            }
        }
    }

    pub fn delete(&mut self, key: &JsValue) -> bool {
        self.entries
            .shift_remove(&MapKey::from_value(key))
            .is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entry at insertion position `index`, for cursor-based iteration
    pub fn entry_at(&self, index: usize) -> Option<(JsValue, JsValue)> {
        self.entries
            .get_index(index)
            .map(|(_, (key, value))| (key.clone(), value.clone()))
    }
}
