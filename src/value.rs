//! JavaScript value representation
//!
//! The core JsValue type and related structures for representing JavaScript values at runtime.

mod map;
mod typed_array;

pub use map::{MapKey, MapStore};
pub use typed_array::{ByteBuffer, TypedArrayKind, TypedArrayView, new_byte_buffer};

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};

use indexmap::IndexMap;
use rustc_hash::{FxBuildHasher, FxHashMap};

use crate::ast;
use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::interpreter::coroutine::Coroutine;
use crate::interpreter::environment::Environment;

/// Trait for types that have cheap (O(1), reference-counted) clones.
///
/// This trait makes it explicit when a clone is cheap (just incrementing a reference count)
/// vs when it might be expensive (copying data).
pub trait CheapClone: Clone {
    /// Create a cheap (reference-counted) clone of this value.
    fn cheap_clone(&self) -> Self {
        self.clone()
    }
}

// Rc<RefCell<T>> is covered by this
impl<T: ?Sized> CheapClone for Rc<T> {}

/// Maximum number of prototype hops a lookup follows before giving up.
///
/// Prototype cycles are not rejected on assignment, so every chain walk is bounded.
pub const MAX_PROTOTYPE_DEPTH: usize = 1024;

/// A JavaScript value
#[derive(Clone, Default)]
pub enum JsValue {
    #[default]
    Undefined,
    Null,
    Boolean(bool),
    Number(f64),
    String(JsString),
    Symbol(JsSymbol),
    Object(JsObjectRef),
}

impl CheapClone for JsValue {}

impl JsValue {
    /// Check if this value is null or undefined
    pub fn is_null_or_undefined(&self) -> bool {
        matches!(self, JsValue::Null | JsValue::Undefined)
    }

    /// Check if this value is callable (a function)
    pub fn is_callable(&self) -> bool {
        match self {
            JsValue::Object(obj) => obj.borrow().is_callable(),
            _ => false,
        }
    }

    pub fn as_object(&self) -> Option<&JsObjectRef> {
        match self {
            JsValue::Object(obj) => Some(obj),
            _ => None,
        }
    }

    /// Get the typeof result for this value
    pub fn type_of(&self) -> &'static str {
        match self {
            JsValue::Undefined => "undefined",
            JsValue::Null => "object", // Historical quirk
            JsValue::Boolean(_) => "boolean",
            JsValue::Number(_) => "number",
            JsValue::String(_) => "string",
            JsValue::Symbol(_) => "symbol",
            JsValue::Object(obj) => {
                if obj.borrow().is_callable() {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// Convert to boolean (ToBoolean)
    pub fn to_boolean(&self) -> bool {
        match self {
            JsValue::Undefined | JsValue::Null => false,
            JsValue::Boolean(b) => *b,
            JsValue::Number(n) => *n != 0.0 && !n.is_nan(),
            JsValue::String(s) => !s.is_empty(),
            JsValue::Symbol(_) => true,
            JsValue::Object(_) => true,
        }
    }

    /// Convert to number (ToNumber) for primitives; objects yield NaN
    /// unless converted with [`Interpreter::to_primitive`] first
    pub fn to_number(&self) -> f64 {
        match self {
            JsValue::Undefined => f64::NAN,
            JsValue::Null => 0.0,
            JsValue::Boolean(true) => 1.0,
            JsValue::Boolean(false) => 0.0,
            JsValue::Number(n) => *n,
            JsValue::String(s) => string_to_number(s.as_str()),
            JsValue::Symbol(_) => f64::NAN,
            JsValue::Object(_) => f64::NAN,
        }
    }

    /// Convert to string (ToString)
    pub fn to_js_string(&self) -> JsString {
        match self {
            JsValue::Undefined => JsString::from("undefined"),
            JsValue::Null => JsString::from("null"),
            JsValue::Boolean(true) => JsString::from("true"),
            JsValue::Boolean(false) => JsString::from("false"),
            JsValue::Number(n) => JsString::from(number_to_string(*n)),
            JsValue::String(s) => s.cheap_clone(),
            JsValue::Symbol(s) => JsString::from(s.to_string()),
            JsValue::Object(obj) => {
                let obj = obj.borrow();
                match &obj.exotic {
                    ExoticObject::Function(f) => {
                        JsString::from(format!("function {}() {{ [code] }}", f.name()))
                    }
                    _ => JsString::from("[object Object]"),
                }
            }
        }
    }

    /// Strict equality (===)
    pub fn strict_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (JsValue::Undefined, JsValue::Undefined) => true,
            (JsValue::Null, JsValue::Null) => true,
            (JsValue::Boolean(a), JsValue::Boolean(b)) => a == b,
            // NaN !== NaN falls out of f64 comparison
            (JsValue::Number(a), JsValue::Number(b)) => a == b,
            (JsValue::String(a), JsValue::String(b)) => a == b,
            (JsValue::Symbol(a), JsValue::Symbol(b)) => a == b,
            (JsValue::Object(a), JsValue::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }

    /// Loose equality (==) without object-to-primitive conversion
    pub fn loose_equals(&self, other: &JsValue) -> bool {
        match (self, other) {
            (a, b) if a.is_null_or_undefined() && b.is_null_or_undefined() => true,
            (JsValue::Number(_), JsValue::String(_))
            | (JsValue::String(_), JsValue::Number(_))
            | (JsValue::Boolean(_), _)
            | (_, JsValue::Boolean(_)) => {
                if self.is_null_or_undefined() || other.is_null_or_undefined() {
                    return false;
                }
                self.to_number() == other.to_number()
            }
            _ => self.strict_equals(other),
        }
    }
}

fn string_to_number(s: &str) -> f64 {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return 0.0;
    }
    match trimmed {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.contains("inf") || lower.contains("nan") {
        return f64::NAN;
    }
    trimmed.parse::<f64>().unwrap_or(f64::NAN)
}

/// Number-to-string conversion used by ToString
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == 0.0 {
        // Also covers -0
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// ToInt32: wrap a number into the signed 32-bit domain
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32: wrap a number into the unsigned 32-bit domain
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() {
        return 0;
    }
    n.trunc().rem_euclid(4_294_967_296.0) as u32
}

impl fmt::Debug for JsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsValue::Undefined => write!(f, "undefined"),
            JsValue::Null => write!(f, "null"),
            JsValue::Boolean(b) => write!(f, "{}", b),
            JsValue::Number(n) => write!(f, "{}", number_to_string(*n)),
            JsValue::String(s) => write!(f, "\"{}\"", s.as_str()),
            JsValue::Symbol(s) => write!(f, "{}", s),
            JsValue::Object(obj) => write!(f, "{:?}", obj.borrow()),
        }
    }
}

impl PartialEq for JsValue {
    fn eq(&self, other: &Self) -> bool {
        self.strict_equals(other)
    }
}

// Conversions from Rust types

impl From<bool> for JsValue {
    fn from(b: bool) -> Self {
        JsValue::Boolean(b)
    }
}

impl From<f64> for JsValue {
    fn from(n: f64) -> Self {
        JsValue::Number(n)
    }
}

impl From<i32> for JsValue {
    fn from(n: i32) -> Self {
        JsValue::Number(n as f64)
    }
}

impl From<&str> for JsValue {
    fn from(s: &str) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<String> for JsValue {
    fn from(s: String) -> Self {
        JsValue::String(JsString::from(s))
    }
}

impl From<JsString> for JsValue {
    fn from(s: JsString) -> Self {
        JsValue::String(s)
    }
}

impl From<JsObjectRef> for JsValue {
    fn from(obj: JsObjectRef) -> Self {
        JsValue::Object(obj)
    }
}

impl From<JsSymbol> for JsValue {
    fn from(sym: JsSymbol) -> Self {
        JsValue::Symbol(sym)
    }
}

/// Reference-counted string for efficient string handling
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JsString(Rc<str>);

// JsString wraps Rc<str>, so clone is cheap (just reference count increment)
impl CheapClone for JsString {}

impl JsString {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Length in UTF-16 code units, as observed by script code
    pub fn utf16_len(&self) -> usize {
        self.0.encode_utf16().count()
    }
}

impl std::ops::Deref for JsString {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for JsString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for JsString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for JsString {
    fn eq(&self, other: &str) -> bool {
        self.0.as_ref() == other
    }
}

impl PartialEq<&str> for JsString {
    fn eq(&self, other: &&str) -> bool {
        self.0.as_ref() == *other
    }
}

impl From<&str> for JsString {
    fn from(s: &str) -> Self {
        JsString(s.into())
    }
}

impl From<String> for JsString {
    fn from(s: String) -> Self {
        JsString(s.into())
    }
}

impl fmt::Debug for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for JsString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Symbols
// ═══════════════════════════════════════════════════════════════════════════

/// JavaScript Symbol primitive
/// Symbols are unique identifiers, optionally with a description
#[derive(Clone, Debug)]
pub struct JsSymbol {
    /// Unique identifier for this symbol
    id: u64,
    /// Optional description (from Symbol('description'))
    pub description: Option<JsString>,
}

/// Id of `Symbol.iterator`
pub const SYMBOL_ITERATOR_ID: u64 = 1;
/// Id of `Symbol.asyncIterator`
pub const SYMBOL_ASYNC_ITERATOR_ID: u64 = 2;

/// First id handed out to user symbols; lower ids are reserved for well-known symbols
const FIRST_USER_SYMBOL_ID: u64 = 16;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(FIRST_USER_SYMBOL_ID);

/// Process-wide registry behind `Symbol.for` / `Symbol.keyFor`.
///
/// Starts empty and lives until process exit.
#[derive(Default)]
struct SymbolRegistry {
    by_key: FxHashMap<String, u64>,
    by_id: FxHashMap<u64, String>,
}

fn registry() -> &'static Mutex<SymbolRegistry> {
    static REGISTRY: OnceLock<Mutex<SymbolRegistry>> = OnceLock::new();
    REGISTRY.get_or_init(|| Mutex::new(SymbolRegistry::default()))
}

impl JsSymbol {
    /// Create a fresh symbol, distinct from every other symbol
    pub fn new(description: Option<JsString>) -> Self {
        Self {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description,
        }
    }

    /// Get the symbol's unique ID
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn iterator() -> Self {
        Self {
            id: SYMBOL_ITERATOR_ID,
            description: Some(JsString::from("Symbol.iterator")),
        }
    }

    pub fn async_iterator() -> Self {
        Self {
            id: SYMBOL_ASYNC_ITERATOR_ID,
            description: Some(JsString::from("Symbol.asyncIterator")),
        }
    }

    /// `Symbol.for(key)`: the same key always yields the same symbol
    pub fn for_key(key: &str) -> Self {
        let mut registry = registry()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let id = match registry.by_key.get(key) {
            Some(id) => *id,
            None => {
                let id = NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed);
                registry.by_key.insert(key.to_string(), id);
                registry.by_id.insert(id, key.to_string());
                id
            }
        };
        Self {
            id,
            description: Some(JsString::from(key)),
        }
    }

    /// `Symbol.keyFor(sym)`: the registry key of a global symbol
    pub fn registry_key(&self) -> Option<String> {
        let registry = registry()
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        registry.by_id.get(&self.id).cloned()
    }
}

impl PartialEq for JsSymbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for JsSymbol {}

impl std::hash::Hash for JsSymbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for JsSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(desc) => write!(f, "Symbol({})", desc),
            None => write!(f, "Symbol()"),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Objects
// ═══════════════════════════════════════════════════════════════════════════

/// Reference to a heap-allocated object
pub type JsObjectRef = Rc<RefCell<JsObject>>;

/// Insertion-ordered property table
pub type PropertyMap = IndexMap<PropertyKey, Property, FxBuildHasher>;

/// A JavaScript object
pub struct JsObject {
    /// Prototype link
    pub prototype: Option<JsObjectRef>,
    /// Whether the object can have properties added
    pub extensible: bool,
    /// Object properties, in insertion order
    pub properties: PropertyMap,
    /// Exotic object behavior
    pub exotic: ExoticObject,
}

impl JsObject {
    /// Create a new ordinary object
    pub fn new() -> Self {
        Self {
            prototype: None,
            extensible: true,
            properties: PropertyMap::default(),
            exotic: ExoticObject::Ordinary,
        }
    }

    /// Create a new ordinary object with a prototype
    pub fn with_prototype(prototype: JsObjectRef) -> Self {
        Self {
            prototype: Some(prototype),
            ..Self::new()
        }
    }

    /// Check if this object is callable
    pub fn is_callable(&self) -> bool {
        matches!(self.exotic, ExoticObject::Function(_))
    }

    /// Get an own property
    pub fn get_own_property(&self, key: &PropertyKey) -> Option<&Property> {
        self.properties.get(key)
    }

    /// Define (or replace) an own property with explicit attributes
    pub fn define_property(&mut self, key: PropertyKey, prop: Property) {
        self.properties.insert(key, prop);
    }

    pub fn has_own_property(&self, key: &PropertyKey) -> bool {
        self.properties.contains_key(key)
    }

    /// Own keys in insertion order
    pub fn own_keys(&self) -> Vec<PropertyKey> {
        self.properties.keys().cloned().collect()
    }
}

impl Default for JsObject {
    fn default() -> Self {
        Self::new()
    }
}

// Shallow on purpose: prototype links and function closures form cycles
impl fmt::Debug for JsObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.exotic {
            ExoticObject::Ordinary => write!(f, "{{{} properties}}", self.properties.len()),
            ExoticObject::Array { length } => write!(f, "[Array({})]", length),
            ExoticObject::Function(func) => write!(f, "[Function: {}]", func.name()),
            ExoticObject::Map(store) => write!(f, "Map({})", store.len()),
            ExoticObject::Generator(_) => write!(f, "[object Generator]"),
            ExoticObject::Promise(state) => {
                let status = match state.borrow().status {
                    PromiseStatus::Pending => "pending",
                    PromiseStatus::Fulfilled(_) => "fulfilled",
                    PromiseStatus::Rejected(_) => "rejected",
                };
                write!(f, "Promise {{{}}}", status)
            }
            ExoticObject::ArrayBuffer(buffer) => {
                write!(f, "ArrayBuffer({})", buffer.borrow().len())
            }
            ExoticObject::TypedArray(view) => {
                write!(f, "{}({})", view.kind.name(), view.length)
            }
        }
    }
}

/// Create a bare object with no prototype
pub fn create_object() -> JsObjectRef {
    Rc::new(RefCell::new(JsObject::new()))
}

/// Property key - can be string, array index or symbol
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    String(JsString),
    Index(u32),
    Symbol(JsSymbol),
}

impl PropertyKey {
    /// ToPropertyKey for primitives. Canonical array indices become `Index`.
    pub fn from_value(value: &JsValue) -> Self {
        match value {
            JsValue::Number(n) => {
                let n = *n;
                if n >= 0.0 && n.fract() == 0.0 && n < u32::MAX as f64 {
                    PropertyKey::Index(n as u32)
                } else {
                    PropertyKey::String(JsString::from(number_to_string(n)))
                }
            }
            JsValue::String(s) => PropertyKey::from(s.cheap_clone()),
            JsValue::Symbol(sym) => PropertyKey::Symbol(sym.clone()),
            other => PropertyKey::String(other.to_js_string()),
        }
    }

    pub fn eq_str(&self, s: &str) -> bool {
        match self {
            PropertyKey::String(js) => js.as_str() == s,
            _ => false,
        }
    }

    /// The key as a script value (indices become numeric strings)
    pub fn to_value(&self) -> JsValue {
        match self {
            PropertyKey::String(s) => JsValue::String(s.cheap_clone()),
            PropertyKey::Index(i) => JsValue::String(JsString::from(i.to_string())),
            PropertyKey::Symbol(sym) => JsValue::Symbol(sym.clone()),
        }
    }
}

fn parse_array_index(s: &str) -> Option<u32> {
    let index = s.parse::<u32>().ok()?;
    // Reject "01", "+1" and the reserved 2^32 - 1
    if index == u32::MAX || index.to_string() != s {
        return None;
    }
    Some(index)
}

impl From<&str> for PropertyKey {
    fn from(s: &str) -> Self {
        match parse_array_index(s) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::String(JsString::from(s)),
        }
    }
}

impl From<String> for PropertyKey {
    fn from(s: String) -> Self {
        PropertyKey::from(JsString::from(s))
    }
}

impl From<JsString> for PropertyKey {
    fn from(s: JsString) -> Self {
        match parse_array_index(s.as_str()) {
            Some(index) => PropertyKey::Index(index),
            None => PropertyKey::String(s),
        }
    }
}

impl From<u32> for PropertyKey {
    fn from(index: u32) -> Self {
        PropertyKey::Index(index)
    }
}

impl From<JsSymbol> for PropertyKey {
    fn from(sym: JsSymbol) -> Self {
        PropertyKey::Symbol(sym)
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyKey::String(s) => write!(f, "{}", s),
            PropertyKey::Index(i) => write!(f, "{}", i),
            PropertyKey::Symbol(sym) => write!(f, "{}", sym),
        }
    }
}

/// A property slot: data (`value` + `writable`) or accessor (`getter`/`setter`)
#[derive(Clone, Debug)]
pub struct Property {
    pub value: JsValue,
    pub writable: bool,
    pub enumerable: bool,
    pub configurable: bool,
    pub getter: Option<JsObjectRef>,
    pub setter: Option<JsObjectRef>,
}

impl Property {
    pub fn data(value: JsValue) -> Self {
        Self {
            value,
            writable: true,
            enumerable: true,
            configurable: true,
            getter: None,
            setter: None,
        }
    }

    /// Writable but non-enumerable, as used for built-in methods
    pub fn hidden(value: JsValue) -> Self {
        Self {
            enumerable: false,
            ..Self::data(value)
        }
    }

    pub fn data_readonly(value: JsValue) -> Self {
        Self {
            writable: false,
            enumerable: false,
            configurable: false,
            ..Self::data(value)
        }
    }

    pub fn accessor(getter: Option<JsObjectRef>, setter: Option<JsObjectRef>) -> Self {
        Self {
            value: JsValue::Undefined,
            writable: false,
            enumerable: true,
            configurable: true,
            getter,
            setter,
        }
    }

    pub fn is_accessor(&self) -> bool {
        self.getter.is_some() || self.setter.is_some()
    }
}

/// Exotic object behavior
pub enum ExoticObject {
    Ordinary,
    Array { length: u32 },
    Function(JsFunction),
    Map(MapStore),
    Generator(Rc<RefCell<Coroutine>>),
    Promise(Rc<RefCell<PromiseState>>),
    ArrayBuffer(ByteBuffer),
    TypedArray(TypedArrayView),
}

// ═══════════════════════════════════════════════════════════════════════════
// Property access capability
// ═══════════════════════════════════════════════════════════════════════════

/// Result of a property read before accessors are invoked
#[derive(Debug, Clone)]
pub enum PropertyLookup {
    Data(JsValue),
    /// Accessor found on the receiver or its chain; `None` when it has no getter
    Accessor(Option<JsObjectRef>),
    Absent,
}

/// Result of a property write before setters are invoked
#[derive(Debug, Clone)]
pub enum PropertyWrite {
    Done,
    /// A setter on the receiver or its chain must be called with the value
    Setter(JsObjectRef),
    /// Read-only data property, getter-only accessor, or non-extensible receiver
    Rejected,
}

/// Property access shared by every value variant.
///
/// Implementations never call back into script code: getters and setters are
/// reported to the caller, which owns the interpreter needed to invoke them.
pub trait PropertyAccess {
    fn try_get_property(&self, key: &PropertyKey) -> Result<PropertyLookup, JsError>;

    fn set_property(&self, key: PropertyKey, value: JsValue) -> Result<PropertyWrite, JsError>;

    /// Whether the key resolves anywhere on the value or its prototype chain
    fn has_property(&self, key: &PropertyKey) -> Result<bool, JsError> {
        Ok(!matches!(self.try_get_property(key)?, PropertyLookup::Absent))
    }
}

/// Element index addressed by a key on a typed array.
///
/// Canonical numeric strings that are not valid indices ("-1", "1.5") are
/// out of bounds rather than ordinary property names.
fn typed_array_index(key: &PropertyKey) -> Result<Option<usize>, JsError> {
    match key {
        PropertyKey::Index(i) => Ok(Some(*i as usize)),
        PropertyKey::String(s) => match s.as_str().parse::<f64>() {
            Ok(n) if number_to_string(n) == s.as_str() => Err(JsError::range_error(format!(
                "Index {} is out of bounds",
                s
            ))),
            _ => Ok(None),
        },
        PropertyKey::Symbol(_) => Ok(None),
    }
}

fn array_length_from(value: &JsValue) -> Result<u32, JsError> {
    let n = value.to_number();
    if n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 {
        Ok(n as u32)
    } else {
        Err(JsError::range_error("Invalid array length"))
    }
}

impl PropertyAccess for JsObjectRef {
    fn try_get_property(&self, key: &PropertyKey) -> Result<PropertyLookup, JsError> {
        {
            let obj = self.borrow();
            match &obj.exotic {
                ExoticObject::Array { length } if key.eq_str("length") => {
                    return Ok(PropertyLookup::Data(JsValue::Number(*length as f64)));
                }
                ExoticObject::TypedArray(view) => {
                    if let Some(index) = typed_array_index(key)? {
                        return Ok(PropertyLookup::Data(JsValue::Number(view.get(index)?)));
                    }
                    let special = match key {
                        k if k.eq_str("length") => Some(view.length),
                        k if k.eq_str("byteLength") => Some(view.byte_length()),
                        k if k.eq_str("byteOffset") => Some(view.byte_offset),
                        _ => None,
                    };
                    if let Some(n) = special {
                        return Ok(PropertyLookup::Data(JsValue::Number(n as f64)));
                    }
                }
                ExoticObject::ArrayBuffer(buffer) if key.eq_str("byteLength") => {
                    let len = buffer.borrow().len();
                    return Ok(PropertyLookup::Data(JsValue::Number(len as f64)));
                }
                _ => {}
            }
        }

        let mut current = self.cheap_clone();
        for _ in 0..MAX_PROTOTYPE_DEPTH {
            let next = {
                let obj = current.borrow();
                if let Some(prop) = obj.properties.get(key) {
                    return Ok(if prop.is_accessor() {
                        PropertyLookup::Accessor(prop.getter.clone())
                    } else {
                        PropertyLookup::Data(prop.value.clone())
                    });
                }
                obj.prototype.clone()
            };
            match next {
                Some(proto) => current = proto,
                None => return Ok(PropertyLookup::Absent),
            }
        }
        Ok(PropertyLookup::Absent)
    }

    fn set_property(&self, key: PropertyKey, value: JsValue) -> Result<PropertyWrite, JsError> {
        {
            let mut guard = self.borrow_mut();
            let obj = &mut *guard;
            match &mut obj.exotic {
                ExoticObject::TypedArray(view) => {
                    if let Some(index) = typed_array_index(&key)? {
                        view.set(index, value.to_number())?;
                        return Ok(PropertyWrite::Done);
                    }
                    if ["length", "byteLength", "byteOffset"].iter().any(|k| key.eq_str(k)) {
                        return Ok(PropertyWrite::Rejected);
                    }
                }
                ExoticObject::Array { length } => {
                    if key.eq_str("length") {
                        let new_length = array_length_from(&value)?;
                        if new_length < *length {
                            obj.properties.retain(|k, _| match k {
                                PropertyKey::Index(i) => *i < new_length,
                                _ => true,
                            });
                        }
                        *length = new_length;
                        return Ok(PropertyWrite::Done);
                    }
                    if let PropertyKey::Index(i) = key {
                        if i >= *length && obj.extensible {
                            *length = i
                                .checked_add(1)
                                .ok_or_else(|| JsError::range_error("Invalid array length"))?;
                        }
                    }
                }
                _ => {}
            }

            if let Some(prop) = obj.properties.get_mut(&key) {
                if prop.is_accessor() {
                    return Ok(match &prop.setter {
                        Some(setter) => PropertyWrite::Setter(setter.cheap_clone()),
                        None => PropertyWrite::Rejected,
                    });
                }
                if !prop.writable {
                    return Ok(PropertyWrite::Rejected);
                }
                prop.value = value;
                return Ok(PropertyWrite::Done);
            }
        }

        // Inherited setters and read-only slots still govern the write
        let mut current = self.borrow().prototype.clone();
        for _ in 0..MAX_PROTOTYPE_DEPTH {
            let Some(proto) = current else { break };
            let next = {
                let obj = proto.borrow();
                if let Some(prop) = obj.properties.get(&key) {
                    if prop.is_accessor() {
                        return Ok(match &prop.setter {
                            Some(setter) => PropertyWrite::Setter(setter.cheap_clone()),
                            None => PropertyWrite::Rejected,
                        });
                    }
                    if !prop.writable {
                        return Ok(PropertyWrite::Rejected);
                    }
                    None
                } else {
                    obj.prototype.clone()
                }
            };
            current = next;
        }

        let mut obj = self.borrow_mut();
        if !obj.extensible {
            return Ok(PropertyWrite::Rejected);
        }
        obj.properties.insert(key, Property::data(value));
        Ok(PropertyWrite::Done)
    }
}

impl PropertyAccess for JsValue {
    fn try_get_property(&self, key: &PropertyKey) -> Result<PropertyLookup, JsError> {
        match self {
            JsValue::Object(obj) => obj.try_get_property(key),
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                self.to_js_string(),
                key
            ))),
            JsValue::String(s) => Ok(match key {
                k if k.eq_str("length") => {
                    PropertyLookup::Data(JsValue::Number(s.utf16_len() as f64))
                }
                PropertyKey::Index(i) => match s.as_str().encode_utf16().nth(*i as usize) {
                    Some(unit) => PropertyLookup::Data(JsValue::from(String::from_utf16_lossy(&[
                        unit,
                    ]))),
                    None => PropertyLookup::Absent,
                },
                _ => PropertyLookup::Absent,
            }),
            JsValue::Symbol(sym) if key.eq_str("description") => Ok(PropertyLookup::Data(
                sym.description
                    .clone()
                    .map(JsValue::String)
                    .unwrap_or(JsValue::Undefined),
            )),
            _ => Ok(PropertyLookup::Absent),
        }
    }

    fn set_property(&self, key: PropertyKey, value: JsValue) -> Result<PropertyWrite, JsError> {
        match self {
            JsValue::Object(obj) => obj.set_property(key, value),
            JsValue::Undefined | JsValue::Null => Err(JsError::type_error(format!(
                "Cannot set properties of {} (setting '{}')",
                self.to_js_string(),
                key
            ))),
            _ => Ok(PropertyWrite::Rejected),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Functions
// ═══════════════════════════════════════════════════════════════════════════

/// A callable that can be stored as a property and invoked by the interpreter.
///
/// Closures with the matching signature implement this automatically.
pub trait Invokable {
    fn invoke(
        &self,
        interp: &mut Interpreter,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError>;
}

impl<F> Invokable for F
where
    F: Fn(&mut Interpreter, JsValue, &[JsValue]) -> Result<JsValue, JsError>,
{
    fn invoke(
        &self,
        interp: &mut Interpreter,
        this: JsValue,
        args: &[JsValue],
    ) -> Result<JsValue, JsError> {
        self(interp, this, args)
    }
}

#[derive(Clone)]
pub enum JsFunction {
    Interpreted(InterpretedFunction),
    Native(NativeFunction),
}

impl JsFunction {
    pub fn name(&self) -> &str {
        match self {
            JsFunction::Interpreted(f) => f.name.as_ref().map(|n| n.as_str()).unwrap_or(""),
            JsFunction::Native(f) => f.name.as_str(),
        }
    }
}

/// A function defined by script code, closing over its defining environment
#[derive(Clone)]
pub struct InterpretedFunction {
    pub name: Option<JsString>,
    pub node: Rc<ast::Function>,
    pub closure: Environment,
}

/// A host-provided function
#[derive(Clone)]
pub struct NativeFunction {
    pub name: JsString,
    pub func: Rc<dyn Invokable>,
    pub arity: usize,
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Promises
// ═══════════════════════════════════════════════════════════════════════════

/// Internal state of a promise
#[derive(Default)]
pub struct PromiseState {
    pub status: PromiseStatus,
    /// Reactions registered while pending, in registration order
    pub reactions: Vec<PromiseReaction>,
    /// Set once any reaction has been registered
    pub handled: bool,
}

/// Settlement state; transitions out of `Pending` happen at most once
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PromiseStatus {
    #[default]
    Pending,
    Fulfilled(JsValue),
    Rejected(JsValue),
}

/// One `(onFulfilled, onRejected, downstream)` triple
pub struct PromiseReaction {
    pub on_fulfilled: ReactionHandler,
    pub on_rejected: ReactionHandler,
    /// Promise settled with the handler's outcome; absent for internal reactions
    pub downstream: Option<JsObjectRef>,
}

/// What a reaction does with the settled value
#[derive(Clone)]
pub enum ReactionHandler {
    /// No callback: forward the value or reason to the downstream promise
    Passthrough,
    /// Call a script callable with the value or reason
    Callback(JsValue),
    /// Resume a suspended async function body
    AsyncResume(Rc<RefCell<Coroutine>>),
}

impl ReactionHandler {
    /// Callable arguments become callbacks; anything else passes through
    pub fn from_argument(value: Option<&JsValue>) -> Self {
        match value {
            Some(v) if v.is_callable() => ReactionHandler::Callback(v.clone()),
            _ => ReactionHandler::Passthrough,
        }
    }
}
