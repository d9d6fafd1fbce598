//! Public API for interacting with JavaScript values from Rust.
//!
//! # Example
//!
//! ```
//! use jsrun::{Runtime, JsValue, api};
//!
//! let mut runtime = Runtime::new();
//! let user = runtime
//!     .interpreter()
//!     .value_from_json(&serde_json::json!({"name": "Alice", "tags": [1, 2]}));
//!
//! assert_eq!(api::get_property(&mut runtime, &user, "name").unwrap(), JsValue::from("Alice"));
//! let tags = api::get_property(&mut runtime, &user, "tags").unwrap();
//! api::push(&mut runtime, &tags, JsValue::Number(3.0)).unwrap();
//! assert_eq!(
//!     runtime.interpreter().value_to_json(&tags).unwrap(),
//!     serde_json::json!([1, 2, 3])
//! );
//! ```

use std::rc::Rc;

use rustc_hash::FxHashSet;

use crate::Runtime;
use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{ExoticObject, JsObjectRef, JsValue, Property, PropertyKey};

// ═══════════════════════════════════════════════════════════════════════════════
// JSON Conversion
// ═══════════════════════════════════════════════════════════════════════════════

impl Interpreter {
    /// Build a script value from JSON. Objects and arrays get the realm's
    /// prototypes.
    pub fn value_from_json(&self, json: &serde_json::Value) -> JsValue {
        match json {
            serde_json::Value::Null => JsValue::Null,
            serde_json::Value::Bool(b) => JsValue::Boolean(*b),
            serde_json::Value::Number(n) => JsValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => JsValue::from(s.as_str()),
            serde_json::Value::Array(items) => {
                let elements = items.iter().map(|item| self.value_from_json(item)).collect();
                JsValue::Object(self.create_array(elements))
            }
            serde_json::Value::Object(map) => {
                let obj = self.create_object();
                for (key, value) in map {
                    let value = self.value_from_json(value);
                    obj.borrow_mut()
                        .define_property(PropertyKey::from(key.as_str()), Property::data(value));
                }
                JsValue::Object(obj)
            }
        }
    }

    /// Convert a script value to JSON.
    ///
    /// Own enumerable data properties are serialized; accessors are not
    /// invoked. `undefined`, functions and symbols become `null` in arrays and
    /// are skipped in objects. Typed arrays serialize as arrays of numbers.
    /// Circular structures fail with TypeError.
    pub fn value_to_json(&self, value: &JsValue) -> Result<serde_json::Value, JsError> {
        let mut visited = FxHashSet::default();
        value_to_json_with_visited(value, &mut visited)
    }
}

fn number_to_json(n: f64) -> serde_json::Value {
    if !n.is_finite() {
        return serde_json::Value::Null;
    }
    if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        return serde_json::Value::Number(serde_json::Number::from(n as i64));
    }
    serde_json::Number::from_f64(n)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// Whether a value is dropped from objects (and nulled in arrays)
fn is_unserializable(value: &JsValue) -> bool {
    match value {
        JsValue::Undefined | JsValue::Symbol(_) => true,
        JsValue::Object(obj) => obj.borrow().is_callable(),
        _ => false,
    }
}

fn value_to_json_with_visited(
    value: &JsValue,
    visited: &mut FxHashSet<usize>,
) -> Result<serde_json::Value, JsError> {
    let obj = match value {
        JsValue::Undefined | JsValue::Null | JsValue::Symbol(_) => {
            return Ok(serde_json::Value::Null);
        }
        JsValue::Boolean(b) => return Ok(serde_json::Value::Bool(*b)),
        JsValue::Number(n) => return Ok(number_to_json(*n)),
        JsValue::String(s) => return Ok(serde_json::Value::String(s.to_string())),
        JsValue::Object(obj) => obj,
    };
    if obj.borrow().is_callable() {
        return Ok(serde_json::Value::Null);
    }

    let id = Rc::as_ptr(obj) as usize;
    if !visited.insert(id) {
        return Err(JsError::type_error("Converting circular structure to JSON"));
    }
    let result = object_to_json(obj, visited);
    visited.remove(&id);
    result
}

fn object_to_json(
    obj: &JsObjectRef,
    visited: &mut FxHashSet<usize>,
) -> Result<serde_json::Value, JsError> {
    let (entries, array_length) = {
        let o = obj.borrow();
        match &o.exotic {
            ExoticObject::TypedArray(view) => {
                let mut items = Vec::with_capacity(view.length);
                for index in 0..view.length {
                    items.push(number_to_json(view.get(index)?));
                }
                return Ok(serde_json::Value::Array(items));
            }
            ExoticObject::Array { length } => (Vec::new(), Some(*length)),
            _ => {
                let entries: Vec<(String, JsValue)> = o
                    .properties
                    .iter()
                    .filter(|(key, prop)| {
                        prop.enumerable
                            && !prop.is_accessor()
                            && !matches!(key, PropertyKey::Symbol(_))
                    })
                    .map(|(key, prop)| (key.to_string(), prop.value.clone()))
                    .collect();
                (entries, None)
            }
        }
    };

    if let Some(length) = array_length {
        let mut items = Vec::with_capacity(length as usize);
        for index in 0..length {
            let element = obj
                .borrow()
                .get_own_property(&PropertyKey::Index(index))
                .filter(|prop| !prop.is_accessor())
                .map(|prop| prop.value.clone())
                .unwrap_or_default();
            if is_unserializable(&element) {
                items.push(serde_json::Value::Null);
            } else {
                items.push(value_to_json_with_visited(&element, visited)?);
            }
        }
        return Ok(serde_json::Value::Array(items));
    }

    let mut map = serde_json::Map::new();
    for (key, value) in entries {
        if is_unserializable(&value) {
            continue;
        }
        map.insert(key, value_to_json_with_visited(&value, visited)?);
    }
    Ok(serde_json::Value::Object(map))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Property Access
// ═══════════════════════════════════════════════════════════════════════════════

/// Get a property value by key, invoking getters.
pub fn get_property(runtime: &mut Runtime, obj: &JsValue, key: &str) -> Result<JsValue, JsError> {
    runtime.interpreter_mut().get_named(obj, key)
}

/// Get an element by index.
pub fn get_index(runtime: &mut Runtime, arr: &JsValue, index: u32) -> Result<JsValue, JsError> {
    runtime
        .interpreter_mut()
        .get_property(arr, &PropertyKey::Index(index))
}

/// Set a property, invoking setters.
pub fn set_property(
    runtime: &mut Runtime,
    obj: &JsValue,
    key: &str,
    value: JsValue,
) -> Result<(), JsError> {
    runtime
        .interpreter_mut()
        .put_property(obj, PropertyKey::from(key), value)
}

/// Append a value to an array (or array-like).
pub fn push(runtime: &mut Runtime, arr: &JsValue, value: JsValue) -> Result<(), JsError> {
    call_method(runtime, arr, "push", &[value])?;
    Ok(())
}

/// Collect the elements of any iterable (arrays, maps, generators, ...).
pub fn get_elements(runtime: &mut Runtime, iterable: &JsValue) -> Result<Vec<JsValue>, JsError> {
    runtime.interpreter_mut().iterate_to_vec(iterable)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Function and Method Calls
// ═══════════════════════════════════════════════════════════════════════════════

/// Call `obj[method](...args)` with `obj` as `this`.
///
/// # Example
/// ```
/// use jsrun::{Runtime, JsValue, api};
///
/// let mut runtime = Runtime::new();
/// let arr = runtime.interpreter().value_from_json(&serde_json::json!([1, 2, 3]));
/// let joined = api::call_method(&mut runtime, &arr, "join", &[JsValue::from("-")]).unwrap();
/// assert_eq!(joined, JsValue::from("1-2-3"));
/// ```
pub fn call_method(
    runtime: &mut Runtime,
    obj: &JsValue,
    method: &str,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let interp = runtime.interpreter_mut();
    let func = interp.get_named(obj, method)?;
    if !func.is_callable() {
        return Err(JsError::type_error(format!("{} is not a function", method)));
    }
    interp.call_function(func, obj.clone(), args)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Utility Functions
// ═══════════════════════════════════════════════════════════════════════════════

/// Whether a value is an array.
pub fn is_array(value: &JsValue) -> bool {
    match value {
        JsValue::Object(obj) => matches!(obj.borrow().exotic, ExoticObject::Array { .. }),
        _ => false,
    }
}

/// Own enumerable string keys of an object, in insertion order.
pub fn keys(obj: &JsValue) -> Vec<String> {
    match obj {
        JsValue::Object(obj) => obj
            .borrow()
            .properties
            .iter()
            .filter(|(key, prop)| prop.enumerable && !matches!(key, PropertyKey::Symbol(_)))
            .map(|(key, _)| key.to_string())
            .collect(),
        _ => Vec::new(),
    }
}
