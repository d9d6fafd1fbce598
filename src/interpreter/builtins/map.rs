//! Map built-in methods

use std::cell::Cell;
use std::rc::Rc;

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{CheapClone, ExoticObject, JsObjectRef, JsSymbol, JsValue, MapStore, PropertyKey};

use super::{create_native_iterator, link_constructor};

/// Initialize Map.prototype and the global `Map` constructor
pub fn init_map(interp: &mut Interpreter) {
    let proto = interp.map_prototype.clone();
    interp.register_method(&proto, "get", map_get, 1);
    interp.register_method(&proto, "set", map_set, 2);
    interp.register_method(&proto, "has", map_has, 1);
    interp.register_method(&proto, "delete", map_delete, 1);
    interp.register_method(&proto, "clear", map_clear, 0);
    interp.register_method(&proto, "forEach", map_foreach, 1);
    interp.register_method(&proto, "entries", map_entries, 0);
    interp.register_symbol_method(&proto, JsSymbol::iterator(), "entries", map_entries, 0);
    interp.register_getter(&proto, "size", map_size);

    let ctor = interp.create_native_function("Map", map_constructor, 0);
    link_constructor(&ctor, &proto);
    interp.define_global("Map", JsValue::Object(ctor));
}

fn this_map(this: &JsValue, method: &str) -> Result<JsObjectRef, JsError> {
    match this {
        JsValue::Object(obj) if matches!(obj.borrow().exotic, ExoticObject::Map(_)) => {
            Ok(obj.cheap_clone())
        }
        _ => Err(JsError::type_error(format!(
            "Method Map.prototype.{} called on incompatible receiver {}",
            method,
            this.to_js_string()
        ))),
    }
}

/// Run `f` on the store of a Map object
fn with_store<T>(
    this: &JsValue,
    method: &str,
    f: impl FnOnce(&mut MapStore) -> T,
) -> Result<T, JsError> {
    let map = this_map(this, method)?;
    let mut obj = map.borrow_mut();
    match &mut obj.exotic {
        ExoticObject::Map(store) => Ok(f(store)),
        _ => Err(JsError::internal_error("Map lost its store")),
    }
}

pub fn map_constructor(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let map = interp.create_exotic(ExoticObject::Map(MapStore::new()), &interp.map_prototype);
    let map_value = JsValue::Object(map);

    let iterable = args.first().cloned().unwrap_or_default();
    if iterable.is_null_or_undefined() {
        return Ok(map_value);
    }
    for entry in interp.iterate_to_vec(&iterable)? {
        if !matches!(entry, JsValue::Object(_)) {
            return Err(JsError::type_error(format!(
                "Iterator value {} is not an entry object",
                entry.to_js_string()
            )));
        }
        let key = interp.get_property(&entry, &PropertyKey::Index(0))?;
        let value = interp.get_property(&entry, &PropertyKey::Index(1))?;
        with_store(&map_value, "set", |store| store.set(key, value))?;
    }
    Ok(map_value)
}

pub fn map_get(
    _interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = args.first().cloned().unwrap_or_default();
    Ok(with_store(&this, "get", |store| store.get(&key))?.unwrap_or_default())
}

pub fn map_set(
    _interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = args.first().cloned().unwrap_or_default();
    let value = args.get(1).cloned().unwrap_or_default();
    with_store(&this, "set", |store| store.set(key, value))?;
    // Return the map for chaining
    Ok(this)
}

pub fn map_has(
    _interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = args.first().cloned().unwrap_or_default();
    Ok(JsValue::Boolean(with_store(&this, "has", |store| store.has(&key))?))
}

pub fn map_delete(
    _interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = args.first().cloned().unwrap_or_default();
    Ok(JsValue::Boolean(with_store(&this, "delete", |store| store.delete(&key))?))
}

pub fn map_clear(
    _interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    with_store(&this, "clear", MapStore::clear)?;
    Ok(JsValue::Undefined)
}

pub fn map_size(
    _interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    let len = with_store(&this, "size", |store| store.len())?;
    Ok(JsValue::Number(len as f64))
}

/// forEach(callback(value, key, map), thisArg); entries added during the walk
/// are visited
pub fn map_foreach(
    interp: &mut Interpreter,
    this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let callback = args.first().cloned().unwrap_or_default();
    if !callback.is_callable() {
        return Err(JsError::type_error(format!(
            "{} is not a function",
            callback.to_js_string()
        )));
    }
    let this_arg = args.get(1).cloned().unwrap_or_default();

    let mut index = 0;
    while let Some((key, value)) = with_store(&this, "forEach", |store| store.entry_at(index))? {
        interp.call_function(callback.clone(), this_arg.clone(), &[value, key, this.clone()])?;
        index += 1;
    }
    Ok(JsValue::Undefined)
}

/// entries() / [Symbol.iterator](): `[key, value]` pairs in insertion order
pub fn map_entries(
    interp: &mut Interpreter,
    this: JsValue,
    _args: &[JsValue],
) -> Result<JsValue, JsError> {
    this_map(&this, "entries")?;
    let cursor = Rc::new(Cell::new(0usize));
    let proto = interp.map_iterator_prototype.clone();
    Ok(create_native_iterator(interp, &proto, move |interp| {
        let index = cursor.get();
        let Some((key, value)) = with_store(&this, "entries", |store| store.entry_at(index))? else {
            return Ok(None);
        };
        cursor.set(index + 1);
        Ok(Some(JsValue::Object(interp.create_array(vec![key, value]))))
    }))
}
