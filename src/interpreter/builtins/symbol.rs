//! Symbol built-in object implementation

use crate::error::JsError;
use crate::interpreter::Interpreter;
use crate::value::{JsString, JsSymbol, JsValue, Property, PropertyKey};

/// Initialize the global `Symbol` function with `for`, `keyFor` and the
/// well-known symbols
pub fn init_symbol(interp: &mut Interpreter) {
    let ctor = interp.create_native_function("Symbol", symbol_constructor, 0);
    interp.register_method(&ctor, "for", symbol_for, 1);
    interp.register_method(&ctor, "keyFor", symbol_key_for, 1);
    {
        let mut c = ctor.borrow_mut();
        c.define_property(
            PropertyKey::from("iterator"),
            Property::data_readonly(JsValue::Symbol(JsSymbol::iterator())),
        );
        c.define_property(
            PropertyKey::from("asyncIterator"),
            Property::data_readonly(JsValue::Symbol(JsSymbol::async_iterator())),
        );
    }
    interp.define_global("Symbol", JsValue::Object(ctor));
}

/// Symbol(description) - creates a new unique symbol
pub fn symbol_constructor(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let description = match args.first() {
        None | Some(JsValue::Undefined) => None,
        Some(value) => Some(interp.to_string_value(value)?),
    };
    Ok(JsValue::Symbol(JsSymbol::new(description)))
}

/// Symbol.for(key) - returns the registered symbol for `key`, creating it once
pub fn symbol_for(
    interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    let key = interp.to_string_value(&args.first().cloned().unwrap_or_default())?;
    Ok(JsValue::Symbol(JsSymbol::for_key(&key)))
}

/// Symbol.keyFor(sym) - the registry key of `sym`, or undefined
pub fn symbol_key_for(
    _interp: &mut Interpreter,
    _this: JsValue,
    args: &[JsValue],
) -> Result<JsValue, JsError> {
    match args.first() {
        Some(JsValue::Symbol(sym)) => Ok(sym
            .registry_key()
            .map(|key| JsValue::String(JsString::from(key)))
            .unwrap_or_default()),
        other => Err(JsError::type_error(format!(
            "{} is not a symbol",
            other.cloned().unwrap_or_default().to_js_string()
        ))),
    }
}
