//! Iterator protocol
//!
//! `for...of`, array destructuring, `yield*` and the `Map` constructor all
//! consume iterables through these helpers.

use crate::error::JsError;
use crate::value::{CheapClone, JsSymbol, JsValue, PropertyKey};

use super::Interpreter;

/// An iterator object together with its cached `next` method
#[derive(Debug, Clone)]
pub struct IteratorRecord {
    pub iterator: JsValue,
    pub next: JsValue,
}

impl Interpreter {
    /// GetIterator: call `value[Symbol.iterator]()` and cache `next`
    pub fn get_iterator(&mut self, value: &JsValue) -> Result<IteratorRecord, JsError> {
        // Strings iterate by character without a String.prototype
        if let JsValue::String(s) = value {
            let chars = s
                .as_str()
                .chars()
                .map(|c| JsValue::from(c.to_string()))
                .collect();
            let array = JsValue::Object(self.create_array(chars));
            return self.get_iterator(&array);
        }
        if value.is_null_or_undefined() {
            return Err(not_iterable(value));
        }

        let method = self.get_property(value, &PropertyKey::Symbol(JsSymbol::iterator()))?;
        if !method.is_callable() {
            return Err(not_iterable(value));
        }
        let iterator = self.call_function(method, value.clone(), &[])?;
        if !matches!(iterator, JsValue::Object(_)) {
            return Err(JsError::type_error(
                "Result of the Symbol.iterator method is not an object",
            ));
        }
        let next = self.get_named(&iterator, "next")?;
        Ok(IteratorRecord { iterator, next })
    }

    /// IteratorStep: advance once, returning `None` when the iterator is done
    pub fn iterator_step(&mut self, record: &IteratorRecord) -> Result<Option<JsValue>, JsError> {
        let result = self.call_function(record.next.clone(), record.iterator.cheap_clone(), &[])?;
        let (done, value) = self.iter_result_parts(&result)?;
        Ok(if done { None } else { Some(value) })
    }

    /// Split an iterator result object into `(done, value)`
    pub(crate) fn iter_result_parts(
        &mut self,
        result: &JsValue,
    ) -> Result<(bool, JsValue), JsError> {
        if !matches!(result, JsValue::Object(_)) {
            return Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                result.to_js_string()
            )));
        }
        let done = self.get_named(result, "done")?.to_boolean();
        let value = self.get_named(result, "value")?;
        Ok((done, value))
    }

    /// IteratorClose: call `return()` if the iterator has one
    pub fn iterator_close(&mut self, record: &IteratorRecord) -> Result<(), JsError> {
        let Some(method) = self.get_method(&record.iterator, "return")? else {
            return Ok(());
        };
        let result = self.call_function(method, record.iterator.cheap_clone(), &[])?;
        if !matches!(result, JsValue::Object(_)) {
            return Err(JsError::type_error(format!(
                "Iterator result {} is not an object",
                result.to_js_string()
            )));
        }
        Ok(())
    }

    /// GetMethod: `None` for undefined/null, TypeError for other non-callables
    pub fn get_method(&mut self, value: &JsValue, name: &str) -> Result<Option<JsValue>, JsError> {
        let method = self.get_named(value, name)?;
        if method.is_null_or_undefined() {
            return Ok(None);
        }
        if !method.is_callable() {
            return Err(JsError::type_error(format!(
                "{} is not a function",
                method.to_js_string()
            )));
        }
        Ok(Some(method))
    }

    /// Drain an iterable into a vector
    pub fn iterate_to_vec(&mut self, iterable: &JsValue) -> Result<Vec<JsValue>, JsError> {
        let record = self.get_iterator(iterable)?;
        let mut values = Vec::new();
        while let Some(value) = self.iterator_step(&record)? {
            values.push(value);
        }
        Ok(values)
    }
}

fn not_iterable(value: &JsValue) -> JsError {
    JsError::type_error(format!("{} is not iterable", value.to_js_string()))
}
