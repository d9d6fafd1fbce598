//! Byte buffers and fixed-width integer views over them

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::JsError;

/// Shared, fixed-size byte storage behind an `ArrayBuffer`
pub type ByteBuffer = Rc<RefCell<Vec<u8>>>;

pub fn new_byte_buffer(byte_length: usize) -> ByteBuffer {
    Rc::new(RefCell::new(vec![0; byte_length]))
}

/// Element encoding of a typed-array view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypedArrayKind {
    Int8,
    Uint8,
    Int16,
    Uint16,
    Int32,
    Uint32,
}

impl TypedArrayKind {
    pub const ALL: [TypedArrayKind; 6] = [
        TypedArrayKind::Int8,
        TypedArrayKind::Uint8,
        TypedArrayKind::Int16,
        TypedArrayKind::Uint16,
        TypedArrayKind::Int32,
        TypedArrayKind::Uint32,
    ];

    /// Bytes per element
    pub fn element_size(self) -> usize {
        match self {
            TypedArrayKind::Int8 | TypedArrayKind::Uint8 => 1,
            TypedArrayKind::Int16 | TypedArrayKind::Uint16 => 2,
            TypedArrayKind::Int32 | TypedArrayKind::Uint32 => 4,
        }
    }

    /// Constructor name
    pub fn name(self) -> &'static str {
        match self {
            TypedArrayKind::Int8 => "Int8Array",
            TypedArrayKind::Uint8 => "Uint8Array",
            TypedArrayKind::Int16 => "Int16Array",
            TypedArrayKind::Uint16 => "Uint16Array",
            TypedArrayKind::Int32 => "Int32Array",
            TypedArrayKind::Uint32 => "Uint32Array",
        }
    }

    /// Little-endian bytes for `value`, wrapped modulo 2^bits.
    ///
    /// Only the first `element_size()` bytes are meaningful.
    fn encode(self, value: f64) -> [u8; 4] {
        if !value.is_finite() {
            return [0; 4];
        }
        let modulus = 2f64.powi(8 * self.element_size() as i32);
        let wrapped = value.trunc().rem_euclid(modulus);
        (wrapped as u32).to_le_bytes()
    }

    fn decode(self, raw: [u8; 4]) -> f64 {
        let bits = u32::from_le_bytes(raw);
        match self {
            TypedArrayKind::Int8 => f64::from(bits as u8 as i8),
            TypedArrayKind::Uint8 => f64::from(bits as u8),
            TypedArrayKind::Int16 => f64::from(bits as u16 as i16),
            TypedArrayKind::Uint16 => f64::from(bits as u16),
            TypedArrayKind::Int32 => f64::from(bits as i32),
            TypedArrayKind::Uint32 => f64::from(bits),
        }
    }
}

/// A window of `length` elements starting `byte_offset` bytes into a buffer.
///
/// Several views may alias the same buffer.
#[derive(Debug, Clone)]
pub struct TypedArrayView {
    pub kind: TypedArrayKind,
    pub buffer: ByteBuffer,
    pub byte_offset: usize,
    pub length: usize,
}

impl TypedArrayView {
    /// Create a view, validating alignment and range against the buffer.
    ///
    /// `length: None` covers the rest of the buffer.
    pub fn new(
        kind: TypedArrayKind,
        buffer: ByteBuffer,
        byte_offset: usize,
        length: Option<usize>,
    ) -> Result<Self, JsError> {
        let size = kind.element_size();
        if byte_offset % size != 0 {
            return Err(JsError::range_error(format!(
                "start offset of {} should be a multiple of {}",
                kind.name(),
                size
            )));
        }
        let buffer_len = buffer.borrow().len();
        if byte_offset > buffer_len {
            return Err(JsError::range_error(format!(
                "Start offset {} is outside the bounds of the buffer",
                byte_offset
            )));
        }
        let length = match length {
            Some(length) => {
                let end = length
                    .checked_mul(size)
                    .and_then(|bytes| bytes.checked_add(byte_offset));
                match end {
                    Some(end) if end <= buffer_len => length,
                    _ => {
                        return Err(JsError::range_error(format!(
                            "Invalid typed array length: {}",
                            length
                        )));
                    }
                }
            }
            None => {
                let remaining = buffer_len - byte_offset;
                if remaining % size != 0 {
                    return Err(JsError::range_error(format!(
                        "byte length of {} should be a multiple of {}",
                        kind.name(),
                        size
                    )));
                }
                remaining / size
            }
        };
        Ok(Self {
            kind,
            buffer,
            byte_offset,
            length,
        })
    }

    /// A view over a fresh zeroed buffer
    pub fn with_length(kind: TypedArrayKind, length: usize) -> Result<Self, JsError> {
        let bytes = length
            .checked_mul(kind.element_size())
            .ok_or_else(|| JsError::range_error("Invalid typed array length"))?;
        Self::new(kind, new_byte_buffer(bytes), 0, Some(length))
    }

    pub fn byte_length(&self) -> usize {
        self.length * self.kind.element_size()
    }

    fn byte_range(&self, index: usize) -> Result<std::ops::Range<usize>, JsError> {
        if index >= self.length {
            return Err(JsError::range_error(format!(
                "Index {} is out of bounds for {} of length {}",
                index,
                self.kind.name(),
                self.length
            )));
        }
        let start = self.byte_offset + index * self.kind.element_size();
        Ok(start..start + self.kind.element_size())
    }

    /// Read element `index`
    pub fn get(&self, index: usize) -> Result<f64, JsError> {
        let range = self.byte_range(index)?;
        let buffer = self.buffer.borrow();
        let bytes = buffer
            .get(range)
            .ok_or_else(|| JsError::range_error("Typed array view exceeds its buffer"))?;
        let mut raw = [0u8; 4];
        for (slot, byte) in raw.iter_mut().zip(bytes) {
            *slot = *byte;
        }
        Ok(self.kind.decode(raw))
    }

    /// Write element `index`, wrapping `value` into the element domain
    pub fn set(&self, index: usize, value: f64) -> Result<(), JsError> {
        let range = self.byte_range(index)?;
        let encoded = self.kind.encode(value);
        let mut buffer = self.buffer.borrow_mut();
        let bytes = buffer
            .get_mut(range)
            .ok_or_else(|| JsError::range_error("Typed array view exceeds its buffer"))?;
        for (slot, byte) in bytes.iter_mut().zip(encoded) {
            *slot = byte;
        }
        Ok(())
    }
}
