//! Conversion between logical values and their 16-bit register representation.
//!
//! Every [`ValueType`] maps deterministically to a word count and a byte-order
//! convention. Decoding and encoding normalize through big-endian, the native
//! Modbus ordering, so the LE and LER transforms are applied symmetrically on
//! both paths.

use std::str::FromStr;

use crate::error::{InvalidConfig, InvalidValue};
use crate::types::RegisterValue;

/// Byte-order conventions used by register types wider than one byte
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ByteOrder {
    /// Network order, the Modbus-native convention
    Be,
    /// All bytes of the value reversed
    Le,
    /// 16-bit words in reverse order, each word big-endian internally.
    ///
    /// `0x12345678` travels as `[0x56, 0x78, 0x12, 0x34]`. Common on PLCs
    /// and distinct from [`ByteOrder::Le`].
    Ler,
}

impl ByteOrder {
    /// Reorder a big-endian buffer into wire order, or wire order back into
    /// big-endian. Both transforms are their own inverse.
    pub(crate) fn reorder(self, buf: &mut [u8]) {
        match self {
            ByteOrder::Be => {}
            ByteOrder::Le => buf.reverse(),
            ByteOrder::Ler => {
                let words = buf.len() / 2;
                for i in 0..words / 2 {
                    let j = words - 1 - i;
                    buf.swap(2 * i, 2 * j);
                    buf.swap(2 * i + 1, 2 * j + 1);
                }
            }
        }
    }
}

/// The closed set of register type tags.
///
/// Each tag fixes the value's width, signedness, and byte order. An
/// unrecognized tag is rejected when parsing the configuration, never
/// defaulted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(missing_docs)]
pub enum ValueType {
    Int16,
    Int16Le,
    Int32,
    Int32Le,
    Int32Ler,
    Int64,
    Int64Le,
    Int64Ler,
    Uint16,
    Uint16Le,
    Uint32,
    Uint32Le,
    Uint32Ler,
    Uint64,
    Uint64Le,
    Uint64Ler,
    Float32,
    Float32Le,
    Float32Ler,
    Float64,
    Float64Le,
    Float64Ler,
    /// Raw register bytes decoded as text
    String,
    /// Raw register bytes rendered as upper-case hex pairs
    Byte,
    /// Signed 16-bit exponent `e` decoded as the scaling factor `10^e`
    Scale,
    /// A single bit, read and written through the bit-addressed banks
    Bool,
}

impl ValueType {
    const ALL: [(&'static str, ValueType); 26] = [
        ("INT16", ValueType::Int16),
        ("INT16LE", ValueType::Int16Le),
        ("INT32", ValueType::Int32),
        ("INT32LE", ValueType::Int32Le),
        ("INT32LER", ValueType::Int32Ler),
        ("INT64", ValueType::Int64),
        ("INT64LE", ValueType::Int64Le),
        ("INT64LER", ValueType::Int64Ler),
        ("UINT16", ValueType::Uint16),
        ("UINT16LE", ValueType::Uint16Le),
        ("UINT32", ValueType::Uint32),
        ("UINT32LE", ValueType::Uint32Le),
        ("UINT32LER", ValueType::Uint32Ler),
        ("UINT64", ValueType::Uint64),
        ("UINT64LE", ValueType::Uint64Le),
        ("UINT64LER", ValueType::Uint64Ler),
        ("FLOAT32", ValueType::Float32),
        ("FLOAT32LE", ValueType::Float32Le),
        ("FLOAT32LER", ValueType::Float32Ler),
        ("FLOAT64", ValueType::Float64),
        ("FLOAT64LE", ValueType::Float64Le),
        ("FLOAT64LER", ValueType::Float64Ler),
        ("STRING", ValueType::String),
        ("BYTE", ValueType::Byte),
        ("SCALE", ValueType::Scale),
        ("BOOL", ValueType::Bool),
    ];

    /// The number of 16-bit registers this type occupies.
    ///
    /// STRING and BYTE take their length from the caller, defaulting to one
    /// word. BOOL has no word count at all since it travels through the
    /// bit-addressed banks.
    pub fn word_count(self, requested: Option<u16>) -> Result<u16, InvalidConfig> {
        match self {
            ValueType::String | ValueType::Byte => match requested {
                Some(0) => Err(InvalidConfig::ZeroCount),
                Some(n) => Ok(n),
                None => Ok(1),
            },
            ValueType::Bool => Ok(0),
            _ => Ok(self.byte_width() as u16 / 2),
        }
    }

    /// The fixed byte width of the numeric types. STRING/BYTE/BOOL have no
    /// fixed width and return zero.
    fn byte_width(self) -> usize {
        match self {
            ValueType::Int16 | ValueType::Int16Le => 2,
            ValueType::Uint16 | ValueType::Uint16Le => 2,
            ValueType::Scale => 2,
            ValueType::Int32 | ValueType::Int32Le | ValueType::Int32Ler => 4,
            ValueType::Uint32 | ValueType::Uint32Le | ValueType::Uint32Ler => 4,
            ValueType::Float32 | ValueType::Float32Le | ValueType::Float32Ler => 4,
            ValueType::Int64 | ValueType::Int64Le | ValueType::Int64Ler => 8,
            ValueType::Uint64 | ValueType::Uint64Le | ValueType::Uint64Ler => 8,
            ValueType::Float64 | ValueType::Float64Le | ValueType::Float64Ler => 8,
            ValueType::String | ValueType::Byte | ValueType::Bool => 0,
        }
    }

    fn byte_order(self) -> ByteOrder {
        match self {
            ValueType::Int16Le
            | ValueType::Uint16Le
            | ValueType::Int32Le
            | ValueType::Uint32Le
            | ValueType::Float32Le
            | ValueType::Int64Le
            | ValueType::Uint64Le
            | ValueType::Float64Le => ByteOrder::Le,
            ValueType::Int32Ler
            | ValueType::Uint32Ler
            | ValueType::Float32Ler
            | ValueType::Int64Ler
            | ValueType::Uint64Ler
            | ValueType::Float64Ler => ByteOrder::Ler,
            _ => ByteOrder::Be,
        }
    }

    /// True for the single type that reads and writes through the
    /// bit-addressed banks
    pub fn is_bit(self) -> bool {
        self == ValueType::Bool
    }
}

impl FromStr for ValueType {
    type Err = InvalidConfig;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|(tag, _)| *tag == s)
            .map(|(_, ty)| *ty)
            .ok_or_else(|| InvalidConfig::UnknownValueType(s.to_string()))
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let tag = Self::ALL
            .iter()
            .find(|(_, ty)| ty == self)
            .map(|(tag, _)| *tag)
            .unwrap_or("?");
        f.write_str(tag)
    }
}

/// Render bytes as upper-case hex pairs separated by single spaces,
/// e.g. `[0x00, 0x2A]` becomes `"00 2A"`
pub fn format_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 3);
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02X}"));
    }
    out
}

/// Decode the raw register bytes of a response into a typed value.
///
/// BOOL never reaches this path since it decodes from the bit array of a
/// coil or discrete-input response.
pub fn decode(ty: ValueType, bytes: &[u8]) -> Result<RegisterValue, InvalidValue> {
    match ty {
        ValueType::String => Ok(RegisterValue::Text(
            String::from_utf8_lossy(bytes)
                .trim_end_matches('\0')
                .to_string(),
        )),
        ValueType::Byte => Ok(RegisterValue::Bytes(bytes.to_vec())),
        ValueType::Bool => Err(InvalidValue::TypeMismatch { ty }),
        ValueType::Scale => {
            let word = checked_slice(ty, bytes)?;
            let exponent = i16::from_be_bytes([word[0], word[1]]);
            Ok(RegisterValue::Float(10f64.powi(i32::from(exponent))))
        }
        _ => {
            let mut buf = checked_slice(ty, bytes)?;
            ty.byte_order().reorder(&mut buf);
            Ok(decode_be(ty, &buf))
        }
    }
}

fn checked_slice(ty: ValueType, bytes: &[u8]) -> Result<Vec<u8>, InvalidValue> {
    let width = ty.byte_width();
    if bytes.len() < width {
        return Err(InvalidValue::BufferLength {
            expected: width,
            actual: bytes.len(),
        });
    }
    Ok(bytes[..width].to_vec())
}

fn decode_be(ty: ValueType, buf: &[u8]) -> RegisterValue {
    match ty {
        ValueType::Int16 | ValueType::Int16Le => {
            RegisterValue::Integer(i64::from(i16::from_be_bytes([buf[0], buf[1]])))
        }
        ValueType::Uint16 | ValueType::Uint16Le => {
            RegisterValue::Unsigned(u64::from(u16::from_be_bytes([buf[0], buf[1]])))
        }
        ValueType::Int32 | ValueType::Int32Le | ValueType::Int32Ler => {
            let mut raw = [0; 4];
            raw.copy_from_slice(buf);
            RegisterValue::Integer(i64::from(i32::from_be_bytes(raw)))
        }
        ValueType::Uint32 | ValueType::Uint32Le | ValueType::Uint32Ler => {
            let mut raw = [0; 4];
            raw.copy_from_slice(buf);
            RegisterValue::Unsigned(u64::from(u32::from_be_bytes(raw)))
        }
        ValueType::Float32 | ValueType::Float32Le | ValueType::Float32Ler => {
            let mut raw = [0; 4];
            raw.copy_from_slice(buf);
            RegisterValue::Float(f64::from(f32::from_be_bytes(raw)))
        }
        ValueType::Int64 | ValueType::Int64Le | ValueType::Int64Ler => {
            let mut raw = [0; 8];
            raw.copy_from_slice(buf);
            RegisterValue::Integer(i64::from_be_bytes(raw))
        }
        ValueType::Uint64 | ValueType::Uint64Le | ValueType::Uint64Ler => {
            let mut raw = [0; 8];
            raw.copy_from_slice(buf);
            RegisterValue::Unsigned(u64::from_be_bytes(raw))
        }
        ValueType::Float64 | ValueType::Float64Le | ValueType::Float64Ler => {
            let mut raw = [0; 8];
            raw.copy_from_slice(buf);
            RegisterValue::Float(f64::from_be_bytes(raw))
        }
        ValueType::String | ValueType::Byte | ValueType::Scale | ValueType::Bool => {
            unreachable!("handled before byte-order normalization")
        }
    }
}

/// Encode a typed value into the raw register bytes of a write request.
///
/// Range validation runs before any buffer is built, so an out-of-range
/// value never reaches the wire. SCALE is a read-only advertisement and
/// BOOL writes travel through the coil path, so neither encodes here.
pub fn encode(ty: ValueType, value: &RegisterValue) -> Result<Vec<u8>, InvalidValue> {
    match ty {
        ValueType::Scale | ValueType::Bool => Err(InvalidValue::NotEncodable(ty)),
        ValueType::String => {
            let RegisterValue::Text(text) = value else {
                return Err(InvalidValue::TypeMismatch { ty });
            };
            let mut bytes = text.as_bytes().to_vec();
            if bytes.len() % 2 != 0 {
                bytes.push(0);
            }
            Ok(bytes)
        }
        ValueType::Byte => {
            let RegisterValue::Bytes(raw) = value else {
                return Err(InvalidValue::TypeMismatch { ty });
            };
            let mut bytes = raw.clone();
            if bytes.len() % 2 != 0 {
                bytes.push(0);
            }
            Ok(bytes)
        }
        _ => {
            let mut buf = encode_be(ty, value)?;
            ty.byte_order().reorder(&mut buf);
            Ok(buf)
        }
    }
}

fn encode_be(ty: ValueType, value: &RegisterValue) -> Result<Vec<u8>, InvalidValue> {
    let out_of_range = || InvalidValue::OutOfRange {
        value: value.as_text(),
        ty,
    };

    // Integral inputs are widened to i128 so that the full u64 range and
    // every signed range check share one comparison path.
    let integral: Option<i128> = match value {
        RegisterValue::Integer(v) => Some(i128::from(*v)),
        RegisterValue::Unsigned(v) => Some(i128::from(*v)),
        _ => None,
    };

    match ty {
        ValueType::Int16 | ValueType::Int16Le => {
            let v = integral.ok_or(InvalidValue::TypeMismatch { ty })?;
            let v = i16::try_from(v).map_err(|_| out_of_range())?;
            Ok(v.to_be_bytes().to_vec())
        }
        ValueType::Uint16 | ValueType::Uint16Le => {
            let v = integral.ok_or(InvalidValue::TypeMismatch { ty })?;
            let v = u16::try_from(v).map_err(|_| out_of_range())?;
            Ok(v.to_be_bytes().to_vec())
        }
        ValueType::Int32 | ValueType::Int32Le | ValueType::Int32Ler => {
            let v = integral.ok_or(InvalidValue::TypeMismatch { ty })?;
            let v = i32::try_from(v).map_err(|_| out_of_range())?;
            Ok(v.to_be_bytes().to_vec())
        }
        ValueType::Uint32 | ValueType::Uint32Le | ValueType::Uint32Ler => {
            let v = integral.ok_or(InvalidValue::TypeMismatch { ty })?;
            let v = u32::try_from(v).map_err(|_| out_of_range())?;
            Ok(v.to_be_bytes().to_vec())
        }
        ValueType::Int64 | ValueType::Int64Le | ValueType::Int64Ler => {
            let v = integral.ok_or(InvalidValue::TypeMismatch { ty })?;
            let v = i64::try_from(v).map_err(|_| out_of_range())?;
            Ok(v.to_be_bytes().to_vec())
        }
        ValueType::Uint64 | ValueType::Uint64Le | ValueType::Uint64Ler => {
            let v = integral.ok_or(InvalidValue::TypeMismatch { ty })?;
            let v = u64::try_from(v).map_err(|_| out_of_range())?;
            Ok(v.to_be_bytes().to_vec())
        }
        ValueType::Float32 | ValueType::Float32Le | ValueType::Float32Ler => {
            let v = numeric(value).ok_or(InvalidValue::TypeMismatch { ty })?;
            if v.is_finite() && v.abs() > f64::from(f32::MAX) {
                return Err(out_of_range());
            }
            Ok((v as f32).to_be_bytes().to_vec())
        }
        ValueType::Float64 | ValueType::Float64Le | ValueType::Float64Ler => {
            let v = numeric(value).ok_or(InvalidValue::TypeMismatch { ty })?;
            Ok(v.to_be_bytes().to_vec())
        }
        ValueType::String | ValueType::Byte | ValueType::Scale | ValueType::Bool => {
            unreachable!("handled before byte-order normalization")
        }
    }
}

fn numeric(value: &RegisterValue) -> Option<f64> {
    match value {
        RegisterValue::Integer(v) => Some(*v as f64),
        RegisterValue::Unsigned(v) => Some(*v as f64),
        RegisterValue::Float(v) => Some(*v),
        _ => None,
    }
}
