use std::fmt;

use crate::type_registry;

/// Runtime tag of a captured value.
///
/// The tag is written next to every value in the arena so a later query can
/// tell what type the value had at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    Bool = 1,
    I8 = 2,
    I16 = 3,
    I32 = 4,
    I64 = 5,
    U8 = 6,
    U16 = 7,
    U32 = 8,
    U64 = 9,
    F32 = 10,
    F64 = 11,
    Char = 12,
    Str = 13,
    Bytes = 14,
    Custom = 15,
}

impl ValueKind {
    pub fn from_tag(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => ValueKind::Bool,
            2 => ValueKind::I8,
            3 => ValueKind::I16,
            4 => ValueKind::I32,
            5 => ValueKind::I64,
            6 => ValueKind::U8,
            7 => ValueKind::U16,
            8 => ValueKind::U32,
            9 => ValueKind::U64,
            10 => ValueKind::F32,
            11 => ValueKind::F64,
            12 => ValueKind::Char,
            13 => ValueKind::Str,
            14 => ValueKind::Bytes,
            15 => ValueKind::Custom,
            _ => return None,
        })
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueKind::Bool => "bool",
            ValueKind::I8 => "i8",
            ValueKind::I16 => "i16",
            ValueKind::I32 => "i32",
            ValueKind::I64 => "i64",
            ValueKind::U8 => "u8",
            ValueKind::U16 => "u16",
            ValueKind::U32 => "u32",
            ValueKind::U64 => "u64",
            ValueKind::F32 => "f32",
            ValueKind::F64 => "f64",
            ValueKind::Char => "char",
            ValueKind::Str => "str",
            ValueKind::Bytes => "bytes",
            ValueKind::Custom => "custom",
        }
    }
}

/// A value captured at a call site.
///
/// Values are owned copies, independent of the caller's originals, and keep
/// their exact original type.
#[derive(Debug, Clone, PartialEq)]
pub enum LogValue {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Char(char),
    Str(String),
    Bytes(Vec<u8>),
    /// A user-defined type, see [`type_registry`].
    Custom { type_id: u16, bytes: Vec<u8> },
}

impl LogValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            LogValue::Bool(_) => ValueKind::Bool,
            LogValue::I8(_) => ValueKind::I8,
            LogValue::I16(_) => ValueKind::I16,
            LogValue::I32(_) => ValueKind::I32,
            LogValue::I64(_) => ValueKind::I64,
            LogValue::U8(_) => ValueKind::U8,
            LogValue::U16(_) => ValueKind::U16,
            LogValue::U32(_) => ValueKind::U32,
            LogValue::U64(_) => ValueKind::U64,
            LogValue::F32(_) => ValueKind::F32,
            LogValue::F64(_) => ValueKind::F64,
            LogValue::Char(_) => ValueKind::Char,
            LogValue::Str(_) => ValueKind::Str,
            LogValue::Bytes(_) => ValueKind::Bytes,
            LogValue::Custom { .. } => ValueKind::Custom,
        }
    }

    /// Name of the original type, custom types by their registered name.
    pub fn type_name(&self) -> &'static str {
        match self {
            LogValue::Custom { type_id, .. } => {
                type_registry::type_name(*type_id).unwrap_or("custom")
            }
            other => other.kind().name(),
        }
    }

    /// Any integer variant widened to `i128`.
    pub fn as_integer(&self) -> Option<i128> {
        Some(match *self {
            LogValue::I8(v) => v as i128,
            LogValue::I16(v) => v as i128,
            LogValue::I32(v) => v as i128,
            LogValue::I64(v) => v as i128,
            LogValue::U8(v) => v as i128,
            LogValue::U16(v) => v as i128,
            LogValue::U32(v) => v as i128,
            LogValue::U64(v) => v as i128,
            _ => return None,
        })
    }
}

impl fmt::Display for LogValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogValue::Bool(v) => write!(f, "{}", v),
            LogValue::I8(v) => write!(f, "{}", v),
            LogValue::I16(v) => write!(f, "{}", v),
            LogValue::I32(v) => write!(f, "{}", v),
            LogValue::I64(v) => write!(f, "{}", v),
            LogValue::U8(v) => write!(f, "{}", v),
            LogValue::U16(v) => write!(f, "{}", v),
            LogValue::U32(v) => write!(f, "{}", v),
            LogValue::U64(v) => write!(f, "{}", v),
            LogValue::F32(v) => write!(f, "{}", v),
            LogValue::F64(v) => write!(f, "{}", v),
            LogValue::Char(v) => write!(f, "{}", v),
            LogValue::Str(s) => f.write_str(s),
            LogValue::Bytes(bytes) => {
                f.write_str("[")?;
                for (i, b) in bytes.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{:02x}", b)?;
                }
                f.write_str("]")
            }
            LogValue::Custom { type_id, bytes } => {
                f.write_str(&type_registry::render_custom(*type_id, bytes))
            }
        }
    }
}

/// A type that can be captured by a logging call site.
///
/// Implemented for the primitive types, strings, byte vectors and references
/// to any of them. User types implement it by producing
/// [`LogValue::Custom`] with an id from [`type_registry::register_type`].
pub trait Loggable {
    fn to_log_value(&self) -> LogValue;
}

macro_rules! impl_loggable {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl Loggable for $ty {
                #[inline]
                fn to_log_value(&self) -> LogValue {
                    LogValue::$variant(*self)
                }
            }
        )*
    };
}

impl_loggable! {
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
    char => Char,
}

impl Loggable for isize {
    fn to_log_value(&self) -> LogValue {
        LogValue::I64(*self as i64)
    }
}

impl Loggable for usize {
    fn to_log_value(&self) -> LogValue {
        LogValue::U64(*self as u64)
    }
}

impl Loggable for str {
    fn to_log_value(&self) -> LogValue {
        LogValue::Str(self.to_owned())
    }
}

impl Loggable for String {
    fn to_log_value(&self) -> LogValue {
        LogValue::Str(self.clone())
    }
}

impl Loggable for [u8] {
    fn to_log_value(&self) -> LogValue {
        LogValue::Bytes(self.to_vec())
    }
}

impl Loggable for Vec<u8> {
    fn to_log_value(&self) -> LogValue {
        LogValue::Bytes(self.clone())
    }
}

impl Loggable for LogValue {
    fn to_log_value(&self) -> LogValue {
        self.clone()
    }
}

impl<T: Loggable + ?Sized> Loggable for &T {
    #[inline]
    fn to_log_value(&self) -> LogValue {
        (**self).to_log_value()
    }
}

/// A type that can be read back out of a captured value.
///
/// Conversions are checked: `None` means the captured value's original type
/// is not compatible with `Self`, which queries report as a type mismatch.
/// Integers convert across widths and signedness only when the value fits.
pub trait FromLogValue: Sized {
    fn from_log_value(value: &LogValue) -> Option<Self>;
}

macro_rules! impl_from_integer {
    ($($ty:ty),* $(,)?) => {
        $(
            impl FromLogValue for $ty {
                fn from_log_value(value: &LogValue) -> Option<Self> {
                    value.as_integer().and_then(|v| <$ty>::try_from(v).ok())
                }
            }
        )*
    };
}

impl_from_integer!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromLogValue for f64 {
    fn from_log_value(value: &LogValue) -> Option<Self> {
        match *value {
            LogValue::F64(v) => Some(v),
            LogValue::F32(v) => Some(v as f64),
            _ => None,
        }
    }
}

impl FromLogValue for f32 {
    fn from_log_value(value: &LogValue) -> Option<Self> {
        match *value {
            LogValue::F32(v) => Some(v),
            _ => None,
        }
    }
}

impl FromLogValue for bool {
    fn from_log_value(value: &LogValue) -> Option<Self> {
        match *value {
            LogValue::Bool(v) => Some(v),
            _ => None,
        }
    }
}

impl FromLogValue for char {
    fn from_log_value(value: &LogValue) -> Option<Self> {
        match *value {
            LogValue::Char(v) => Some(v),
            _ => None,
        }
    }
}

impl FromLogValue for String {
    fn from_log_value(value: &LogValue) -> Option<Self> {
        match value {
            LogValue::Str(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl FromLogValue for Vec<u8> {
    fn from_log_value(value: &LogValue) -> Option<Self> {
        match value {
            LogValue::Bytes(bytes) => Some(bytes.clone()),
            _ => None,
        }
    }
}

impl FromLogValue for LogValue {
    fn from_log_value(value: &LogValue) -> Option<Self> {
        Some(value.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_keeps_original_type() {
        assert_eq!(42i32.to_log_value(), LogValue::I32(42));
        assert_eq!(7usize.to_log_value(), LogValue::U64(7));
        assert_eq!("hi".to_log_value(), LogValue::Str("hi".into()));
        assert_eq!((&&true).to_log_value(), LogValue::Bool(true));
    }

    #[test]
    fn test_integer_conversion_is_checked() {
        assert_eq!(i64::from_log_value(&LogValue::I32(-3)), Some(-3));
        assert_eq!(u8::from_log_value(&LogValue::I32(300)), None);
        assert_eq!(u32::from_log_value(&LogValue::I8(-1)), None);
        assert_eq!(i32::from_log_value(&LogValue::Str("1".into())), None);
    }

    #[test]
    fn test_float_and_string_conversion() {
        assert_eq!(f64::from_log_value(&LogValue::F32(1.5)), Some(1.5));
        assert_eq!(f32::from_log_value(&LogValue::F64(1.5)), None);
        assert_eq!(String::from_log_value(&LogValue::Str("x".into())), Some("x".into()));
        assert_eq!(String::from_log_value(&LogValue::Char('x')), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(LogValue::Bytes(vec![0x0a, 0xff]).to_string(), "[0a ff]");
        assert_eq!(LogValue::F64(1.0).to_string(), "1");
        assert_eq!(LogValue::Str("plain".into()).to_string(), "plain");
    }
}
