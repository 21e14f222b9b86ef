//! Binary layout of a record inside an arena block.
//!
//! ```text
//! u32 record_len | u32 site_id | u64 timestamp_micros | u32 value_count | values...
//! value := u8 tag | payload
//! ```
//!
//! All integers are little-endian. Payload sizes:
//!
//! * bool, i8, u8: 1 byte
//! * i16, u16: 2 bytes
//! * i32, u32, f32, char: 4 bytes
//! * i64, u64, f64: 8 bytes
//! * str, bytes: `u32` length followed by the bytes
//! * custom: `u16` type id, `u32` length, bytes
//!
//! `record_len` covers the whole record including itself, so a block can be
//! walked record by record without knowing the value types.

use crate::call_site::CallSiteId;
use crate::loggable::LogValue;

/// Size of the fixed record header in bytes.
pub const RECORD_HEADER_SIZE: usize = 4 + 4 + 8 + 4;

/// Encoded size of one value, tag included.
pub fn value_len(value: &LogValue) -> usize {
    1 + match value {
        LogValue::Bool(_) | LogValue::I8(_) | LogValue::U8(_) => 1,
        LogValue::I16(_) | LogValue::U16(_) => 2,
        LogValue::I32(_) | LogValue::U32(_) | LogValue::F32(_) | LogValue::Char(_) => 4,
        LogValue::I64(_) | LogValue::U64(_) | LogValue::F64(_) => 8,
        LogValue::Str(s) => 4 + s.len(),
        LogValue::Bytes(bytes) => 4 + bytes.len(),
        LogValue::Custom { bytes, .. } => 2 + 4 + bytes.len(),
    }
}

/// Encoded size of a whole record carrying `values`.
pub fn record_len(values: &[LogValue]) -> usize {
    RECORD_HEADER_SIZE + values.iter().map(value_len).sum::<usize>()
}

/// Writes a record into `out`, which must be exactly [`record_len`] bytes.
pub fn encode_record(out: &mut [u8], site_id: CallSiteId, timestamp_micros: u64, values: &[LogValue]) {
    debug_assert_eq!(out.len(), record_len(values));

    let mut writer = ByteWriter { buf: out, pos: 0 };
    writer.put_u32(writer.buf.len() as u32);
    writer.put_u32(site_id);
    writer.put_u64(timestamp_micros);
    writer.put_u32(values.len() as u32);

    for value in values {
        writer.put_u8(value.kind().tag());
        match value {
            LogValue::Bool(v) => writer.put_u8(*v as u8),
            LogValue::I8(v) => writer.put(&v.to_le_bytes()),
            LogValue::I16(v) => writer.put(&v.to_le_bytes()),
            LogValue::I32(v) => writer.put(&v.to_le_bytes()),
            LogValue::I64(v) => writer.put(&v.to_le_bytes()),
            LogValue::U8(v) => writer.put_u8(*v),
            LogValue::U16(v) => writer.put(&v.to_le_bytes()),
            LogValue::U32(v) => writer.put_u32(*v),
            LogValue::U64(v) => writer.put_u64(*v),
            LogValue::F32(v) => writer.put(&v.to_le_bytes()),
            LogValue::F64(v) => writer.put(&v.to_le_bytes()),
            LogValue::Char(v) => writer.put_u32(*v as u32),
            LogValue::Str(s) => {
                writer.put_u32(s.len() as u32);
                writer.put(s.as_bytes());
            }
            LogValue::Bytes(bytes) => {
                writer.put_u32(bytes.len() as u32);
                writer.put(bytes);
            }
            LogValue::Custom { type_id, bytes } => {
                writer.put(&type_id.to_le_bytes());
                writer.put_u32(bytes.len() as u32);
                writer.put(bytes);
            }
        }
    }
}

struct ByteWriter<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl ByteWriter<'_> {
    #[inline]
    fn put(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }

    #[inline]
    fn put_u8(&mut self, v: u8) {
        self.buf[self.pos] = v;
        self.pos += 1;
    }

    #[inline]
    fn put_u32(&mut self, v: u32) {
        self.put(&v.to_le_bytes());
    }

    #[inline]
    fn put_u64(&mut self, v: u64) {
        self.put(&v.to_le_bytes());
    }
}
