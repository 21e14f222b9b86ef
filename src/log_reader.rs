//! Reader and utilities for decoding captured records.
//!
//! The same decoder serves two callers: the query engine, which walks arena
//! blocks in memory, and tools reading the output of a binary sink. Binary
//! sinks write each drained block as a frame:
//!
//! ```text
//! u64 frame_len | frame bytes
//! ```
//!
//! where the frame bytes are either the raw block or, for the lz4 sink, the
//! block compressed with `lz4_flex::compress_prepend_size`.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::call_site::{self, CallSiteId, CallSiteInfo};
use crate::codec::RECORD_HEADER_SIZE;
use crate::error::{DecodeError, RenderError};
use crate::formatter;
use crate::loggable::{LogValue, ValueKind};

/// The fixed part of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    pub len: usize,
    pub site_id: CallSiteId,
    pub timestamp_micros: u64,
    pub value_count: usize,
}

/// A record decoded from bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedRecord {
    pub site_id: CallSiteId,
    pub timestamp_micros: u64,
    pub values: Vec<LogValue>,
}

impl DecodedRecord {
    /// The call site, if it was registered in this process.
    pub fn site(&self) -> Option<&'static CallSiteInfo> {
        call_site::lookup(self.site_id)
    }

    pub fn timestamp(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_micros(self.timestamp_micros)
    }

    /// Renders the record as an output line.
    ///
    /// Records from sites unknown to this process render their values only.
    pub fn render(&self) -> Result<String, RenderError> {
        match self.site() {
            Some(site) => formatter::render_line(site, self.timestamp_micros, &self.values),
            None => {
                let values: Vec<String> = self.values.iter().map(ToString::to_string).collect();
                Ok(format!("[site #{}] [{}]", self.site_id, values.join(", ")))
            }
        }
    }
}

/// Sequential byte reader with bounds-checked primitives.
struct ByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Reads a slice of bytes from the current position.
    fn read_bytes(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.data.len());
        match end {
            Some(end) => {
                let slice = &self.data[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(DecodeError::Truncated {
                offset: self.pos,
                needed: len,
                available: self.data.len().saturating_sub(self.pos),
            }),
        }
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(self.read_bytes(N)?);
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_bytes(1)?[0])
    }

    fn read_u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    fn read_u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    fn read_len_prefixed(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.read_u32()? as usize;
        self.read_bytes(len)
    }

    fn read_value(&mut self) -> Result<LogValue, DecodeError> {
        let tag = self.read_u8()?;
        let kind = ValueKind::from_tag(tag).ok_or(DecodeError::UnknownTag(tag))?;

        Ok(match kind {
            ValueKind::Bool => LogValue::Bool(self.read_u8()? != 0),
            ValueKind::I8 => LogValue::I8(i8::from_le_bytes(self.read_array()?)),
            ValueKind::I16 => LogValue::I16(i16::from_le_bytes(self.read_array()?)),
            ValueKind::I32 => LogValue::I32(i32::from_le_bytes(self.read_array()?)),
            ValueKind::I64 => LogValue::I64(i64::from_le_bytes(self.read_array()?)),
            ValueKind::U8 => LogValue::U8(self.read_u8()?),
            ValueKind::U16 => LogValue::U16(self.read_u16()?),
            ValueKind::U32 => LogValue::U32(self.read_u32()?),
            ValueKind::U64 => LogValue::U64(self.read_u64()?),
            ValueKind::F32 => LogValue::F32(f32::from_le_bytes(self.read_array()?)),
            ValueKind::F64 => LogValue::F64(f64::from_le_bytes(self.read_array()?)),
            ValueKind::Char => {
                let scalar = self.read_u32()?;
                LogValue::Char(char::from_u32(scalar).ok_or(DecodeError::InvalidChar(scalar))?)
            }
            ValueKind::Str => {
                let bytes = self.read_len_prefixed()?;
                let s = std::str::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8)?;
                LogValue::Str(s.to_owned())
            }
            ValueKind::Bytes => LogValue::Bytes(self.read_len_prefixed()?.to_vec()),
            ValueKind::Custom => {
                let type_id = self.read_u16()?;
                let bytes = self.read_len_prefixed()?.to_vec();
                LogValue::Custom { type_id, bytes }
            }
        })
    }
}

/// Reads only the fixed header of the record at the start of `bytes`.
pub fn read_header(bytes: &[u8]) -> Result<RecordHeader, DecodeError> {
    let mut reader = ByteReader::new(bytes);
    let len = reader.read_u32()? as usize;
    let site_id = reader.read_u32()?;
    let timestamp_micros = reader.read_u64()?;
    let value_count = reader.read_u32()? as usize;

    if len < RECORD_HEADER_SIZE {
        return Err(DecodeError::LengthMismatch {
            declared: len,
            actual: RECORD_HEADER_SIZE,
        });
    }

    Ok(RecordHeader {
        len,
        site_id,
        timestamp_micros,
        value_count,
    })
}

/// Decodes one complete record; `bytes` must hold exactly that record.
pub fn decode_record(bytes: &[u8]) -> Result<DecodedRecord, DecodeError> {
    let header = read_header(bytes)?;
    if header.len != bytes.len() {
        return Err(DecodeError::LengthMismatch {
            declared: header.len,
            actual: bytes.len(),
        });
    }

    let mut reader = ByteReader::new(&bytes[RECORD_HEADER_SIZE..]);
    // Every value takes at least two bytes; cap the preallocation by that.
    let mut values = Vec::with_capacity(header.value_count.min(bytes.len() / 2));
    for _ in 0..header.value_count {
        values.push(reader.read_value()?);
    }

    let consumed = RECORD_HEADER_SIZE + reader.pos;
    if consumed != header.len {
        return Err(DecodeError::LengthMismatch {
            declared: header.len,
            actual: consumed,
        });
    }

    Ok(DecodedRecord {
        site_id: header.site_id,
        timestamp_micros: header.timestamp_micros,
        values,
    })
}

/// Walks the records of one drained arena block.
///
/// # Examples
///
/// ```
/// # use replay_logger::log_reader::BlockReader;
/// let empty: &[u8] = &[];
/// let mut reader = BlockReader::new(empty);
/// assert!(reader.next_record().is_none());
/// ```
pub struct BlockReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BlockReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// Returns the next record, `None` at the end of the block.
    ///
    /// After an error the reader stops, since record boundaries can no longer
    /// be trusted.
    pub fn next_record(&mut self) -> Option<Result<DecodedRecord, DecodeError>> {
        if self.pos >= self.data.len() {
            return None;
        }

        let rest = &self.data[self.pos..];
        let result = read_header(rest).and_then(|header| {
            let bytes = rest.get(..header.len).ok_or(DecodeError::Truncated {
                offset: self.pos,
                needed: header.len,
                available: rest.len(),
            })?;
            let record = decode_record(bytes)?;
            Ok((header.len, record))
        });

        match result {
            Ok((len, record)) => {
                self.pos += len;
                Some(Ok(record))
            }
            Err(err) => {
                self.pos = self.data.len();
                Some(Err(err))
            }
        }
    }
}

impl Iterator for BlockReader<'_> {
    type Item = Result<DecodedRecord, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record()
    }
}

/// Splits binary sink output into frames.
pub struct FrameReader<'a> {
    reader: ByteReader<'a>,
}

impl<'a> FrameReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            reader: ByteReader::new(data),
        }
    }

    pub fn next_frame(&mut self) -> Option<Result<&'a [u8], DecodeError>> {
        if self.reader.pos >= self.reader.data.len() {
            return None;
        }

        let frame = self
            .reader
            .read_u64()
            .and_then(|len| self.reader.read_bytes(len as usize));
        if frame.is_err() {
            self.reader.pos = self.reader.data.len();
        }
        Some(frame)
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<&'a [u8], DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_frame()
    }
}

/// Undoes the compression of an lz4 sink frame.
pub fn decompress_frame(frame: &[u8]) -> Result<Vec<u8>, DecodeError> {
    lz4_flex::decompress_size_prepended(frame).map_err(|err| DecodeError::Decompress(err.to_string()))
}

/// Decodes every record in raw binary sink output.
pub fn read_frames(data: &[u8]) -> Result<Vec<DecodedRecord>, DecodeError> {
    let mut records = Vec::new();
    for frame in FrameReader::new(data) {
        for record in BlockReader::new(frame?) {
            records.push(record?);
        }
    }
    Ok(records)
}

/// Decodes every record in lz4 binary sink output.
pub fn read_compressed_frames(data: &[u8]) -> Result<Vec<DecodedRecord>, DecodeError> {
    let mut records = Vec::new();
    for frame in FrameReader::new(data) {
        let block = decompress_frame(frame?)?;
        for record in BlockReader::new(&block) {
            records.push(record?);
        }
    }
    Ok(records)
}
