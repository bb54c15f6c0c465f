//! JSONB parsing: frame verification, forward-only record enumeration and
//! keyed lookup with numeric coercion.

use crate::cobs;
use crate::error::{Error, Result};
use crate::opcode::Opcode;
use crate::write::{HEADER, TERMINATOR, TRAILER};

/// One record pulled from the enumeration.
#[derive(Debug, Clone, Copy)]
pub struct Record<'a> {
    /// True when this record is the first inside its container, or the
    /// first in the stream.
    pub first_in_container: bool,
    pub opcode: Opcode,
    /// The preceding ITEM name, when the record is an object member.
    pub key: Option<&'a str>,
    /// The record payload: string bytes without the NUL, blob bytes, or
    /// little-endian scalar bytes. Empty for structural records.
    pub payload: &'a [u8],
}

/// A numeric payload widened to its largest in-kind representation.
pub(crate) enum Num {
    Signed(i64),
    Unsigned(u64),
    Real(f64),
}

/// Widens any numeric record payload. `None` for non-numeric opcodes or a
/// payload of the wrong width.
pub(crate) fn decode_num(op: Opcode, payload: &[u8]) -> Option<Num> {
    Some(match op {
        Opcode::Int8 => Num::Signed(i8::from_le_bytes(payload.try_into().ok()?) as i64),
        Opcode::Int16 => Num::Signed(i16::from_le_bytes(payload.try_into().ok()?) as i64),
        Opcode::Int32 => Num::Signed(i32::from_le_bytes(payload.try_into().ok()?) as i64),
        Opcode::Int64 => Num::Signed(i64::from_le_bytes(payload.try_into().ok()?)),
        Opcode::Uint8 => Num::Unsigned(u8::from_le_bytes(payload.try_into().ok()?) as u64),
        Opcode::Uint16 => Num::Unsigned(u16::from_le_bytes(payload.try_into().ok()?) as u64),
        Opcode::Uint32 => Num::Unsigned(u32::from_le_bytes(payload.try_into().ok()?) as u64),
        Opcode::Uint64 => Num::Unsigned(u64::from_le_bytes(payload.try_into().ok()?)),
        Opcode::Float => Num::Real(f32::from_le_bytes(payload.try_into().ok()?) as f64),
        Opcode::Double => Num::Real(f64::from_le_bytes(payload.try_into().ok()?)),
        _ => return None,
    })
}

/// Parses and enumerates one JSONB frame.
///
/// [`Reader::parse`] decodes the frame in place; afterwards the buffer
/// holds the raw tagged payload and the reader walks it a record at a
/// time. Enumeration is single-pass and forward-only; [`Reader::rewind`]
/// restarts it.
pub struct Reader<'a> {
    buf: &'a [u8],
    cursor: usize,
    last: Option<Opcode>,
}

impl<'a> Reader<'a> {
    /// Verifies the envelope and COBS-decodes the payload in place.
    /// Control bytes (anything below 0x20, including the terminator) are
    /// trimmed from both ends first.
    pub fn parse(frame: &'a mut [u8]) -> Result<Self> {
        let mut lo = 0;
        let mut hi = frame.len();
        while lo < hi && frame[lo] < 0x20 {
            lo += 1;
        }
        while hi > lo && frame[hi - 1] < 0x20 {
            hi -= 1;
        }
        let body = &frame[lo..hi];
        if body.len() < HEADER.len() + TRAILER.len()
            || !body.starts_with(HEADER)
            || !body.ends_with(TRAILER)
        {
            return Err(Error::Frame);
        }

        let start = lo + HEADER.len();
        let end = hi - TRAILER.len();
        let decoded = cobs::decode_in_place(&mut frame[start..end], TERMINATOR);
        let frozen: &'a [u8] = frame;
        Ok(Self {
            buf: &frozen[start..start + decoded],
            cursor: 0,
            last: None,
        })
    }

    /// Enumerates a raw (already unframed, un-stuffed) record payload.
    pub fn from_payload(payload: &'a [u8]) -> Self {
        Self {
            buf: payload,
            cursor: 0,
            last: None,
        }
    }

    /// Restarts the enumeration.
    pub fn rewind(&mut self) {
        self.cursor = 0;
        self.last = None;
    }

    /// The decoded record payload this reader walks.
    pub fn payload(&self) -> &'a [u8] {
        self.buf
    }

    fn take_opcode(&mut self) -> Result<Opcode> {
        let b = *self.buf.get(self.cursor).ok_or(Error::Truncated)?;
        self.cursor += 1;
        Opcode::from_byte(b).ok_or(Error::UnknownOpcode(b))
    }

    fn take_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self.cursor.checked_add(n).ok_or(Error::Truncated)?;
        let bytes = self.buf.get(self.cursor..end).ok_or(Error::Truncated)?;
        self.cursor = end;
        Ok(bytes)
    }

    fn take_str(&mut self) -> Result<&'a str> {
        let rest = &self.buf[self.cursor..];
        let nul = rest.iter().position(|&b| b == 0).ok_or(Error::Truncated)?;
        let s = ::std::str::from_utf8(&rest[..nul]).map_err(|_| Error::Invalid("utf-8".into()))?;
        self.cursor += nul + 1;
        Ok(s)
    }

    fn take_len(&mut self, width: usize) -> Result<usize> {
        let bytes = self.take_bytes(width)?;
        let mut len = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            len |= (b as usize) << (8 * i);
        }
        Ok(len)
    }

    /// Advances one record. `Ok(None)` at the end of the payload. An ITEM
    /// record is folded into the value record that follows it, surfacing
    /// as [`Record::key`]. On error the cursor is not rewound.
    pub fn next(&mut self) -> Result<Option<Record<'a>>> {
        if self.cursor >= self.buf.len() {
            return Ok(None);
        }
        let first_in_container = matches!(
            self.last,
            None | Some(Opcode::BeginObject) | Some(Opcode::BeginArray)
        );
        let mut opcode = self.take_opcode()?;
        let mut key = None;
        if opcode == Opcode::Item {
            key = Some(self.take_str()?);
            opcode = self.take_opcode()?;
        }
        self.last = Some(opcode);

        let payload = match opcode {
            Opcode::BeginObject
            | Opcode::EndObject
            | Opcode::BeginArray
            | Opcode::EndArray
            | Opcode::Null
            | Opcode::True
            | Opcode::False => self.take_bytes(0)?,
            Opcode::Item => return Err(Error::Invalid("item in value position".into())),
            Opcode::String => self.take_str()?.as_bytes(),
            Opcode::Bin8 => {
                let n = self.take_len(1)?;
                self.take_bytes(n)?
            }
            Opcode::Bin16 => {
                let n = self.take_len(2)?;
                self.take_bytes(n)?
            }
            Opcode::Bin24 => {
                let n = self.take_len(3)?;
                self.take_bytes(n)?
            }
            Opcode::Bin32 => {
                let n = self.take_len(4)?;
                self.take_bytes(n)?
            }
            Opcode::Int8 | Opcode::Uint8 => self.take_bytes(1)?,
            Opcode::Int16 | Opcode::Uint16 => self.take_bytes(2)?,
            Opcode::Int32 | Opcode::Uint32 | Opcode::Float => self.take_bytes(4)?,
            Opcode::Int64 | Opcode::Uint64 | Opcode::Double => self.take_bytes(8)?,
        };

        Ok(Some(Record {
            first_in_container,
            opcode,
            key,
            payload,
        }))
    }

    /// Finds a member of the outermost object by name, returning its type
    /// and payload. Only immediate children are considered; members of
    /// nested objects never match. Restarts the enumeration.
    pub fn get(&mut self, name: &str) -> Option<(Opcode, &'a [u8])> {
        let mut nesting = 0i32;
        self.rewind();
        while let Ok(Some(record)) = self.next() {
            match record.opcode {
                Opcode::BeginObject => nesting += 1,
                Opcode::EndObject => nesting -= 1,
                _ => {}
            }
            if nesting == 0 {
                break;
            }
            if nesting != 1 {
                continue;
            }
            if record.key == Some(name) {
                return Some((record.opcode, record.payload));
            }
        }
        None
    }

    /// Returns the member's string, or `""` when it is missing or not a
    /// STRING. The getters never fail: callers probe for fields without
    /// error handling and treat the zero value as absence.
    pub fn get_string(&mut self, name: &str) -> &'a str {
        match self.get(name) {
            Some((Opcode::String, payload)) => ::std::str::from_utf8(payload).unwrap_or(""),
            _ => "",
        }
    }

    /// The peripheral's error report, when present.
    pub fn get_err(&mut self) -> &'a str {
        self.get_string("err")
    }

    /// True iff the member exists and holds TRUE.
    pub fn get_bool(&mut self, name: &str) -> bool {
        matches!(self.get(name), Some((Opcode::True, _)))
    }

    fn get_num(&mut self, name: &str) -> Option<Num> {
        self.get(name).and_then(|(op, payload)| decode_num(op, payload))
    }

    /// The member widened to `f64`, whatever numeric width it was stored
    /// at. Missing or non-numeric members read as 0.
    pub fn get_f64(&mut self, name: &str) -> f64 {
        match self.get_num(name) {
            Some(Num::Signed(v)) => v as f64,
            Some(Num::Unsigned(v)) => v as f64,
            Some(Num::Real(v)) => v,
            None => 0.0,
        }
    }

    pub fn get_f32(&mut self, name: &str) -> f32 {
        self.get_f64(name) as f32
    }

    /// The member converted to `i64`; floats truncate, out-of-range
    /// conversions wrap or saturate per `as`-cast rules.
    pub fn get_i64(&mut self, name: &str) -> i64 {
        match self.get_num(name) {
            Some(Num::Signed(v)) => v,
            Some(Num::Unsigned(v)) => v as i64,
            Some(Num::Real(v)) => v as i64,
            None => 0,
        }
    }

    pub fn get_i32(&mut self, name: &str) -> i32 {
        self.get_i64(name) as i32
    }

    pub fn get_u64(&mut self, name: &str) -> u64 {
        match self.get_num(name) {
            Some(Num::Signed(v)) => v as u64,
            Some(Num::Unsigned(v)) => v,
            Some(Num::Real(v)) => v as u64,
            None => 0,
        }
    }

    pub fn get_u32(&mut self, name: &str) -> u32 {
        self.get_u64(name) as u32
    }
}
