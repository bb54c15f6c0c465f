#![forbid(unsafe_code)]
//! # JSONB codec and serial-over-I2C transport for Notecard-style peripherals.
//!
//! JSONB is a compact, self-describing binary encoding of JSON-like data:
//! every datum carries a one-byte tag, and a sealed frame travels as
//! `{:` + COBS-stuffed payload + `:}` + newline, so the newline terminator
//! can never appear inside a frame. The design goals, in order:
//!
//! - No allocator required. The writer appends into caller-owned storage
//!   and seals the frame in place; the reader decodes in place and hands
//!   out borrowed slices. Growable storage is an opt-in capability.
//! - Tolerant reading. Typed getters return zero values for missing or
//!   mismatched members, so callers probe replies without error plumbing.
//! - A small transport. The [`soi2c`] module drives a half-duplex chunked
//!   request/response exchange over injected I2C primitives.
//!
//! Known limitations, kept deliberately:
//!
//! - Strings and member names must not contain NUL (they are stored
//!   NUL-terminated).
//! - The format is little-endian IEEE-754 by construction; big-endian
//!   hosts must swap on both sides.
//! - Contexts are single-threaded and exclusively owned.
//!
//! Any [`serde::Serialize`] value can be sealed into a frame with
//! [`to_frame`] and read back with [`from_frame`]; the writer and reader
//! can also be driven directly for record-at-a-time work.

/// Caller-owned storage and the growth capability.
pub mod buffer;
/// Byte stuffing for the frame envelope.
pub mod cobs;
/// Deserialization types and functions.
pub mod de;
/// Error types and functions.
pub mod error;
/// The record tag alphabet.
pub mod opcode;
/// Frame parsing and record enumeration.
pub mod read;
/// Serialization types and functions.
pub mod ser;
/// The request/response transaction engine.
pub mod soi2c;
/// Frame formatting.
pub mod write;


pub use crate::buffer::Buffer;
pub use crate::de::Deserializer;
pub use crate::error::{Error, Result};
pub use crate::opcode::Opcode;
pub use crate::read::{Reader, Record};
pub use crate::ser::Serializer;
pub use crate::soi2c::{Exchange, Link, TransactError, Transactor};
pub use crate::write::Writer;

/// Serialize a value into a sealed JSONB frame.
pub fn to_frame<V>(v: &V) -> crate::error::Result<Vec<u8>>
where
    V: ::serde::Serialize,
{
    let (mut frame, n) = to_frame_in(v, Vec::new())?;
    frame.truncate(n);
    Ok(frame)
}

/// Serialize a value into a sealed JSONB frame in caller-provided storage,
/// returning the storage and the frame length.
pub fn to_frame_in<V, B>(v: &V, buf: B) -> crate::error::Result<(B, usize)>
where
    V: ::serde::Serialize,
    B: crate::buffer::Buffer,
{
    let mut writer = crate::write::Writer::new(buf);
    v.serialize(&mut crate::ser::Serializer::new(&mut writer))?;
    let n = writer.end()?;
    Ok((writer.into_inner(), n))
}

/// Deserialize a value from a received frame. The buffer is decoded in
/// place and the value may borrow from it.
pub fn from_frame<'de, V>(frame: &'de mut [u8]) -> crate::error::Result<V>
where
    V: ::serde::Deserialize<'de>,
{
    let mut reader = crate::read::Reader::parse(frame)?;
    V::deserialize(&mut crate::de::Deserializer::new(&mut reader))
}
