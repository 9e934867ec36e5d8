//! Sub-record framing and primitive field access
//!
//! A sub-record is `signature[4]`, `size: u16` and `size` payload bytes.
//! Payloads wider than `u16::MAX` are announced by an `XXXX` sub-record whose
//! 4-byte payload is the real size; the sub-record after it stores 0 in its
//! own size field.

use crate::formid::FormId;
use crate::signature::{Signature, sigs};
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::Write;

/// Size of a sub-record header in bytes
pub const SUBRECORD_HEADER_SIZE: usize = 6;

/// One sub-record: a tagged byte payload
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Subrecord {
    /// Field signature
    pub signature: Signature,
    /// Raw payload
    pub data: Vec<u8>,
}

impl std::fmt::Debug for Subrecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]", self.signature, self.data.len())
    }
}

impl Subrecord {
    /// Create a sub-record from raw bytes
    pub fn new(signature: Signature, data: Vec<u8>) -> Self {
        Self { signature, data }
    }

    /// Null-terminated string payload
    pub fn from_zstring(signature: Signature, value: &str) -> Self {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        Self::new(signature, data)
    }

    /// Single byte payload
    pub fn from_u8(signature: Signature, value: u8) -> Self {
        Self::new(signature, vec![value])
    }

    /// Little-endian u32 payload
    pub fn from_u32(signature: Signature, value: u32) -> Self {
        Self::new(signature, value.to_le_bytes().to_vec())
    }

    /// Little-endian i32 payload
    pub fn from_i32(signature: Signature, value: i32) -> Self {
        Self::new(signature, value.to_le_bytes().to_vec())
    }

    /// Little-endian f32 payload
    pub fn from_f32(signature: Signature, value: f32) -> Self {
        Self::new(signature, value.to_le_bytes().to_vec())
    }

    /// Raw form id payload
    pub fn from_form_id(signature: Signature, value: FormId) -> Self {
        Self::from_u32(signature, value.raw())
    }

    /// Bytes this sub-record occupies when written, including any `XXXX` prefix
    pub fn encoded_len(&self) -> usize {
        let base = SUBRECORD_HEADER_SIZE + self.data.len();
        if self.data.len() > u16::MAX as usize {
            base + SUBRECORD_HEADER_SIZE + 4
        } else {
            base
        }
    }

    /// Fail with `FieldSizeMismatch` unless the payload is exactly `expected` bytes
    pub fn expect_len(&self, record: Signature, expected: usize) -> Result<()> {
        if self.data.len() != expected {
            return Err(Error::FieldSizeMismatch {
                record,
                field: self.signature,
                expected,
                actual: self.data.len(),
            });
        }
        Ok(())
    }

    /// Read a u8 field
    pub fn read_u8(&self, record: Signature) -> Result<u8> {
        self.expect_len(record, 1)?;
        Ok(self.data[0])
    }

    /// Read a u32 field
    pub fn read_u32(&self, record: Signature) -> Result<u32> {
        self.expect_len(record, 4)?;
        Ok((&self.data[..]).read_u32::<LittleEndian>()?)
    }

    /// Read an i32 field
    pub fn read_i32(&self, record: Signature) -> Result<i32> {
        self.expect_len(record, 4)?;
        Ok((&self.data[..]).read_i32::<LittleEndian>()?)
    }

    /// Read an f32 field
    pub fn read_f32(&self, record: Signature) -> Result<f32> {
        self.expect_len(record, 4)?;
        Ok((&self.data[..]).read_f32::<LittleEndian>()?)
    }

    /// Read a raw form id field
    pub fn read_form_id(&self, record: Signature) -> Result<FormId> {
        self.read_u32(record).map(FormId::new)
    }

    /// Read a null-terminated UTF-8 string
    ///
    /// Returns `None` when the payload does not round-trip through
    /// [`from_zstring`](Self::from_zstring): a missing terminator, an embedded
    /// NUL or invalid UTF-8.
    pub fn read_zstring(&self) -> Option<String> {
        let (last, text) = self.data.split_last()?;
        if *last != 0 || text.contains(&0) {
            return None;
        }
        String::from_utf8(text.to_vec()).ok()
    }

    /// Read a zstring, tolerating a missing terminator and non-UTF-8 bytes
    pub fn read_zstring_lossy(&self) -> String {
        let end = self.data.iter().position(|&b| b == 0).unwrap_or(self.data.len());
        String::from_utf8_lossy(&self.data[..end]).into_owned()
    }

    /// Write the sub-record, emitting an `XXXX` prefix when needed
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        match u16::try_from(self.data.len()) {
            Ok(size) => {
                writer.write_all(self.signature.as_bytes())?;
                writer.write_u16::<LittleEndian>(size)?;
            }
            Err(_) => {
                let size = u32::try_from(self.data.len())
                    .map_err(|_| Error::malformed("sub-record payload exceeds 4GB"))?;
                writer.write_all(sigs::XXXX.as_bytes())?;
                writer.write_u16::<LittleEndian>(4)?;
                writer.write_u32::<LittleEndian>(size)?;
                writer.write_all(self.signature.as_bytes())?;
                writer.write_u16::<LittleEndian>(0)?;
            }
        }
        writer.write_all(&self.data)?;
        Ok(())
    }
}

/// Split a record payload into sub-records
///
/// `record` and `form_id` only feed error messages.
pub fn parse_subrecords(data: &[u8], record: Signature, form_id: FormId) -> Result<Vec<Subrecord>> {
    let malformed = |what: &str| Error::malformed(format!("{record} record {form_id}: {what}"));

    let mut subrecords = Vec::new();
    let mut rest = data;
    let mut extended: Option<usize> = None;
    while !rest.is_empty() {
        if rest.len() < SUBRECORD_HEADER_SIZE {
            return Err(malformed("truncated sub-record header"));
        }
        let signature = Signature::new([rest[0], rest[1], rest[2], rest[3]]);
        let stored = u16::from_le_bytes([rest[4], rest[5]]) as usize;
        rest = &rest[SUBRECORD_HEADER_SIZE..];

        let size = extended.take().unwrap_or(stored);
        if size > rest.len() {
            return Err(malformed(&format!(
                "{signature} payload of {size} bytes runs past the record end"
            )));
        }
        let (payload, tail) = rest.split_at(size);
        rest = tail;

        if signature == sigs::XXXX {
            if size != 4 {
                return Err(malformed("XXXX payload is not 4 bytes"));
            }
            extended = Some(u32::from_le_bytes([payload[0], payload[1], payload[2], payload[3]]) as usize);
            continue;
        }
        subrecords.push(Subrecord::new(signature, payload.to_vec()));
    }
    if extended.is_some() {
        return Err(malformed("XXXX is not followed by a sub-record"));
    }
    Ok(subrecords)
}

/// Serialize sub-records back to a record payload
pub fn write_subrecords(subrecords: &[Subrecord]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(subrecords.iter().map(Subrecord::encoded_len).sum());
    for subrecord in subrecords {
        subrecord.write(&mut out)?;
    }
    Ok(out)
}
