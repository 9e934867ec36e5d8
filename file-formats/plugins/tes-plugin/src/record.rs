//! Raw records: header plus sub-record list

use crate::compression::{deflate, inflate};
use crate::formid::FormId;
use crate::header::{HEADER_SIZE, RecordFlags, RecordHeader};
use crate::limits::{CompressionPolicy, DecodeLimits, EncodeOptions};
use crate::signature::{Signature, sigs};
use crate::subrecord::{Subrecord, parse_subrecords, write_subrecords};
use crate::{Error, Result};
use std::io::Write;

/// A record with its sub-records decoded but not interpreted
///
/// Compressed records remember their original compressed bytes until the
/// sub-record list is borrowed mutably, so an unmodified record is written
/// back byte-for-byte.
#[derive(Debug, Clone)]
pub struct RawRecord {
    header: RecordHeader,
    subrecords: Vec<Subrecord>,
    packed: Option<Vec<u8>>,
}

impl PartialEq for RawRecord {
    fn eq(&self, other: &Self) -> bool {
        // data_size depends on compression, compare the rest
        let strip = |h: &RecordHeader| RecordHeader { data_size: 0, ..*h };
        strip(&self.header) == strip(&other.header) && self.subrecords == other.subrecords
    }
}

impl RawRecord {
    /// Create an uncompressed record
    pub fn new(
        signature: Signature,
        form_id: FormId,
        flags: RecordFlags,
        subrecords: Vec<Subrecord>,
    ) -> Self {
        Self {
            header: RecordHeader::new(signature, form_id, flags - RecordFlags::COMPRESSED),
            subrecords,
            packed: None,
        }
    }

    /// Build from a header and sub-records; `data_size` is recomputed on write
    pub fn from_header(header: RecordHeader, subrecords: Vec<Subrecord>) -> Self {
        Self {
            header,
            subrecords,
            packed: None,
        }
    }

    /// Build from an already-read header and its payload bytes
    pub fn decode(header: RecordHeader, payload: &[u8], limits: &DecodeLimits) -> Result<Self> {
        if header.is_compressed() {
            let data = inflate(payload, header.signature, header.form_id, limits)?;
            let subrecords = parse_subrecords(&data, header.signature, header.form_id)?;
            Ok(Self {
                header,
                subrecords,
                packed: Some(payload.to_vec()),
            })
        } else {
            Ok(Self {
                header,
                subrecords: parse_subrecords(payload, header.signature, header.form_id)?,
                packed: None,
            })
        }
    }

    /// Record header as last read or written
    pub fn header(&self) -> &RecordHeader {
        &self.header
    }

    /// Category signature
    pub fn signature(&self) -> Signature {
        self.header.signature
    }

    /// Raw form id
    pub fn form_id(&self) -> FormId {
        self.header.form_id
    }

    /// Flag bits
    pub fn flags(&self) -> RecordFlags {
        self.header.flags
    }

    /// Whether the record is flagged deleted
    pub fn is_deleted(&self) -> bool {
        self.header.is_deleted()
    }

    /// Sub-records in file order
    pub fn subrecords(&self) -> &[Subrecord] {
        &self.subrecords
    }

    /// Mutable access to the sub-records; drops the cached compressed bytes
    pub fn subrecords_mut(&mut self) -> &mut Vec<Subrecord> {
        self.packed = None;
        &mut self.subrecords
    }

    /// First sub-record with the given signature
    pub fn get(&self, signature: Signature) -> Option<&Subrecord> {
        self.subrecords.iter().find(|s| s.signature == signature)
    }

    /// Editor id, if the record has one
    pub fn editor_id(&self) -> Option<String> {
        self.get(sigs::EDID).map(Subrecord::read_zstring_lossy)
    }

    /// Replace the raw form id
    pub fn set_form_id(&mut self, form_id: FormId) {
        self.header.form_id = form_id;
        self.packed = None;
    }

    /// Replace the flag bits
    pub fn set_flags(&mut self, flags: RecordFlags) {
        if flags.contains(RecordFlags::COMPRESSED) != self.header.is_compressed() {
            self.packed = None;
        }
        self.header.flags = flags;
    }

    /// Serialize the header and payload
    pub fn write<W: Write>(&self, writer: &mut W, options: &EncodeOptions) -> Result<()> {
        let compress = match options.compression {
            CompressionPolicy::Preserve => self.header.is_compressed(),
            CompressionPolicy::Always => self.header.signature != sigs::TES4,
            CompressionPolicy::Never => false,
        };

        let payload = match (&self.packed, compress) {
            (Some(packed), true) => packed.clone(),
            (_, true) => deflate(&write_subrecords(&self.subrecords)?, options.compression_level)?,
            (_, false) => write_subrecords(&self.subrecords)?,
        };

        let mut header = self.header;
        header.flags.set(RecordFlags::COMPRESSED, compress);
        header.data_size = u32::try_from(payload.len()).map_err(|_| {
            Error::malformed(format!(
                "{} record {} payload exceeds 4GB",
                header.signature, header.form_id
            ))
        })?;
        header.write(writer)?;
        writer.write_all(&payload)?;
        Ok(())
    }

    /// Serialize to a fresh buffer
    pub fn to_bytes(&self, options: &EncodeOptions) -> Result<Vec<u8>> {
        let body: usize = self.subrecords.iter().map(Subrecord::encoded_len).sum();
        let mut out = Vec::with_capacity(HEADER_SIZE + body);
        self.write(&mut out, options)?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::RecordHeader;
    use std::io::Cursor;

    fn sample() -> RawRecord {
        RawRecord::new(
            sigs::MISC,
            FormId::new(0x0000_0800),
            RecordFlags::empty(),
            vec![
                Subrecord::from_zstring(sigs::EDID, "Gem"),
                Subrecord::new(sigs::DATA, vec![5, 0, 0, 0, 0, 0, 0x80, 0x3F]),
            ],
        )
    }

    fn reread(bytes: &[u8]) -> RawRecord {
        let mut cursor = Cursor::new(bytes);
        let header = RecordHeader::read(&mut cursor).unwrap();
        RawRecord::decode(header, &bytes[HEADER_SIZE..], &DecodeLimits::default()).unwrap()
    }

    #[test]
    fn test_plain_round_trip() {
        let record = sample();
        let bytes = record.to_bytes(&EncodeOptions::default()).unwrap();
        assert_eq!(bytes.len(), HEADER_SIZE + 10 + 14);
        let read = reread(&bytes);
        assert_eq!(read, record);
        assert_eq!(read.editor_id().as_deref(), Some("Gem"));
        assert_eq!(read.to_bytes(&EncodeOptions::default()).unwrap(), bytes);
    }

    #[test]
    fn test_compressed_round_trip_is_byte_identical() {
        let options = EncodeOptions::new().compression(CompressionPolicy::Always);
        let bytes = sample().to_bytes(&options).unwrap();
        let read = reread(&bytes);
        assert!(read.header().is_compressed());
        assert_eq!(read, sample().tap_flags(RecordFlags::COMPRESSED));

        // Preserve reuses the cached stream, even at another level
        let preserve = EncodeOptions::new().compression_level(1);
        assert_eq!(read.to_bytes(&preserve).unwrap(), bytes);
    }

    #[test]
    fn test_mutation_drops_cache() {
        let options = EncodeOptions::new().compression(CompressionPolicy::Always);
        let mut read = reread(&sample().to_bytes(&options).unwrap());
        read.subrecords_mut()[0] = Subrecord::from_zstring(sigs::EDID, "Ruby");
        let again = reread(&read.to_bytes(&EncodeOptions::default()).unwrap());
        assert_eq!(again.editor_id().as_deref(), Some("Ruby"));
    }

    #[test]
    fn test_never_clears_flag() {
        let options = EncodeOptions::new().compression(CompressionPolicy::Always);
        let read = reread(&sample().to_bytes(&options).unwrap());
        let never = EncodeOptions::new().compression(CompressionPolicy::Never);
        let plain = reread(&read.to_bytes(&never).unwrap());
        assert!(!plain.header().is_compressed());
        assert_eq!(plain.subrecords(), sample().subrecords());
    }

    impl RawRecord {
        fn tap_flags(mut self, flags: RecordFlags) -> Self {
            self.header.flags |= flags;
            self
        }
    }
}
