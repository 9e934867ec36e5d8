//! zlib handling for compressed record payloads
//!
//! A compressed payload is a `u32` inflated length followed by a zlib stream.

use crate::formid::FormId;
use crate::limits::DecodeLimits;
use crate::signature::Signature;
use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use std::io::{Read, Write};

/// Inflate a compressed record payload
///
/// The declared length is checked against `limits` before the output buffer
/// is allocated, and the decoder is never allowed to produce more than one
/// byte past the declared length.
pub(crate) fn inflate(
    payload: &[u8],
    signature: Signature,
    form_id: FormId,
    limits: &DecodeLimits,
) -> Result<Vec<u8>> {
    let mut cursor = payload;
    let declared = cursor.read_u32::<LittleEndian>().map_err(|_| {
        Error::malformed(format!(
            "{signature} record {form_id}: compressed payload shorter than its length prefix"
        ))
    })? as u64;
    limits.check_decompression(cursor.len(), declared)?;

    let mut inflated = Vec::with_capacity(declared as usize);
    let mut decoder = ZlibDecoder::new(cursor).take(declared + 1);
    if let Err(e) = decoder.read_to_end(&mut inflated) {
        log::debug!("zlib inflate failed for {signature} {form_id}: {e}");
        log::trace!(
            "First 16 bytes of stream: {:02X?}",
            &cursor[..16.min(cursor.len())]
        );
        return Err(Error::UnsupportedCompression {
            signature,
            form_id,
            reason: e.to_string(),
        });
    }

    if inflated.len() as u64 != declared {
        return Err(Error::SizeMismatch {
            signature,
            form_id,
            expected: declared,
            actual: inflated.len() as u64,
        });
    }
    log::trace!(
        "Inflated {signature} {form_id}: {} -> {} bytes",
        cursor.len(),
        inflated.len()
    );
    Ok(inflated)
}

/// Compress a record payload, prefixing the inflated length
pub(crate) fn deflate(data: &[u8], level: u32) -> Result<Vec<u8>> {
    let declared = u32::try_from(data.len())
        .map_err(|_| Error::malformed("record payload exceeds 4GB"))?;
    let mut out = Vec::with_capacity(data.len() / 2 + 8);
    out.write_u32::<LittleEndian>(declared)?;
    let mut encoder = ZlibEncoder::new(out, Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}
