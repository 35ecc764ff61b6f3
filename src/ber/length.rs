//! BER length octets.

use crate::error::{DecodeErrorKind, Error, Result};

/// Longest long-form length accepted (4 length octets).
const MAX_LENGTH_OCTETS: usize = 4;

/// Encode a length for the reverse buffer.
///
/// Returns the octets in *reverse* order (ready to be pushed one by one)
/// and the number of valid octets.
pub fn encode_length(len: usize) -> ([u8; 9], usize) {
    let mut out = [0u8; 9];
    if len < 0x80 {
        out[0] = len as u8;
        return (out, 1);
    }

    let mut count = 0;
    let mut v = len;
    while v > 0 {
        out[count] = (v & 0xFF) as u8;
        v >>= 8;
        count += 1;
    }
    out[count] = 0x80 | count as u8;
    (out, count + 1)
}

/// Decode length octets starting at `data[0]`.
///
/// Returns `(length, octets_consumed)`. `offset` is only used for error reporting.
pub fn decode_length(data: &[u8], offset: usize) -> Result<(usize, usize)> {
    let first = *data
        .first()
        .ok_or_else(|| Error::decode(offset, DecodeErrorKind::TruncatedData))?;

    if first < 0x80 {
        return Ok((first as usize, 1));
    }
    if first == 0x80 {
        return Err(Error::decode(offset, DecodeErrorKind::IndefiniteLength));
    }

    let octets = (first & 0x7F) as usize;
    if octets > MAX_LENGTH_OCTETS {
        return Err(Error::decode(
            offset,
            DecodeErrorKind::LengthTooLong { octets },
        ));
    }
    if data.len() < 1 + octets {
        return Err(Error::decode(offset, DecodeErrorKind::TruncatedData));
    }

    let len = data[1..=octets]
        .iter()
        .fold(0usize, |acc, &b| (acc << 8) | b as usize);
    Ok((len, 1 + octets))
}
