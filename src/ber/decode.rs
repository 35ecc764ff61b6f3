//! BER decoding.

use bytes::Bytes;

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// Cursor over BER-encoded data.
///
/// Sub-decoders returned by [`read_sequence`](Self::read_sequence) share the
/// underlying buffer and report offsets relative to the outermost input.
pub struct Decoder {
    data: Bytes,
    pos: usize,
    base: usize,
}

impl Decoder {
    /// Create a decoder over `data`.
    pub fn new(data: Bytes) -> Self {
        Self {
            data,
            pos: 0,
            base: 0,
        }
    }

    /// Absolute offset of the cursor in the original input.
    pub fn offset(&self) -> usize {
        self.base + self.pos
    }

    /// Remaining undecoded bytes.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Whether all input has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Peek at the next tag without consuming it.
    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn error(&self, kind: DecodeErrorKind) -> Error {
        Error::decode(self.offset(), kind)
    }

    /// Read one tag octet.
    pub fn read_tag(&mut self) -> Result<u8> {
        let tag = self
            .peek_tag()
            .ok_or_else(|| self.error(DecodeErrorKind::TruncatedData))?;
        self.pos += 1;
        Ok(tag)
    }

    /// Read length octets and check the content fits in the remaining input.
    pub fn read_length(&mut self) -> Result<usize> {
        let (len, consumed) = decode_length(&self.data[self.pos..], self.offset())?;
        self.pos += consumed;
        if len > self.remaining() {
            return Err(self.error(DecodeErrorKind::TlvOverflow));
        }
        Ok(len)
    }

    /// Read `len` content octets.
    pub fn read_bytes(&mut self, len: usize) -> Result<Bytes> {
        if len > self.remaining() {
            return Err(self.error(DecodeErrorKind::TruncatedData));
        }
        let bytes = self.data.slice(self.pos..self.pos + len);
        self.pos += len;
        Ok(bytes)
    }

    /// Read any TLV, returning its tag and content.
    pub fn read_tlv(&mut self) -> Result<(u8, Bytes)> {
        let tag = self.read_tag()?;
        let len = self.read_length()?;
        Ok((tag, self.read_bytes(len)?))
    }

    /// Read a TLV and require a specific tag.
    pub fn read_expected(&mut self, expected: u8) -> Result<Bytes> {
        let at = self.offset();
        let (actual, content) = self.read_tlv()?;
        if actual != expected {
            return Err(Error::decode(
                at,
                DecodeErrorKind::UnexpectedTag { expected, actual },
            ));
        }
        Ok(content)
    }

    /// Read a constructed TLV with the given tag and return a sub-decoder.
    pub fn read_constructed(&mut self, expected: u8) -> Result<Decoder> {
        let base = self.offset();
        let content = self.read_expected(expected)?;
        // Content starts after tag and length octets.
        let header = self.offset() - base - content.len();
        Ok(Decoder {
            data: content,
            pos: 0,
            base: base + header,
        })
    }

    /// Read a SEQUENCE and return a sub-decoder over its contents.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        self.read_constructed(tag::universal::SEQUENCE)
    }

    /// Read an INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        let at = self.offset();
        let content = self.read_expected(tag::universal::INTEGER)?;
        decode_signed(&content, at)
    }

    /// Read an unsigned 32-bit value with the given tag.
    pub fn read_unsigned32(&mut self, expected: u8) -> Result<u32> {
        let at = self.offset();
        let content = self.read_expected(expected)?;
        let value = decode_unsigned(&content, 5, at)?;
        u32::try_from(value).map_err(|_| Error::decode(at, DecodeErrorKind::IntegerOverflow))
    }

    /// Read a Counter64.
    pub fn read_counter64(&mut self) -> Result<u64> {
        let at = self.offset();
        let content = self.read_expected(tag::application::COUNTER64)?;
        decode_unsigned(&content, 9, at)
    }

    /// Read an OCTET STRING.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        self.read_expected(tag::universal::OCTET_STRING)
    }

    /// Read a NULL.
    pub fn read_null(&mut self) -> Result<()> {
        let at = self.offset();
        let content = self.read_expected(tag::universal::NULL)?;
        if !content.is_empty() {
            return Err(Error::decode(at, DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read an OBJECT IDENTIFIER.
    pub fn read_oid(&mut self) -> Result<Oid> {
        let at = self.offset();
        let content = self.read_expected(tag::universal::OBJECT_IDENTIFIER)?;
        Oid::from_ber(&content).map_err(|e| match e {
            Error::Decode { offset, kind } => Error::decode(at + offset, kind),
            other => other,
        })
    }

    /// Read an IpAddress.
    pub fn read_ip_address(&mut self) -> Result<[u8; 4]> {
        let at = self.offset();
        let content = self.read_expected(tag::application::IP_ADDRESS)?;
        <[u8; 4]>::try_from(content.as_ref()).map_err(|_| {
            Error::decode(
                at,
                DecodeErrorKind::InvalidIpAddressLength {
                    length: content.len(),
                },
            )
        })
    }
}

/// Decode two's complement content octets into an i32.
pub(crate) fn decode_signed(content: &[u8], offset: usize) -> Result<i32> {
    if content.is_empty() {
        return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
    }
    if content.len() > 4 {
        return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
    }
    let fill = if content[0] & 0x80 != 0 { 0xFF } else { 0x00 };
    let mut bytes = [fill; 4];
    bytes[4 - content.len()..].copy_from_slice(content);
    Ok(i32::from_be_bytes(bytes))
}

/// Decode unsigned content octets, allowing one leading zero octet.
fn decode_unsigned(content: &[u8], max_len: usize, offset: usize) -> Result<u64> {
    if content.is_empty() {
        return Err(Error::decode(offset, DecodeErrorKind::ZeroLengthInteger));
    }
    if content.len() > max_len || (content.len() == max_len && content[0] != 0) {
        return Err(Error::decode(offset, DecodeErrorKind::IntegerOverflow));
    }
    Ok(content.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
}
