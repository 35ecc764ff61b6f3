//! BER encoding.
//!
//! Writes from the end backwards: content is pushed first, then its length
//! and tag are prepended, so no length pre-computation is needed. Callers
//! push the elements of a SEQUENCE in reverse order.

use bytes::Bytes;

use super::length::encode_length;
use super::tag;
use crate::oid::Oid;

/// Reverse-order BER output buffer.
pub struct EncodeBuf {
    buf: Vec<u8>,
}

impl EncodeBuf {
    /// Create a new encode buffer with default capacity.
    pub fn new() -> Self {
        Self::with_capacity(512)
    }

    /// Create a new encode buffer with specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Number of bytes encoded so far.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Check if buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Prepend content octets that are in forward order.
    pub fn push_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes.iter().rev());
    }

    /// Prepend a tag octet.
    pub fn push_tag(&mut self, tag: u8) {
        self.buf.push(tag);
    }

    /// Prepend BER length octets.
    pub fn push_length(&mut self, len: usize) {
        let (bytes, count) = encode_length(len);
        self.buf.extend_from_slice(&bytes[..count]);
    }

    /// Encode a constructed type (SEQUENCE, PDU, ...).
    ///
    /// The closure pushes the contents (in reverse order); length and tag are
    /// prepended afterwards.
    pub fn push_constructed<F>(&mut self, tag: u8, f: F)
    where
        F: FnOnce(&mut Self),
    {
        let start = self.len();
        f(self);
        let content_len = self.len() - start;
        self.push_length(content_len);
        self.push_tag(tag);
    }

    /// Encode a SEQUENCE.
    pub fn push_sequence<F>(&mut self, f: F)
    where
        F: FnOnce(&mut Self),
    {
        self.push_constructed(tag::universal::SEQUENCE, f);
    }

    /// Encode a primitive TLV with the given tag.
    pub fn push_primitive(&mut self, tag: u8, content: &[u8]) {
        self.push_bytes(content);
        self.push_length(content.len());
        self.push_tag(tag);
    }

    /// Encode an INTEGER.
    pub fn push_integer(&mut self, value: i32) {
        let bytes = value.to_be_bytes();
        let start = minimal_signed_start(&bytes);
        self.push_primitive(tag::universal::INTEGER, &bytes[start..]);
    }

    /// Encode an unsigned 32-bit value (Counter32, Gauge32, TimeTicks).
    pub fn push_unsigned32(&mut self, tag: u8, value: u32) {
        let mut bytes = [0u8; 5];
        bytes[1..].copy_from_slice(&value.to_be_bytes());
        let start = minimal_unsigned_start(&bytes);
        self.push_primitive(tag, &bytes[start..]);
    }

    /// Encode a Counter64.
    pub fn push_counter64(&mut self, value: u64) {
        let mut bytes = [0u8; 9];
        bytes[1..].copy_from_slice(&value.to_be_bytes());
        let start = minimal_unsigned_start(&bytes);
        self.push_primitive(tag::application::COUNTER64, &bytes[start..]);
    }

    /// Encode an OCTET STRING.
    pub fn push_octet_string(&mut self, data: &[u8]) {
        self.push_primitive(tag::universal::OCTET_STRING, data);
    }

    /// Encode a NULL.
    pub fn push_null(&mut self) {
        self.push_primitive(tag::universal::NULL, &[]);
    }

    /// Encode an OBJECT IDENTIFIER.
    pub fn push_oid(&mut self, oid: &Oid) {
        let ber = oid.to_ber_smallvec();
        self.push_primitive(tag::universal::OBJECT_IDENTIFIER, &ber);
    }

    /// Encode an IpAddress.
    pub fn push_ip_address(&mut self, addr: [u8; 4]) {
        self.push_primitive(tag::application::IP_ADDRESS, &addr);
    }

    /// Finalize and return the encoded bytes in wire order.
    pub fn finish(mut self) -> Bytes {
        self.buf.reverse();
        Bytes::from(self.buf)
    }
}

impl Default for EncodeBuf {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of the first octet of the minimal two's complement form.
fn minimal_signed_start(bytes: &[u8]) -> usize {
    let mut start = 0;
    while start + 1 < bytes.len() {
        let redundant_zero = bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0;
        let redundant_ones = bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0;
        if !(redundant_zero || redundant_ones) {
            break;
        }
        start += 1;
    }
    start
}

/// Index of the first octet of the minimal form of an unsigned value that
/// was written with one spare leading zero octet.
fn minimal_unsigned_start(bytes: &[u8]) -> usize {
    let mut start = 0;
    while start + 1 < bytes.len() && bytes[start] == 0 && bytes[start + 1] & 0x80 == 0 {
        start += 1;
    }
    start
}
