//! BER (Basic Encoding Rules) codec primitives for SNMP.
//!
//! Encoding uses a reverse buffer ([`EncodeBuf`]); decoding walks a
//! [`Decoder`] over shared [`bytes::Bytes`] without copying content octets.
//! Parsing is permissive in the same places net-snmp is (non-minimal
//! lengths and integers are accepted).

mod decode;
mod encode;
mod length;
pub mod tag;

pub use decode::*;
pub use encode::*;
pub use length::*;
