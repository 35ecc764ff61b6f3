//! SNMP value type.
//!
//! The enum variant is the value-type tag of a varbind. Requests carry
//! [`Value::Null`]; agents signal the end of a traversal with
//! [`Value::EndOfMibView`].

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};
use crate::oid::Oid;

/// A typed varbind value.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    /// INTEGER (Integer32)
    Integer(i32),
    /// OCTET STRING
    OctetString(Bytes),
    /// NULL
    Null,
    /// OBJECT IDENTIFIER
    ObjectIdentifier(Oid),
    /// IpAddress
    IpAddress([u8; 4]),
    /// Counter32
    Counter32(u32),
    /// Gauge32 / Unsigned32
    Gauge32(u32),
    /// TimeTicks (hundredths of a second)
    TimeTicks(u32),
    /// Opaque
    Opaque(Bytes),
    /// Counter64
    Counter64(u64),
    /// noSuchObject exception
    NoSuchObject,
    /// noSuchInstance exception
    NoSuchInstance,
    /// endOfMibView exception
    EndOfMibView,
    /// Any tag this crate does not interpret.
    Unknown { tag: u8, data: Bytes },
}

impl Value {
    /// The BER tag for this value.
    pub fn tag(&self) -> u8 {
        match self {
            Value::Integer(_) => tag::universal::INTEGER,
            Value::OctetString(_) => tag::universal::OCTET_STRING,
            Value::Null => tag::universal::NULL,
            Value::ObjectIdentifier(_) => tag::universal::OBJECT_IDENTIFIER,
            Value::IpAddress(_) => tag::application::IP_ADDRESS,
            Value::Counter32(_) => tag::application::COUNTER32,
            Value::Gauge32(_) => tag::application::GAUGE32,
            Value::TimeTicks(_) => tag::application::TIMETICKS,
            Value::Opaque(_) => tag::application::OPAQUE,
            Value::Counter64(_) => tag::application::COUNTER64,
            Value::NoSuchObject => tag::context::NO_SUCH_OBJECT,
            Value::NoSuchInstance => tag::context::NO_SUCH_INSTANCE,
            Value::EndOfMibView => tag::context::END_OF_MIB_VIEW,
            Value::Unknown { tag, .. } => *tag,
        }
    }

    /// Whether this is one of the SNMPv2 exception values.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView
        )
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        match self {
            Value::Integer(v) => buf.push_integer(*v),
            Value::OctetString(data) => buf.push_octet_string(data),
            Value::Null => buf.push_null(),
            Value::ObjectIdentifier(oid) => buf.push_oid(oid),
            Value::IpAddress(addr) => buf.push_ip_address(*addr),
            Value::Counter32(v) | Value::Gauge32(v) | Value::TimeTicks(v) => {
                buf.push_unsigned32(self.tag(), *v)
            }
            Value::Opaque(data) => buf.push_primitive(tag::application::OPAQUE, data),
            Value::Counter64(v) => buf.push_counter64(*v),
            Value::NoSuchObject | Value::NoSuchInstance | Value::EndOfMibView => {
                buf.push_primitive(self.tag(), &[])
            }
            Value::Unknown { tag, data } => buf.push_primitive(*tag, data),
        }
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let next = decoder
            .peek_tag()
            .ok_or_else(|| Error::decode(decoder.offset(), DecodeErrorKind::TruncatedData))?;

        let value = match next {
            tag::universal::INTEGER => Value::Integer(decoder.read_integer()?),
            tag::universal::OCTET_STRING => Value::OctetString(decoder.read_octet_string()?),
            tag::universal::NULL => {
                decoder.read_null()?;
                Value::Null
            }
            tag::universal::OBJECT_IDENTIFIER => Value::ObjectIdentifier(decoder.read_oid()?),
            tag::application::IP_ADDRESS => Value::IpAddress(decoder.read_ip_address()?),
            tag::application::COUNTER32 => Value::Counter32(decoder.read_unsigned32(next)?),
            tag::application::GAUGE32 => Value::Gauge32(decoder.read_unsigned32(next)?),
            tag::application::TIMETICKS => Value::TimeTicks(decoder.read_unsigned32(next)?),
            tag::application::COUNTER64 => Value::Counter64(decoder.read_counter64()?),
            tag::application::OPAQUE => Value::Opaque(decoder.read_expected(next)?),
            tag::context::NO_SUCH_OBJECT => {
                decoder.read_tlv()?;
                Value::NoSuchObject
            }
            tag::context::NO_SUCH_INSTANCE => {
                decoder.read_tlv()?;
                Value::NoSuchInstance
            }
            tag::context::END_OF_MIB_VIEW => {
                decoder.read_tlv()?;
                Value::EndOfMibView
            }
            _ => {
                let (tag, data) = decoder.read_tlv()?;
                Value::Unknown { tag, data }
            }
        };
        Ok(value)
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Integer(v) => write!(f, "INTEGER: {}", v),
            Value::OctetString(data) => match std::str::from_utf8(data) {
                Ok(s) if !s.chars().any(char::is_control) => write!(f, "STRING: \"{}\"", s),
                _ => {
                    write!(f, "Hex-STRING:")?;
                    for b in data.iter() {
                        write!(f, " {:02X}", b)?;
                    }
                    Ok(())
                }
            },
            Value::Null => write!(f, "NULL"),
            Value::ObjectIdentifier(oid) => write!(f, "OID: {}", oid),
            Value::IpAddress([a, b, c, d]) => write!(f, "IpAddress: {}.{}.{}.{}", a, b, c, d),
            Value::Counter32(v) => write!(f, "Counter32: {}", v),
            Value::Gauge32(v) => write!(f, "Gauge32: {}", v),
            Value::TimeTicks(v) => write!(f, "Timeticks: ({})", v),
            Value::Opaque(data) => write!(f, "Opaque: {} bytes", data.len()),
            Value::Counter64(v) => write!(f, "Counter64: {}", v),
            Value::NoSuchObject => write!(f, "noSuchObject"),
            Value::NoSuchInstance => write!(f, "noSuchInstance"),
            Value::EndOfMibView => write!(f, "endOfMibView"),
            Value::Unknown { tag, data } => {
                write!(f, "Unknown(0x{:02X}): {} bytes", tag, data.len())
            }
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::OctetString(Bytes::copy_from_slice(s.as_bytes()))
    }
}

impl From<Oid> for Value {
    fn from(oid: Oid) -> Self {
        Value::ObjectIdentifier(oid)
    }
}
