//! Protocol data units.

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, ErrorStatus, Result};
use crate::varbind::{VarBind, decode_varbind_list, encode_varbind_list};

/// PDU type, i.e. the context-specific tag of the PDU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    Response,
    SetRequest,
    GetBulkRequest,
    InformRequest,
    TrapV2,
    Report,
}

impl PduType {
    /// BER tag of this PDU type.
    pub const fn tag(self) -> u8 {
        match self {
            PduType::GetRequest => tag::pdu::GET_REQUEST,
            PduType::GetNextRequest => tag::pdu::GET_NEXT_REQUEST,
            PduType::Response => tag::pdu::RESPONSE,
            PduType::SetRequest => tag::pdu::SET_REQUEST,
            PduType::GetBulkRequest => tag::pdu::GET_BULK_REQUEST,
            PduType::InformRequest => tag::pdu::INFORM_REQUEST,
            PduType::TrapV2 => tag::pdu::TRAP_V2,
            PduType::Report => tag::pdu::REPORT,
        }
    }

    /// Map a tag back to a PDU type.
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            tag::pdu::GET_REQUEST => Some(PduType::GetRequest),
            tag::pdu::GET_NEXT_REQUEST => Some(PduType::GetNextRequest),
            tag::pdu::RESPONSE => Some(PduType::Response),
            tag::pdu::SET_REQUEST => Some(PduType::SetRequest),
            tag::pdu::GET_BULK_REQUEST => Some(PduType::GetBulkRequest),
            tag::pdu::INFORM_REQUEST => Some(PduType::InformRequest),
            tag::pdu::TRAP_V2 => Some(PduType::TrapV2),
            tag::pdu::REPORT => Some(PduType::Report),
            _ => None,
        }
    }

    /// Confirmed-class PDUs expect a Response from the receiver (RFC 3411 Section 2.8).
    pub const fn is_confirmed(self) -> bool {
        matches!(
            self,
            PduType::GetRequest
                | PduType::GetNextRequest
                | PduType::SetRequest
                | PduType::GetBulkRequest
                | PduType::InformRequest
        )
    }
}

impl std::fmt::Display for PduType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PduType::GetRequest => "GetRequest",
            PduType::GetNextRequest => "GetNextRequest",
            PduType::Response => "Response",
            PduType::SetRequest => "SetRequest",
            PduType::GetBulkRequest => "GetBulkRequest",
            PduType::InformRequest => "InformRequest",
            PduType::TrapV2 => "SNMPv2-Trap",
            PduType::Report => "Report",
        };
        f.write_str(name)
    }
}

/// A request, response or notification PDU.
///
/// For GetBulk, `error_status`/`error_index` carry non-repeaters and
/// max-repetitions on the wire; this crate never sends GetBulk.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pdu {
    pub pdu_type: PduType,
    pub request_id: i32,
    pub error_status: ErrorStatus,
    pub error_index: i32,
    pub varbinds: Vec<VarBind>,
}

impl Pdu {
    /// Create a PDU with no error status.
    pub fn new(pdu_type: PduType, request_id: i32, varbinds: Vec<VarBind>) -> Self {
        Self {
            pdu_type,
            request_id,
            error_status: ErrorStatus::NoError,
            error_index: 0,
            varbinds,
        }
    }

    /// Build the Response a well-behaved agent would send for this request.
    pub fn response(&self, varbinds: Vec<VarBind>) -> Pdu {
        Pdu::new(PduType::Response, self.request_id, varbinds)
    }

    /// Set the error status and index (1-based varbind position, 0 for none).
    pub fn with_error(mut self, status: ErrorStatus, index: i32) -> Self {
        self.error_status = status;
        self.error_index = index;
        self
    }

    /// Whether the agent reported `noSuchName` (SNMPv1 end of traversal).
    pub fn is_no_such_name(&self) -> bool {
        self.error_status == ErrorStatus::NoSuchName
    }

    /// Encode to BER.
    pub fn encode(&self, buf: &mut EncodeBuf) {
        buf.push_constructed(self.pdu_type.tag(), |buf| {
            encode_varbind_list(buf, &self.varbinds);
            buf.push_integer(self.error_index);
            buf.push_integer(self.error_status.as_i32());
            buf.push_integer(self.request_id);
        });
    }

    /// Decode from BER.
    pub fn decode(decoder: &mut Decoder) -> Result<Self> {
        let at = decoder.offset();
        let tag = decoder
            .peek_tag()
            .ok_or_else(|| Error::decode(at, DecodeErrorKind::TruncatedData))?;
        let pdu_type = PduType::from_tag(tag)
            .ok_or_else(|| Error::decode(at, DecodeErrorKind::UnknownPduType(tag)))?;

        let mut body = decoder.read_constructed(tag)?;
        let request_id = body.read_integer()?;
        let error_status = ErrorStatus::from_i32(body.read_integer()?);
        let error_index = body.read_integer()?;
        let varbinds = decode_varbind_list(&mut body)?;

        Ok(Pdu {
            pdu_type,
            request_id,
            error_status,
            error_index,
            varbinds,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oid;
    use bytes::Bytes;

    #[test]
    fn test_get_request_wire_form() {
        let pdu = Pdu::new(
            PduType::GetRequest,
            1,
            vec![VarBind::null(oid!(1, 3, 6, 1))],
        );
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        assert_eq!(
            buf.finish().as_ref(),
            &[
                0xA0, 0x14, // GetRequest
                0x02, 0x01, 0x01, // request-id
                0x02, 0x01, 0x00, // error-status
                0x02, 0x01, 0x00, // error-index
                0x30, 0x09, 0x30, 0x07, 0x06, 0x03, 0x2B, 0x06, 0x01, 0x05, 0x00,
            ]
        );

        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        assert_eq!(Pdu::decode(&mut Decoder::new(buf.finish())).unwrap(), pdu);
    }

    #[test]
    fn test_error_status_survives_decode() {
        let pdu = Pdu::new(PduType::Response, 77, vec![VarBind::null(oid!(1, 3, 6, 1))])
            .with_error(ErrorStatus::NoSuchName, 1);
        let mut buf = EncodeBuf::new();
        pdu.encode(&mut buf);
        let decoded = Pdu::decode(&mut Decoder::new(buf.finish())).unwrap();
        assert!(decoded.is_no_such_name());
        assert_eq!(decoded.error_index, 1);
        assert_eq!(decoded.request_id, 77);
    }

    #[test]
    fn test_unknown_pdu_tag() {
        // SNMPv1 Trap-PDU (0xA4) is not supported.
        let mut decoder = Decoder::new(Bytes::from_static(&[0xA4, 0x00]));
        assert!(matches!(
            Pdu::decode(&mut decoder),
            Err(Error::Decode {
                kind: DecodeErrorKind::UnknownPduType(0xA4),
                ..
            })
        ));
    }

    #[test]
    fn test_confirmed_class() {
        assert!(PduType::GetNextRequest.is_confirmed());
        assert!(PduType::InformRequest.is_confirmed());
        assert!(!PduType::TrapV2.is_confirmed());
        assert!(!PduType::Response.is_confirmed());
    }
}
