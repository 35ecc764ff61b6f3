//! SNMP message framing.
//!
//! - SNMPv1/v2c (RFC 1157, RFC 1901): `SEQUENCE { version, community, PDU }`
//! - SNMPv3 (RFC 3412): `SEQUENCE { version, msgGlobalData,
//!   msgSecurityParameters, scopedPDU }`, noAuthNoPriv only.
//!
//! Correlation always uses the PDU's request-id. For v3 the msgID is set to
//! the same value so reports from the agent line up as well.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::credential::Credential;
use crate::error::{DecodeErrorKind, Error, Result};
use crate::pdu::Pdu;
use crate::varbind::VarBind;
use crate::version::Version;

/// msgMaxSize advertised in SNMPv3 headers.
pub const DEFAULT_MAX_MESSAGE_SIZE: u32 = 65535;

/// USM security model number (RFC 3411).
const SECURITY_MODEL_USM: i32 = 3;

const FLAG_AUTH: u8 = 0x01;
const FLAG_PRIV: u8 = 0x02;
const FLAG_REPORTABLE: u8 = 0x04;

/// Per-message security information.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Security {
    /// Community string (SNMPv1/v2c).
    Community(Bytes),
    /// USM user (SNMPv3).
    Usm(Credential),
}

/// A complete SNMP message: version, security and exactly one PDU.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Message {
    pub version: Version,
    pub security: Security,
    pub pdu: Pdu,
}

impl Message {
    /// Create a message.
    pub fn new(version: Version, security: Security, pdu: Pdu) -> Self {
        Self {
            version,
            security,
            pdu,
        }
    }

    /// Create a community-based (v1/v2c) message.
    pub fn community(version: Version, community: impl Into<Bytes>, pdu: Pdu) -> Self {
        Self::new(version, Security::Community(community.into()), pdu)
    }

    /// Build the Response message an agent would send back for this one.
    pub fn response(&self, varbinds: Vec<VarBind>) -> Message {
        Message::new(
            self.version,
            self.security.clone(),
            self.pdu.response(varbinds),
        )
    }

    /// Community string, if this is a v1/v2c message.
    pub fn community_string(&self) -> Option<&Bytes> {
        match &self.security {
            Security::Community(c) => Some(c),
            Security::Usm(_) => None,
        }
    }

    /// Encode to BER.
    pub fn encode(&self) -> Bytes {
        let mut buf = EncodeBuf::new();
        match &self.security {
            Security::Community(community) => {
                buf.push_sequence(|buf| {
                    self.pdu.encode(buf);
                    buf.push_octet_string(community);
                    buf.push_integer(self.version.as_i32());
                });
            }
            Security::Usm(credential) => {
                buf.push_sequence(|buf| {
                    // scopedPDU
                    buf.push_sequence(|buf| {
                        self.pdu.encode(buf);
                        buf.push_octet_string(&credential.context_name);
                        buf.push_octet_string(credential.effective_context_engine_id());
                    });

                    // msgSecurityParameters is an OCTET STRING wrapping the USM SEQUENCE.
                    let mut usm = EncodeBuf::new();
                    credential.encode_usm(&mut usm);
                    buf.push_octet_string(&usm.finish());

                    // msgGlobalData
                    let flags = if self.pdu.pdu_type.is_confirmed() {
                        FLAG_REPORTABLE
                    } else {
                        0
                    };
                    buf.push_sequence(|buf| {
                        buf.push_integer(SECURITY_MODEL_USM);
                        buf.push_octet_string(&[flags]);
                        buf.push_integer(DEFAULT_MAX_MESSAGE_SIZE as i32);
                        buf.push_integer(self.pdu.request_id);
                    });

                    buf.push_integer(Version::V3.as_i32());
                });
            }
        }
        buf.finish()
    }

    /// Decode from BER. The whole input must be one message.
    pub fn decode(data: Bytes) -> Result<Self> {
        let mut outer = Decoder::new(data);
        let mut seq = outer.read_sequence()?;
        if !outer.is_empty() {
            return Err(Error::decode(
                outer.offset(),
                DecodeErrorKind::TrailingData {
                    remaining: outer.remaining(),
                },
            ));
        }

        let at = seq.offset();
        let raw_version = seq.read_integer()?;
        let version = Version::from_i32(raw_version)
            .ok_or_else(|| Error::decode(at, DecodeErrorKind::UnknownVersion(raw_version)))?;

        match version {
            Version::V1 | Version::V2c => {
                let community = seq.read_octet_string()?;
                let pdu = Pdu::decode(&mut seq)?;
                Ok(Message::community(version, community, pdu))
            }
            Version::V3 => decode_v3(&mut seq),
        }
    }
}

fn decode_v3(seq: &mut Decoder) -> Result<Message> {
    let mut global = seq.read_sequence()?;
    let _msg_id = global.read_integer()?;
    let _max_size = global.read_integer()?;
    let flags_at = global.offset();
    let flags = global.read_octet_string()?;
    let model_at = global.offset();
    let model = global.read_integer()?;

    let flags = flags
        .first()
        .copied()
        .ok_or_else(|| Error::decode(flags_at, DecodeErrorKind::TruncatedData))?;
    if flags & FLAG_PRIV != 0 {
        return Err(Error::decode(flags_at, DecodeErrorKind::EncryptedScopedPdu));
    }
    if model != SECURITY_MODEL_USM {
        return Err(Error::decode(
            model_at,
            DecodeErrorKind::UnknownSecurityModel(model),
        ));
    }
    // The auth flag is accepted without verifying a digest.

    let usm_at = seq.offset();
    let usm = seq.read_octet_string()?;
    let mut credential = Credential::decode_usm(usm, usm_at)?;

    let mut scoped = seq.read_sequence()?;
    credential.context_engine_id = scoped.read_octet_string()?;
    credential.context_name = scoped.read_octet_string()?;
    let pdu = Pdu::decode(&mut scoped)?;

    Ok(Message::new(Version::V3, Security::Usm(credential), pdu))
}
