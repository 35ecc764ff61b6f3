//! SNMPv3 user credential.
//!
//! A [`Credential`] names a USM user and the authoritative engine it talks
//! to. The session treats it as opaque: the codec frames it as
//! noAuthNoPriv USM security parameters (RFC 3414 Section 2.4). Engine
//! discovery and key localisation are left to the caller.

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf};
use crate::error::{DecodeErrorKind, Error, Result};

/// USM user and engine parameters for an SNMPv3 session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Credential {
    /// USM user name.
    pub user_name: Bytes,
    /// Authoritative engine ID.
    pub engine_id: Bytes,
    /// Authoritative engine boots.
    pub engine_boots: u32,
    /// Authoritative engine time.
    pub engine_time: u32,
    /// Context engine ID. Empty means "same as `engine_id`".
    pub context_engine_id: Bytes,
    /// Context name.
    pub context_name: Bytes,
}

impl Credential {
    /// Create a credential for `user_name` with no engine information yet.
    pub fn new(user_name: impl Into<Bytes>) -> Self {
        Self {
            user_name: user_name.into(),
            ..Self::default()
        }
    }

    /// Set the authoritative engine ID, boots and time.
    pub fn engine(mut self, engine_id: impl Into<Bytes>, boots: u32, time: u32) -> Self {
        self.engine_id = engine_id.into();
        self.engine_boots = boots;
        self.engine_time = time;
        self
    }

    /// Set the context engine ID.
    pub fn context_engine_id(mut self, id: impl Into<Bytes>) -> Self {
        self.context_engine_id = id.into();
        self
    }

    /// Set the context name.
    pub fn context_name(mut self, name: impl Into<Bytes>) -> Self {
        self.context_name = name.into();
        self
    }

    /// Context engine ID as sent in the scoped PDU.
    pub(crate) fn effective_context_engine_id(&self) -> &Bytes {
        if self.context_engine_id.is_empty() {
            &self.engine_id
        } else {
            &self.context_engine_id
        }
    }

    /// Encode the USM security parameters SEQUENCE.
    ///
    /// Authentication and privacy parameters are always empty.
    pub(crate) fn encode_usm(&self, buf: &mut EncodeBuf) {
        buf.push_sequence(|buf| {
            buf.push_octet_string(&[]); // msgPrivacyParameters
            buf.push_octet_string(&[]); // msgAuthenticationParameters
            buf.push_octet_string(&self.user_name);
            buf.push_integer(clamp_i32(self.engine_time));
            buf.push_integer(clamp_i32(self.engine_boots));
            buf.push_octet_string(&self.engine_id);
        });
    }

    /// Decode USM security parameters. Context fields are filled in by the
    /// caller from the scoped PDU.
    pub(crate) fn decode_usm(data: Bytes, base_offset: usize) -> Result<Self> {
        let mut outer = Decoder::new(data);
        let mut seq = outer.read_sequence()?;
        let engine_id = seq.read_octet_string()?;
        let engine_boots = non_negative(seq.read_integer()?, base_offset)?;
        let engine_time = non_negative(seq.read_integer()?, base_offset)?;
        let user_name = seq.read_octet_string()?;
        let _auth_params = seq.read_octet_string()?;
        let _priv_params = seq.read_octet_string()?;

        Ok(Self {
            user_name,
            engine_id,
            engine_boots,
            engine_time,
            context_engine_id: Bytes::new(),
            context_name: Bytes::new(),
        })
    }
}

// engineBoots and engineTime are INTEGER (0..2147483647).
fn clamp_i32(v: u32) -> i32 {
    v.min(i32::MAX as u32) as i32
}

fn non_negative(v: i32, offset: usize) -> Result<u32> {
    u32::try_from(v).map_err(|_| Error::decode(offset, DecodeErrorKind::IntegerOverflow))
}
