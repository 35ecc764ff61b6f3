//! Wire codec boundary.
//!
//! The session never looks at bytes itself: it hands [`Message`]s to a
//! [`Codec`] for encoding and asks it to decode every inbound datagram.

use bytes::Bytes;

use crate::error::Result;
use crate::message::Message;

/// Serialises messages to and from datagrams.
///
/// `encode` must be deterministic and total. `decode` fails with
/// [`Error::Decode`](crate::Error::Decode); the session logs and drops such
/// datagrams, so decode errors never reach a caller.
pub trait Codec: Send + Sync + 'static {
    /// Encode a message.
    fn encode(&self, message: &Message) -> Bytes;

    /// Decode one datagram.
    fn decode(&self, data: Bytes) -> Result<Message>;
}

/// BER codec for SNMPv1, v2c and v3 (noAuthNoPriv) messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct BerCodec;

impl Codec for BerCodec {
    fn encode(&self, message: &Message) -> Bytes {
        message.encode()
    }

    fn decode(&self, data: Bytes) -> Result<Message> {
        Message::decode(data)
    }
}
