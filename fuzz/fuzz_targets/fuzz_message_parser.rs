#![no_main]

use bytes::Bytes;
use libfuzzer_sys::fuzz_target;

use snmp_session::codec::{BerCodec, Codec};
use snmp_session::message::Message;
use snmp_session::pdu::Pdu;

fuzz_target!(|data: &[u8]| {
    let bytes = Bytes::copy_from_slice(data);

    // Whole-message decoder (dispatches on version)
    if let Ok(message) = Message::decode(bytes.clone()) {
        // Anything that decodes must survive a re-encode and decode.
        let encoded = BerCodec.encode(&message);
        let _ = BerCodec.decode(encoded);
    }

    // PDU decoder on its own
    let mut decoder = snmp_session::ber::Decoder::new(bytes);
    let _ = Pdu::decode(&mut decoder);
});
