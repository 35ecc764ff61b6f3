//! Async SNMP session engine.
//!
//! `snmp-session` sends typed SNMP requests over UDP, correlates replies by
//! request ID, retransmits on timeout and builds lazy GETNEXT walks on top of
//! single request/response exchanges.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use snmp_session::{Session, oid};
//!
//! # async fn example() -> snmp_session::Result<()> {
//! let session = Session::community("192.168.1.1", b"public")
//!     .retries(2)
//!     .build()
//!     .await?;
//!
//! let reply = session.get(&oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)).await?;
//! for vb in &reply.pdu.varbinds {
//!     println!("{vb}");
//! }
//!
//! session.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! Each [`Session`] owns one dispatcher task. The dispatcher is the only code
//! that touches the socket, the pending request table and the retransmission
//! timers; session handles talk to it over a channel and wait on a oneshot
//! for their reply. Handles are cheap to clone and can be used concurrently.
//!
//! The wire format sits behind the [`Codec`] trait. [`BerCodec`] implements
//! SNMPv1/v2c community messages and SNMPv3 noAuthNoPriv framing.

pub mod ber;
pub mod codec;
pub mod credential;
pub mod error;
pub mod message;
pub mod oid;
#[cfg(any(test, feature = "testing"))]
pub mod oid_table;
pub mod pdu;
pub mod prelude;
pub mod session;
pub mod transport;
pub mod value;
pub mod varbind;
pub mod version;

pub(crate) mod util;

pub use codec::{BerCodec, Codec};
pub use credential::Credential;
pub use error::{Error, ErrorStatus, Result};
pub use message::{Message, Security};
pub use oid::Oid;
pub use pdu::{Pdu, PduType};
pub use session::{Session, SessionBuilder, SessionConfig, Walk, WalkControl};
pub use value::Value;
pub use varbind::VarBind;
pub use version::Version;
