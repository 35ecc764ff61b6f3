//! Prelude module for convenient imports.
//!
//! ```rust,no_run
//! use snmp_session::prelude::*;
//! ```
//!
//! This imports:
//! - Session types: [`Session`], [`Walk`], [`WalkControl`]
//! - Data types: [`Message`], [`Oid`], [`Value`], [`VarBind`], [`Credential`]
//! - Error handling: [`Error`], [`Result`]
//! - The [`oid!`] macro for compile-time OID construction

pub use crate::credential::Credential;
pub use crate::error::{Error, ErrorStatus, Result};
pub use crate::message::Message;
pub use crate::oid::Oid;
pub use crate::session::{Session, Walk, WalkControl};
pub use crate::value::Value;
pub use crate::varbind::VarBind;
pub use crate::version::Version;

#[doc(no_inline)]
pub use crate::oid;
