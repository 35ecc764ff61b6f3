//! Sorted OID storage with GETNEXT lookup.
//!
//! [`OidTable`] is what a simulated agent needs to answer requests: exact
//! lookups for GET, successor lookups for GETNEXT. The session's mock
//! transport and the integration tests answer requests through
//! [`OidTable::answer`]. Only built for tests and with the `testing`
//! feature.

use crate::error::ErrorStatus;
use crate::oid::Oid;
use crate::pdu::{Pdu, PduType};
use crate::value::Value;
use crate::varbind::VarBind;
use crate::version::Version;

/// OID-keyed values kept in lexicographic order.
#[derive(Debug, Clone)]
pub struct OidTable<V> {
    entries: Vec<(Oid, V)>,
}

impl<V> OidTable<V> {
    /// Create a new empty OID table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert an OID-value pair. An existing value for the OID is replaced.
    pub fn insert(&mut self, oid: Oid, value: V) {
        match self.entries.binary_search_by(|(o, _)| o.cmp(&oid)) {
            Ok(idx) => self.entries[idx].1 = value,
            Err(idx) => self.entries.insert(idx, (oid, value)),
        }
    }

    /// Remove an OID, returning its value if present.
    pub fn remove(&mut self, oid: &Oid) -> Option<V> {
        self.entries
            .binary_search_by(|(o, _)| o.cmp(oid))
            .ok()
            .map(|idx| self.entries.remove(idx).1)
    }

    /// Value for an exact OID match.
    pub fn get(&self, oid: &Oid) -> Option<&V> {
        self.entries
            .binary_search_by(|(o, _)| o.cmp(oid))
            .ok()
            .map(|idx| &self.entries[idx].1)
    }

    /// First entry strictly greater than `oid`.
    pub fn get_next(&self, oid: &Oid) -> Option<(&Oid, &V)> {
        let idx = match self.entries.binary_search_by(|(o, _)| o.cmp(oid)) {
            Ok(idx) => idx + 1,
            Err(idx) => idx,
        };
        self.entries.get(idx).map(|(o, v)| (o, v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in lexicographic order.
    pub fn iter(&self) -> impl Iterator<Item = (&Oid, &V)> {
        self.entries.iter().map(|(o, v)| (o, v))
    }
}

impl<V> Default for OidTable<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<(Oid, V)> for OidTable<V> {
    fn from_iter<I: IntoIterator<Item = (Oid, V)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (oid, value) in iter {
            table.insert(oid, value);
        }
        table
    }
}

impl OidTable<Value> {
    /// Answer a request PDU the way an agent would.
    ///
    /// SNMPv1 reports missing objects and the end of the view with a
    /// `noSuchName` error status pointing at the first failing varbind.
    /// Later versions use the exception values instead. SET stores the
    /// supplied values. Notifications and informs are acknowledged by
    /// echoing their varbinds.
    pub fn answer(&mut self, version: Version, request: &Pdu) -> Pdu {
        let mut varbinds = Vec::with_capacity(request.varbinds.len());
        let mut failed_at = None;

        for (i, vb) in request.varbinds.iter().enumerate() {
            let answered = match request.pdu_type {
                PduType::GetRequest => match self.get(&vb.oid) {
                    Some(value) => VarBind::new(vb.oid.clone(), value.clone()),
                    None => VarBind::new(vb.oid.clone(), Value::NoSuchObject),
                },
                PduType::GetNextRequest => match self.get_next(&vb.oid) {
                    Some((oid, value)) => VarBind::new(oid.clone(), value.clone()),
                    None => VarBind::new(vb.oid.clone(), Value::EndOfMibView),
                },
                PduType::SetRequest => {
                    self.insert(vb.oid.clone(), vb.value.clone());
                    vb.clone()
                }
                _ => vb.clone(),
            };
            if answered.value.is_exception() && failed_at.is_none() {
                failed_at = Some(i);
            }
            varbinds.push(answered);
        }

        match (version, failed_at) {
            (Version::V1, Some(i)) => request
                .response(request.varbinds.clone())
                .with_error(ErrorStatus::NoSuchName, i as i32 + 1),
            _ => request.response(varbinds),
        }
    }
}
