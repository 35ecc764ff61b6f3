//! Common test fixtures and constants.

use snmp_session::oid_table::OidTable;
use snmp_session::{Oid, Value, oid};

// =============================================================================
// Standard system MIB OIDs (1.3.6.1.2.1.1.*)
// =============================================================================

pub fn sys_descr() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 1, 0)
}
pub fn sys_object_id() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 2, 0)
}
pub fn sys_uptime() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 3, 0)
}
pub fn sys_contact() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 4, 0)
}
pub fn sys_name() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 5, 0)
}
pub fn sys_location() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 6, 0)
}
pub fn sys_services() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1, 7, 0)
}

/// System subtree root: 1.3.6.1.2.1.1
pub fn system_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 1)
}

/// Interfaces subtree root: 1.3.6.1.2.1.2
pub fn interfaces_subtree() -> Oid {
    oid!(1, 3, 6, 1, 2, 1, 2)
}

/// Nothing in [`system_mib`] lives here.
pub fn nonexistent_oid() -> Oid {
    oid!(1, 3, 6, 1, 99, 99, 99, 0)
}

pub const COMMUNITY: &[u8] = b"public";

/// The seven system group scalars plus two ifNumber-style entries under
/// the interfaces subtree.
pub fn system_mib() -> OidTable<Value> {
    let mut table = OidTable::new();
    table.insert(sys_descr(), Value::from("Linux edge-7 6.1.0 x86_64"));
    table.insert(
        sys_object_id(),
        Value::ObjectIdentifier(oid!(1, 3, 6, 1, 4, 1, 8072, 3, 2, 10)),
    );
    table.insert(sys_uptime(), Value::TimeTicks(123_456));
    table.insert(sys_contact(), Value::from("noc@example.net"));
    table.insert(sys_name(), Value::from("edge-7"));
    table.insert(sys_location(), Value::from("rack 12"));
    table.insert(sys_services(), Value::Integer(72));
    table.insert(oid!(1, 3, 6, 1, 2, 1, 2, 1, 0), Value::Integer(2));
    table.insert(oid!(1, 3, 6, 1, 2, 1, 2, 2, 1, 1, 1), Value::Integer(1));
    table
}
