//! Object identifier type.
//!
//! An [`Oid`] is an ordered sequence of non-negative arcs. The derived
//! ordering is lexicographic over the arcs, which is exactly the order
//! agents use for GETNEXT traversal.

use smallvec::SmallVec;

use crate::error::{DecodeErrorKind, Error, OidErrorKind, Result};

/// Maximum number of arcs accepted when decoding (RFC 2578 Section 3.5).
pub const MAX_OID_LEN: usize = 128;

/// Object identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Oid {
    arcs: SmallVec<[u32; 16]>,
}

impl Oid {
    /// Create an OID from a slice of arcs.
    pub fn from_slice(arcs: &[u32]) -> Self {
        Self {
            arcs: SmallVec::from_slice(arcs),
        }
    }

    /// Parse dotted notation (`1.3.6.1` or `.1.3.6.1`).
    pub fn parse(s: &str) -> Result<Self> {
        let trimmed = s.trim().trim_start_matches('.');
        if trimmed.is_empty() {
            return Err(Error::invalid_oid_with_input(OidErrorKind::Empty, s));
        }

        let mut arcs = SmallVec::new();
        for part in trimmed.split('.') {
            let arc = part
                .parse::<u32>()
                .map_err(|_| Error::invalid_oid_with_input(OidErrorKind::InvalidArc, s))?;
            arcs.push(arc);
        }
        Ok(Self { arcs })
    }

    /// The arcs of this OID.
    pub fn arcs(&self) -> &[u32] {
        &self.arcs
    }

    /// Number of arcs.
    pub fn len(&self) -> usize {
        self.arcs.len()
    }

    /// Whether the OID has no arcs.
    pub fn is_empty(&self) -> bool {
        self.arcs.is_empty()
    }

    /// Whether `prefix` is a (non-strict) prefix of this OID.
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.arcs.starts_with(&prefix.arcs)
    }

    /// Return a new OID with `arc` appended.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.arcs.clone();
        arcs.push(arc);
        Oid { arcs }
    }

    /// Encode the arcs as BER subidentifiers (content octets only).
    ///
    /// The first two arcs are packed as `40 * a0 + a1`. OIDs shorter than two
    /// arcs are padded with zeros so that encoding is total.
    pub fn to_ber_smallvec(&self) -> SmallVec<[u8; 64]> {
        let mut out = SmallVec::new();
        let a0 = self.arcs.first().copied().unwrap_or(0) as u64;
        let a1 = self.arcs.get(1).copied().unwrap_or(0) as u64;
        push_subidentifier(&mut out, a0 * 40 + a1);
        for &arc in self.arcs.iter().skip(2) {
            push_subidentifier(&mut out, arc as u64);
        }
        out
    }

    /// Decode BER content octets into an OID.
    pub fn from_ber(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(Error::decode(0, DecodeErrorKind::InvalidOidEncoding));
        }

        let mut arcs: SmallVec<[u32; 16]> = SmallVec::new();
        let mut value: u64 = 0;
        let mut in_progress = false;

        for (i, &byte) in data.iter().enumerate() {
            // A leading 0x80 within a subidentifier is non-minimal.
            if !in_progress && byte == 0x80 {
                return Err(Error::decode(i, DecodeErrorKind::InvalidOidEncoding));
            }
            value = (value << 7) | (byte & 0x7F) as u64;
            if value > u32::MAX as u64 + 80 {
                return Err(Error::decode(i, DecodeErrorKind::IntegerOverflow));
            }
            in_progress = byte & 0x80 != 0;
            if in_progress {
                continue;
            }

            if arcs.is_empty() {
                let (a0, a1) = match value {
                    v if v < 40 => (0, v),
                    v if v < 80 => (1, v - 40),
                    v => (2, v - 80),
                };
                arcs.push(a0 as u32);
                arcs.push(u32::try_from(a1).map_err(|_| {
                    Error::decode(i, DecodeErrorKind::IntegerOverflow)
                })?);
            } else {
                arcs.push(
                    u32::try_from(value)
                        .map_err(|_| Error::decode(i, DecodeErrorKind::IntegerOverflow))?,
                );
            }
            if arcs.len() > MAX_OID_LEN {
                return Err(Error::decode(
                    i,
                    DecodeErrorKind::OidTooLong {
                        count: arcs.len(),
                        max: MAX_OID_LEN,
                    },
                ));
            }
            value = 0;
        }

        if in_progress {
            return Err(Error::decode(data.len(), DecodeErrorKind::TruncatedData));
        }
        Ok(Self { arcs })
    }
}

fn push_subidentifier(out: &mut SmallVec<[u8; 64]>, value: u64) {
    let mut tmp = [0u8; 10];
    let mut i = tmp.len();
    let mut v = value;
    loop {
        i -= 1;
        tmp[i] = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            break;
        }
    }
    let last = tmp.len() - 1;
    for (idx, byte) in tmp.iter().enumerate().skip(i) {
        out.push(if idx == last { *byte } else { byte | 0x80 });
    }
}

impl std::fmt::Display for Oid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for arc in &self.arcs {
            if !first {
                f.write_str(".")?;
            }
            write!(f, "{}", arc)?;
            first = false;
        }
        Ok(())
    }
}

impl std::str::FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl From<&[u32]> for Oid {
    fn from(arcs: &[u32]) -> Self {
        Self::from_slice(arcs)
    }
}

impl<const N: usize> From<[u32; N]> for Oid {
    fn from(arcs: [u32; N]) -> Self {
        Self::from_slice(&arcs)
    }
}

/// Construct an [`Oid`] from literal arcs.
///
/// ```
/// use snmp_session::oid;
/// let sys_descr = oid!(1, 3, 6, 1, 2, 1, 1, 1, 0);
/// assert_eq!(sys_descr.to_string(), "1.3.6.1.2.1.1.1.0");
/// ```
#[macro_export]
macro_rules! oid {
    ($($arc:expr),* $(,)?) => {
        $crate::oid::Oid::from_slice(&[$($arc),*])
    };
}
