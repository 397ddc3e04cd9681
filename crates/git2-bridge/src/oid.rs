use std::fmt;
use std::str::FromStr;

use crate::error::Error;
use crate::raw::{git_oid, GIT_ERROR, GIT_ERROR_INVALID, GIT_OID_RAWSZ};

/// A 20-byte object id.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid([u8; GIT_OID_RAWSZ]);

impl Oid {
    pub fn from_bytes(bytes: [u8; GIT_OID_RAWSZ]) -> Oid {
        Oid(bytes)
    }

    /// Copies the id behind `raw`; null reads as the zero id.
    pub(crate) unsafe fn from_raw(raw: *const git_oid) -> Oid {
        if raw.is_null() {
            Oid::zero()
        } else {
            Oid((*raw).id)
        }
    }

    pub fn zero() -> Oid {
        Oid([0; GIT_OID_RAWSZ])
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&b| b == 0)
    }

    pub fn as_bytes(&self) -> &[u8; GIT_OID_RAWSZ] {
        &self.0
    }

    pub fn raw(&self) -> git_oid {
        git_oid { id: self.0 }
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl FromStr for Oid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Oid, Error> {
        let invalid = || Error::new(GIT_ERROR, GIT_ERROR_INVALID, format!("invalid object id {s:?}"));
        if s.len() != GIT_OID_RAWSZ * 2 || !s.is_ascii() {
            return Err(invalid());
        }
        let mut out = [0u8; GIT_OID_RAWSZ];
        for (i, byte) in out.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        Ok(Oid(out))
    }
}
