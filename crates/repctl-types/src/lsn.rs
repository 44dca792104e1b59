use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A write-ahead-log position: a monotonically increasing 64-bit value,
/// rendered and parsed in Postgres's `<hi>/<lo>` hex notation (e.g.
/// `0/3000028`) rather than as a plain integer, since that's the only form
/// every consumer (the database, `pg_basebackup`, the node-check protocol)
/// ever emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Lsn(pub u64);

impl Lsn {
    pub const ZERO: Lsn = Lsn(0);

    pub fn from_parts(hi: u32, lo: u32) -> Self {
        Lsn(((hi as u64) << 32) | lo as u64)
    }

    pub fn parts(self) -> (u32, u32) {
        ((self.0 >> 32) as u32, self.0 as u32)
    }
}

impl FromStr for Lsn {
    type Err = LsnParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (hi, lo) = s.split_once('/').ok_or(LsnParseError::MissingSeparator)?;
        let hi = u32::from_str_radix(hi, 16).map_err(|_| LsnParseError::BadHex)?;
        let lo = u32::from_str_radix(lo, 16).map_err(|_| LsnParseError::BadHex)?;
        Ok(Lsn::from_parts(hi, lo))
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hi, lo) = self.parts();
        write!(f, "{hi:X}/{lo:X}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LsnParseError {
    #[error("LSN is missing the '/' separator")]
    MissingSeparator,
    #[error("LSN component is not valid hexadecimal")]
    BadHex,
}
