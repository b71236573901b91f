// ── Object identity ──
//
// Every addressable object carries a controller-assigned numeric id that
// is unique across the whole system and stable for the object's lifetime.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

/// Vantage object id, as assigned by the controller hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vid(u32);

impl Vid {
    pub const fn new(vid: u32) -> Self {
        Self(vid)
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for Vid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Vid {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u32> for Vid {
    fn from(vid: u32) -> Self {
        Self(vid)
    }
}

impl From<Vid> for u32 {
    fn from(vid: Vid) -> Self {
        vid.0
    }
}
