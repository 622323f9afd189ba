//! Economic phase labels.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Macro-economic regime derived from GDP growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Expansion,
    Recession,
}

impl Phase {
    pub const ALL: [Phase; 2] = [Phase::Expansion, Phase::Recession];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Expansion => "expansion",
            Phase::Recession => "recession",
        }
    }
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Expansion
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
