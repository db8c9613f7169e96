use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GraphError;

/// Dotted `major.minor.patch` version carried in the file preamble.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FormatVersion {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl FormatVersion {
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn at_least(&self, other: FormatVersion) -> bool {
        *self >= other
    }
}

impl FromStr for FormatVersion {
    type Err = GraphError;

    /// Accepts one to three numeric components; missing ones are zero.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GraphError::InvalidPreamble(format!("bad version string {s:?}"));
        let mut parts = [0u32; 3];
        let mut count = 0;
        for piece in s.split('.') {
            let slot = parts.get_mut(count).ok_or_else(invalid)?;
            *slot = piece.parse().map_err(|_| invalid())?;
            count += 1;
        }
        Ok(Self::new(parts[0], parts[1], parts[2]))
    }
}

impl TryFrom<String> for FormatVersion {
    type Error = GraphError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FormatVersion> for String {
    fn from(v: FormatVersion) -> Self {
        v.to_string()
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
