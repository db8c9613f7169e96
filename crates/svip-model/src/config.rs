use std::fmt;
use std::str::FromStr;

use nrbf_codec::ParseOptions;
use serde::{Deserialize, Serialize};

use crate::error::SvipError;

/// Version label written when nothing better is known.
pub const FALLBACK_LABEL: &str = "SVIP6.0.0";
/// Label of files any editor version opens read-only.
pub const COMPAT_LABEL: &str = "SVIP0.0.0";

/// Which version label an output file carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputVersion {
    /// Keep the input's label, upgrading `SVIP0.0.0` to `SVIP6.0.0`.
    #[default]
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "7.0.0")]
    V7,
    #[serde(rename = "6.0.0")]
    V6,
    /// `SVIP0.0.0`: opens everywhere, but the editor ignores newer curves.
    #[serde(rename = "compat")]
    Compat,
}

impl OutputVersion {
    /// Output label for a project that was read with `input` (e.g. `SVIP7.0.0`).
    pub fn resolve(self, input: &str) -> String {
        let label = match self {
            Self::V7 => "SVIP7.0.0",
            Self::V6 => FALLBACK_LABEL,
            Self::Compat => COMPAT_LABEL,
            Self::Auto if input == COMPAT_LABEL => FALLBACK_LABEL,
            Self::Auto => input,
        };
        normalize_label(label)
    }
}

/// `label` if it has the `SVIP<d>.<d>.<d>` shape, else the fallback.
pub fn normalize_label(label: &str) -> String {
    let well_formed = label
        .strip_prefix("SVIP")
        .map(|rest| {
            let parts: Vec<&str> = rest.split('.').collect();
            parts.len() == 3
                && parts
                    .iter()
                    .all(|p| p.len() == 1 && p.bytes().all(|b| b.is_ascii_digit()))
        })
        .unwrap_or(false);
    if well_formed {
        label.to_owned()
    } else {
        FALLBACK_LABEL.to_owned()
    }
}

impl FromStr for OutputVersion {
    type Err = SvipError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "7.0.0" => Ok(Self::V7),
            "6.0.0" => Ok(Self::V6),
            "compat" | "0.0.0" => Ok(Self::Compat),
            other => Err(SvipError::Config(format!(
                "unknown output version {other:?} (expected auto, 7.0.0, 6.0.0 or compat)"
            ))),
        }
    }
}

impl fmt::Display for OutputVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Auto => "auto",
            Self::V7 => "7.0.0",
            Self::V6 => "6.0.0",
            Self::Compat => "compat",
        })
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvipConfig {
    pub version: OutputVersion,
    pub parse: ParseOptions,
}
