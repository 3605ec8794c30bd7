//! Platform regions and service hostnames.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// Geographic region hosting an environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Region {
    /// Asia-Pacific.
    Ap,
    /// Australia.
    Au,
    /// Canada.
    Ca,
    /// Europe.
    Eu,
    /// North America.
    Na,
    /// Singapore.
    Sg,
}

impl Region {
    /// All regions.
    pub const ALL: [Self; 6] = [Self::Ap, Self::Au, Self::Ca, Self::Eu, Self::Na, Self::Sg];

    /// Region code, e.g. `EU`.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::Ap => "AP",
            Self::Au => "AU",
            Self::Ca => "CA",
            Self::Eu => "EU",
            Self::Na => "NA",
            Self::Sg => "SG",
        }
    }

    /// Top-level domain of the region's service hostnames.
    #[must_use]
    pub const fn tld(self) -> &'static str {
        match self {
            Self::Ap => "asia",
            Self::Au => "com.au",
            Self::Ca => "ca",
            Self::Eu => "eu",
            Self::Na => "com",
            Self::Sg => "sg",
        }
    }

    /// Default API hostname.
    #[must_use]
    pub fn api_hostname(self) -> String {
        format!("api.pingone.{}", self.tld())
    }

    /// Default auth hostname.
    #[must_use]
    pub fn auth_hostname(self) -> String {
        format!("auth.pingone.{}", self.tld())
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|r| r.code().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ConfigError::InvalidRegion {
                code: s.to_string(),
            })
    }
}
