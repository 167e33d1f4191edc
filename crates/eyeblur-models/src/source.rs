//! Video source kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where an input video comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// YouTube watch URL, fetched with yt-dlp.
    Youtube,
    /// Direct Vimeo file URL, fetched over HTTP.
    Vimeo,
    /// File already on local disk.
    Local,
}

/// Returned when a source type string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid source type: {0}")]
pub struct SourceTypeError(pub String);

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Youtube => "youtube",
            SourceType::Vimeo => "vimeo",
            SourceType::Local => "local",
        }
    }

    /// Remote sources are downloaded into a temporary file that is removed
    /// once processing succeeds.
    pub fn is_remote(&self) -> bool {
        matches!(self, SourceType::Youtube | SourceType::Vimeo)
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = SourceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "youtube" => Ok(SourceType::Youtube),
            "vimeo" => Ok(SourceType::Vimeo),
            "local" => Ok(SourceType::Local),
            other => Err(SourceTypeError(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_sources() {
        assert_eq!("youtube".parse::<SourceType>().unwrap(), SourceType::Youtube);
        assert_eq!("vimeo".parse::<SourceType>().unwrap(), SourceType::Vimeo);
        assert_eq!("local".parse::<SourceType>().unwrap(), SourceType::Local);
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("YouTube".parse::<SourceType>().is_err());
        assert!("ftp".parse::<SourceType>().is_err());
    }

    #[test]
    fn test_remote_sources() {
        assert!(SourceType::Youtube.is_remote());
        assert!(SourceType::Vimeo.is_remote());
        assert!(!SourceType::Local.is_remote());
    }
}
