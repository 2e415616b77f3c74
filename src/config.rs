//! Scheme-qualified location strings
//!
//! A store backend is selected by a location such as `file:///var/data/blobs`
//! or `mem://`. The scheme picks the driver out of a [`Registry`] and the
//! remainder is handed to the driver factory to interpret.
//!
//! [`Registry`]: crate::driver::Registry

use std::fmt;
use std::str::FromStr;

use crate::{Error, Result};

/// A parsed backend location: a scheme plus a driver-dependent value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    scheme: String,
    value: String,
}

impl Location {
    pub fn new(scheme: impl Into<String>, value: impl Into<String>) -> Self {
        Location {
            scheme: scheme.into(),
            value: value.into(),
        }
    }

    /// The driver scheme, e.g. `file`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// The driver-dependent remainder, e.g. a directory path.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl FromStr for Location {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (scheme, value) = s
            .split_once("://")
            .ok_or_else(|| Error::Config(format!("location {s:?} has no scheme")))?;
        if scheme.is_empty() {
            return Err(Error::Config(format!("location {s:?} has an empty scheme")));
        }
        Ok(Location::new(scheme, value))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let loc: Location = "file:///var/data/blobs".parse().unwrap();
        assert_eq!(loc.scheme(), "file");
        assert_eq!(loc.value(), "/var/data/blobs");
    }

    #[test]
    fn test_parse_empty_value() {
        let loc: Location = "mem://".parse().unwrap();
        assert_eq!(loc.scheme(), "mem");
        assert_eq!(loc.value(), "");
    }

    #[test]
    fn test_missing_scheme_is_config_error() {
        assert!(matches!(
            "/var/data/blobs".parse::<Location>(),
            Err(Error::Config(_))
        ));
        assert!(matches!("://x".parse::<Location>(), Err(Error::Config(_))));
    }

    #[test]
    fn test_display_roundtrip() {
        let loc: Location = "file://blobs".parse().unwrap();
        assert_eq!(loc.to_string(), "file://blobs");
    }
}
