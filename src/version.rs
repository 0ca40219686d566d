//! Instance metadata API versions.

use std::fmt;
use std::str::FromStr;

/// Supported instance metadata API versions.
///
/// The version decides the shape of the response: older versions wrap the
/// VM identity fields in a `compute` object, newer ones return them flat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum InstanceApiVersion {
    /// `2019-08-15`, fields nested under `compute`.
    #[default]
    V2019_08_15,
    /// `2021-02-01`, flat fields.
    V2021_02_01,
}

impl InstanceApiVersion {
    /// Every supported version, oldest first.
    pub const ALL: [InstanceApiVersion; 2] =
        [InstanceApiVersion::V2019_08_15, InstanceApiVersion::V2021_02_01];

    /// Value of the `api-version` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceApiVersion::V2019_08_15 => "2019-08-15",
            InstanceApiVersion::V2021_02_01 => "2021-02-01",
        }
    }

    /// Key wrapping the identity fields, if any.
    pub fn envelope(&self) -> Option<&'static str> {
        match self {
            InstanceApiVersion::V2019_08_15 => Some("compute"),
            InstanceApiVersion::V2021_02_01 => None,
        }
    }
}

impl fmt::Display for InstanceApiVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceApiVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        InstanceApiVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown api version: {} (expected 2019-08-15 or 2021-02-01)",
                    s
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_display() {
        assert_eq!(InstanceApiVersion::V2019_08_15.to_string(), "2019-08-15");
        assert_eq!(InstanceApiVersion::V2021_02_01.to_string(), "2021-02-01");
    }

    #[test]
    fn test_default_version() {
        assert_eq!(InstanceApiVersion::default(), InstanceApiVersion::V2019_08_15);
    }

    #[test]
    fn test_envelope() {
        assert_eq!(InstanceApiVersion::V2019_08_15.envelope(), Some("compute"));
        assert_eq!(InstanceApiVersion::V2021_02_01.envelope(), None);
    }

    #[test]
    fn test_from_str() {
        for version in InstanceApiVersion::ALL {
            assert_eq!(version.as_str().parse::<InstanceApiVersion>(), Ok(version));
        }
        assert!("2017-01-01".parse::<InstanceApiVersion>().is_err());
    }
}
