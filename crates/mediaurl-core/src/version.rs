//! SDK version helpers.
//!
//! Addons declare the SDK they were built with in `sdkVersion`. Three
//! protocol generations are distinguished; anything older than a threshold
//! needs wire migration.

use semver::Version;

use crate::protocol::DEFAULT_SDK_VERSION;

/// First SDK of the 2.x protocol (catalogs, pages).
pub const V2_THRESHOLD: &str = "2.0.0-alpha.0";
/// First SDK with `options.shape` and `initialData`.
pub const V2_2_THRESHOLD: &str = "2.2.0-alpha.0";

/// Parse a semantic version; `None` for missing or malformed input.
pub fn parse(version: Option<&str>) -> Option<Version> {
    let raw = version?.trim();
    match Version::parse(raw) {
        Ok(v) => Some(v),
        Err(e) => {
            tracing::debug!(version = %raw, err = %e, "Unparseable version");
            None
        }
    }
}

/// `a > b`, with missing/malformed sides replaced by `default`.
pub fn is_newer(a: Option<&str>, b: Option<&str>, default: &str) -> bool {
    let fallback = || Version::parse(default).unwrap_or_else(|_| Version::new(0, 0, 0));
    let a = parse(a).unwrap_or_else(fallback);
    let b = parse(b).unwrap_or_else(fallback);
    a > b
}

/// `sdk_version > other`, both defaulting to the legacy SDK baseline.
pub fn sdk_newer_than(sdk_version: Option<&str>, other: Option<&str>) -> bool {
    is_newer(sdk_version, other, DEFAULT_SDK_VERSION)
}

/// Protocol generation an addon was built against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SdkGeneration {
    /// `< 2.0.0-alpha.0`: flags, metadata, rootDirectories, dashboards
    LegacyV1,
    /// `< 2.2.0-alpha.0`: options.imageShape, inline directory items
    LegacyV2,
    Current,
}

impl SdkGeneration {
    /// Missing or malformed versions count as the oldest generation.
    pub fn of(sdk_version: Option<&str>) -> Self {
        let Some(v) = parse(sdk_version) else {
            return Self::LegacyV1;
        };
        if v < threshold(V2_THRESHOLD) {
            Self::LegacyV1
        } else if v < threshold(V2_2_THRESHOLD) {
            Self::LegacyV2
        } else {
            Self::Current
        }
    }

    pub fn is_legacy_v1(self) -> bool {
        self == Self::LegacyV1
    }

    /// True for every generation before 2.2 (v1 included).
    pub fn is_legacy_v2(self) -> bool {
        self <= Self::LegacyV2
    }
}

fn threshold(raw: &str) -> Version {
    Version::parse(raw).unwrap_or_else(|_| Version::new(0, 0, 0))
}
