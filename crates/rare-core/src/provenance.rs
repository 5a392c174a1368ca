//! Schema versions and run provenance recorded in checkpoints and manifests.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Version of a persisted payload layout.
///
/// Readers accept any payload with the same major version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Bumped when older readers can no longer load the payload.
    pub major: u32,
    /// Bumped when fields are added.
    pub minor: u32,
    /// Bumped for fixes that leave the layout untouched.
    pub patch: u32,
}

impl SchemaVersion {
    /// Creates a version triple.
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// True when a payload written with `other` can be read by a `self` reader.
    pub fn reads(&self, other: &SchemaVersion) -> bool {
        self.major == other.major
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Where a run came from: configuration digest, seed, time and tool versions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RunProvenance {
    /// Hex SHA-256 of the canonical configuration.
    pub config_hash: String,
    /// Master seed every random stream derives from.
    pub seed: u64,
    /// Free-form label attached to the seed in the configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_label: Option<String>,
    /// RFC 3339 creation time.
    pub created_at: String,
    /// Crate versions that produced the artifact.
    pub tool_versions: BTreeMap<String, String>,
}
