//! Version types for schema compatibility.

use serde::{Deserialize, Serialize};

/// Schema version using semantic versioning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SchemaVersion {
    /// Major version (breaking changes)
    pub major: u16,
    /// Minor version (backwards-compatible additions)
    pub minor: u16,
    /// Patch version (bug fixes)
    pub patch: u16,
}

impl SchemaVersion {
    /// Creates a new schema version.
    #[must_use]
    pub const fn new(major: u16, minor: u16, patch: u16) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Current save record version.
    ///
    /// 1.1 added `accountId`; 1.0 blobs load with a fresh id.
    pub const SAVE_RECORD: Self = Self::new(1, 1, 0);

    /// Size of the encoded version in bytes.
    pub const ENCODED_LEN: usize = 6;

    /// Checks if this version can read data from another version.
    #[must_use]
    pub const fn can_read(&self, data_version: &Self) -> bool {
        self.major == data_version.major
    }

    /// Encodes as three little-endian u16 values.
    #[must_use]
    pub fn to_le_bytes(self) -> [u8; Self::ENCODED_LEN] {
        let mut out = [0u8; Self::ENCODED_LEN];
        out[0..2].copy_from_slice(&self.major.to_le_bytes());
        out[2..4].copy_from_slice(&self.minor.to_le_bytes());
        out[4..6].copy_from_slice(&self.patch.to_le_bytes());
        out
    }

    /// Decodes from three little-endian u16 values.
    #[must_use]
    pub fn from_le_bytes(bytes: [u8; Self::ENCODED_LEN]) -> Self {
        Self::new(
            u16::from_le_bytes([bytes[0], bytes[1]]),
            u16::from_le_bytes([bytes[2], bytes[3]]),
            u16::from_le_bytes([bytes[4], bytes[5]]),
        )
    }
}

impl std::fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Magic bytes for file format identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MagicBytes(pub [u8; 4]);

impl MagicBytes {
    /// Ballrush save record magic bytes.
    pub const SAVE: Self = Self(*b"BRSV");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_byte_roundtrip() {
        let v = SchemaVersion::new(3, 258, 7);
        assert_eq!(SchemaVersion::from_le_bytes(v.to_le_bytes()), v);
    }

    #[test]
    fn test_can_read_same_major_only() {
        let current = SchemaVersion::SAVE_RECORD;
        assert!(current.can_read(&SchemaVersion::new(1, 0, 0)));
        assert!(!current.can_read(&SchemaVersion::new(2, 0, 0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(SchemaVersion::new(1, 2, 3).to_string(), "1.2.3");
    }
}
