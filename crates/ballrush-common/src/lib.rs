//! # Ballrush Common
//!
//! Common types, utilities, and shared abstractions for Ballrush.
//!
//! This crate provides foundational types used across all Ballrush subsystems:
//! - Wall-clock abstraction and .NET tick conversion
//! - Version information and magic bytes for the save envelope
//! - Common error types
//! - Prelude for convenient imports

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

pub mod clock;
pub mod error;
pub mod version;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::clock::*;
    pub use crate::error::*;
    pub use crate::version::*;
}

pub use prelude::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_is_shared() {
        let clock = ManualClock::at_unix(1_000);
        let other = clock.clone();
        clock.advance_secs(30);
        assert_eq!(other.now(), clock.now());
    }

    #[test]
    fn test_version_compatibility() {
        let v1 = SchemaVersion::new(1, 0, 0);
        let v2 = SchemaVersion::new(1, 1, 0);
        let v3 = SchemaVersion::new(2, 0, 0);

        // Same major reads either way
        assert!(v2.can_read(&v1));
        assert!(v1.can_read(&v2));
        // Different major versions are incompatible
        assert!(!v1.can_read(&v3));
        assert!(!v3.can_read(&v2));
    }
}
