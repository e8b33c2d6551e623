//! # Milestone Sync Core
//!
//! Shared types for keeping a source record's date and its mirror record in
//! step, in both directions.
//!
//! ## Crate Organization
//!
//! - [`ids`] - Identifier newtypes (`SourceId`, `MirrorId`, `RevisionToken`)
//! - [`identity`] - Versioned derivation of mirror ids from source ids
//! - [`fingerprint`] - Content hashing of the fields that define "changed"
//! - [`record`] - Source and mirror records, sync metadata, write drafts
//! - [`types`] - Direction, origin tag and listing filters
//! - [`error`] - Error taxonomy (transient, conflict, validation, permanent)
//! - [`traits`] - Collaborator traits for the two remote systems
//!
//! ## Example
//!
//! ```
//! use msync_core::prelude::*;
//!
//! let mapper = IdentityMapper::new(IdScheme::LegacyNumeric);
//! let mirror_id = mapper.derive_mirror_id(&SourceId::from(42)).unwrap();
//! assert_eq!(mirror_id.as_str(), "openproject42");
//! assert_eq!(mapper.extract_source_id(&mirror_id), Some(SourceId::from(42)));
//! ```

pub mod error;
pub mod fingerprint;
pub mod identity;
pub mod ids;
pub mod record;
pub mod traits;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```
/// use msync_core::prelude::*;
/// ```
pub mod prelude {
    // IDs
    pub use crate::ids::{MirrorId, RevisionToken, SourceId};

    // Identity and fingerprints
    pub use crate::fingerprint::ContentHash;
    pub use crate::identity::{IdScheme, IdentityMapper};

    // Records
    pub use crate::record::{MirrorDraft, MirrorRecord, MirrorTiming, SourceRecord, SyncMetadata};

    // Types and enums
    pub use crate::types::{CategoryFilter, Direction, MirrorFilter, OriginTag};

    // Error handling
    pub use crate::error::{ErrorKind, SyncError, SyncResult};

    // Traits
    pub use crate::traits::{
        DateWrite, DeleteOutcome, Lookup, MirrorSystem, SourceSystem, UpsertOutcome,
    };
}

// Re-export async_trait for collaborator implementors
pub use async_trait::async_trait;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _source = SourceId::from(1);
        let _mirror = MirrorId::from("openproject1");
        let _token = RevisionToken::from(3);
        let _mapper = IdentityMapper::default();
        let _direction = Direction::Reverse;
        let _origin = OriginTag::MirrorEdited;
        let _filter = MirrorFilter::ManagedTag;
        let _kind = ErrorKind::TransientIo;
    }
}
