//! Identity mapping between source ids and mirror ids
//!
//! Mirror ids are derived from source ids by a versioned scheme. Every scheme
//! produces ids in the mirror system's legal alphabet (lowercase `a`-`v` and
//! digits, 5 to 1024 characters) and has an inverse that only accepts ids the
//! scheme itself could have produced, so foreign records are never mistaken
//! for managed ones.
//!
//! Derivation always uses the configured scheme. Recognition tries every
//! known scheme newest first, so mirrors created under an older scheme stay
//! recognizable (and collectable) after a scheme change.

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::ids::{MirrorId, SourceId};

const LEGACY_PREFIX: &str = "openproject";
const HEX_PREFIX: &str = "milestonev2";

const MIN_MIRROR_ID_LEN: usize = 5;
const MAX_MIRROR_ID_LEN: usize = 1024;

/// A versioned id-derivation scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdScheme {
    /// Version 1: fixed prefix followed by a decimal source id.
    LegacyNumeric,
    /// Version 2: fixed prefix followed by the lowercase hex of the source id bytes.
    HexEncoded,
}

impl IdScheme {
    /// All known schemes, newest first. Recognition tries them in this order.
    pub const NEWEST_FIRST: [IdScheme; 2] = [IdScheme::HexEncoded, IdScheme::LegacyNumeric];

    /// The scheme's version number.
    pub fn version(self) -> u8 {
        match self {
            Self::LegacyNumeric => 1,
            Self::HexEncoded => 2,
        }
    }

    /// Look up a scheme by version number.
    pub fn from_version(version: u8) -> Option<Self> {
        Self::NEWEST_FIRST
            .into_iter()
            .find(|scheme| scheme.version() == version)
    }

    /// Derive the mirror id for a source id under this scheme.
    pub fn derive(self, source_id: &SourceId) -> SyncResult<MirrorId> {
        let raw = source_id.as_str();
        if raw.is_empty() {
            return Err(SyncError::IdDerivation {
                source_id: source_id.clone(),
                message: "source id is empty".to_string(),
            });
        }

        let candidate = match self {
            Self::LegacyNumeric => {
                if !raw.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(SyncError::IdDerivation {
                        source_id: source_id.clone(),
                        message: "scheme v1 only supports numeric source ids".to_string(),
                    });
                }
                format!("{LEGACY_PREFIX}{raw}")
            }
            Self::HexEncoded => format!("{HEX_PREFIX}{}", hex::encode(raw.as_bytes())),
        };

        if !is_legal_mirror_id(&candidate) {
            return Err(SyncError::IdDerivation {
                source_id: source_id.clone(),
                message: format!(
                    "derived id exceeds {MAX_MIRROR_ID_LEN} characters under scheme v{}",
                    self.version()
                ),
            });
        }

        Ok(MirrorId::new(candidate))
    }

    /// Invert [`IdScheme::derive`]. Returns `None` for ids this scheme did not produce.
    pub fn extract(self, mirror_id: &MirrorId) -> Option<SourceId> {
        let raw = mirror_id.as_str();
        match self {
            Self::LegacyNumeric => {
                let digits = raw.strip_prefix(LEGACY_PREFIX)?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                Some(SourceId::new(digits))
            }
            Self::HexEncoded => {
                let encoded = raw.strip_prefix(HEX_PREFIX)?;
                if encoded.is_empty() {
                    return None;
                }
                let bytes = hex::decode(encoded).ok()?;
                // Only the canonical lowercase encoding round-trips.
                if hex::encode(&bytes) != encoded {
                    return None;
                }
                String::from_utf8(bytes).ok().map(SourceId::new)
            }
        }
    }
}

impl std::fmt::Display for IdScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.version())
    }
}

fn is_legal_mirror_id(id: &str) -> bool {
    (MIN_MIRROR_ID_LEN..=MAX_MIRROR_ID_LEN).contains(&id.len())
        && id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'v').contains(&b))
}

/// Maps source ids to mirror ids and back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityMapper {
    current: IdScheme,
}

impl IdentityMapper {
    /// Create a mapper deriving ids with the given scheme.
    #[must_use]
    pub fn new(current: IdScheme) -> Self {
        Self { current }
    }

    /// The scheme used for derivation.
    pub fn current_scheme(&self) -> IdScheme {
        self.current
    }

    /// Derive the mirror id for a source id under the current scheme.
    pub fn derive_mirror_id(&self, source_id: &SourceId) -> SyncResult<MirrorId> {
        self.current.derive(source_id)
    }

    /// Recover the source id from a mirror id produced by any known scheme.
    pub fn extract_source_id(&self, mirror_id: &MirrorId) -> Option<SourceId> {
        self.recognize(mirror_id).map(|(_, source_id)| source_id)
    }

    /// Like [`IdentityMapper::extract_source_id`], also reporting the matching scheme.
    pub fn recognize(&self, mirror_id: &MirrorId) -> Option<(IdScheme, SourceId)> {
        IdScheme::NEWEST_FIRST
            .into_iter()
            .find_map(|scheme| scheme.extract(mirror_id).map(|id| (scheme, id)))
    }
}

impl Default for IdentityMapper {
    fn default() -> Self {
        Self::new(IdScheme::NEWEST_FIRST[0])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_scheme_matches_existing_ids() {
        let id = IdScheme::LegacyNumeric
            .derive(&SourceId::from(1234))
            .unwrap();
        assert_eq!(id.as_str(), "openproject1234");
    }

    #[test]
    fn test_legacy_scheme_rejects_non_numeric() {
        let err = IdScheme::LegacyNumeric
            .derive(&SourceId::from("wp-12"))
            .unwrap_err();
        assert_eq!(err.error_code(), "ID_DERIVATION_FAILED");
    }

    #[test]
    fn test_hex_scheme_output_is_legal() {
        let id = IdScheme::HexEncoded
            .derive(&SourceId::from("Work Package #7 / Ü"))
            .unwrap();
        assert!(id.as_str().starts_with("milestonev2"));
        assert!(is_legal_mirror_id(id.as_str()));
    }

    #[test]
    fn test_bijection_for_all_schemes() {
        let mapper = IdentityMapper::default();
        for raw in ["1", "42", "900719925474099", "007"] {
            for scheme in IdScheme::NEWEST_FIRST {
                let source = SourceId::from(raw);
                let mirror = scheme.derive(&source).unwrap();
                assert_eq!(scheme.extract(&mirror), Some(source.clone()));
                assert_eq!(mapper.extract_source_id(&mirror), Some(source));
            }
        }

        for raw in ["abc", "with space", "ünïcode", "a-b_c.d"] {
            let source = SourceId::from(raw);
            let mirror = IdScheme::HexEncoded.derive(&source).unwrap();
            assert_eq!(mapper.extract_source_id(&mirror), Some(source));
        }
    }

    #[test]
    fn test_foreign_ids_not_recognized() {
        let mapper = IdentityMapper::default();
        for foreign in [
            "abcdef123",
            "openproject",
            "openprojectx12",
            "milestonev2",
            "milestonev2zz",
            "milestonev2abc",
            "milestonev2ABCD",
            "_googlecal_event",
        ] {
            assert!(
                mapper.extract_source_id(&MirrorId::from(foreign)).is_none(),
                "{foreign} should not be managed"
            );
        }
    }

    #[test]
    fn test_recognize_reports_scheme() {
        let mapper = IdentityMapper::new(IdScheme::HexEncoded);
        let legacy = MirrorId::from("openproject77");
        assert_eq!(
            mapper.recognize(&legacy),
            Some((IdScheme::LegacyNumeric, SourceId::from(77)))
        );

        let current = mapper.derive_mirror_id(&SourceId::from(77)).unwrap();
        assert_ne!(current, legacy);
        assert_eq!(
            mapper.recognize(&current).map(|(scheme, _)| scheme),
            Some(IdScheme::HexEncoded)
        );
    }

    #[test]
    fn test_overlong_source_id_rejected() {
        let long = "x".repeat(600);
        assert!(IdScheme::HexEncoded.derive(&SourceId::new(long)).is_err());
    }

    #[test]
    fn test_scheme_versions() {
        assert_eq!(IdScheme::from_version(1), Some(IdScheme::LegacyNumeric));
        assert_eq!(IdScheme::from_version(2), Some(IdScheme::HexEncoded));
        assert_eq!(IdScheme::from_version(3), None);
        assert_eq!(IdScheme::HexEncoded.to_string(), "v2");
    }
}
