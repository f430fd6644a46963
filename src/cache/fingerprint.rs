//! Build fingerprints
//!
//! A fingerprint is the SHA-512 digest of the canonical JSON form of the
//! build arguments. Struct fields serialize in declaration order, so equal
//! arguments always give equal text.

use serde::Serialize;
use sha2::{Digest, Sha512};
use std::fmt;

/// Hex digest identifying one set of build arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint any serializable argument set
    ///
    /// # Errors
    ///
    /// Returns an error if `args` cannot be serialized to JSON (e.g. a map
    /// with non-string keys).
    pub fn of<T: Serialize>(args: &T) -> serde_json::Result<Self> {
        let canonical = serde_json::to_vec(args)?;
        let digest = Sha512::digest(&canonical);
        Ok(Self(format!("{digest:x}")))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Tests can panic")]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Args {
        name: &'static str,
        macros: Vec<(&'static str, Option<&'static str>)>,
    }

    #[test]
    fn equal_args_equal_fingerprints() {
        let a = Args {
            name: "core",
            macros: vec![("NDEBUG", None)],
        };
        let b = Args {
            name: "core",
            macros: vec![("NDEBUG", None)],
        };
        assert_eq!(Fingerprint::of(&a).unwrap(), Fingerprint::of(&b).unwrap());
    }

    #[test]
    fn any_change_changes_fingerprint() {
        let base = Fingerprint::of(&Args {
            name: "core",
            macros: vec![],
        })
        .unwrap();
        let renamed = Fingerprint::of(&Args {
            name: "core2",
            macros: vec![],
        })
        .unwrap();
        let with_macro = Fingerprint::of(&Args {
            name: "core",
            macros: vec![("FAST", Some("1"))],
        })
        .unwrap();

        assert_ne!(base, renamed);
        assert_ne!(base, with_macro);
    }

    #[test]
    fn digest_is_sha512_hex() {
        let fingerprint = Fingerprint::of(&"x").unwrap();
        assert_eq!(fingerprint.as_str().len(), 128);
        assert!(fingerprint.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
