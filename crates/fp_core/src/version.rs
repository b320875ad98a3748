use serde::{Deserialize, Serialize};

use crate::types::ListId;
use crate::{Error, Result};

/// Optimistic-concurrency check applied by the persistence boundary.
///
/// A save declaring `known` is admitted while `stored <= known + tolerance`.
/// With the default tolerance of zero only a save based on the latest
/// version gets through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionGate {
    pub tolerance: u64,
}

impl VersionGate {
    pub fn new(tolerance: u64) -> Self {
        Self { tolerance }
    }

    pub fn admits(&self, known: u64, stored: u64) -> bool {
        stored <= known.saturating_add(self.tolerance)
    }

    pub fn admit(&self, list_id: ListId, known: u64, stored: u64) -> Result<()> {
        if self.admits(known, stored) {
            Ok(())
        } else {
            Err(Error::VersionConflict { list_id, known, stored })
        }
    }

    /// Whether the stored version is ahead of what the caller holds.
    pub fn is_newer(stored: u64, known: u64) -> bool {
        stored > known
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_gate() {
        let gate = VersionGate::default();
        assert!(gate.admits(5, 5));
        assert!(gate.admits(6, 5));
        assert!(!gate.admits(5, 6));

        let err = gate.admit(9, 5, 6).unwrap_err();
        assert!(matches!(err, Error::VersionConflict { list_id: 9, known: 5, stored: 6 }));
    }

    #[test]
    fn test_tolerant_gate() {
        let gate = VersionGate::new(2);
        assert!(gate.admits(5, 7));
        assert!(!gate.admits(5, 8));
        assert!(gate.admits(u64::MAX, u64::MAX));
    }

    #[test]
    fn test_is_newer() {
        assert!(!VersionGate::is_newer(5, 5));
        assert!(VersionGate::is_newer(6, 5));
        assert!(!VersionGate::is_newer(4, 5));
    }
}
