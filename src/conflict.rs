//! Conflict detection and resolution strategies (C8 support).

use crate::metadata::local::LocalSyncMetadata;
use crate::metadata::RemoteMetadataRecord;
use serde::{Deserialize, Serialize};

/// Strategy used when a key's local metadata and cached remote metadata
/// disagree on both digest and version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictStrategy {
    /// The local value always wins; the remote is overwritten on next flush.
    LocalWins,
    /// The remote value always wins; local state is hydrated from it.
    RemoteWins,
    /// Whichever side has the higher version wins, local breaking ties.
    #[default]
    LastModifiedWins,
}

/// Which side's value should be treated as current.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Local,
    Remote,
}

/// A conflict exists when the remote has moved past what local last knew
/// about it (higher version) and the content actually differs (digest
/// mismatch) - matching digests with a higher remote version is a
/// no-op republish, not a conflict.
pub fn is_conflict(local: &LocalSyncMetadata, remote: &RemoteMetadataRecord) -> bool {
    remote.version > local.version && remote.digest != local.digest
}

/// Resolves a detected conflict per `strategy`.
pub fn resolve(
    strategy: ConflictStrategy,
    local: &LocalSyncMetadata,
    remote: &RemoteMetadataRecord,
) -> Resolution {
    match strategy {
        ConflictStrategy::LocalWins => Resolution::Local,
        ConflictStrategy::RemoteWins => Resolution::Remote,
        ConflictStrategy::LastModifiedWins => {
            if remote.version > local.version {
                Resolution::Remote
            } else {
                Resolution::Local
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::local::SyncStatus;

    fn local(digest: &str, version: u64) -> LocalSyncMetadata {
        LocalSyncMetadata {
            digest: digest.into(),
            version,
            sync_status: SyncStatus::Synced,
        }
    }

    fn remote(digest: &str, version: u64) -> RemoteMetadataRecord {
        RemoteMetadataRecord {
            digest: digest.into(),
            version,
        }
    }

    #[test]
    fn same_digest_is_never_a_conflict() {
        assert!(!is_conflict(&local("abc", 1), &remote("abc", 5)));
    }

    #[test]
    fn stale_remote_is_not_a_conflict() {
        assert!(!is_conflict(&local("abc", 5), &remote("def", 1)));
    }

    #[test]
    fn newer_differing_remote_is_a_conflict() {
        assert!(is_conflict(&local("abc", 1), &remote("def", 2)));
    }

    #[test]
    fn local_wins_always_picks_local() {
        let resolution = resolve(ConflictStrategy::LocalWins, &local("a", 1), &remote("b", 99));
        assert_eq!(resolution, Resolution::Local);
    }

    #[test]
    fn remote_wins_always_picks_remote() {
        let resolution = resolve(
            ConflictStrategy::RemoteWins,
            &local("a", 99),
            &remote("b", 1),
        );
        assert_eq!(resolution, Resolution::Remote);
    }

    #[test]
    fn last_modified_wins_picks_higher_version() {
        let resolution = resolve(
            ConflictStrategy::LastModifiedWins,
            &local("a", 5),
            &remote("b", 10),
        );
        assert_eq!(resolution, Resolution::Remote);

        let resolution = resolve(
            ConflictStrategy::LastModifiedWins,
            &local("a", 10),
            &remote("b", 5),
        );
        assert_eq!(resolution, Resolution::Local);
    }

    #[test]
    fn last_modified_wins_breaks_ties_locally() {
        let resolution = resolve(
            ConflictStrategy::LastModifiedWins,
            &local("a", 5),
            &remote("b", 5),
        );
        assert_eq!(resolution, Resolution::Local);
    }
}
