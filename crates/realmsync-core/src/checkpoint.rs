use serde::{Deserialize, Serialize};

/// Marker of the last snapshot fully applied to a realm.
///
/// Persisted outside the process by a checkpoint store; the reconciler is
/// the single writer. `last_applied_digest` is monotonic per realm: a run
/// never regresses the checkpoint to an earlier snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub realm: String,
    #[serde(rename = "lastAppliedDigest")]
    pub last_applied_digest: String,
    #[serde(rename = "sequenceIndex")]
    pub sequence_index: u64,
}

impl Checkpoint {
    pub fn new(
        realm: impl Into<String>,
        last_applied_digest: impl Into<String>,
        sequence_index: u64,
    ) -> Self {
        Self {
            realm: realm.into(),
            last_applied_digest: last_applied_digest.into(),
            sequence_index,
        }
    }
}
