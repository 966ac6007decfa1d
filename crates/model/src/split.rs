use serde::{Deserialize, Serialize};

pub const DFLT_BATCH_LEN: u64 = 5_000_000;

/// How the input collection is cut into batches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SplitMode {
    /// Hard per-batch ceiling: every batch except possibly the last stays
    /// within `batch_len` residues. Never splits a record.
    Strict { batch_len: u64 },
    /// Approximate a target batch count. Requires a measuring pre-pass to
    /// learn the total input length.
    Proportional { parts: u32 },
}

impl Default for SplitMode {
    fn default() -> Self {
        SplitMode::Strict {
            batch_len: DFLT_BATCH_LEN,
        }
    }
}

impl SplitMode {
    /// Per-batch length for this mode given the measured total input
    /// length. Only meaningful for `Proportional`, where it is the rounded
    /// share of one part.
    pub fn batch_len(&self, total_len: u64) -> u64 {
        match self {
            SplitMode::Strict { batch_len } => *batch_len,
            SplitMode::Proportional { parts } => {
                let parts = u64::from((*parts).max(1));
                // round(total / parts) without going through floats
                (total_len + parts / 2) / parts
            }
        }
    }
}
