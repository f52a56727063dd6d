use crate::data::MINORITY_CLASS;
use log::debug;
use rand::seq::index::sample;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Minority count of a bootstrap, as seen by the repair policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MinorityBucket {
    Absent,
    Single,
    Enough,
}

impl MinorityBucket {
    pub fn of(count: usize) -> MinorityBucket {
        match count {
            0 => MinorityBucket::Absent,
            1 => MinorityBucket::Single,
            _ => MinorityBucket::Enough,
        }
    }

    /// How many positions of the bootstrap are overwritten with minority rows
    pub fn injections(&self) -> usize {
        match self {
            MinorityBucket::Absent => 2,
            MinorityBucket::Single => 1,
            MinorityBucket::Enough => 0,
        }
    }
}

/// What the repair did to a bootstrap
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RepairAction {
    Untouched,
    /// (position in the bootstrap, original index written there)
    Injected(Vec<(usize, usize)>),
}

impl RepairAction {
    pub fn injected_count(&self) -> usize {
        match self {
            RepairAction::Untouched => 0,
            RepairAction::Injected(writes) => writes.len(),
        }
    }
}

/// Make sure a bootstrap holds at least two minority rows.
///
/// `indices` point into the original data, `labels` are the original labels and `pool`
/// the original minority indices. Overwriting indices keeps every row and its label paired.
/// With no minority row, two distinct positions are overwritten; with one, a majority
/// position is. An empty pool leaves the bootstrap untouched.
pub fn repair_minority(indices: &mut [usize], labels: &[u8], pool: &[usize], rng: &mut ChaCha8Rng) -> RepairAction {
    let minority_count = indices.iter().filter(|&&i| labels[i] == MINORITY_CLASS).count();
    let bucket = MinorityBucket::of(minority_count);

    if bucket == MinorityBucket::Enough || pool.is_empty() || indices.is_empty() {
        return RepairAction::Untouched;
    }

    let positions: Vec<usize> = match bucket {
        MinorityBucket::Absent => sample(rng, indices.len(), bucket.injections().min(indices.len())).into_vec(),
        _ => {
            let majority_positions: Vec<usize> = (0..indices.len())
                .filter(|&p| labels[indices[p]] != MINORITY_CLASS)
                .collect();
            if majority_positions.is_empty() {
                return RepairAction::Untouched;
            }
            vec![majority_positions[rng.gen_range(0..majority_positions.len())]]
        }
    };

    let mut writes = Vec::with_capacity(positions.len());
    for position in positions {
        let replacement = pool[rng.gen_range(0..pool.len())];
        indices[position] = replacement;
        writes.push((position, replacement));
    }

    debug!("Minority repair ({:?}): {:?}", bucket, writes);
    RepairAction::Injected(writes)
}
