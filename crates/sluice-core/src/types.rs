use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Modular striping of a sorted shard list across cooperating workers.
///
/// All workers must derive their stripe from the same sorted file listing;
/// rank `r` of `w` keeps every file at list position `i` with `i % w == r`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardPartition {
    pub world_rank: usize,
    pub world_size: usize,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PartitionError {
    #[error("world_size must be > 0")]
    ZeroWorldSize,
    #[error("world_rank {world_rank} out of range for world_size {world_size}")]
    RankOutOfRange { world_rank: usize, world_size: usize },
}

impl ShardPartition {
    /// The single-worker partition: rank 0 of 1, keeps everything.
    pub fn solo() -> Self {
        Self {
            world_rank: 0,
            world_size: 1,
        }
    }

    pub fn validate(&self) -> Result<(), PartitionError> {
        if self.world_size == 0 {
            return Err(PartitionError::ZeroWorldSize);
        }
        if self.world_rank >= self.world_size {
            return Err(PartitionError::RankOutOfRange {
                world_rank: self.world_rank,
                world_size: self.world_size,
            });
        }
        Ok(())
    }

    pub fn owns(&self, index: usize) -> bool {
        index % self.world_size == self.world_rank
    }

    /// Keeps this rank's stripe of `items`, preserving order.
    pub fn apply<T>(&self, items: Vec<T>) -> Result<Vec<T>, PartitionError> {
        self.validate()?;
        if self.world_size == 1 {
            return Ok(items);
        }
        Ok(items
            .into_iter()
            .enumerate()
            .filter(|(index, _)| self.owns(*index))
            .map(|(_, item)| item)
            .collect())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FeatureLayoutError {
    #[error("feature names must be non-empty")]
    EmptyName,
    #[error("duplicate record name: {0}")]
    DuplicateRecordName(String),
}

/// Maps tensor-record names found in shard files to fixed per-sample feature
/// slots, and remembers the graph input name each slot feeds.
///
/// Record names not present in the layout are not errors; shard files may
/// carry extra fields the consumer never asked for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureLayout {
    input_names: Vec<String>,
    slot_by_record_name: HashMap<String, usize>,
}

impl FeatureLayout {
    /// Builds a layout from `(record_name, input_name)` pairs.
    ///
    /// Slot order follows the order of `pairs`, so every worker configured
    /// with the same pairs sees the same per-sample feature order.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, FeatureLayoutError>
    where
        I: IntoIterator<Item = (S, S)>,
        S: Into<String>,
    {
        let mut input_names = Vec::new();
        let mut slot_by_record_name = HashMap::new();
        for (record_name, input_name) in pairs {
            let record_name = record_name.into();
            let input_name = input_name.into();
            if record_name.trim().is_empty() || input_name.trim().is_empty() {
                return Err(FeatureLayoutError::EmptyName);
            }
            let slot = input_names.len();
            if slot_by_record_name
                .insert(record_name.clone(), slot)
                .is_some()
            {
                return Err(FeatureLayoutError::DuplicateRecordName(record_name));
            }
            input_names.push(input_name);
        }
        Ok(Self {
            input_names,
            slot_by_record_name,
        })
    }

    pub fn len(&self) -> usize {
        self.input_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.input_names.is_empty()
    }

    pub fn slot_of(&self, record_name: &str) -> Option<usize> {
        self.slot_by_record_name.get(record_name).copied()
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solo_partition_keeps_everything() {
        let partition = ShardPartition::solo();
        let kept = partition.apply(vec!["a", "b", "c"]).unwrap();
        assert_eq!(kept, vec!["a", "b", "c"]);
    }

    #[test]
    fn rank_out_of_range_is_rejected() {
        let partition = ShardPartition {
            world_rank: 3,
            world_size: 3,
        };
        let err = partition.validate().unwrap_err();
        assert_eq!(
            err,
            PartitionError::RankOutOfRange {
                world_rank: 3,
                world_size: 3,
            }
        );
    }

    #[test]
    fn zero_world_size_is_rejected() {
        let partition = ShardPartition {
            world_rank: 0,
            world_size: 0,
        };
        assert_eq!(partition.validate().unwrap_err(), PartitionError::ZeroWorldSize);
    }

    #[test]
    fn layout_preserves_pair_order() {
        let layout =
            FeatureLayout::from_pairs([("input_0", "x"), ("label", "y")]).unwrap();
        assert_eq!(layout.len(), 2);
        assert_eq!(layout.slot_of("input_0"), Some(0));
        assert_eq!(layout.slot_of("label"), Some(1));
        assert_eq!(layout.slot_of("extra"), None);
        assert_eq!(layout.input_names(), ["x".to_string(), "y".to_string()]);
    }

    #[test]
    fn layout_rejects_duplicate_record_name() {
        let err = FeatureLayout::from_pairs([("a", "x"), ("a", "y")]).unwrap_err();
        assert_eq!(err, FeatureLayoutError::DuplicateRecordName("a".to_string()));
    }

    #[test]
    fn layout_rejects_empty_names() {
        let err = FeatureLayout::from_pairs([("", "x")]).unwrap_err();
        assert_eq!(err, FeatureLayoutError::EmptyName);
    }
}
