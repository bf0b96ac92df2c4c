use std::sync::Arc;

use anyhow::Result;

use sluice_proto::v0::TensorRecord;

/// One fully-parsed sample: feature slots aligned with the layout's input names.
#[derive(Debug, Clone)]
pub struct Sample {
    pub features: Vec<Option<TensorRecord>>,
}

impl Sample {
    pub fn feature(&self, slot: usize) -> Option<&TensorRecord> {
        self.features.get(slot).and_then(|feature| feature.as_ref())
    }
}

/// An in-memory shard: input names plus the samples parsed from one file.
///
/// Built incrementally while the shard file is consumed, then handed to the
/// shard map as `Arc<DataSet>` and never mutated again.
#[derive(Debug)]
pub struct DataSet {
    input_names: Arc<[String]>,
    samples: Vec<Sample>,
}

impl DataSet {
    pub fn new(input_names: Arc<[String]>) -> Self {
        Self {
            input_names,
            samples: Vec::new(),
        }
    }

    pub fn add_sample(&mut self, features: Vec<Option<TensorRecord>>) -> Result<()> {
        anyhow::ensure!(
            features.len() == self.input_names.len(),
            "sample has {} feature slots, layout expects {}",
            features.len(),
            self.input_names.len()
        );
        self.samples.push(Sample { features });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn sample(&self, index: usize) -> Option<&Sample> {
        self.samples.get(index)
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn input_names(&self) -> &[String] {
        &self.input_names
    }
}
