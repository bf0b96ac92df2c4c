use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use prost::Message;

use sluice_core::types::FeatureLayout;
use sluice_proto::v0::TensorRecord;

use crate::dataset::DataSet;

/// Lists regular files directly under `dir` with the given extension,
/// sorted by path. Hidden (`.`-prefixed) names are excluded.
///
/// Sorting is load-bearing: cooperating workers must derive identical
/// stripes from the same directory listing.
pub fn enumerate_shard_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("read_dir failed: {}", dir.display()))?
    {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with('.') {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            continue;
        }
        files.push(path);
    }
    files.sort();
    Ok(files)
}

/// Parses one shard file into a `DataSet`.
///
/// Framing: `[u32-le sample_len][sample bytes]*`, where each sample body is
/// `[u32-le record_len][TensorRecord bytes]*` until `sample_len` is consumed.
/// Records whose names are not in `layout` are discarded; a record that fails
/// to decode (or overruns its sample's declared length) abandons the file.
pub fn read_shard_file(path: &Path, layout: &FeatureLayout) -> Result<DataSet> {
    let file = File::open(path).with_context(|| format!("open failed: {}", path.display()))?;
    let mut reader = BufReader::new(file);

    let input_names: Arc<[String]> = Arc::from(layout.input_names());
    let mut data_set = DataSet::new(input_names);

    loop {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf) {
            Ok(()) => {}
            // End of file at a sample boundary ends the shard cleanly.
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => {
                return Err(err).with_context(|| format!("read failed: {}", path.display()))
            }
        }
        let sample_len = u32::from_le_bytes(len_buf);

        let features = read_one_sample(&mut reader, sample_len, layout)
            .with_context(|| format!("parse failed: {}", path.display()))?;
        data_set.add_sample(features)?;
    }

    Ok(data_set)
}

fn read_one_sample(
    reader: &mut impl Read,
    sample_len: u32,
    layout: &FeatureLayout,
) -> Result<Vec<Option<TensorRecord>>> {
    let mut features: Vec<Option<TensorRecord>> = vec![None; layout.len()];

    let mut read: u64 = 0;
    let sample_len = u64::from(sample_len);
    while read < sample_len {
        let remaining = sample_len - read;
        anyhow::ensure!(
            remaining >= 4,
            "truncated tensor record length prefix ({remaining} bytes left in sample)"
        );

        let mut len_buf = [0u8; 4];
        reader.read_exact(&mut len_buf)?;
        let record_len = u64::from(u32::from_le_bytes(len_buf));
        anyhow::ensure!(
            record_len <= remaining - 4,
            "tensor record of {record_len} bytes overruns sample boundary ({} bytes left)",
            remaining - 4
        );

        let mut record_buf = vec![0u8; record_len as usize];
        reader.read_exact(&mut record_buf)?;
        let tensor = TensorRecord::decode(record_buf.as_slice())
            .map_err(|err| anyhow::anyhow!("tensor record decode failed: {err}"))?;

        if let Some(slot) = layout.slot_of(&tensor.name) {
            features[slot] = Some(tensor);
        }

        read += 4 + record_len;
    }

    Ok(features)
}

/// Writes a shard file in the framing `read_shard_file` consumes. One inner
/// `Vec<TensorRecord>` becomes one sample.
pub fn write_shard_file(path: &Path, samples: &[Vec<TensorRecord>]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("create failed: {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    for sample in samples {
        let mut body: Vec<u8> = Vec::new();
        for record in sample {
            let encoded = record.encode_to_vec();
            let record_len = u32::try_from(encoded.len())
                .map_err(|_| anyhow::anyhow!("tensor record too large for u32 framing"))?;
            body.extend_from_slice(&record_len.to_le_bytes());
            body.extend_from_slice(&encoded);
        }
        let sample_len = u32::try_from(body.len())
            .map_err(|_| anyhow::anyhow!("sample too large for u32 framing"))?;
        writer.write_all(&sample_len.to_le_bytes())?;
        writer.write_all(&body)?;
    }

    writer.flush()?;
    Ok(())
}
