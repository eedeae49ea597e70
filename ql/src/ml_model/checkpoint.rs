//! Checkpoint holding one or more [ModelParameters] sets.
//!
//! The checkpoint file itself is a small JSON header naming the format version and, per model, the
//! layer sizes (architecture tag), the parameter count and the record file. Each parameter set is written
//! next to it through burn's `BinFileRecorder` as `<stem>.<index>.bin`. The header is written last, so
//! a present header marks a complete checkpoint.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use burn::backend::NdArray;
use burn::module::Param;
use burn::prelude::*;
use burn::record::{BinFileRecorder, FullPrecisionSettings};
use serde::{Deserialize, Serialize};

use crate::ml_model::model::ModelParameters;

const FORMAT_VERSION: u32 = 2;

type RecordBackend = NdArray<f32>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CheckpointHeader {
    format_version: u32,
    models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelEntry {
    architecture: Vec<usize>,
    parameter_count: usize,
    /// record file name, relative to the header's directory
    record: String,
}

/// Flat parameter vector as burn module, so it can go through a recorder
#[derive(Module, Debug)]
struct FlatParameters<B: Backend> {
    values: Param<Tensor<B, 1>>,
}

impl<B: Backend> FlatParameters<B> {
    fn new(
        values: &[f32],
        device: &B::Device,
    ) -> Self {
        Self {
            values: Param::from_tensor(Tensor::from_floats(values, device)),
        }
    }

    fn into_values(self) -> Vec<f32> { self.values.val().into_data().iter::<f32>().collect() }
}

fn recorder() -> BinFileRecorder<FullPrecisionSettings> { BinFileRecorder::<FullPrecisionSettings>::new() }

fn record_file_name(
    file: &Path,
    index: usize,
) -> Result<String> {
    let stem = file.file_stem().and_then(|s| s.to_str()).ok_or_else(|| anyhow!("invalid checkpoint file name {}", file.display()))?;
    Ok(format!("{}.{}.bin", stem, index))
}

fn sibling(
    file: &Path,
    name: &str,
) -> PathBuf {
    match file.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

pub fn write_checkpoint(
    file: &Path,
    models: &[&ModelParameters],
) -> Result<()> {
    if let Some(dir) = file.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).with_context(|| format!("creating checkpoint directory {}", dir.display()))?;
    }

    let device = <RecordBackend as Backend>::Device::default();
    let mut entries = Vec::with_capacity(models.len());
    for (index, model) in models.iter().enumerate() {
        let record = record_file_name(file, index)?;
        let record_path = sibling(file, &record);
        FlatParameters::<RecordBackend>::new(&model.values, &device)
            .save_file(&record_path, &recorder())
            .map_err(|e| anyhow!("writing {}: {}", record_path.display(), e))?;
        entries.push(ModelEntry {
            architecture: model.architecture.clone(),
            parameter_count: model.values.len(),
            record,
        });
    }

    let header = CheckpointHeader {
        format_version: FORMAT_VERSION,
        models: entries,
    };
    let json = serde_json::to_string_pretty(&header)?;
    fs::write(file, json).with_context(|| format!("writing {}", file.display()))?;
    Ok(())
}

pub fn read_checkpoint(file: &Path) -> Result<Vec<ModelParameters>> {
    let json = fs::read_to_string(file).with_context(|| format!("opening {}", file.display()))?;
    let header: CheckpointHeader = serde_json::from_str(&json).context("reading checkpoint header")?;
    if header.format_version != FORMAT_VERSION {
        bail!("unsupported checkpoint format version {}", header.format_version);
    }

    let device = <RecordBackend as Backend>::Device::default();
    let mut models = Vec::with_capacity(header.models.len());
    for entry in header.models {
        let record_path = sibling(file, &entry.record);
        let template = FlatParameters::<RecordBackend>::new(&vec![0.0; entry.parameter_count], &device);
        let values = template
            .load_file(&record_path, &recorder(), &device)
            .map_err(|e| anyhow!("reading {}: {}", record_path.display(), e))?
            .into_values();
        if values.len() != entry.parameter_count {
            bail!("{} holds {} parameter values, header says {}", entry.record, values.len(), entry.parameter_count);
        }
        models.push(ModelParameters {
            architecture: entry.architecture,
            values,
        });
    }
    Ok(models)
}
