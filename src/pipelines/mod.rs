// src/pipelines/mod.rs: pipeline orchestrators and the helpers they share

pub mod rna;
pub mod sixteen;
pub mod vis;
pub mod wgs;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::defs::{FASTQ_TAG, PipelineError};
use crate::utils::fastx::SeqInput;
use crate::utils::file::{guess_seq_filetype, is_compressed, new_file, rm_ext};
use crate::utils::task::Task;
use crate::workflows::general::{extract, sequence_convert, SequenceConvertConfig};

pub use rna::{RnaOptions, RnaPipeline};
pub use sixteen::{SixteenSOptions, SixteenSPipeline};
pub use vis::{VisualizationOptions, VisualizationPipeline};
pub use wgs::{WgsOptions, WgsPipeline};


/// Named lists of files a pipeline produces, e.g. `otu_tables`.
pub type Products = BTreeMap<String, Vec<PathBuf>>;

/// Everything one `configure` call yields: the ordered task list plus the
/// product lists accumulated while building it.
#[derive(Debug, Clone, Default)]
pub struct PipelinePlan {
    pub tasks: Vec<Task>,
    pub products: Products,
}

impl PipelinePlan {
    pub fn push(&mut self, task: Task) {
        self.tasks.push(task);
    }

    pub fn extend(&mut self, tasks: impl IntoIterator<Item = Task>) {
        self.tasks.extend(tasks);
    }

    pub fn add_product(&mut self, kind: &str, path: impl Into<PathBuf>) {
        self.products.entry(kind.to_string()).or_default().push(path.into());
    }

    pub fn products_of(&self, kind: &str) -> &[PathBuf] {
        self.products.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// A pipeline builds its task graph from inputs fixed at construction.
///
/// `configure` is pure apart from reading a sample map file; calling it
/// twice yields the same plan.
pub trait Pipeline {
    fn name(&self) -> &'static str;

    fn configure(&self) -> Result<PipelinePlan, PipelineError>;
}


/// Per-pipeline tool options, read from `[workflow_options.<pipeline>]`
/// tables of the settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WorkflowOptions {
    pub sixteen: SixteenSOptions,
    pub wgs: WgsOptions,
    pub rna: RnaOptions,
    pub visualization: VisualizationOptions,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OptionsFile {
    workflow_options: WorkflowOptions,
}

impl WorkflowOptions {
    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        toml::from_str::<OptionsFile>(text)
            .map(|f| f.workflow_options)
            .map_err(|e| PipelineError::Settings {
                path: PathBuf::new(),
                error: e.to_string(),
            })
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, PipelineError> {
        let text = fs::read_to_string(path).map_err(|e| PipelineError::Settings {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&text).map_err(|e| match e {
            PipelineError::Settings { error, .. } => PipelineError::Settings {
                path: path.to_path_buf(),
                error,
            },
            other => other,
        })
    }
}


/// Summary of a plan for the external scheduler.
#[derive(Debug, Serialize)]
pub struct PlanManifest<'a> {
    pub pipeline: &'a str,
    pub tasks: Vec<crate::utils::task::TaskManifest>,
    pub products: &'a Products,
}

impl PipelinePlan {
    pub fn manifest<'a>(&'a self, pipeline: &'a str) -> PlanManifest<'a> {
        PlanManifest {
            pipeline,
            tasks: self.tasks.iter().map(Task::manifest).collect(),
            products: &self.products,
        }
    }
}


/// Adds an extract task for every compressed file and swaps it for its
/// decompressed copy in `products_dir`.
///
/// # Returns
/// The rewritten inputs, in order, and the extract tasks.
pub fn maybe_decompress(
    inputs: &[SeqInput],
    products_dir: &Path,
) -> Result<(Vec<SeqInput>, Vec<Task>), PipelineError> {
    let mut tasks = Vec::new();
    let mut decompress = |f: &PathBuf| -> Result<PathBuf, PipelineError> {
        if !is_compressed(f) {
            return Ok(f.clone());
        }
        let unzipped = new_file(rm_ext(f), products_dir);
        tasks.push(extract(f, &unzipped)?);
        Ok(unzipped)
    };

    let mut rewritten = Vec::with_capacity(inputs.len());
    for input in inputs {
        rewritten.push(match input {
            SeqInput::Single(f) => SeqInput::Single(decompress(f)?),
            SeqInput::Pair(r1, r2) => SeqInput::Pair(decompress(r1)?, decompress(r2)?),
        });
    }
    Ok((rewritten, tasks))
}

/// Converts every file that is not plain fastq into
/// `<products_dir>/<name>.fastq`.
pub fn maybe_convert_to_fastq(
    files: &[PathBuf],
    products_dir: &Path,
    config: &SequenceConvertConfig,
) -> Result<(Vec<PathBuf>, Vec<Task>), PipelineError> {
    let mut converted = Vec::with_capacity(files.len());
    let mut tasks = Vec::new();
    for f in files {
        if guess_seq_filetype(f) == Some(FASTQ_TAG) && !is_compressed(f) {
            converted.push(f.clone());
            continue;
        }
        let fastq = new_file(format!("{}.fastq", f.display()), products_dir);
        let to_fastq = SequenceConvertConfig {
            format_to: FASTQ_TAG.to_string(),
            ..config.clone()
        };
        tasks.push(sequence_convert(std::slice::from_ref(f), Some(fastq.as_path()), &to_fastq)?);
        converted.push(fastq);
    }
    Ok((converted, tasks))
}
