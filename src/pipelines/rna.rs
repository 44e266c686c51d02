// src/pipelines/rna.rs: RNA-seq read counting pipeline

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::config::defs::{BAM_TAG, PipelineError, Settings};
use crate::pipelines::{maybe_convert_to_fastq, Pipeline, PipelinePlan};
use crate::utils::fastx::{infer_inputs, to_merged, SeqInput};
use crate::utils::file::{add_ext, add_tag, guess_seq_filetype, new_file, rm_ext};
use crate::utils::metadata::{records_from_ids, SampleMetadataSource};
use crate::workflows::general::SequenceConvertConfig;
use crate::workflows::samtools::{to_paired_fastq, SamtoolsSortConfig};
use crate::workflows::subread::{align, feature_counts, FeatureCountsConfig, SubreadAlignConfig};


#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RnaOptions {
    pub infer_pairs: bool,
    pub sequence_convert: SequenceConvertConfig,
    pub to_paired_fastq: SamtoolsSortConfig,
    pub subread_align: SubreadAlignConfig,
    pub feature_counts: FeatureCountsConfig,
}

impl Default for RnaOptions {
    fn default() -> Self {
        RnaOptions {
            infer_pairs: true,
            sequence_convert: SequenceConvertConfig::default(),
            to_paired_fastq: SamtoolsSortConfig::default(),
            subread_align: SubreadAlignConfig::default(),
            feature_counts: FeatureCountsConfig::default(),
        }
    }
}

/// RNA-seq pipeline producing one read count table per alignment.
///
/// Every sequence set is turned into paired and single fastq files (BAM
/// inputs are name-sorted and split), aligned with subread and counted
/// against the annotation with featureCounts.
#[derive(Debug, Clone)]
pub struct RnaPipeline {
    /// Falls back to one sample per raw file, named by its basename.
    pub sample_metadata: SampleMetadataSource,
    pub raw_seq_files: Vec<PathBuf>,
    pub paired_fastq_files: Vec<(PathBuf, PathBuf)>,
    pub unpaired_fastq_files: Vec<PathBuf>,
    pub align_sams: Vec<PathBuf>,
    pub settings: Settings,
    pub options: RnaOptions,
}

fn basename(path: &Path) -> PathBuf {
    path.file_name().map(PathBuf::from).unwrap_or_else(|| path.to_path_buf())
}

impl RnaPipeline {
    pub fn new(sample_metadata: SampleMetadataSource, settings: Settings) -> Self {
        RnaPipeline {
            sample_metadata,
            raw_seq_files: Vec::new(),
            paired_fastq_files: Vec::new(),
            unpaired_fastq_files: Vec::new(),
            align_sams: Vec::new(),
            settings,
            options: RnaOptions::default(),
        }
    }

    fn default_metadata(&self) -> SampleMetadataSource {
        match &self.sample_metadata {
            SampleMetadataSource::Records(r) if r.is_empty() => {
                let ids = self.raw_seq_files.iter().map(|f| basename(f).to_string_lossy().into_owned());
                SampleMetadataSource::Records(records_from_ids(ids))
            }
            other => other.clone(),
        }
    }
}

impl Pipeline for RnaPipeline {
    fn name(&self) -> &'static str {
        "RNA"
    }

    fn configure(&self) -> Result<PipelinePlan, PipelineError> {
        let mut plan = PipelinePlan::default();
        let products_dir = &self.settings.products_dir;
        if !self.raw_seq_files.is_empty() {
            let samples = self.default_metadata().resolve()?;
            debug!("RNA pipeline: {} samples", samples.len());
        }

        let inputs = if self.options.infer_pairs {
            infer_inputs(&self.raw_seq_files)
        } else {
            self.raw_seq_files.iter().cloned().map(SeqInput::Single).collect()
        };

        let mut pairs = self.paired_fastq_files.clone();
        let mut singles = self.unpaired_fastq_files.clone();
        for input in &inputs {
            match input {
                SeqInput::Pair(r1, r2) => {
                    let (converted, tasks) = maybe_convert_to_fastq(
                        &[r1.clone(), r2.clone()],
                        products_dir,
                        &self.options.sequence_convert,
                    )?;
                    plan.extend(tasks);
                    pairs.push((converted[0].clone(), converted[1].clone()));
                }
                SeqInput::Single(f) if guess_seq_filetype(f) == Some(BAM_TAG) => {
                    let prefix = new_file(rm_ext(basename(f)), products_dir);
                    let task = to_paired_fastq(f, &prefix, &self.options.to_paired_fastq);
                    pairs.push((task.targets[0].clone(), task.targets[1].clone()));
                    singles.push(task.targets[2].clone());
                    plan.push(task);
                }
                SeqInput::Single(f) => {
                    let (converted, tasks) = maybe_convert_to_fastq(
                        std::slice::from_ref(f),
                        products_dir,
                        &self.options.sequence_convert,
                    )?;
                    plan.extend(tasks);
                    singles.extend(converted);
                }
            }
        }

        let mut sams = self.align_sams.clone();
        for (r1, r2) in &pairs {
            let sam = add_ext(new_file(to_merged(basename(r1), "align"), products_dir), "sam");
            let reads = SeqInput::Pair(r1.clone(), r2.clone());
            plan.push(align(&reads, &sam, &self.options.subread_align, &self.settings));
            sams.push(sam);
        }
        for single in &singles {
            let sam = add_ext(new_file(add_tag(basename(single), "align"), products_dir), "sam");
            plan.push(align(&SeqInput::Single(single.clone()), &sam, &self.options.subread_align, &self.settings));
            sams.push(sam);
        }

        for sam in &sams {
            let count_table = new_file(add_tag(basename(sam), "count"), products_dir);
            plan.push(feature_counts(
                std::slice::from_ref(sam),
                &count_table,
                &self.options.feature_counts,
                &self.settings,
            )?);
            plan.add_product("count_tables", count_table);
        }

        for (r1, r2) in pairs {
            plan.add_product("paired_fastq_files", r1);
            plan.add_product("paired_fastq_files", r2);
        }
        for f in singles {
            plan.add_product("unpaired_fastq_files", f);
        }
        for f in sams {
            plan.add_product("align_sams", f);
        }
        info!("Configured {} tasks for the RNA pipeline", plan.tasks.len());
        Ok(plan)
    }
}
