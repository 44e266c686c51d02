// src/pipelines/wgs.rs: whole-genome shotgun pipeline

use std::path::PathBuf;

use log::info;
use serde::Deserialize;

use crate::config::defs::{PipelineError, Settings};
use crate::pipelines::{Pipeline, PipelinePlan};
use crate::utils::file::{add_ext, new_file};
use crate::utils::metadata::{filter_samples_for_file, SampleMetadataSource};
use crate::workflows::alignment::{bowtie2_align, Bowtie2Config};
use crate::workflows::general::{sequence_convert, SequenceConvertConfig};
use crate::workflows::wgs::{humann, metaphlan2, Metaphlan2Config};


#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WgsOptions {
    pub sequence_convert: SequenceConvertConfig,
    pub metaphlan2: Metaphlan2Config,
    pub bowtie2_align: Bowtie2Config,
}

impl Default for WgsOptions {
    fn default() -> Self {
        WgsOptions {
            sequence_convert: SequenceConvertConfig {
                lenfilters_list: vec![">=60".to_string()],
                ..Default::default()
            },
            metaphlan2: Metaphlan2Config::default(),
            bowtie2_align: Bowtie2Config::default(),
        }
    }
}

/// WGS pipeline. Each sequence set (one or more files aggregated as one
/// sample) is converted into a single length-filtered fastq, profiled with
/// MetaPhlAn2, aligned to KEGG with bowtie2 and run through HUMAnN.
#[derive(Debug, Clone)]
pub struct WgsPipeline {
    pub sample_metadata: SampleMetadataSource,
    pub raw_seq_files: Vec<Vec<PathBuf>>,
    /// Fastq files ready for profiling and alignment.
    pub intermediate_fastq_files: Vec<PathBuf>,
    /// SAM files ready for HUMAnN.
    pub alignment_result_files: Vec<PathBuf>,
    pub settings: Settings,
    pub options: WgsOptions,
}

impl WgsPipeline {
    pub fn new(sample_metadata: SampleMetadataSource, settings: Settings) -> Self {
        WgsPipeline {
            sample_metadata,
            raw_seq_files: Vec::new(),
            intermediate_fastq_files: Vec::new(),
            alignment_result_files: Vec::new(),
            settings,
            options: WgsOptions::default(),
        }
    }
}

impl Pipeline for WgsPipeline {
    fn name(&self) -> &'static str {
        "WGS"
    }

    fn configure(&self) -> Result<PipelinePlan, PipelineError> {
        let mut plan = PipelinePlan::default();
        let products_dir = &self.settings.products_dir;
        let records = if self.raw_seq_files.is_empty() {
            Vec::new()
        } else {
            self.sample_metadata.resolve()?
        };

        let mut fastq_files = self.intermediate_fastq_files.clone();
        for files in self.raw_seq_files.iter().filter(|set| !set.is_empty()) {
            let name = files[0]
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let fastq = new_file(format!("{}_merged.fastq", name), products_dir);
            plan.push(sequence_convert(files, Some(fastq.as_path()), &self.options.sequence_convert)?);

            let profile = new_file(format!("{}_merged.metaphlan2.pcl", name), products_dir);
            let otu_table = new_file(format!("{}_merged.metaphlan2.biom", name), products_dir);
            let sample_id = filter_samples_for_file(&records, &fastq)
                .first()
                .map(|s| s.sample_id().to_string());
            let config = Metaphlan2Config {
                output_file: Some(profile.clone()),
                biom: Some(otu_table.clone()),
                sample_id,
                ..self.options.metaphlan2.clone()
            };
            plan.push(metaphlan2(std::slice::from_ref(&fastq), &config, &self.settings)?);
            plan.add_product("metaphlan_results", profile);
            plan.add_product("otu_tables", otu_table);
            fastq_files.push(fastq);
        }

        let mut alignments = self.alignment_result_files.clone();
        for fastq in &fastq_files {
            let sam = add_ext(fastq, "sam");
            plan.push(bowtie2_align(
                std::slice::from_ref(fastq),
                &sam,
                &self.options.bowtie2_align,
                &self.settings,
            )?);
            alignments.push(sam);
        }

        for sam in &alignments {
            let workdir = PathBuf::from(format!("{}_humann", sam.display()));
            plan.push(humann(std::slice::from_ref(sam), &workdir)?);
        }

        for f in fastq_files {
            plan.add_product("intermediate_fastq_files", f);
        }
        for f in alignments {
            plan.add_product("alignment_result_files", f);
        }
        info!("Configured {} tasks for the WGS pipeline", plan.tasks.len());
        Ok(plan)
    }
}
