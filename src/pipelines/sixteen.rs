// src/pipelines/sixteen.rs: 16S amplicon pipeline

use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::config::defs::{
    DEMUXED_FNAME, MAP_FNAME, OTU_TABLE_FNAME, OTUS_DIR, PipelineError, RUN_ACCESSION_COLUMN,
    Settings,
};
use crate::pipelines::{maybe_decompress, Pipeline, PipelinePlan};
use crate::utils::fastx::{infer_inputs, to_merged, SeqInput};
use crate::utils::file::{add_ext, new_file};
use crate::utils::metadata::{
    determine_barcode_type, filter_files_for_sample, group_by_sample_id, SampleMetadataSource,
    SampleRecord,
};
use crate::workflows::biom::to_tsv;
use crate::workflows::general::{fastq_split, FastqSplitConfig};
use crate::workflows::sixteen::{
    demultiplex, demultiplex_illumina, picrust, pick_otus_closed_ref, write_map, DemultiplexConfig,
    DemultiplexIlluminaConfig, PickOtusConfig, PicrustConfig,
};
use crate::workflows::usearch::{usearch_stitch, UsearchStitchConfig};


#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SixteenSOptions {
    /// Pair `_R1`/`_R2` files and stitch each pair before demultiplexing.
    pub infer_pairs: bool,
    pub usearch_stitch: UsearchStitchConfig,
    pub fastq_split: FastqSplitConfig,
    pub demultiplex: DemultiplexConfig,
    pub demultiplex_illumina: DemultiplexIlluminaConfig,
    pub pick_otus_closed_ref: PickOtusConfig,
    pub picrust: PicrustConfig,
}

impl Default for SixteenSOptions {
    fn default() -> Self {
        SixteenSOptions {
            infer_pairs: true,
            usearch_stitch: UsearchStitchConfig::default(),
            fastq_split: FastqSplitConfig::default(),
            demultiplex: DemultiplexConfig::default(),
            demultiplex_illumina: DemultiplexIlluminaConfig::default(),
            pick_otus_closed_ref: PickOtusConfig::default(),
            picrust: PicrustConfig::default(),
        }
    }
}

/// 16S pipeline: raw reads to per-sample OTU tables and PICRUSt
/// predictions.
///
/// Raw files are decompressed and stitched when paired, then split per
/// sample id. Barcode read files select Illumina demultiplexing; without
/// them the 454 path (fasta/qual split, split_libraries.py) is used.
#[derive(Debug, Clone)]
pub struct SixteenSPipeline {
    pub sample_metadata: SampleMetadataSource,
    pub raw_seq_files: Vec<PathBuf>,
    pub barcode_seq_files: Vec<PathBuf>,
    /// Already demultiplexed and quality-checked fasta files.
    pub demuxed_fasta_files: Vec<PathBuf>,
    /// Already picked OTU tables.
    pub otu_tables: Vec<PathBuf>,
    pub settings: Settings,
    pub options: SixteenSOptions,
}

impl SixteenSPipeline {
    pub fn new(sample_metadata: SampleMetadataSource, settings: Settings) -> Self {
        SixteenSPipeline {
            sample_metadata,
            raw_seq_files: Vec::new(),
            barcode_seq_files: Vec::new(),
            demuxed_fasta_files: Vec::new(),
            otu_tables: Vec::new(),
            settings,
            options: SixteenSOptions::default(),
        }
    }

    fn stitch(&self, inputs: Vec<SeqInput>, plan: &mut PipelinePlan) -> Vec<PathBuf> {
        let products_dir = &self.settings.products_dir;
        let mut seq_files = Vec::with_capacity(inputs.len());
        for input in inputs {
            match input {
                SeqInput::Pair(r1, r2) => {
                    let stitched = new_file(to_merged(&r1, "stitched"), products_dir);
                    plan.push(usearch_stitch(&r1, &r2, &stitched, &self.options.usearch_stitch));
                    seq_files.push(stitched);
                }
                SeqInput::Single(f) => seq_files.push(f),
            }
        }
        seq_files
    }

    fn demultiplex_sample(
        &self,
        sample_id: &str,
        group: &[SampleRecord],
        seq_files: &[PathBuf],
        plan: &mut PipelinePlan,
    ) -> Result<PathBuf, PipelineError> {
        let sample_dir = self.settings.products_dir.join(sample_id);
        let map_fname = new_file(MAP_FNAME, &sample_dir);
        let demuxed = new_file(DEMUXED_FNAME, &sample_dir);
        plan.push(write_map(group, &sample_dir)?);

        let files = filter_files_for_sample(seq_files, group, RUN_ACCESSION_COLUMN);
        if !self.barcode_seq_files.is_empty() {
            let barcodes = filter_files_for_sample(&self.barcode_seq_files, group, RUN_ACCESSION_COLUMN);
            debug!("Sample {}: Illumina demultiplexing of {} files", sample_id, files.len());
            plan.push(demultiplex_illumina(
                &map_fname,
                &files,
                &barcodes,
                &demuxed,
                &self.options.demultiplex_illumina,
                &self.settings,
            )?);
        } else {
            let fasta = new_file(add_ext(sample_id, "fa"), &sample_dir);
            let qual = new_file(add_ext(sample_id, "qual"), &sample_dir);
            plan.push(fastq_split(&files, &fasta, &qual, &self.options.fastq_split)?);

            let mut config = self.options.demultiplex.clone();
            if !config.qiime_opts.contains("barcode-type") {
                config.qiime_opts.set("barcode-type", determine_barcode_type(group)?);
            }
            plan.push(demultiplex(&map_fname, &fasta, &qual, &demuxed, &config));
        }
        Ok(demuxed)
    }
}

impl Pipeline for SixteenSPipeline {
    fn name(&self) -> &'static str {
        "16S"
    }

    fn configure(&self) -> Result<PipelinePlan, PipelineError> {
        let mut plan = PipelinePlan::default();
        let products_dir: &Path = &self.settings.products_dir;

        let inputs = if self.options.infer_pairs {
            infer_inputs(&self.raw_seq_files)
        } else {
            self.raw_seq_files.iter().cloned().map(SeqInput::Single).collect()
        };
        let (inputs, extract_tasks) = maybe_decompress(&inputs, products_dir)?;
        plan.extend(extract_tasks);
        let seq_files = self.stitch(inputs, &mut plan);

        let mut demuxed_files = self.demuxed_fasta_files.clone();
        if !seq_files.is_empty() {
            let records = self.sample_metadata.resolve()?;
            for (sample_id, group) in group_by_sample_id(&records) {
                demuxed_files.push(self.demultiplex_sample(&sample_id, &group, &seq_files, &mut plan)?);
            }
        }

        let mut otu_tables = self.otu_tables.clone();
        for fasta in &demuxed_files {
            let otu_dir = fasta.parent().unwrap_or_else(|| Path::new("")).join(OTUS_DIR);
            plan.push(pick_otus_closed_ref(
                fasta,
                &otu_dir,
                &self.options.pick_otus_closed_ref,
                &self.settings,
            )?);
            otu_tables.push(new_file(OTU_TABLE_FNAME, &otu_dir));
        }

        for otu_table in &otu_tables {
            let tsv = add_ext(otu_table, "tsv");
            plan.push(to_tsv(otu_table, &tsv));
            plan.add_product("otu_tsvs", tsv);
        }
        for otu_table in &otu_tables {
            plan.push(picrust(otu_table, &self.options.picrust, &self.settings));
        }

        for f in demuxed_files {
            plan.add_product("demuxed_fasta_files", f);
        }
        for t in otu_tables {
            plan.add_product("otu_tables", t);
        }
        info!("Configured {} tasks for the 16S pipeline", plan.tasks.len());
        Ok(plan)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::metadata::parse_map;
    use crate::utils::task::Task;

    const MAP: &str = "#SampleID\tBarcodeSequence\tRun_accession\n\
                       S2\tACGTACGTACGT\trunB\n\
                       S1\tACGTAC\trunA\n";

    fn pipeline() -> SixteenSPipeline {
        let records = parse_map(MAP.as_bytes()).unwrap();
        let settings = Settings::default().with_products_dir("p");
        let mut pipeline = SixteenSPipeline::new(SampleMetadataSource::Records(records), settings);
        pipeline.raw_seq_files = vec![PathBuf::from("raw/runA.fastq"), PathBuf::from("raw/runB.fastq.gz")];
        pipeline
    }

    #[test]
    fn test_454_branch_task_order() {
        let plan = pipeline().configure().unwrap();
        let names: Vec<&str> = plan.tasks.iter().map(|t| t.name.split(':').next().unwrap_or("")).collect();
        assert_eq!(
            names,
            vec![
                "decompress",
                "write_map",
                "fastq_split",
                "demultiplex",
                "write_map",
                "fastq_split",
                "demultiplex",
                "pick_otus_closed_ref",
                "pick_otus_closed_ref",
                "biom_to_tsv",
                "biom_to_tsv",
                "picrust",
                "picrust"
            ]
        );
        assert_eq!(
            plan.products_of("otu_tables"),
            &[PathBuf::from("p/S1/otus/otu_table.biom"), PathBuf::from("p/S2/otus/otu_table.biom")]
        );
    }

    #[test]
    fn test_barcode_type_derived_per_sample() {
        let plan = pipeline().configure().unwrap();
        let demux: Vec<String> = plan
            .tasks
            .iter()
            .filter(|t| t.name.starts_with("demultiplex:"))
            .map(|t| t.manifest().actions.last().cloned().unwrap_or_default())
            .collect();
        assert!(demux[0].ends_with("-M 2 --barcode-type 6"));
        assert!(demux[1].ends_with("-M 2 --barcode-type golay_12"));
        assert!(demux[1].contains("--fasta=p/S2/S2.fa"));
    }

    #[test]
    fn test_files_filtered_by_run_accession() {
        let plan = pipeline().configure().unwrap();
        let split = plan.tasks.iter().find(|t| t.name.starts_with("fastq_split")).unwrap();
        assert_eq!(split.file_dep, vec![PathBuf::from("raw/runA.fastq")]);
        let split_b = plan.tasks.iter().filter(|t| t.name.starts_with("fastq_split")).nth(1).unwrap();
        assert_eq!(split_b.file_dep, vec![PathBuf::from("p/runB.fastq")]);
    }

    #[test]
    fn test_illumina_branch_with_stitching() {
        let mut pipeline = pipeline();
        pipeline.raw_seq_files = vec![PathBuf::from("raw/runA_R1.fastq"), PathBuf::from("raw/runA_R2.fastq")];
        pipeline.barcode_seq_files = vec![PathBuf::from("raw/runA_I1.fastq")];
        let plan = pipeline.configure().unwrap();

        assert_eq!(plan.tasks[0].name, "usearch_stitch: p/runA_stitched.fastq");
        assert!(plan.tasks.iter().any(|t| t.name == "demultiplex_illumina:p/runA_stitched.fastq"));
        assert!(!plan.tasks.iter().any(|t| t.name.starts_with("fastq_split")));
    }

    #[test]
    fn test_configure_is_repeatable() {
        let pipeline = pipeline();
        let first: Vec<_> = pipeline.configure().unwrap().tasks.iter().map(Task::manifest).collect();
        let second: Vec<_> = pipeline.configure().unwrap().tasks.iter().map(Task::manifest).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_only_otu_tables_given() {
        let mut pipeline = SixteenSPipeline::new(SampleMetadataSource::Records(Vec::new()), Settings::default());
        pipeline.otu_tables = vec![PathBuf::from("t/otu_table.biom")];
        let plan = pipeline.configure().unwrap();
        assert_eq!(plan.tasks.len(), 2);
    }
}
