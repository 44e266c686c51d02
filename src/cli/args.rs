use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Debug, Clone, Copy, ValueEnum, Default, PartialEq)]
pub enum PipelineKind {
    #[default]
    Sixteen,
    Wgs,
    Rna,
    Visualization,
}

#[derive(Parser, Debug, Clone, Default)]
#[command(name = "seqtoid-workflows", version = "0.1.1")]
pub struct Arguments {

    #[arg(long, value_enum, default_value = "sixteen")]
    pub pipeline: PipelineKind,

    #[arg(short = 'm', long, help = "Tab-separated map.txt with one row per sample. Optional for the RNA pipeline.")]
    pub metadata: Option<PathBuf>,

    #[arg(short = 'i', long = "input", help = "Raw sequence file; repeat for more files. For WGS each file is its own sequence set.")]
    pub input: Vec<PathBuf>,

    #[arg(long, help = "Barcode read files; selects Illumina demultiplexing in the 16S pipeline")]
    pub barcodes: Vec<PathBuf>,

    #[arg(long)]
    pub demuxed: Vec<PathBuf>,

    #[arg(long = "otu-tables")]
    pub otu_tables: Vec<PathBuf>,

    #[arg(long = "pcl-files")]
    pub pcl_files: Vec<PathBuf>,

    #[arg(short = 'o', long = "products-dir", help = "Where outputs go; overrides the settings file.")]
    pub products_dir: Option<PathBuf>,

    #[arg(short = 's', long, help = "TOML file with database paths and [workflow_options.*] tables")]
    pub settings: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub no_infer_pairs: bool,

    #[arg(short = 'v', long = "verbose", action)]
    pub verbose: bool,

    #[arg(long, default_value_t = false)]
    pub pretty: bool,
}
