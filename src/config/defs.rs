use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

// External software
pub const QIIME_TAG: &str = "qiime_cmd";
pub const PICRUST_TAG: &str = "picrust_cmd";
pub const USEARCH_TAG: &str = "usearch7";
pub const BIOM_TAG: &str = "biom";
pub const BOWTIE2_TAG: &str = "bowtie2";
pub const SAMTOOLS_TAG: &str = "samtools";
pub const BAM_PE_SPLIT_TAG: &str = "bam_pe_split";
pub const SUBREAD_ALIGN_TAG: &str = "subread-align";
pub const FEATURE_COUNTS_TAG: &str = "featureCounts";
pub const METAPHLAN2_TAG: &str = "metaphlan2.py";
pub const HUMANN_INIT_TAG: &str = "humann_init.py";
pub const HUMANN2_TAG: &str = "humann2";
pub const KNEADDATA_TAG: &str = "knead_data.py";
pub const SCONS_TAG: &str = "scons";
pub const MAASLIN_TAG: &str = "Maaslin.R";
pub const PCOA_TAG: &str = "scriptPcoa.py";
pub const QIIME_TO_MAASLIN_TAG: &str = "qiimeToMaaslin.py";
pub const MERGE_METADATA_TAG: &str = "merge_metadata.py";
pub const TRANSPOSE_TAG: &str = "transpose.py";
pub const GUNZIP_TAG: &str = "gunzip";
pub const BUNZIP2_TAG: &str = "bunzip2";

// Helper scripts shipped alongside the workflows
pub const SEQUENCE_CONVERT_TAG: &str = "sequence_convert";
pub const SEQUENCE_PAIR_TAG: &str = "sequence_pair";
pub const FASTQ_SPLIT_TAG: &str = "fastq_split";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QiimeScript {
    SplitLibraries,
    SplitLibrariesFastq,
    PickClosedReferenceOtus,
    PickOpenReferenceOtus,
    MergeOtuTables,
    SummarizeTaxaThroughPlots,
}

impl QiimeScript {
    pub fn as_str(&self) -> &'static str {
        match self {
            QiimeScript::SplitLibraries => "split_libraries.py",
            QiimeScript::SplitLibrariesFastq => "split_libraries_fastq.py",
            QiimeScript::PickClosedReferenceOtus => "pick_closed_reference_otus.py",
            QiimeScript::PickOpenReferenceOtus => "pick_open_reference_otus.py",
            QiimeScript::MergeOtuTables => "merge_otu_tables.py",
            QiimeScript::SummarizeTaxaThroughPlots => "summarize_taxa_through_plots.py",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PicrustScript {
    NormalizeByCopyNumber,
    PredictMetagenomes,
}

impl PicrustScript {
    pub fn as_str(&self) -> &'static str {
        match self {
            PicrustScript::NormalizeByCopyNumber => "normalize_by_copy_number.py",
            PicrustScript::PredictMetagenomes => "predict_metagenomes.py",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BiomSubcommand {
    Convert,
    AddMetadata,
}

impl BiomSubcommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            BiomSubcommand::Convert => "convert",
            BiomSubcommand::AddMetadata => "add-metadata",
        }
    }
}

// Static Filenames
pub const MAP_FNAME: &str = "map.txt";
pub const OTU_TABLE_FNAME: &str = "otu_table.biom";
pub const DEMUXED_FNAME: &str = "seqs.fna";
pub const REVCOMP_FNAME: &str = "revcomp.fna";
pub const OTUS_DIR: &str = "otus";

// Sample metadata
pub const BARCODE_COLUMN: &str = "BarcodeSequence";
pub const RUN_ACCESSION_COLUMN: &str = "Run_accession";
pub const SAMPLE_ID_COLUMN: &str = "SampleID";
pub const GOLAY_12: &str = "golay_12";
pub const VARIABLE_LENGTH: &str = "variable_length";

// Static Parameters
pub const EMPTY_FILE_THRESHOLD: u64 = 1;

pub const FASTA_TAG: &str = "fasta";
pub const FASTQ_TAG: &str = "fastq";
pub const BAM_TAG: &str = "bam";
pub const SAM_TAG: &str = "sam";
pub const SFF_TAG: &str = "sff";
pub const FASTA_EXTS: &[&str] = &["fasta", "fa", "fna", "faa", "ffn", "frn"];
pub const FASTQ_EXTS: &[&str] = &["fastq", "fq"];
pub const SFF_EXTS: &[&str] = &["sff"];
pub const BAM_EXTS: &[&str] = &["bam"];
pub const SAM_EXTS: &[&str] = &["sam"];
pub const GZIP_EXTS: &[&str] = &["gz", "gzip"];
pub const BZIP2_EXTS: &[&str] = &["bz2", "bzip2"];

pub const DEFAULT_PRODUCTS_DIR: &str = "anadama_products";

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid sample metadata: {0}")]
    InvalidMetadata(String),

    #[error("Sample metadata file does not exist: {0}")]
    MissingMetadata(PathBuf),

    #[error("Failed to read settings from {path}: {error}")]
    Settings { path: PathBuf, error: String },

    #[error("IO error: {0}")]
    IOError(String),
}

impl From<std::io::Error> for PipelineError {
    fn from(e: std::io::Error) -> Self {
        PipelineError::IOError(e.to_string())
    }
}

impl From<csv::Error> for PipelineError {
    fn from(e: csv::Error) -> Self {
        PipelineError::InvalidMetadata(e.to_string())
    }
}


/// Locations of reference databases and run-wide defaults.
///
/// Passed explicitly into every workflow function and pipeline. The
/// `Default` values are relative paths under `databases/` so a checkout with
/// the standard layout works without a settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub products_dir: PathBuf,
    pub verbose: bool,
    pub sixteen: SixteenSettings,
    pub metaphlan2: Metaphlan2Settings,
    pub knead: KneadSettings,
    pub subread: SubreadSettings,
    pub alignment: AlignmentSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SixteenSettings {
    pub otu_taxonomy: PathBuf,
    pub otu_refseq: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Metaphlan2Settings {
    pub bowtie2db: PathBuf,
    pub mpa_pkl: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KneadSettings {
    pub reference_db: Vec<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SubreadSettings {
    pub index: PathBuf,
    pub annotations: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AlignmentSettings {
    pub kegg_bowtie2_db: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            products_dir: PathBuf::from(DEFAULT_PRODUCTS_DIR),
            verbose: true,
            sixteen: SixteenSettings::default(),
            metaphlan2: Metaphlan2Settings::default(),
            knead: KneadSettings::default(),
            subread: SubreadSettings::default(),
            alignment: AlignmentSettings::default(),
        }
    }
}

impl Default for SixteenSettings {
    fn default() -> Self {
        SixteenSettings {
            otu_taxonomy: PathBuf::from("databases/gg_13_5_otus/taxonomy/97_otu_taxonomy.txt"),
            otu_refseq: PathBuf::from("databases/gg_13_5_otus/rep_set/97_otus.fasta"),
        }
    }
}

impl Default for Metaphlan2Settings {
    fn default() -> Self {
        Metaphlan2Settings {
            bowtie2db: PathBuf::from("databases/metaphlan2/db_v20/mpa_v20_m200"),
            mpa_pkl: PathBuf::from("databases/metaphlan2/db_v20/mpa_v20_m200.pkl"),
        }
    }
}

impl Default for KneadSettings {
    fn default() -> Self {
        KneadSettings {
            reference_db: vec![PathBuf::from("databases/bowtie2/humanGRCh38")],
        }
    }
}

impl Default for SubreadSettings {
    fn default() -> Self {
        SubreadSettings {
            index: PathBuf::from("databases/subread/GRCh38"),
            annotations: PathBuf::from("databases/subread/default_annotations.gtf"),
        }
    }
}

impl Default for AlignmentSettings {
    fn default() -> Self {
        AlignmentSettings {
            kegg_bowtie2_db: PathBuf::from("databases/bowtie2/KEGG_proks_reduced"),
        }
    }
}

impl Settings {
    /// Loads settings from a TOML file. Missing keys keep their defaults.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a TOML settings file.
    ///
    /// # Returns
    /// Result<Settings, PipelineError>
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

    pub fn from_toml_str(text: &str) -> Result<Self, PipelineError> {
        toml::from_str(text).map_err(|e| PipelineError::Settings {
            path: PathBuf::new(),
            error: e.to_string(),
        })
    }

    /// Returns the products directory with the same copy of settings otherwise.
    pub fn with_products_dir(mut self, products_dir: impl Into<PathBuf>) -> Self {
        self.products_dir = products_dir.into();
        self
    }
}
