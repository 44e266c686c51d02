// src/workflows/samtools.rs: name-sorting BAM files and splitting them into fastq

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::defs::{BAM_PE_SPLIT_TAG, SAMTOOLS_TAG};
use crate::utils::command::{CommandLine, ToolOptions};
use crate::utils::file::add_ext;
use crate::utils::task::{Action, Task};
use crate::workflows::display;


#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SamtoolsSortConfig {
    /// Memory per sorting thread, K/M/G suffixed.
    pub memory_level: String,
    pub num_threads: usize,
    pub option_fields: ToolOptions,
}

impl Default for SamtoolsSortConfig {
    fn default() -> Self {
        SamtoolsSortConfig {
            memory_level: "768M".to_string(),
            num_threads: 1,
            option_fields: ToolOptions::new(),
        }
    }
}

fn sort_cmd(input: &Path, output_prefix: &Path, config: &SamtoolsSortConfig, extra: &ToolOptions) -> String {
    let defaults = ToolOptions::new()
        .flag("n")
        .with("@", config.num_threads)
        .with("m", &config.memory_level);
    let opts = extra.merged_over(&config.option_fields.merged_over(&defaults));
    CommandLine::new(SAMTOOLS_TAG)
        .arg("sort")
        .opts(&opts)
        .path(input)
        .path(output_prefix)
        .build()
}

/// Sorts a BAM file by read name into `<output_prefix>.bam`.
pub fn sort(input: &Path, output_prefix: &Path, config: &SamtoolsSortConfig) -> Task {
    let output = add_ext(output_prefix, "bam");
    Task::new(format!("samtools.sort: {}", display(&output)))
        .action(Action::shell(sort_cmd(input, output_prefix, config, &ToolOptions::new())))
        .file_dep(input)
        .target(&output)
        .prepare_target_dirs()
}

/// Output files of [`to_paired_fastq`]: forward, reverse and singleton reads.
pub fn paired_fastq_names(output_prefix: &Path) -> (PathBuf, PathBuf, PathBuf) {
    (
        add_ext(output_prefix, "r1.fastq"),
        add_ext(output_prefix, "r2.fastq"),
        add_ext(output_prefix, "single.fastq"),
    )
}

/// Name-sorts a BAM file to stdout and splits the stream into
/// `<prefix>.r1.fastq`, `<prefix>.r2.fastq` and `<prefix>.single.fastq`.
pub fn to_paired_fastq(input: &Path, output_prefix: &Path, config: &SamtoolsSortConfig) -> Task {
    let (r1, r2, single) = paired_fastq_names(output_prefix);
    let sort = sort_cmd(input, output_prefix, config, &ToolOptions::new().flag("o"));
    let split = CommandLine::new(BAM_PE_SPLIT_TAG).path(output_prefix).build();

    Task::new(format!("samtools.to_paired_fastq {}...", display(&r1)))
        .action(Action::shell(format!("{} | {}", sort, split)))
        .file_dep(input)
        .targets(&[r1, r2, single])
        .prepare_target_dirs()
}
