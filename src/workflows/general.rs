// src/workflows/general.rs: decompression and sequence format conversion

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::defs::{
    BUNZIP2_TAG, FASTQ_SPLIT_TAG, FASTQ_TAG, GUNZIP_TAG, PipelineError, SEQUENCE_CONVERT_TAG,
};
use crate::utils::command::CommandLine;
use crate::utils::file::{compression_of, guess_seq_filetype, Compression};
use crate::utils::task::{Action, Task};
use crate::workflows::{display, require_inputs};


/// Decompresses one gzip or bzip2 file into `output`, leaving the input
/// in place.
///
/// # Returns
/// Err when the extension names no known compression.
pub fn extract(input: &Path, output: &Path) -> Result<Task, PipelineError> {
    let program = match compression_of(input) {
        Some(Compression::Gzip) => GUNZIP_TAG,
        Some(Compression::Bzip2) => BUNZIP2_TAG,
        None => {
            return Err(PipelineError::InvalidConfig(format!(
                "{} is not a recognised compressed file",
                input.display()
            )));
        }
    };

    let cmd = CommandLine::new(program).arg("-c").path(input).stdout_to(output).build();
    Ok(Task::new(format!("decompress:{}", display(input)))
        .action(Action::shell(cmd))
        .file_dep(input)
        .target(output)
        .prepare_target_dirs())
}


#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct FastqSplitConfig {
    pub reverse_complement: bool,
    /// Bases trimmed from the start of every sequence.
    pub trim: u32,
    pub from_format: Option<String>,
}

impl Default for FastqSplitConfig {
    fn default() -> Self {
        FastqSplitConfig {
            reverse_complement: false,
            trim: 4,
            from_format: None,
        }
    }
}

fn input_format(files: &[PathBuf], explicit: &Option<String>) -> Result<String, PipelineError> {
    if let Some(format) = explicit {
        return Ok(format.clone());
    }
    guess_seq_filetype(&files[0]).map(String::from).ok_or_else(|| {
        PipelineError::InvalidConfig(format!(
            "cannot guess the sequence format of {}; set from_format",
            files[0].display()
        ))
    })
}

/// Concatenates sequence files into a fasta file and a qual file.
///
/// # Arguments
///
/// * `files` - Input sequence files; the first one decides the format.
/// * `fasta_out` - Fasta output.
/// * `qual_out` - Qual output.
/// * `config` - Trim length, orientation and format override.
///
/// # Returns
/// Result<Task, PipelineError>
pub fn fastq_split(
    files: &[PathBuf],
    fasta_out: &Path,
    qual_out: &Path,
    config: &FastqSplitConfig,
) -> Result<Task, PipelineError> {
    require_inputs(files, "fastq_split")?;
    let format = input_format(files, &config.from_format)?;

    let mut cmd = CommandLine::new(FASTQ_SPLIT_TAG)
        .arg(format!("--fasta_out={}", fasta_out.display()))
        .arg(format!("--qual_out={}", qual_out.display()))
        .arg(format!("--format={}", format))
        .arg(format!("--trim={}", config.trim));
    if config.reverse_complement {
        cmd = cmd.arg("-r");
    }
    let cmd = cmd.paths(files).build();

    Ok(Task::new(format!("fastq_split:{}", display(&files[0])))
        .action(Action::shell(cmd))
        .file_deps(files)
        .target(fasta_out)
        .target(qual_out)
        .prepare_target_dirs())
}


#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SequenceConvertConfig {
    pub reverse_complement: bool,
    pub from_format: Option<String>,
    pub format_to: String,
    /// Length conditions such as `>=60`; sequences failing any are dropped.
    pub lenfilters_list: Vec<String>,
}

impl Default for SequenceConvertConfig {
    fn default() -> Self {
        SequenceConvertConfig {
            reverse_complement: false,
            from_format: None,
            format_to: FASTQ_TAG.to_string(),
            lenfilters_list: Vec::new(),
        }
    }
}

/// Command converting `files` into `output`, shared with the workflows that
/// need it inside a fallback group.
pub fn sequence_convert_cmd(
    files: &[PathBuf],
    output: &Path,
    config: &SequenceConvertConfig,
) -> Result<String, PipelineError> {
    require_inputs(files, "sequence_convert")?;
    let format = input_format(files, &config.from_format)?;

    let mut cmd = CommandLine::new(SEQUENCE_CONVERT_TAG)
        .arg(format!("--format={}", format))
        .arg(format!("--to={}", config.format_to));
    if config.reverse_complement {
        cmd = cmd.arg("--reverse_complement");
    }
    for filter in &config.lenfilters_list {
        cmd = cmd.opt("-n", format!("'{}'", filter));
    }
    Ok(cmd.paths(files).stdout_to(output).build())
}

/// Converts and concatenates sequence files into one file of
/// `config.format_to`.
///
/// # Arguments
///
/// * `files` - Input sequence files.
/// * `output` - Output path; defaults to `<first>_merged.<format_to>`.
/// * `config` - Conversion options.
///
/// # Returns
/// Result<Task, PipelineError>
pub fn sequence_convert(
    files: &[PathBuf],
    output: Option<&Path>,
    config: &SequenceConvertConfig,
) -> Result<Task, PipelineError> {
    require_inputs(files, "sequence_convert")?;
    let output = match output {
        Some(o) => o.to_path_buf(),
        None => PathBuf::from(format!("{}_merged.{}", files[0].display(), config.format_to)),
    };
    let cmd = sequence_convert_cmd(files, &output, config)?;

    Ok(Task::new(format!("sequence_convert_to_{}: {}...", config.format_to, display(&files[0])))
        .action(Action::shell(cmd))
        .file_deps(files)
        .target(&output)
        .prepare_target_dirs())
}

/// `cat`-like command streaming `files` to stdout, picking the
/// decompressor from the first file's extension.
pub fn cat_cmd(files: &[PathBuf]) -> String {
    let program = match files.first().and_then(|f| compression_of(f)) {
        Some(Compression::Gzip) => "gzip -dc",
        Some(Compression::Bzip2) => "bzip2 -dc",
        None => "cat",
    };
    CommandLine::new(program).paths(files).build()
}
