// src/workflows/alignment.rs: bowtie2 mapping against a reference database

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::defs::{BOWTIE2_TAG, PipelineError, Settings};
use crate::utils::command::{join_paths, CommandLine, ToolOptions};
use crate::utils::task::{Action, Task};
use crate::workflows::{display, require_inputs};


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Bowtie2Config {
    /// Index basename; the KEGG database from settings when unset.
    pub reference_db: Option<PathBuf>,
    /// Defaults to 2.
    pub threads: Option<usize>,
    pub option_fields: ToolOptions,
}

/// Maps fastq reads with bowtie2 in `--very-sensitive` mode, writing SAM
/// without header lines.
///
/// # Arguments
///
/// * `inputs` - Fastq files passed together through `-U`.
/// * `output` - SAM output.
/// * `config` - Database, threads and extra flags.
/// * `settings` - Supplies the default database.
///
/// # Returns
/// Result<Task, PipelineError>
pub fn bowtie2_align(
    inputs: &[PathBuf],
    output: &Path,
    config: &Bowtie2Config,
    settings: &Settings,
) -> Result<Task, PipelineError> {
    require_inputs(inputs, "bowtie2_align")?;
    let db = config.reference_db.as_deref().unwrap_or(&settings.alignment.kegg_bowtie2_db);

    let cmd = CommandLine::new(BOWTIE2_TAG)
        .opt("-x", db.display())
        .opt("-p", config.threads.unwrap_or(2))
        .opt("-U", join_paths(inputs, ","))
        .arg("--no-head")
        .arg("--very-sensitive")
        .opts(&config.option_fields)
        .stdout_to(output)
        .build();

    Ok(Task::new(format!("bowtie2_align:{}", display(output)))
        .action(Action::shell(cmd))
        .file_deps(inputs)
        .target(output)
        .prepare_target_dirs())
}
