// src/workflows/usearch.rs: USEARCH v7 read stitching and quality filtering

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::debug;
use serde::Deserialize;

use crate::config::defs::{FASTQ_TAG, SEQUENCE_PAIR_TAG, USEARCH_TAG};
use crate::utils::command::{CommandLine, ToolOptions};
use crate::utils::fallback::FallbackPlan;
use crate::utils::task::{skip_if_empty, Action, Task};
use crate::workflows::display;


#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsearchStitchConfig {
    pub verbose: bool,
    /// Delete the `_paired.fastq` files left by the re-pairing step.
    pub remove_tempfiles: bool,
    pub option_fields: ToolOptions,
}

impl Default for UsearchStitchConfig {
    fn default() -> Self {
        UsearchStitchConfig {
            verbose: true,
            remove_tempfiles: true,
            option_fields: ToolOptions::new(),
        }
    }
}

fn stitch_defaults() -> ToolOptions {
    ToolOptions::new().with("fastq_truncqual", 10).with("fastq_maxdiffs", 3)
}

/// `reads.fastq` -> `reads_paired.fastq`
pub fn paired_name(path: &Path) -> PathBuf {
    PathBuf::from(path.to_string_lossy().replace(".fastq", "_paired.fastq"))
}

fn stitch_cmd(r1: &Path, r2: &Path, output: &Path, opts: &ToolOptions) -> String {
    CommandLine::new(USEARCH_TAG)
        .opt("-fastq_mergepairs", r1.display())
        .opt("-reverse", r2.display())
        .single_dash_opts(opts)
        .opt("-fastqout", output.display())
        .build()
}

/// Stitches a read pair into one fastq file.
///
/// usearch7 needs both files in the same read order, so a failed merge is
/// retried after re-pairing the reads with `sequence_pair`; if that fails
/// too, the forward reads are copied to `output` unchanged.
///
/// # Arguments
///
/// * `r1` - Forward reads.
/// * `r2` - Reverse reads.
/// * `output` - Stitched fastq.
/// * `config` - usearch7 flags, merged over `fastq_truncqual 10` and
///   `fastq_maxdiffs 3`.
///
/// # Returns
/// Task running the whole fallback chain as one action.
pub fn usearch_stitch(r1: &Path, r2: &Path, output: &Path, config: &UsearchStitchConfig) -> Task {
    let opts = config.option_fields.merged_over(&stitch_defaults());
    let verbose = config.verbose;
    let (r1_paired, r2_paired) = (paired_name(r1), paired_name(r2));

    let pair_cmd = CommandLine::new(SEQUENCE_PAIR_TAG)
        .opt("-f", FASTQ_TAG)
        .opt("-t", FASTQ_TAG)
        .opt("-1", r1_paired.display())
        .opt("-2", r2_paired.display())
        .path(r1)
        .path(r2)
        .build();

    let plan = Arc::new(
        FallbackPlan::new()
            .attempt(Action::shell_verbose(stitch_cmd(r1, r2, output, &opts), verbose))
            .group(vec![
                Action::shell_verbose(pair_cmd, verbose),
                Action::shell_verbose(stitch_cmd(&r1_paired, &r2_paired, output, &opts), verbose),
            ])
            .attempt(Action::shell_verbose(
                CommandLine::new("cp").path(r1).path(output).build(),
                verbose,
            )),
    );

    let remove_tempfiles = config.remove_tempfiles;
    let temps = vec![r1_paired, r2_paired];
    let stitch = Action::callable(format!("usearch7 stitch {} with re-pair fallback", display(r1)), move || {
        let plan = Arc::clone(&plan);
        let temps = temps.clone();
        async move {
            let outcome = plan.run().await;
            if remove_tempfiles {
                for f in &temps {
                    if tokio::fs::remove_file(f).await.is_ok() {
                        debug!("Removed {}", f.display());
                    }
                }
            }
            outcome
        }
    });

    Task::new(format!("usearch_stitch: {}", display(output)))
        .action(stitch)
        .file_dep(r1)
        .file_dep(r2)
        .target(output)
        .prepare_target_dirs()
}


#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct UsearchFilterConfig {
    pub verbose: bool,
    pub option_fields: ToolOptions,
}

impl Default for UsearchFilterConfig {
    fn default() -> Self {
        UsearchFilterConfig {
            verbose: true,
            option_fields: ToolOptions::new(),
        }
    }
}

/// Quality-filters a fastq file into fasta. An empty input yields an empty
/// output without calling usearch7.
pub fn usearch_filter(input: &Path, output: &Path, config: &UsearchFilterConfig) -> Task {
    let defaults = ToolOptions::new().with("fastq_minlen", 200).with("fastq_truncqual", 25);
    let cmd = CommandLine::new(USEARCH_TAG)
        .opt("-fastq_filter", input.display())
        .opt("-fastaout", output.display())
        .single_dash_opts(&config.option_fields.merged_over(&defaults))
        .build();

    Task::new(format!("usearch_filter: {}", display(output)))
        .action(skip_if_empty(
            vec![input.to_path_buf()],
            vec![output.to_path_buf()],
            Action::shell_verbose(cmd, config.verbose),
        ))
        .file_dep(input)
        .target(output)
        .prepare_target_dirs()
}
