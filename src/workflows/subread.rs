// src/workflows/subread.rs: RNA-seq alignment and read counting

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::config::defs::{FEATURE_COUNTS_TAG, PipelineError, SUBREAD_ALIGN_TAG, Settings};
use crate::utils::command::{CommandLine, ToolOptions};
use crate::utils::fastx::SeqInput;
use crate::utils::task::{is_empty_or_missing, skip_if_empty, touch_all, Action, FailureReason, Outcome, Task};
use crate::workflows::{display, require_inputs};


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SubreadAlignConfig {
    pub verbose: Option<bool>,
    pub option_fields: ToolOptions,
}

/// Aligns single or paired reads with subread-align into SAM.
/// An empty input file yields an empty SAM instead of running the aligner.
///
/// # Arguments
///
/// * `reads` - One file, or a forward/reverse pair.
/// * `output` - SAM output.
/// * `config` - Extra flags, merged over `--unique --hamming --index <db>`.
/// * `settings` - Supplies the default index.
///
/// # Returns
/// Task
pub fn align(reads: &SeqInput, output: &Path, config: &SubreadAlignConfig, settings: &Settings) -> Task {
    let deps: Vec<PathBuf> = reads.files().iter().map(|p| p.to_path_buf()).collect();
    let run = align_action(reads, output, config, settings);

    Task::new(format!("subread_align: {}", display(output)))
        .action(skip_if_empty(deps.clone(), vec![output.to_path_buf()], run))
        .file_deps(&deps)
        .target(output)
        .prepare_target_dirs()
}

fn align_action(reads: &SeqInput, output: &Path, config: &SubreadAlignConfig, settings: &Settings) -> Action {
    let defaults = ToolOptions::new()
        .flag("unique")
        .flag("hamming")
        .with("index", settings.subread.index.display());
    let mut opts = config.option_fields.merged_over(&defaults);
    opts.set("output", output.display());
    match reads {
        SeqInput::Single(r) => {
            opts.set("read", r.display());
        }
        SeqInput::Pair(r1, r2) => {
            opts.set("read", r1.display());
            opts.set("read2", r2.display());
        }
    }
    let cmd = CommandLine::new(SUBREAD_ALIGN_TAG).opts(&opts).build();
    Action::shell_verbose(cmd, config.verbose.unwrap_or(settings.verbose))
}


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct FeatureCountsConfig {
    /// Annotation file; the settings default when unset.
    pub annotations: Option<PathBuf>,
    pub verbose: Option<bool>,
    pub option_fields: ToolOptions,
}

/// Counts reads per feature across SAM files into one table.
///
/// Missing or empty SAMs are dropped when the task runs; with none left the
/// table is written empty.
pub fn feature_counts(
    sams: &[PathBuf],
    output: &Path,
    config: &FeatureCountsConfig,
    settings: &Settings,
) -> Result<Task, PipelineError> {
    require_inputs(sams, "feature_counts")?;
    let annotations = config.annotations.as_deref().unwrap_or(&settings.subread.annotations);
    let mut opts = config
        .option_fields
        .merged_over(&ToolOptions::new().with("a", annotations.display()));
    opts.set("o", output.display());
    let base = CommandLine::new(FEATURE_COUNTS_TAG).opts(&opts);
    let verbose = config.verbose.unwrap_or(settings.verbose);

    let (inputs, target) = (sams.to_vec(), output.to_path_buf());
    let count = Action::callable(format!("{} {}", base.build(), join_labels(sams)), move || {
        let inputs = inputs.clone();
        let target = target.clone();
        let base = base.clone();
        async move {
            let mut usable = Vec::new();
            for f in &inputs {
                if !is_empty_or_missing(f).await {
                    usable.push(f.clone());
                }
            }
            if usable.is_empty() {
                info!("No alignments to count; writing empty {}", target.display());
                return match touch_all(&[target.clone()]).await {
                    Ok(()) => Outcome::success(format!("empty {}", target.display())),
                    Err(e) => Outcome::Failure(FailureReason::Io {
                        label: target.display().to_string(),
                        error: e.to_string(),
                    }),
                };
            }
            Action::shell_verbose(base.paths(&usable).build(), verbose).execute().await
        }
    });

    Ok(Task::new(format!("featureCounts: {}", display(output)))
        .action(count)
        .file_deps(sams)
        .target(output)
        .prepare_target_dirs())
}

fn join_labels(paths: &[PathBuf]) -> String {
    paths.iter().map(|p| p.display().to_string()).collect::<Vec<_>>().join(" ")
}
