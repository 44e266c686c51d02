// src/workflows/wgs.rs: whole-genome shotgun profiling (MetaPhlAn2, HUMAnN, KneadData)

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::defs::{
    FASTA_TAG, FASTQ_TAG, HUMANN2_TAG, HUMANN_INIT_TAG, KNEADDATA_TAG, METAPHLAN2_TAG,
    PipelineError, SCONS_TAG, Settings,
};
use crate::utils::command::{CommandLine, ToolOptions};
use crate::utils::file::{add_ext, add_tag, guess_seq_filetype, new_file, rm_ext};
use crate::utils::fastx::SeqInput;
use crate::utils::task::{Action, Task};
use crate::workflows::general::cat_cmd;
use crate::workflows::{display, require_inputs};


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Metaphlan2Config {
    /// `multifasta` or `multifastq`; guessed from the first input when unset.
    pub input_type: Option<String>,
    /// Profile output; `<first input>.metaphlan2` when unset.
    pub output_file: Option<PathBuf>,
    /// Also write the profile as biom.
    pub biom: Option<PathBuf>,
    pub sample_id: Option<String>,
    pub option_fields: ToolOptions,
}

fn metaphlan_input_type(path: &Path) -> Result<&'static str, PipelineError> {
    match guess_seq_filetype(path) {
        Some(FASTA_TAG) => Ok("multifasta"),
        Some(FASTQ_TAG) => Ok("multifastq"),
        _ => Err(PipelineError::InvalidConfig(format!(
            "metaphlan2 needs fasta or fastq input, or an explicit input_type; got {}",
            path.display()
        ))),
    }
}

/// Taxonomic profiling of shotgun reads. Inputs are streamed through
/// `cat` (or a decompressor) into metaphlan2.py.
///
/// # Arguments
///
/// * `files` - Sequence files of one sample.
/// * `config` - Output names, biom export and extra flags.
/// * `settings` - bowtie2 database and marker pickle.
///
/// # Returns
/// Task targeting the profile, the bowtie2 mapping and, when requested,
/// the biom table.
pub fn metaphlan2(files: &[PathBuf], config: &Metaphlan2Config, settings: &Settings) -> Result<Task, PipelineError> {
    require_inputs(files, "metaphlan2")?;
    let base = config.output_file.clone().unwrap_or_else(|| files[0].clone());
    let output_file = config.output_file.clone().unwrap_or_else(|| add_ext(&base, "metaphlan2"));
    let bowtie2out = add_ext(&base, "bowtie2out.txt");
    let input_type = match &config.input_type {
        Some(t) => t.clone(),
        None => metaphlan_input_type(&files[0])?.to_string(),
    };

    let mut defaults = ToolOptions::new()
        .with("bt2_ps", "very-sensitive")
        .with("bowtie2db", settings.metaphlan2.bowtie2db.display())
        .with("mpa_pkl", settings.metaphlan2.mpa_pkl.display())
        .with("bowtie2out", bowtie2out.display())
        .with("output_file", output_file.display());
    if let Some(biom) = &config.biom {
        defaults.set("biom", biom.display());
    }
    if let Some(sample_id) = &config.sample_id {
        defaults.set("sample_id", sample_id);
    }
    defaults.set("input_type", input_type);
    let opts = config.option_fields.merged_over(&defaults);

    let cmd = format!(
        "{} | {}",
        cat_cmd(files),
        CommandLine::new(METAPHLAN2_TAG).opts(&opts).build()
    );

    let mut task = Task::new(format!("metaphlan2:{}", display(&output_file)))
        .action(Action::shell(cmd))
        .file_deps(files)
        .target(&output_file)
        .target(&bowtie2out);
    if let Some(biom) = &config.biom {
        task = task.target(biom);
    }
    Ok(task.prepare_target_dirs())
}


const HUMANN_SUFFIXES: [&str; 4] = [
    "_04a-hit-keg-mpm-cop-nul-nve-nve-xpe.txt",
    "_04a-hit-keg-mpt-cop-nul-nve-nve-xpe.txt",
    "_04b-hit-keg-mpm-cop-nul-nve-nve.txt",
    "_04b-hit-keg-mpt-cop-nul-nve-nve.txt",
];

/// Runs the scons-driven HUMAnN 0.99 environment in `workdir` over
/// homology search results.
///
/// Inputs are symlinked into `workdir/input`; pathway and module tables
/// land in `workdir/output`.
pub fn humann(files: &[PathBuf], workdir: &Path) -> Result<Task, PipelineError> {
    require_inputs(files, "humann")?;
    let input_dir = workdir.join("input");
    let output_dir = workdir.join("output");

    let mut targets = Vec::with_capacity(files.len() * HUMANN_SUFFIXES.len());
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.display().to_string());
        for suffix in HUMANN_SUFFIXES {
            targets.push(output_dir.join(format!("{}{}", name, suffix)));
        }
    }

    let wd = workdir.display();
    let inputs = input_dir.display();
    Ok(Task::new(format!("humann:{}", display(&targets[0])))
        .action(Action::shell(format!("cd {}; test -f SConstruct || {}", wd, HUMANN_INIT_TAG)))
        .action(Action::shell(format!(
            "cd {}; ls {} | grep -v 'dat$' | xargs rm -f",
            inputs, inputs
        )))
        .action(Action::shell(CommandLine::new("ln -s").paths(files).path(&input_dir).build()))
        .action(Action::shell(format!("cd {}; {}", wd, SCONS_TAG)))
        .file_deps(files)
        .targets(&targets)
        .prepare_dirs(&[input_dir.clone(), output_dir.clone()]))
}


#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct Humann2Config {
    pub memory_use: String,
    pub log_level: String,
    pub output_format: String,
    pub remove_temp_output: bool,
    pub option_fields: ToolOptions,
}

impl Default for Humann2Config {
    fn default() -> Self {
        Humann2Config {
            memory_use: "minimum".to_string(),
            log_level: "INFO".to_string(),
            output_format: "tsv".to_string(),
            remove_temp_output: true,
            option_fields: ToolOptions::new(),
        }
    }
}

/// Output tables of [`humann2`] for one input.
pub fn humann2_targets(input: &Path, output_dir: &Path, output_format: &str) -> Vec<PathBuf> {
    let renamed = add_ext(rm_ext(input), output_format);
    ["genefamilies", "pathcoverage", "pathabundance"]
        .iter()
        .map(|tag| new_file(add_tag(&renamed, tag), output_dir))
        .collect()
}

/// Gene family and pathway profiling of one sequence file with HUMAnN2.
pub fn humann2(input: &Path, output_dir: &Path, config: &Humann2Config) -> Task {
    let mut defaults = ToolOptions::new()
        .with("input", input.display())
        .with("output", output_dir.display())
        .with("o-log", output_dir.join("humann2_log.txt").display())
        .with("memory-use", &config.memory_use)
        .with("log-level", &config.log_level);
    if config.remove_temp_output {
        defaults.set("remove-temp-output", "");
    }
    defaults.set("output-format", &config.output_format);
    let opts = config.option_fields.merged_over(&defaults);

    let targets = humann2_targets(input, output_dir, &config.output_format);
    Task::new(format!("humann2:{}", display(output_dir)))
        .action(Action::shell(CommandLine::new(HUMANN2_TAG).opts(&opts).build()))
        .file_dep(input)
        .targets(&targets)
        .prepare_target_dirs()
}


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct KneadDataConfig {
    /// Host databases; the settings list when empty.
    pub reference_db: Vec<PathBuf>,
    pub option_fields: ToolOptions,
}

/// Removes host reads (anything mapping to a reference database) from one
/// sample with KneadData.
///
/// # Arguments
///
/// * `reads` - Single-end file or a read pair.
/// * `output_base` - Directory plus base name; results go to
///   `<output_base>_knead/`.
/// * `config` - Host databases and extra flags.
/// * `settings` - Default host databases.
///
/// # Returns
/// Task targeting the cleaned fastq and one contaminant file per database
/// (per mate for pairs).
pub fn knead_data(reads: &SeqInput, output_base: &Path, config: &KneadDataConfig, settings: &Settings) -> Task {
    let prefix = output_base
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let defaults = ToolOptions::new()
        .with("output-prefix", &prefix)
        .with("output-dir", format!("{}_knead", output_base.display()));
    let opts = config.option_fields.merged_over(
        &defaults.with("strategy", "memory").with("logging", "WARNING"),
    );
    let dbs = if config.reference_db.is_empty() {
        &settings.knead.reference_db
    } else {
        &config.reference_db
    };

    let out_dir = PathBuf::from(opts.get("output-dir").unwrap_or_default());
    let prefix = opts.get("output-prefix").unwrap_or(prefix.as_str()).to_string();
    let mates: Vec<Option<u8>> = match reads {
        SeqInput::Single(_) => vec![None],
        SeqInput::Pair(_, _) => vec![Some(1), Some(2)],
    };
    let mut targets = vec![out_dir.join(format!("{}.fastq", prefix))];
    for mate in &mates {
        for db in dbs {
            let db_base = db
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let mut parts = vec![prefix.clone(), db_base];
            if let Some(n) = mate {
                parts.push(n.to_string());
            }
            parts.push("contam.fastq".to_string());
            let name: Vec<String> = parts.into_iter().filter(|p| !p.is_empty()).collect();
            targets.push(out_dir.join(name.join("_")));
        }
    }

    let mut cmd = CommandLine::new(KNEADDATA_TAG).opts(&opts);
    for db in dbs {
        cmd = cmd.opt("--reference-db", db.display());
    }
    let cmd = match reads {
        SeqInput::Single(r) => cmd.opt("-1", r.display()),
        SeqInput::Pair(r1, r2) => cmd.opt("-1", r1.display()).opt("-2", r2.display()),
    };

    let deps: Vec<PathBuf> = reads.files().iter().map(|p| p.to_path_buf()).collect();
    Task::new(format!("knead_data:{}", display(output_base)))
        .action(Action::shell(cmd.build()))
        .file_deps(&deps)
        .targets(&targets)
        .prepare_target_dirs()
}
