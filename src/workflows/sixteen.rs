// src/workflows/sixteen.rs: 16S demultiplexing, OTU picking and PICRUSt

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::config::defs::{
    BARCODE_COLUMN, BIOM_TAG, BiomSubcommand, FASTA_TAG, MAP_FNAME, OTU_TABLE_FNAME,
    PICRUST_TAG, PicrustScript, PipelineError, QIIME_TAG, QiimeScript, REVCOMP_FNAME, Settings,
};
use crate::utils::command::{join_paths, CommandLine, ToolOptions};
use crate::utils::fallback::{FailureCondition, FallbackPlan};
use crate::utils::file::{add_tag, new_file};
use crate::utils::metadata::{read_map_file, write_map_file, SampleRecord};
use crate::utils::sequence::reverse_complement;
use crate::utils::task::{is_empty_or_missing, touch_all, Action, FailureReason, Outcome, Task};
use crate::workflows::general::{sequence_convert_cmd, SequenceConvertConfig};
use crate::workflows::{display, require_inputs};


/// Keeps the first record of each consecutive run of equal barcodes and
/// suffixes its sample id with `_<barcode>`.
pub fn map_records_for_sample(group: &[SampleRecord]) -> Result<Vec<SampleRecord>, PipelineError> {
    let mut kept: Vec<SampleRecord> = Vec::new();
    let mut last_barcode: Option<&str> = None;
    for record in group {
        let barcode = record.barcode().ok_or_else(|| {
            PipelineError::InvalidMetadata(format!(
                "sample {} has no {} column",
                record.sample_id(),
                BARCODE_COLUMN
            ))
        })?;
        if last_barcode == Some(barcode) {
            continue;
        }
        last_barcode = Some(barcode);
        kept.push(record.with_sample_id(format!("{}_{}", record.sample_id(), barcode)));
    }
    Ok(kept)
}

/// Writes `sample_dir/map.txt` for one sample group when the task runs.
///
/// # Arguments
///
/// * `group` - Records sharing one sample id.
/// * `sample_dir` - Per-sample products directory.
///
/// # Returns
/// Err at configuration time if the group is empty or lacks barcodes.
pub fn write_map(group: &[SampleRecord], sample_dir: &Path) -> Result<Task, PipelineError> {
    if group.is_empty() {
        return Err(PipelineError::InvalidConfig("write_map: empty sample group".to_string()));
    }
    let records = map_records_for_sample(group)?;
    let map_fname = new_file(MAP_FNAME, sample_dir);

    let target = map_fname.clone();
    Ok(Task::new(format!("write_map:{}", display(&map_fname)))
        .action(Action::blocking(format!("write map file {}", display(&map_fname)), move || {
            write_map_file(&records, &target)
        }))
        .target(&map_fname))
}


#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemultiplexConfig {
    pub qiime_opts: ToolOptions,
}

impl Default for DemultiplexConfig {
    fn default() -> Self {
        DemultiplexConfig {
            qiime_opts: ToolOptions::new().with("M", 2),
        }
    }
}

/// Demultiplexes a 454 run with split_libraries.py.
/// Outputs land in the directory of `output`.
pub fn demultiplex(
    map_fname: &Path,
    fasta_fname: &Path,
    qual_fname: &Path,
    output: &Path,
    config: &DemultiplexConfig,
) -> Task {
    let output_dir = output.parent().unwrap_or_else(|| Path::new("."));
    let cmd = CommandLine::new(QIIME_TAG)
        .arg(QiimeScript::SplitLibraries.as_str())
        .arg(format!("--map={}", map_fname.display()))
        .arg(format!("--fasta={}", fasta_fname.display()))
        .arg(format!("--qual={}", qual_fname.display()))
        .arg(format!("--dir-prefix={}", output_dir.display()))
        .opts(&config.qiime_opts)
        .build();

    Task::new(format!("demultiplex:{}", display(fasta_fname)))
        .action(Action::shell(cmd))
        .file_dep(map_fname)
        .file_dep(fasta_fname)
        .file_dep(qual_fname)
        .target(output)
        .prepare_target_dirs()
}


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct DemultiplexIlluminaConfig {
    pub verbose: Option<bool>,
    pub qiime_opts: ToolOptions,
}

/// Rewrites a map file with every barcode reverse-complemented.
pub fn reverse_complement_map(map_in: &Path, map_out: &Path) -> Result<(), PipelineError> {
    let records = read_map_file(map_in)?;
    let flipped: Vec<SampleRecord> = records
        .iter()
        .map(|r| match r.barcode() {
            Some(barcode) => r.with_value(BARCODE_COLUMN, reverse_complement(barcode)),
            None => r.clone(),
        })
        .collect();
    write_map_file(&flipped, map_out)
}

/// Demultiplexes Illumina reads with split_libraries_fastq.py, retrying
/// with reverse-complemented barcodes when the first run fails or yields
/// an empty `output`.
///
/// # Arguments
///
/// * `map_fname` - Sample map for the run.
/// * `seq_files` - Read files.
/// * `barcode_files` - Index read files, in the same order.
/// * `output` - Demultiplexed fasta (`seqs.fna` inside the output dir).
/// * `config` - Extra split_libraries_fastq.py options.
/// * `settings` - Run-wide verbosity default.
///
/// # Returns
/// Result<Task, PipelineError>
pub fn demultiplex_illumina(
    map_fname: &Path,
    seq_files: &[PathBuf],
    barcode_files: &[PathBuf],
    output: &Path,
    config: &DemultiplexIlluminaConfig,
    settings: &Settings,
) -> Result<Task, PipelineError> {
    require_inputs(seq_files, "demultiplex_illumina")?;
    if seq_files.len() != barcode_files.len() {
        return Err(PipelineError::InvalidConfig(format!(
            "demultiplex_illumina: {} sequence files but {} barcode files",
            seq_files.len(),
            barcode_files.len()
        )));
    }
    let plan = illumina_plan(map_fname, seq_files, barcode_files, output, config, settings);

    Ok(Task::new(format!("demultiplex_illumina:{}", display(&seq_files[0])))
        .action(plan.into_action(format!("demultiplex {} with barcode fallback", display(&seq_files[0]))))
        .file_dep(map_fname)
        .file_deps(seq_files)
        .file_deps(barcode_files)
        .target(output)
        .prepare_target_dirs())
}


/// split_libraries_fastq.py on the given map, then on its
/// reverse-complemented copy; an empty `output` counts as a failed run.
pub(crate) fn illumina_plan(
    map_fname: &Path,
    seq_files: &[PathBuf],
    barcode_files: &[PathBuf],
    output: &Path,
    config: &DemultiplexIlluminaConfig,
    settings: &Settings,
) -> FallbackPlan {
    let verbose = config.verbose.unwrap_or(settings.verbose);
    let output_dir = output.parent().unwrap_or_else(|| Path::new("."));
    let revcomp_map = add_tag(map_fname, "revcomp");

    let cmd = |map: &Path| {
        CommandLine::new(QIIME_TAG)
            .arg(QiimeScript::SplitLibrariesFastq.as_str())
            .opt("-i", join_paths(seq_files, ","))
            .opt("-b", join_paths(barcode_files, ","))
            .opt("-m", map.display())
            .opt("-o", output_dir.display())
            .opts(&config.qiime_opts)
            .build()
    };

    let (map_in, map_out) = (map_fname.to_path_buf(), revcomp_map.clone());
    FallbackPlan::new()
        .attempt(Action::shell_verbose(cmd(map_fname), verbose))
        .group(vec![
            Action::blocking(format!("reverse complement barcodes into {}", display(&revcomp_map)), move || {
                reverse_complement_map(&map_in, &map_out)
            }),
            Action::shell_verbose(cmd(&revcomp_map), verbose),
        ])
        .fail_if(FailureCondition::empty_output(output))
}


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PickOtusConfig {
    pub verbose: Option<bool>,
    pub qiime_opts: ToolOptions,
}

/// qiime OTU picking on `input`, then on its reverse complement; an empty
/// `output_dir/otu_table.biom` counts as a failed run.
pub(crate) fn pick_otus_plan(
    script: QiimeScript,
    input: &Path,
    output_dir: &Path,
    defaults: ToolOptions,
    config: &PickOtusConfig,
    settings: &Settings,
) -> Result<FallbackPlan, PipelineError> {
    let output = new_file(OTU_TABLE_FNAME, output_dir);
    let input_dir = input.parent().unwrap_or_else(|| Path::new(""));
    let revcomp = new_file(REVCOMP_FNAME, input_dir);
    let verbose = config.verbose.unwrap_or(settings.verbose);
    let opts = config.qiime_opts.merged_over(&defaults);

    let cmd = |fasta: &Path| {
        CommandLine::new(QIIME_TAG)
            .arg(script.as_str())
            .arg(format!("--input_fp={}", fasta.display()))
            .arg(format!("--output_dir={}", output_dir.display()))
            .arg("-f")
            .opts(&opts)
            .build()
    };
    let revcomp_cmd = sequence_convert_cmd(
        &[input.to_path_buf()],
        &revcomp,
        &SequenceConvertConfig {
            reverse_complement: true,
            from_format: Some(FASTA_TAG.to_string()),
            format_to: FASTA_TAG.to_string(),
            lenfilters_list: Vec::new(),
        },
    )?;

    Ok(FallbackPlan::new()
        .attempt(Action::shell_verbose(cmd(input), verbose))
        .group(vec![
            Action::shell_verbose(revcomp_cmd, verbose),
            Action::shell_verbose(cmd(&revcomp), verbose),
        ])
        .fail_if(FailureCondition::empty_output(&output)))
}

fn pick_otus(
    script: QiimeScript,
    input: &Path,
    output_dir: &Path,
    defaults: ToolOptions,
    config: &PickOtusConfig,
    settings: &Settings,
) -> Result<Task, PipelineError> {
    let output = new_file(OTU_TABLE_FNAME, output_dir);
    let plan = pick_otus_plan(script, input, output_dir, defaults, config, settings)?;

    let name = match script {
        QiimeScript::PickOpenReferenceOtus => "pick_otus_open_ref",
        _ => "pick_otus_closed_ref",
    };
    Ok(Task::new(format!("{}:{}", name, display(input)))
        .action(plan.into_action(format!("{} {} with reverse complement fallback", name, display(input))))
        .file_dep(input)
        .target(&output)
        .prepare_target_dirs())
}

/// Closed-reference OTU picking against the configured reference set.
/// Retries on the reverse-complemented input when the first run fails or
/// leaves `otu_table.biom` empty.
///
/// # Arguments
///
/// * `input` - Demultiplexed fasta.
/// * `output_dir` - Receives `otu_table.biom` and qiime's logs.
/// * `config` - Caller qiime options, merged over the reference defaults.
/// * `settings` - Reference database locations.
///
/// # Returns
/// Result<Task, PipelineError>
pub fn pick_otus_closed_ref(
    input: &Path,
    output_dir: &Path,
    config: &PickOtusConfig,
    settings: &Settings,
) -> Result<Task, PipelineError> {
    let defaults = ToolOptions::new()
        .with("taxonomy_fp", settings.sixteen.otu_taxonomy.display())
        .with("reference_fp", settings.sixteen.otu_refseq.display());
    pick_otus(QiimeScript::PickClosedReferenceOtus, input, output_dir, defaults, config, settings)
}

/// Open-reference counterpart of [`pick_otus_closed_ref`].
pub fn pick_otus_open_ref(
    input: &Path,
    output_dir: &Path,
    config: &PickOtusConfig,
    settings: &Settings,
) -> Result<Task, PipelineError> {
    let defaults = ToolOptions::new().with("reference_fp", settings.sixteen.otu_refseq.display());
    pick_otus(QiimeScript::PickOpenReferenceOtus, input, output_dir, defaults, config, settings)
}


/// Merges OTU tables into `output_dir/name`.
///
/// Zero-byte inputs are dropped when the task runs; if none remain an empty
/// placeholder is written instead of calling qiime.
pub fn merge_otu_tables(files: &[PathBuf], name: &str, output_dir: &Path) -> Result<Task, PipelineError> {
    require_inputs(files, "merge_otu_tables")?;
    let output = new_file(name, output_dir);
    let label = format!("merge_otu_tables.py -> {}", display(&output));

    let (inputs, target) = (files.to_vec(), output.clone());
    let merge = Action::callable(label, move || {
        let inputs = inputs.clone();
        let target = target.clone();
        async move {
            let mut usable = Vec::new();
            for f in &inputs {
                if !is_empty_or_missing(f).await {
                    usable.push(f.clone());
                }
            }
            if usable.is_empty() {
                info!("All OTU tables are empty; writing empty {}", target.display());
                return match touch_all(&[target.clone()]).await {
                    Ok(()) => Outcome::success(format!("empty {}", target.display())),
                    Err(e) => Outcome::Failure(FailureReason::Io {
                        label: target.display().to_string(),
                        error: e.to_string(),
                    }),
                };
            }
            let cmd = CommandLine::new(QIIME_TAG)
                .arg(QiimeScript::MergeOtuTables.as_str())
                .opt("-i", join_paths(&usable, ","))
                .opt("-o", target.display())
                .build();
            Action::shell(cmd).execute().await
        }
    });

    let file_name = Path::new(name)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| name.to_string());
    Ok(Task::new(format!("merge_otu_tables: {}", file_name))
        .action(merge)
        .file_deps(files)
        .target(&output)
        .prepare_target_dirs())
}


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct PicrustConfig {
    /// Input is tab-separated rather than biom.
    pub tab_in: bool,
    /// Write tab-separated output.
    pub tab_out: bool,
    pub gg_version: Option<String>,
    /// Prediction type: empty for KO, otherwise COG or RFAM.
    pub t: Option<String>,
    pub with_confidence: bool,
    /// Custom trait table to predict from.
    pub custom: Option<PathBuf>,
}

fn picrust_cmds(input: &Path, norm_out: &Path, predict_out: &Path, config: &PicrustConfig) -> (String, String) {
    let mut normalize = CommandLine::new(PICRUST_TAG)
        .arg(PicrustScript::NormalizeByCopyNumber.as_str())
        .opt("-i", input.display())
        .opt("-o", norm_out.display());
    if let Some(version) = &config.gg_version {
        normalize = normalize.opt("-g", version);
    }
    if config.tab_in {
        normalize = normalize.arg("-f");
    }

    let mut predict = CommandLine::new(PICRUST_TAG)
        .arg(PicrustScript::PredictMetagenomes.as_str())
        .opt("-i", norm_out.display())
        .opt("-o", predict_out.display());
    if let Some(version) = &config.gg_version {
        predict = predict.opt("-g", version);
    }
    if config.tab_out {
        predict = predict.arg("-f");
    }
    if let Some(t) = &config.t {
        predict = predict.opt("-t", t);
    }
    if config.with_confidence {
        predict = predict.arg("--with_confidence");
    }
    if let Some(custom) = &config.custom {
        predict = predict.opt("-c", custom.display());
    }
    (normalize.build(), predict.build())
}

/// Predicts metagenome functional content from an OTU table with PICRUSt
/// (normalize by copy number, then predict). If that fails, the table is
/// re-encoded as JSON biom and both steps run again.
///
/// # Returns
/// Task targeting `<file>_picrust` and `<file>_normalized_otus`.
pub fn picrust(file: &Path, config: &PicrustConfig, settings: &Settings) -> Task {
    let norm_out = add_tag(file, "normalized_otus");
    let predict_out = add_tag(file, "picrust");

    Task::new(format!("picrust:{}", display(&predict_out)))
        .action(picrust_plan(file, config, settings).into_action(format!(
            "picrust {} with biom re-encoding fallback",
            display(file)
        )))
        .file_dep(file)
        .target(&predict_out)
        .target(&norm_out)
}

pub(crate) fn picrust_plan(file: &Path, config: &PicrustConfig, settings: &Settings) -> FallbackPlan {
    let norm_out = add_tag(file, "normalized_otus");
    let predict_out = add_tag(file, "picrust");
    let json_table = add_tag(file, "json");

    let (normalize, predict) = picrust_cmds(file, &norm_out, &predict_out, config);
    let (normalize_json, predict_json) = picrust_cmds(&json_table, &norm_out, &predict_out, config);
    let convert = CommandLine::new(BIOM_TAG)
        .arg(BiomSubcommand::Convert.as_str())
        .opt("-i", file.display())
        .opt("-o", json_table.display())
        .arg("--table-type='OTU table'")
        .arg("--to-json")
        .build();

    let verbose = settings.verbose;
    FallbackPlan::new()
        .group(vec![Action::shell_verbose(normalize, verbose), Action::shell_verbose(predict, verbose)])
        .group(vec![
            Action::shell_verbose(convert, verbose),
            Action::shell_verbose(normalize_json, verbose),
            Action::shell_verbose(predict_json, verbose),
        ])
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::fallback::Candidate;
    use crate::utils::metadata::parse_map;
    use crate::utils::task::Report;
    use std::fs;
    use tempfile::tempdir;

    const MAP: &str = "#SampleID\tBarcodeSequence\tDescription\n\
                       S1\tAAAACCCCGGGG\tfirst\n\
                       S1\tAAAACCCCGGGG\tduplicate barcode\n\
                       S1\tTTTTGGGGCCCC\tsecond amplicon\n";

    #[test]
    fn test_map_records_keep_first_per_barcode() {
        let records = parse_map(MAP.as_bytes()).unwrap();
        let kept = map_records_for_sample(&records).unwrap();
        let ids: Vec<&str> = kept.iter().map(|r| r.sample_id()).collect();
        assert_eq!(ids, vec!["S1_AAAACCCCGGGG", "S1_TTTTGGGGCCCC"]);
        assert_eq!(kept[1].get("Description"), Some("second amplicon"));
    }

    #[tokio::test]
    async fn test_write_map_is_deferred() {
        let dir = tempdir().unwrap();
        let sample_dir = dir.path().join("S1");
        let records = parse_map(MAP.as_bytes()).unwrap();
        let task = write_map(&records, &sample_dir).unwrap();
        assert!(!sample_dir.exists());

        assert!(task.run().await.is_success());
        let written = fs::read_to_string(sample_dir.join("map.txt")).unwrap();
        assert_eq!(
            written,
            "#SampleID\tBarcodeSequence\tDescription\n\
             S1_AAAACCCCGGGG\tAAAACCCCGGGG\tfirst\n\
             S1_TTTTGGGGCCCC\tTTTTGGGGCCCC\tsecond amplicon\n"
        );
    }

    #[test]
    fn test_demultiplex_command() {
        let task = demultiplex(
            Path::new("p/S1/map.txt"),
            Path::new("p/S1/S1.fa"),
            Path::new("p/S1/S1.qual"),
            Path::new("p/S1/seqs.fna"),
            &DemultiplexConfig {
                qiime_opts: DemultiplexConfig::default().qiime_opts.with("barcode-type", "golay_12"),
            },
        );
        assert_eq!(
            task.manifest().actions.last().unwrap(),
            "qiime_cmd split_libraries.py --map=p/S1/map.txt --fasta=p/S1/S1.fa \
             --qual=p/S1/S1.qual --dir-prefix=p/S1 -M 2 --barcode-type golay_12"
        );
        assert_eq!(task.file_dep.len(), 3);
    }

    #[test]
    fn test_closed_ref_defaults_from_settings() {
        let settings = Settings::default();
        let config = PickOtusConfig {
            verbose: None,
            qiime_opts: ToolOptions::new().with("a", "").with("O", 4),
        };
        let task = pick_otus_closed_ref(Path::new("p/S1/seqs.fna"), Path::new("p/S1/otus"), &config, &settings).unwrap();
        assert_eq!(task.targets, vec![PathBuf::from("p/S1/otus/otu_table.biom")]);
        assert_eq!(task.file_dep, vec![PathBuf::from("p/S1/seqs.fna")]);
        assert!(task.name.starts_with("pick_otus_closed_ref:"));
    }

    #[tokio::test]
    async fn test_reverse_complement_map() {
        let dir = tempdir().unwrap();
        let map_in = dir.path().join("map.txt");
        let map_out = dir.path().join("map_revcomp.txt");
        fs::write(&map_in, "#SampleID\tBarcodeSequence\nS1\tAACG\n").unwrap();
        reverse_complement_map(&map_in, &map_out).unwrap();
        assert_eq!(fs::read_to_string(&map_out).unwrap(), "#SampleID\tBarcodeSequence\nS1\tCGTT\n");
    }

    #[test]
    fn test_illumina_requires_matching_barcodes() {
        let result = demultiplex_illumina(
            Path::new("map.txt"),
            &[PathBuf::from("r.fastq")],
            &[],
            Path::new("out/seqs.fna"),
            &DemultiplexIlluminaConfig::default(),
            &Settings::default(),
        );
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_merge_skips_empty_tables() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.biom");
        let b = dir.path().join("b.biom");
        fs::write(&a, b"").unwrap();
        fs::write(&b, b"").unwrap();
        let task = merge_otu_tables(&[a, b], "merged.biom", &dir.path().join("out")).unwrap();
        assert!(task.run().await.is_success());
        assert_eq!(fs::metadata(dir.path().join("out").join("merged.biom")).unwrap().len(), 0);
    }

    #[test]
    fn test_picrust_targets_and_flags() {
        let config = PicrustConfig {
            tab_out: true,
            t: Some("COG".to_string()),
            with_confidence: true,
            ..Default::default()
        };
        let (normalize, predict) = picrust_cmds(
            Path::new("otus/otu_table.biom"),
            Path::new("otus/otu_table_normalized_otus.biom"),
            Path::new("otus/otu_table_picrust.biom"),
            &config,
        );
        assert_eq!(
            normalize,
            "picrust_cmd normalize_by_copy_number.py -i otus/otu_table.biom -o otus/otu_table_normalized_otus.biom"
        );
        assert_eq!(
            predict,
            "picrust_cmd predict_metagenomes.py -i otus/otu_table_normalized_otus.biom \
             -o otus/otu_table_picrust.biom -f -t COG --with_confidence"
        );
        let task = picrust(Path::new("otus/otu_table.biom"), &config, &Settings::default());
        assert_eq!(
            task.targets,
            vec![
                PathBuf::from("otus/otu_table_picrust.biom"),
                PathBuf::from("otus/otu_table_normalized_otus.biom")
            ]
        );
    }

    fn group_of(candidate: &Candidate) -> Vec<String> {
        match candidate {
            Candidate::Group(actions) => actions.iter().map(|a| a.describe().to_string()).collect(),
            Candidate::Attempt(action) => panic!("expected a group, got {}", action.describe()),
        }
    }

    #[tokio::test]
    async fn test_illumina_plan_retries_with_reverse_complement() {
        let dir = tempdir().unwrap();
        let map = dir.path().join("map.txt");
        let output = dir.path().join("out").join("seqs.fna");
        let plan = illumina_plan(
            &map,
            &[PathBuf::from("r.fastq")],
            &[PathBuf::from("i.fastq")],
            &output,
            &DemultiplexIlluminaConfig::default(),
            &Settings::default(),
        );

        assert_eq!(plan.candidates().len(), 2);
        match &plan.candidates()[0] {
            Candidate::Attempt(action) => {
                assert!(action.describe().contains(&format!("-m {}", map.display())))
            }
            other => panic!("expected a single attempt, got {:?}", other),
        }
        let retry = group_of(&plan.candidates()[1]);
        assert_eq!(retry.len(), 2);
        assert!(retry[0].starts_with("reverse complement barcodes into"));
        assert!(retry[1].contains(&format!("-m {}", dir.path().join("map_revcomp.txt").display())));

        assert_eq!(plan.conditions().len(), 1);
        let report = Report::new("split_libraries_fastq.py");
        fs::create_dir_all(output.parent().unwrap()).unwrap();
        fs::write(&output, b"").unwrap();
        assert!(plan.conditions()[0].holds(&report).await);
        fs::write(&output, b">S1_0\nACGT\n").unwrap();
        assert!(!plan.conditions()[0].holds(&report).await);
    }

    #[test]
    fn test_pick_otus_plan_retries_reverse_complement() {
        let plan = pick_otus_plan(
            QiimeScript::PickClosedReferenceOtus,
            Path::new("p/S1/seqs.fna"),
            Path::new("p/S1/otus"),
            ToolOptions::new(),
            &PickOtusConfig::default(),
            &Settings::default(),
        )
        .unwrap();

        assert_eq!(plan.candidates().len(), 2);
        assert!(matches!(&plan.candidates()[0], Candidate::Attempt(a) if a.describe().contains("--input_fp=p/S1/seqs.fna")));
        let retry = group_of(&plan.candidates()[1]);
        assert_eq!(retry.len(), 2);
        assert!(retry[0].starts_with("sequence_convert"));
        assert!(retry[0].contains("--reverse_complement"));
        assert!(retry[1].contains("--input_fp=p/S1/revcomp.fna"));
        assert_eq!(
            plan.conditions().iter().map(|c| c.description.as_str()).collect::<Vec<_>>(),
            vec!["p/S1/otus/otu_table.biom is empty or missing"]
        );
    }

    #[test]
    fn test_picrust_plan_reencodes_as_json() {
        let plan = picrust_plan(Path::new("otus/otu_table.biom"), &PicrustConfig::default(), &Settings::default());

        assert_eq!(plan.candidates().len(), 2);
        assert_eq!(group_of(&plan.candidates()[0]).len(), 2);
        let retry = group_of(&plan.candidates()[1]);
        assert_eq!(retry.len(), 3);
        assert!(retry[0].starts_with("biom convert -i otus/otu_table.biom -o otus/otu_table_json.biom"));
        assert!(retry[0].ends_with("--to-json"));
        assert!(retry[1].contains("-i otus/otu_table_json.biom"));
        assert!(plan.conditions().is_empty());
    }
}
