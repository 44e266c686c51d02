// src/workflows/association.rs: MaAsLin association testing and its table plumbing

use std::path::{Path, PathBuf};

use crate::config::defs::{MAASLIN_TAG, MERGE_METADATA_TAG, QIIME_TO_MAASLIN_TAG, TRANSPOSE_TAG};
use crate::utils::command::CommandLine;
use crate::utils::task::{Action, Task};
use crate::workflows::display;

pub use crate::workflows::biom::to_tsv as biom_to_tsv;

const READ_CONFIG_TEMPLATE: &str = "Matrix: Metadata\nRead_PCL_Rows: -REPLACE\n\nMatrix: Abundance\nRead_PCL_Rows: Bacteria-";


/// Rewrites a qiime tsv export into the layout MaAsLin reads.
pub fn qiime_to_maaslin(input: &Path, output: &Path) -> Task {
    let cmd = CommandLine::new(QIIME_TO_MAASLIN_TAG).stdin_from(input).stdout_to(output).build();
    Task::new(format!("qiime_to_maaslin: {}", display(input)))
        .action(Action::shell(cmd))
        .file_dep(input)
        .target(output)
}

/// Prepends sample metadata rows to an abundance table, producing PCL.
pub fn merge_otu_metadata(tsv: &Path, metadata: &Path, pcl: &Path) -> Task {
    let cmd = CommandLine::new(MERGE_METADATA_TAG)
        .path(metadata)
        .stdin_from(tsv)
        .stdout_to(pcl)
        .build();
    Task::new(format!("merge_otu_metadata: {}", display(pcl)))
        .action(Action::shell(cmd))
        .file_dep(tsv)
        .file_dep(metadata)
        .target(pcl)
}

/// Output files of [`maaslin`] next to `otu_table`: the merged pcl, the
/// transposed tsv, the read config and the three result files.
pub struct MaaslinFiles {
    pub pcl: PathBuf,
    pub tsv: PathBuf,
    pub read_config: PathBuf,
    pub results: Vec<PathBuf>,
}

pub fn maaslin_files(otu_table: &Path) -> MaaslinFiles {
    let outdir = otu_table.parent().unwrap_or_else(|| Path::new(""));
    let project = otu_table
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    MaaslinFiles {
        pcl: outdir.join(format!("{}_maaslin.pcl", project)),
        tsv: outdir.join(format!("{}_maaslin.tsv", project)),
        read_config: outdir.join(format!("{}_maaslin.read.config", project)),
        results: vec![
            outdir.join("demo.txt"),
            outdir.join(format!("{}.txt", project)),
            outdir.join(format!("{}_log.txt", project)),
        ],
    }
}

fn read_config_cmd(path: &Path) -> String {
    format!("printf '%s' \"{}\" > {}", READ_CONFIG_TEMPLATE, path.display())
}

/// Tests microbial abundances for association with study metadata.
///
/// The otu table and metadata are merged into a pcl file, a read config is
/// written whose metadata row range ends at the row before the first
/// `Bacteria` row, and the transposed table is handed to Maaslin.R.
/// Everything is written next to `otu_table`.
pub fn maaslin(otu_table: &Path, metadata: &Path) -> Task {
    let files = maaslin_files(otu_table);
    let (pcl, tsv, read_config) = (files.pcl.display(), files.tsv.display(), files.read_config.display());

    let merge = CommandLine::new(MERGE_METADATA_TAG)
        .path(metadata)
        .stdin_from(otu_table)
        .stdout_to(&files.pcl)
        .build();
    let write_config = read_config_cmd(&files.read_config);
    let set_range = format!(
        "sed -i s/REPLACE/$(grep Bacteria {} -B 1 | head -n 1 | awk '{{ print $1 }}')/ {}",
        pcl, read_config
    );
    let transpose = CommandLine::new(TRANSPOSE_TAG).stdin_from(&files.pcl).stdout_to(&files.tsv).build();
    let run = format!("{} -i {} {} {}", MAASLIN_TAG, read_config, files.results[0].display(), tsv);

    Task::new(format!("maaslin: {}", display(&files.results[0])))
        .actions([merge, write_config, set_range, transpose, run].map(Action::shell))
        .file_dep(otu_table)
        .file_dep(metadata)
        .targets(&files.results)
}
