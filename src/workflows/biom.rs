// src/workflows/biom.rs: biom-format conversions

use std::path::Path;

use crate::config::defs::{BIOM_TAG, BiomSubcommand};
use crate::utils::command::CommandLine;
use crate::utils::task::{Action, Task};
use crate::workflows::display;


fn biom(subcommand: BiomSubcommand, input: &Path, output: &Path) -> CommandLine {
    CommandLine::new(BIOM_TAG)
        .arg(subcommand.as_str())
        .opt("-i", input.display())
        .opt("-o", output.display())
}

/// Converts a biom table to tab-separated text, keeping taxonomy as the
/// `Consensus Lineage` column.
pub fn to_tsv(input: &Path, output: &Path) -> Task {
    let cmd = biom(BiomSubcommand::Convert, input, output)
        .arg("-b")
        .opt("--header-key", "taxonomy")
        .opt("--output-metadata-id", "\"Consensus Lineage\"")
        .opt("--table-type", "'otu table'")
        .build();

    Task::new(format!("biom_to_tsv: {}", display(input)))
        .action(Action::shell(cmd))
        .file_dep(input)
        .target(output)
        .prepare_target_dirs()
}

pub fn add_metadata(input: &Path, output: &Path, sample_metadata: &Path) -> Task {
    let cmd = biom(BiomSubcommand::AddMetadata, input, output)
        .opt("-m", sample_metadata.display())
        .build();

    Task::new(format!("biom_add_metadata: {}", display(input)))
        .action(Action::shell(cmd))
        .file_dep(input)
        .file_dep(sample_metadata)
        .target(output)
        .prepare_target_dirs()
}

/// Converts a PCL (tab-separated) table back into biom.
pub fn from_pcl(input: &Path, output: &Path) -> Task {
    let cmd = biom(BiomSubcommand::Convert, input, output)
        .opt("--table-type", "'otu table'")
        .build();

    Task::new(format!("biom_from_pcl: {}", display(input)))
        .action(Action::shell(cmd))
        .file_dep(input)
        .target(output)
        .prepare_target_dirs()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_tsv_command() {
        let task = to_tsv(Path::new("otus/otu_table.biom"), Path::new("otus/otu_table.tsv"));
        assert_eq!(
            task.manifest().actions.last().unwrap(),
            "biom convert -i otus/otu_table.biom -o otus/otu_table.tsv -b --header-key taxonomy \
             --output-metadata-id \"Consensus Lineage\" --table-type 'otu table'"
        );
        assert_eq!(task.name, "biom_to_tsv: otus/otu_table.biom");
    }

    #[test]
    fn test_add_metadata_depends_on_map() {
        let task = add_metadata(Path::new("m.biom"), Path::new("m_meta.biom"), Path::new("map.txt"));
        assert_eq!(task.actions[0].describe(), "biom add-metadata -i m.biom -o m_meta.biom -m map.txt");
        assert_eq!(task.file_dep.len(), 2);
    }

    #[test]
    fn test_from_pcl_command() {
        let task = from_pcl(Path::new("t.pcl"), Path::new("t.biom"));
        assert_eq!(task.actions[0].describe(), "biom convert -i t.pcl -o t.biom --table-type 'otu table'");
    }
}
