// src/workflows/visualization.rs: taxonomy bar charts and PCoA plots

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::defs::{PCOA_TAG, QIIME_TAG, QiimeScript};
use crate::utils::command::{CommandLine, ToolOptions};
use crate::utils::file::{add_tag, new_file};
use crate::utils::task::{Action, Task};
use crate::workflows::display;


#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct StackedBarChartConfig {
    pub qiime_opts: ToolOptions,
}

/// Summarizes taxa at every level and draws stacked bar charts into
/// `output_dir`.
pub fn stacked_bar_chart(biom: &Path, output_dir: &Path, config: &StackedBarChartConfig) -> Task {
    let cmd = CommandLine::new(QIIME_TAG)
        .arg(QiimeScript::SummarizeTaxaThroughPlots.as_str())
        .opt("-i", biom.display())
        .opt("-o", output_dir.display())
        .opts(&config.qiime_opts)
        .build();

    Task::new(format!("stacked_bar_chart: {}", display(output_dir)))
        .action(Action::shell(cmd))
        .file_dep(biom)
        .target(new_file(add_tag(biom, "L1"), output_dir))
}


#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct PcoaConfig {
    /// Color by metadata.
    pub meta: bool,
    /// Label points by sample id.
    pub id: bool,
    pub no_shape: bool,
    /// Coordinates output; `<pcl>_pcoa_coords.txt` when unset.
    pub coordinates_matrix: Option<PathBuf>,
    pub option_fields: ToolOptions,
}

impl Default for PcoaConfig {
    fn default() -> Self {
        PcoaConfig {
            meta: true,
            id: true,
            no_shape: true,
            coordinates_matrix: None,
            option_fields: ToolOptions::new(),
        }
    }
}

/// Draws a PCoA plot of a PCL table with breadcrumbs' scriptPcoa.py.
///
/// # Arguments
///
/// * `pcl` - Abundance table with metadata rows.
/// * `plot` - PNG output.
/// * `config` - Plot flags and the coordinates file.
///
/// # Returns
/// Task targeting the plot and the coordinates matrix.
pub fn breadcrumbs_pcoa_plot(pcl: &Path, plot: &Path, config: &PcoaConfig) -> Task {
    let coords = config
        .coordinates_matrix
        .clone()
        .unwrap_or_else(|| PathBuf::from(format!("{}_pcoa_coords.txt", pcl.display())));

    let mut opts = ToolOptions::new();
    if config.meta {
        opts.set("meta", "");
    }
    if config.id {
        opts.set("id", "");
    }
    if config.no_shape {
        opts.set("noShape", "");
    }
    opts.set("CoordinatesMatrix", coords.display());
    opts.set("outputFile", plot.display());
    let opts = config.option_fields.merged_over(&opts);

    Task::new(format!("breadcrumbs_pcoa_plot: {}", display(plot)))
        .action(Action::shell(CommandLine::new(PCOA_TAG).opts(&opts).path(pcl).build()))
        .file_dep(pcl)
        .target(plot)
        .target(&coords)
        .prepare_target_dirs()
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stacked_bar_chart_target() {
        let task = stacked_bar_chart(
            Path::new("p/merged_meta.biom"),
            Path::new("p/merged_meta.biom_barcharts"),
            &StackedBarChartConfig::default(),
        );
        assert_eq!(task.targets, vec![PathBuf::from("p/merged_meta.biom_barcharts/merged_meta_L1.biom")]);
        assert_eq!(
            task.actions[0].describe(),
            "qiime_cmd summarize_taxa_through_plots.py -i p/merged_meta.biom -o p/merged_meta.biom_barcharts"
        );
    }

    #[test]
    fn test_pcoa_default_flags() {
        let task = breadcrumbs_pcoa_plot(Path::new("t.pcl"), Path::new("t.pcl_pcoa_plot.png"), &PcoaConfig::default());
        assert_eq!(
            task.actions[0].describe(),
            "scriptPcoa.py --meta --id --noShape --CoordinatesMatrix t.pcl_pcoa_coords.txt \
             --outputFile t.pcl_pcoa_plot.png t.pcl"
        );
        assert_eq!(task.targets[1], PathBuf::from("t.pcl_pcoa_coords.txt"));
    }
}
