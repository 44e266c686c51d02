// src/pipelines/vis.rs: visualization pipeline over finished OTU tables

use std::path::{Path, PathBuf};

use log::info;
use serde::Deserialize;

use crate::config::defs::{MAP_FNAME, PipelineError, Settings};
use crate::pipelines::{Pipeline, PipelinePlan};
use crate::utils::file::{add_ext, add_tag, new_file};
use crate::utils::metadata::{write_map_file, SampleMetadataSource};
use crate::utils::task::{Action, Task};
use crate::workflows::association::{biom_to_tsv, merge_otu_metadata, qiime_to_maaslin};
use crate::workflows::biom::add_metadata;
use crate::workflows::sixteen::merge_otu_tables;
use crate::workflows::visualization::{
    breadcrumbs_pcoa_plot, stacked_bar_chart, PcoaConfig, StackedBarChartConfig,
};


#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct VisualizationOptions {
    pub stacked_bar_chart: StackedBarChartConfig,
    pub breadcrumbs_pcoa_plot: PcoaConfig,
}

/// Visualization pipeline: merges OTU tables, enriches them with sample
/// metadata, then draws taxonomy bar charts and PCoA plots.
#[derive(Debug, Clone)]
pub struct VisualizationPipeline {
    /// A map.txt path, or records written to `map.txt` beside the first
    /// input when the plan runs.
    pub sample_metadata: SampleMetadataSource,
    /// Biom OTU tables to merge.
    pub otu_tables: Vec<PathBuf>,
    /// Already merged, metadata-enriched biom tables.
    pub merged_otu_tables: Vec<PathBuf>,
    pub pcl_files: Vec<PathBuf>,
    pub settings: Settings,
    pub options: VisualizationOptions,
}

impl VisualizationPipeline {
    pub fn new(sample_metadata: SampleMetadataSource, settings: Settings) -> Self {
        VisualizationPipeline {
            sample_metadata,
            otu_tables: Vec::new(),
            merged_otu_tables: Vec::new(),
            pcl_files: Vec::new(),
            settings,
            options: VisualizationOptions::default(),
        }
    }

    /// Path of the map file every metadata-consuming task depends on, plus
    /// the task writing it when the metadata is held in memory.
    fn metadata_file(&self) -> Result<(PathBuf, Option<Task>), PipelineError> {
        match &self.sample_metadata {
            SampleMetadataSource::File(path) => {
                if !path.exists() {
                    return Err(PipelineError::MissingMetadata(path.clone()));
                }
                Ok((path.clone(), None))
            }
            SampleMetadataSource::Records(records) => {
                let first = self
                    .otu_tables
                    .iter()
                    .chain(&self.merged_otu_tables)
                    .chain(&self.pcl_files)
                    .next()
                    .ok_or_else(|| {
                        PipelineError::InvalidConfig(
                            "unable to infer the map.txt location: pipeline inputs are empty".to_string(),
                        )
                    })?;
                let map = new_file(MAP_FNAME, first.parent().unwrap_or_else(|| Path::new("")));
                let (records, target) = (records.clone(), map.clone());
                let task = Task::new(format!("write_map:{}", map.display()))
                    .action(Action::blocking(format!("write {}", map.display()), move || {
                        write_map_file(&records, &target)
                    }))
                    .target(&map);
                Ok((map, Some(task)))
            }
        }
    }
}

impl Pipeline for VisualizationPipeline {
    fn name(&self) -> &'static str {
        "Visualization"
    }

    fn configure(&self) -> Result<PipelinePlan, PipelineError> {
        let mut plan = PipelinePlan::default();
        let products_dir = &self.settings.products_dir;
        if self.otu_tables.is_empty() && self.merged_otu_tables.is_empty() && self.pcl_files.is_empty() {
            return Ok(plan);
        }

        let mut merged_tables = self.merged_otu_tables.clone();
        let mut pcl_files = self.pcl_files.clone();
        if !self.otu_tables.is_empty() || !merged_tables.is_empty() {
            let (map, write_task) = self.metadata_file()?;
            plan.extend(write_task);

            if let Some(first) = self.otu_tables.first() {
                let merged_name = add_tag(first, "merged");
                let name = merged_name
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                let merged = new_file(&name, products_dir);
                plan.push(merge_otu_tables(&self.otu_tables, &name, products_dir)?);

                let with_meta = add_tag(&merged, "meta");
                plan.push(add_metadata(&merged, &with_meta, &map));
                merged_tables.push(with_meta);
            }

            for table in &merged_tables {
                let barcharts = new_file(format!("{}_barcharts", table.display()), products_dir);
                plan.push(stacked_bar_chart(table, &barcharts, &self.options.stacked_bar_chart));

                let tsv = add_ext(table, "tsv");
                plan.push(biom_to_tsv(table, &tsv));
                let maaslin_tsv = add_tag(&tsv, "maaslin");
                plan.push(qiime_to_maaslin(&tsv, &maaslin_tsv));
                let pcl = add_ext(table, "pcl");
                plan.push(merge_otu_metadata(&maaslin_tsv, &map, &pcl));
                pcl_files.push(pcl);
            }
        }

        for pcl in &pcl_files {
            let plot = PathBuf::from(format!("{}_pcoa_plot.png", pcl.display()));
            let config = PcoaConfig {
                coordinates_matrix: Some(PathBuf::from(format!("{}_pcoa_coords.txt", pcl.display()))),
                ..self.options.breadcrumbs_pcoa_plot.clone()
            };
            plan.push(breadcrumbs_pcoa_plot(pcl, &plot, &config));
            plan.add_product("pcoa_plots", plot);
        }

        for t in merged_tables {
            plan.add_product("merged_otu_tables", t);
        }
        for f in pcl_files {
            plan.add_product("pcl_files", f);
        }
        info!("Configured {} tasks for the visualization pipeline", plan.tasks.len());
        Ok(plan)
    }
}
