use std::fs;
use std::path::PathBuf;

use anyhow::Result;
use tempfile::tempdir;

use seqtoid_workflows::config::defs::Settings;
use seqtoid_workflows::pipelines::{
    Pipeline, SixteenSPipeline, VisualizationPipeline, WgsPipeline, WorkflowOptions,
};
use seqtoid_workflows::utils::metadata::{read_map_file, records_from_ids, SampleMetadataSource};


const MAP: &str = "#SampleID\tBarcodeSequence\tRun_accession\tDescription\n\
                   S1\tACGTACGTACGT\trunA\tstool\n\
                   S1\tACGTACGTACGT\trunA\tstool rerun\n\
                   S2\tTTGGCCAAGGTT\trunB\tskin\n";


#[tokio::test]
async fn test_sixteen_s_from_map_file() -> Result<()> {
    let dir = tempdir()?;
    let map = dir.path().join("map.txt");
    fs::write(&map, MAP)?;
    let products = dir.path().join("products");

    let mut pipeline = SixteenSPipeline::new(
        SampleMetadataSource::File(map),
        Settings::default().with_products_dir(&products),
    );
    pipeline.raw_seq_files = vec![PathBuf::from("raw/runA.fastq"), PathBuf::from("raw/runB.fastq")];
    let plan = pipeline.configure()?;

    let write_map = plan
        .tasks
        .iter()
        .find(|t| t.name.starts_with("write_map:"))
        .expect("a write_map task");
    let sample_map = products.join("S1").join("map.txt");
    assert_eq!(write_map.targets, vec![sample_map.clone()]);
    assert!(!sample_map.exists());

    assert!(write_map.run().await.is_success());
    let written = read_map_file(&sample_map)?;
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].sample_id(), "S1_ACGTACGTACGT");
    assert_eq!(written[0].get("Description"), Some("stool"));
    Ok(())
}

#[test]
fn test_manifest_serializes_for_scheduler() -> Result<()> {
    let mut pipeline = WgsPipeline::new(
        SampleMetadataSource::Records(records_from_ids(["stool"])),
        Settings::default().with_products_dir("products"),
    );
    pipeline.raw_seq_files = vec![vec![PathBuf::from("raw/stool.fastq")]];
    let plan = pipeline.configure()?;

    let json = serde_json::to_value(plan.manifest(pipeline.name()))?;
    assert_eq!(json["pipeline"], "WGS");
    assert_eq!(json["tasks"].as_array().map(Vec::len), Some(4));
    assert_eq!(json["tasks"][0]["targets"][0], "products/stool.fastq_merged.fastq");
    assert_eq!(json["products"]["otu_tables"][0], "products/stool.fastq_merged.metaphlan2.biom");
    Ok(())
}

#[test]
fn test_workflow_options_reach_commands() -> Result<()> {
    let options = WorkflowOptions::from_toml_str(
        r#"
        [workflow_options.sixteen]
        infer_pairs = false

        [workflow_options.sixteen.demultiplex.qiime_opts]
        M = "5"
        barcode-type = "hamming_8"
        "#,
    )?;
    let records = seqtoid_workflows::utils::metadata::parse_map(MAP.as_bytes())?;
    let mut pipeline = SixteenSPipeline::new(SampleMetadataSource::Records(records), Settings::default());
    pipeline.raw_seq_files = vec![PathBuf::from("runA_R1.fastq"), PathBuf::from("runA_R2.fastq")];
    pipeline.options = options.sixteen;
    let plan = pipeline.configure()?;

    assert!(!plan.tasks.iter().any(|t| t.name.starts_with("usearch_stitch")));
    let demux = plan
        .tasks
        .iter()
        .find(|t| t.name.starts_with("demultiplex:"))
        .expect("a demultiplex task");
    let cmd = demux.manifest().actions.last().cloned().unwrap_or_default();
    assert!(cmd.contains("-M 5"));
    assert!(cmd.contains("--barcode-type hamming_8"));
    assert!(!cmd.contains("golay_12"));
    Ok(())
}

#[tokio::test]
async fn test_visualization_merge_of_empty_tables() -> Result<()> {
    let dir = tempdir()?;
    let tables: Vec<PathBuf> = ["a", "b"]
        .iter()
        .map(|s| dir.path().join(s).join("otu_table.biom"))
        .collect();
    for t in &tables {
        fs::create_dir_all(t.parent().unwrap())?;
        fs::write(t, "")?;
    }
    let products = dir.path().join("products");

    let mut pipeline = VisualizationPipeline::new(
        SampleMetadataSource::Records(records_from_ids(["a", "b"])),
        Settings::default().with_products_dir(&products),
    );
    pipeline.otu_tables = tables;
    let plan = pipeline.configure()?;

    let merge = &plan.tasks[1];
    assert!(merge.name.starts_with("merge_otu_tables"));
    assert!(merge.run().await.is_success());
    let merged = products.join("otu_table_merged.biom");
    assert_eq!(fs::metadata(&merged)?.len(), 0);
    Ok(())
}
