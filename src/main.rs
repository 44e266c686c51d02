use std::io::Write;
use std::time::Instant;

use anyhow::{Context, Result};
use env_logger::Builder;
use log::{LevelFilter, debug, error, info};

use seqtoid_workflows::cli::{parse, Arguments, PipelineKind};
use seqtoid_workflows::config::defs::Settings;
use seqtoid_workflows::pipelines::{
    Pipeline, RnaPipeline, SixteenSPipeline, VisualizationPipeline, WgsPipeline, WorkflowOptions,
};
use seqtoid_workflows::utils::metadata::SampleMetadataSource;


fn main() -> Result<()> {
    let run_start = Instant::now();
    let args = parse();

    let log_level = if args.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}] {}: {}",
                chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .init();

    let (settings, options) = load_settings(&args)?;
    debug!("Products directory: {}", settings.products_dir.display());

    let pipeline = build_pipeline(&args, settings, options);
    info!("Configuring the {} pipeline", pipeline.name());

    let plan = match pipeline.configure() {
        Ok(plan) => plan,
        Err(e) => {
            error!("Pipeline configuration failed: {} at {} milliseconds.", e, run_start.elapsed().as_millis());
            std::process::exit(1);
        }
    };

    let manifest = plan.manifest(pipeline.name());
    let json = if args.pretty {
        serde_json::to_string_pretty(&manifest)?
    } else {
        serde_json::to_string(&manifest)?
    };
    println!("{}", json);

    info!(
        "Configured {} tasks in {} milliseconds.",
        plan.tasks.len(),
        run_start.elapsed().as_millis()
    );
    Ok(())
}


fn load_settings(args: &Arguments) -> Result<(Settings, WorkflowOptions)> {
    let (mut settings, options) = match &args.settings {
        Some(path) => (
            Settings::from_toml_file(path).with_context(|| format!("loading settings from {}", path.display()))?,
            WorkflowOptions::from_toml_file(path)
                .with_context(|| format!("loading workflow options from {}", path.display()))?,
        ),
        None => (Settings::default(), WorkflowOptions::default()),
    };
    if let Some(dir) = &args.products_dir {
        settings.products_dir = dir.clone();
    }
    settings.verbose |= args.verbose;
    Ok((settings, options))
}


fn build_pipeline(args: &Arguments, settings: Settings, options: WorkflowOptions) -> Box<dyn Pipeline> {
    let metadata = match &args.metadata {
        Some(path) => SampleMetadataSource::File(path.clone()),
        None => SampleMetadataSource::Records(Vec::new()),
    };

    match args.pipeline {
        PipelineKind::Sixteen => {
            let mut p = SixteenSPipeline::new(metadata, settings);
            p.raw_seq_files = args.input.clone();
            p.barcode_seq_files = args.barcodes.clone();
            p.demuxed_fasta_files = args.demuxed.clone();
            p.otu_tables = args.otu_tables.clone();
            p.options = options.sixteen;
            if args.no_infer_pairs {
                p.options.infer_pairs = false;
            }
            Box::new(p)
        }
        PipelineKind::Wgs => {
            let mut p = WgsPipeline::new(metadata, settings);
            p.raw_seq_files = args.input.iter().map(|f| vec![f.clone()]).collect();
            p.options = options.wgs;
            Box::new(p)
        }
        PipelineKind::Rna => {
            let mut p = RnaPipeline::new(metadata, settings);
            p.raw_seq_files = args.input.clone();
            p.options = options.rna;
            if args.no_infer_pairs {
                p.options.infer_pairs = false;
            }
            Box::new(p)
        }
        PipelineKind::Visualization => {
            let mut p = VisualizationPipeline::new(metadata, settings);
            p.otu_tables = args.otu_tables.clone();
            p.pcl_files = args.pcl_files.clone();
            p.options = options.visualization;
            Box::new(p)
        }
    }
}
