//! assess_claim - detect damage, estimate repair cost and run fraud checks on one photo

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use vehicle_claims::detect::ReplayBackend;
use vehicle_claims::report::annotate;
use vehicle_claims::ui::{Ui, UiMode};
use vehicle_claims::{decode_photo, AssessConfig, AssessOptions, BackendRegistry, ClaimPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Vehicle photo (JPEG or PNG).
    #[arg(long)]
    image: PathBuf,
    /// Model name from the configuration (defaults to the configured default).
    #[arg(long, conflicts_with = "detections")]
    model: Option<String>,
    /// Detector confidence threshold (0.05 - 0.9).
    #[arg(long)]
    confidence: Option<f32>,
    /// Replay detections from a JSON file instead of running a model.
    #[arg(long)]
    detections: Option<PathBuf>,
    /// Print the report as JSON.
    #[arg(long)]
    json: bool,
    /// Hide the detections table.
    #[arg(long)]
    no_table: bool,
    /// Write the photo with detection boxes drawn on it (PNG).
    #[arg(long)]
    annotate: Option<PathBuf>,
    /// Progress output style.
    #[arg(long, value_enum, default_value_t = UiMode::Auto)]
    ui: UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();
    let cfg = AssessConfig::load()?;

    let mode = if args.json { UiMode::Quiet } else { args.ui };
    let ui = Ui::new(mode, std::io::stderr().is_terminal());

    let pipeline = {
        let _stage = ui.stage("load detector");
        match &args.detections {
            Some(path) => {
                let mut registry = BackendRegistry::new();
                registry.register(ReplayBackend::from_path(path)?);
                ClaimPipeline::new(registry, cfg.costs.clone(), cfg.confidence)?
            }
            None => ClaimPipeline::from_config(&cfg)?,
        }
    };
    if pipeline.registry().is_empty() {
        return Err(anyhow!(
            "no detector available; pass --detections or build with --features backend-tract"
        ));
    }

    let bytes = std::fs::read(&args.image)
        .with_context(|| format!("failed to read photo {}", args.image.display()))?;
    let photo = {
        let stage = ui.stage("decode photo");
        match decode_photo(&bytes) {
            Ok(photo) => photo,
            Err(err) => {
                stage.fail();
                return Err(err);
            }
        }
    };

    let options = AssessOptions {
        model: args.model.clone(),
        confidence: args.confidence,
    };
    let run = {
        let stage = ui.stage("run detector");
        match pipeline.detect(&photo, &options) {
            Ok(run) => run,
            Err(err) => {
                stage.fail();
                return Err(err);
            }
        }
    };

    if let Some(path) = &args.annotate {
        let _stage = ui.stage("annotate photo");
        annotate(&photo, &run.detections)
            .save(path)
            .with_context(|| format!("failed to write annotated photo {}", path.display()))?;
    }

    let report = {
        let _stage = ui.stage("estimate cost + fraud checks");
        pipeline.report(&photo, run)
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{}", report.render_text(cfg.show_table && !args.no_table));
    }
    Ok(())
}
