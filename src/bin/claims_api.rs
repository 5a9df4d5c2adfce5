//! claims_api - local HTTP service for claim assessment
//!
//! This daemon:
//! 1. Loads the configured detector models
//! 2. Serves `POST /assess` on a loopback address
//! 3. Keeps nothing between requests

use anyhow::Result;
use std::sync::mpsc;

use vehicle_claims::api::{ApiConfig, ApiServer};
use vehicle_claims::fraud::Rule;
use vehicle_claims::{AssessConfig, ClaimPipeline};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = AssessConfig::load()?;
    let pipeline = ClaimPipeline::from_config(&config)?;
    if pipeline.registry().is_empty() {
        log::warn!("no detector models loaded; /assess will answer with errors");
    } else {
        log::info!(
            "models loaded: {} (default {})",
            pipeline.registry().list().join(", "),
            pipeline.registry().default_name().unwrap_or("-")
        );
        pipeline.registry().warm_up()?;
    }

    let rule_ids: Vec<&str> = pipeline.rules().rules().iter().map(Rule::id).collect();
    log::info!(
        "pricing {} damage classes; fraud rules: {}",
        pipeline.costs().len(),
        rule_ids.join(", ")
    );

    let api_config = ApiConfig {
        addr: config.api.addr.clone(),
        max_upload_bytes: config.api.max_upload_bytes,
    };
    let api_handle = ApiServer::new(api_config, pipeline).spawn()?;
    log::info!("claims api listening on {}", api_handle.addr);

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .expect("error setting Ctrl-C handler");

    log::info!("claims_api waiting for shutdown signal (Ctrl-C)...");
    let _ = rx.recv();
    log::info!("shutdown signal received, stopping API server...");
    api_handle.stop()?;

    Ok(())
}
