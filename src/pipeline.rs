//! Photo → detections → cost → fraud flags, for one claim at a time.

use anyhow::{anyhow, Context, Result};

use crate::config::{validate_confidence, AssessConfig};
use crate::cost::{ClaimSummary, CostTable};
use crate::detect::{BackendRegistry, Detection};
use crate::fraud::RuleSet;
use crate::photo::{decode_photo, Photo};
use crate::report::ClaimReport;

/// Per-request overrides.
#[derive(Clone, Debug, Default)]
pub struct AssessOptions {
    /// Model name; the registry default when absent.
    pub model: Option<String>,
    /// Detector confidence threshold; the pipeline default when absent.
    pub confidence: Option<f32>,
}

/// Detector output for one photo.
#[derive(Clone, Debug)]
pub struct DetectionRun {
    pub model: String,
    pub confidence: f32,
    pub detections: Vec<Detection>,
}

pub struct ClaimPipeline {
    registry: BackendRegistry,
    costs: CostTable,
    rules: RuleSet,
    confidence: f32,
}

impl ClaimPipeline {
    pub fn new(registry: BackendRegistry, costs: CostTable, confidence: f32) -> Result<Self> {
        validate_confidence(confidence)?;
        Ok(Self {
            registry,
            costs,
            rules: RuleSet::default(),
            confidence,
        })
    }

    /// Build a pipeline from configuration, registering one backend per model.
    ///
    /// Models that cannot be loaded are skipped with a warning; selecting them
    /// later fails with an error. Failing to load the configured default model
    /// is an error whenever any model loaded.
    pub fn from_config(cfg: &AssessConfig) -> Result<Self> {
        let registry = registry_from_config(cfg)?;
        Self::new(registry, cfg.costs.clone(), cfg.confidence)
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn costs(&self) -> &CostTable {
        &self.costs
    }

    pub fn rules(&self) -> &RuleSet {
        &self.rules
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Reject overrides the caller got wrong: an out-of-range threshold or a
    /// model name that is not registered.
    ///
    /// Once this passes, a failing [`ClaimPipeline::detect`] is a detector fault.
    pub fn check_options(&self, options: &AssessOptions) -> Result<()> {
        if let Some(confidence) = options.confidence {
            validate_confidence(confidence)?;
        }
        if let Some(model) = options.model.as_deref() {
            if self.registry.get(model).is_none() {
                return Err(anyhow!(
                    "model '{}' not available (registered: {})",
                    model,
                    self.registry.list().join(", ")
                ));
            }
        }
        Ok(())
    }

    /// Run the selected detector over a decoded photo.
    pub fn detect(&self, photo: &Photo, options: &AssessOptions) -> Result<DetectionRun> {
        self.check_options(options)?;
        let confidence = options.confidence.unwrap_or(self.confidence);
        let (model, detections) = self
            .registry
            .detect(options.model.as_deref(), photo, confidence)
            .context("detector failed")?;
        log::info!(
            "model {} found {} damage regions (confidence >= {:.2})",
            model,
            detections.len(),
            confidence
        );
        Ok(DetectionRun {
            model,
            confidence,
            detections,
        })
    }

    pub fn summarize(&self, detections: &[Detection]) -> ClaimSummary {
        ClaimSummary::from_detections(detections, &self.costs)
    }

    /// Build the report for a photo that has already gone through the detector.
    pub fn report(&self, photo: &Photo, run: DetectionRun) -> ClaimReport {
        let summary = self.summarize(&run.detections);
        let flags = self
            .rules
            .evaluate(&summary.detected_labels, summary.total_cost);
        log::debug!(
            "claim total {} with {} fraud flags",
            summary.total_cost,
            flags.len()
        );
        ClaimReport::new(photo, run, summary, flags)
    }

    /// Decode, detect, estimate and check one uploaded photo.
    pub fn assess(&self, photo_bytes: &[u8], options: &AssessOptions) -> Result<ClaimReport> {
        let photo = decode_photo(photo_bytes)?;
        let run = self.detect(&photo, options)?;
        Ok(self.report(&photo, run))
    }
}

fn registry_from_config(cfg: &AssessConfig) -> Result<BackendRegistry> {
    let mut registry = load_models(cfg);
    select_default(&mut registry, &cfg.default_model)?;
    Ok(registry)
}

/// Make `default_model` the registry default. An empty registry is left alone.
fn select_default(registry: &mut BackendRegistry, default_model: &str) -> Result<()> {
    if registry.is_empty() {
        return Ok(());
    }
    registry.set_default(default_model).with_context(|| {
        format!(
            "default model '{}' did not load (loaded: {})",
            default_model,
            registry.list().join(", ")
        )
    })
}

#[cfg(feature = "backend-tract")]
fn load_models(cfg: &AssessConfig) -> BackendRegistry {
    use crate::detect::{TractBackend, YoloSettings};

    let mut registry = BackendRegistry::new();
    for model in &cfg.models {
        let settings = YoloSettings {
            input_size: model.input_size,
            iou_threshold: cfg.iou_threshold,
            max_detections: cfg.max_detections,
            class_names: cfg.class_names.clone(),
        };
        match TractBackend::new(&model.path, settings) {
            Ok(backend) => registry.register_as(&model.name, backend),
            Err(err) => log::warn!("model '{}' unavailable: {:#}", model.name, err),
        }
    }
    registry
}

#[cfg(not(feature = "backend-tract"))]
fn load_models(cfg: &AssessConfig) -> BackendRegistry {
    if !cfg.models.is_empty() {
        log::warn!(
            "built without backend-tract; {} configured models not loaded",
            cfg.models.len()
        );
    }
    BackendRegistry::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, StubBackend};
    use image::RgbImage;

    fn detection(label: &str, confidence: f32) -> Detection {
        Detection {
            class_id: 0,
            class_label: label.to_string(),
            confidence: Some(confidence),
            bbox: BoundingBox::default(),
        }
    }

    fn pipeline(detections: Vec<Detection>) -> ClaimPipeline {
        let mut registry = BackendRegistry::new();
        registry.register_as("best", StubBackend::new(detections));
        ClaimPipeline::new(registry, CostTable::default(), 0.25).unwrap()
    }

    #[test]
    fn report_sums_costs_and_checks_rules() {
        let pipeline = pipeline(vec![detection("Shattered glass", 0.7)]);
        let photo = Photo::from_rgb(RgbImage::new(4, 4));
        let run = pipeline.detect(&photo, &AssessOptions::default()).unwrap();
        let report = pipeline.report(&photo, run);

        assert_eq!(report.model, "best");
        assert_eq!(report.total_cost, 400.0);
        assert_eq!(
            report.fraud_flags,
            vec!["shattered glass without dents may be suspicious."]
        );
        assert!(report.fraud_detected);
    }

    #[test]
    fn request_threshold_overrides_default() {
        let pipeline = pipeline(vec![detection("Dent", 0.3), detection("Scratch", 0.8)]);
        let photo = Photo::from_rgb(RgbImage::new(4, 4));
        let options = AssessOptions {
            model: None,
            confidence: Some(0.5),
        };
        let run = pipeline.detect(&photo, &options).unwrap();
        assert_eq!(run.confidence, 0.5);
        assert_eq!(run.detections.len(), 1);
    }

    #[test]
    fn out_of_range_threshold_is_rejected() {
        let pipeline = pipeline(Vec::new());
        let photo = Photo::from_rgb(RgbImage::new(4, 4));
        let options = AssessOptions {
            model: None,
            confidence: Some(0.99),
        };
        assert!(pipeline.detect(&photo, &options).is_err());
        assert!(ClaimPipeline::new(BackendRegistry::new(), CostTable::default(), 0.0).is_err());
    }

    #[test]
    fn unregistered_model_is_a_request_error() {
        let pipeline = pipeline(Vec::new());
        let options = AssessOptions {
            model: Some("best_git".to_string()),
            confidence: None,
        };
        let err = pipeline.check_options(&options).unwrap_err();
        assert!(err.to_string().contains("best_git"));
        assert!(pipeline.check_options(&AssessOptions::default()).is_ok());
    }

    #[test]
    fn configured_default_model_is_selected() -> Result<()> {
        let mut registry = BackendRegistry::new();
        registry.register_as("best", StubBackend::new(Vec::new()));
        registry.register_as("best_new", StubBackend::new(Vec::new()));
        select_default(&mut registry, "best_new")?;
        assert_eq!(registry.default_name(), Some("best_new"));
        Ok(())
    }

    #[test]
    fn missing_default_model_is_not_replaced() {
        let mut registry = BackendRegistry::new();
        registry.register_as("best", StubBackend::new(Vec::new()));
        let err = select_default(&mut registry, "best_new").unwrap_err();
        assert!(format!("{:#}", err).contains("best_new"));
        assert_eq!(registry.default_name(), Some("best"));

        let mut empty = BackendRegistry::new();
        assert!(select_default(&mut empty, "best").is_ok());
        assert_eq!(empty.default_name(), None);
    }
}
