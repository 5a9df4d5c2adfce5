use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::cost::{CostTable, DEFAULT_REPAIR_COSTS};

const DEFAULT_API_ADDR: &str = "127.0.0.1:8899";
const DEFAULT_CONFIDENCE: f32 = 0.25;
const DEFAULT_IOU_THRESHOLD: f32 = 0.7;
const DEFAULT_INPUT_SIZE: u32 = 640;
const DEFAULT_MAX_DETECTIONS: usize = 300;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MODELS: [&str; 3] = ["best", "best_new", "best_git"];

/// Allowed range for the detector confidence threshold.
pub const MIN_CONFIDENCE: f32 = 0.05;
pub const MAX_CONFIDENCE: f32 = 0.9;

#[derive(Debug, Deserialize, Default)]
struct AssessConfigFile {
    models: Option<Vec<ModelConfigFile>>,
    default_model: Option<String>,
    confidence: Option<f32>,
    iou_threshold: Option<f32>,
    max_detections: Option<usize>,
    class_names: Option<Vec<String>>,
    costs: Option<BTreeMap<String, f64>>,
    show_table: Option<bool>,
    api: Option<ApiConfigFile>,
}

#[derive(Debug, Deserialize)]
struct ModelConfigFile {
    name: String,
    path: PathBuf,
    input_size: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ApiConfigFile {
    addr: Option<String>,
    max_upload_bytes: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct AssessConfig {
    pub models: Vec<ModelSettings>,
    pub default_model: String,
    pub confidence: f32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Detector class names indexed by class id.
    pub class_names: Vec<String>,
    pub costs: CostTable,
    pub show_table: bool,
    pub api: ApiSettings,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub name: String,
    pub path: PathBuf,
    pub input_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiSettings {
    pub addr: String,
    pub max_upload_bytes: usize,
}

impl AssessConfig {
    /// Load from `ASSESS_CONFIG` (JSON, or TOML by extension) plus env overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("ASSESS_CONFIG").ok();
        let file_cfg = match config_path.as_deref() {
            Some(path) if !path.trim().is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: AssessConfigFile) -> Result<Self> {
        let models: Vec<ModelSettings> = match file.models {
            Some(models) => models
                .into_iter()
                .map(|model| ModelSettings {
                    name: model.name,
                    path: model.path,
                    input_size: model.input_size.unwrap_or(DEFAULT_INPUT_SIZE),
                })
                .collect(),
            None => DEFAULT_MODELS
                .iter()
                .map(|name| ModelSettings {
                    name: name.to_string(),
                    path: PathBuf::from(format!("models/{}.onnx", name)),
                    input_size: DEFAULT_INPUT_SIZE,
                })
                .collect(),
        };
        let default_model = file
            .default_model
            .or_else(|| models.first().map(|model| model.name.clone()))
            .ok_or_else(|| anyhow!("at least one model must be configured"))?;
        let class_names = file.class_names.unwrap_or_else(|| {
            DEFAULT_REPAIR_COSTS
                .iter()
                .map(|(label, _)| label.to_string())
                .collect()
        });
        let costs = match file.costs {
            Some(costs) => CostTable::from_entries(costs)?,
            None => CostTable::default(),
        };
        let api = ApiSettings {
            addr: file
                .api
                .as_ref()
                .and_then(|api| api.addr.clone())
                .unwrap_or_else(|| DEFAULT_API_ADDR.to_string()),
            max_upload_bytes: file
                .api
                .and_then(|api| api.max_upload_bytes)
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),
        };
        Ok(Self {
            models,
            default_model,
            confidence: file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            iou_threshold: file.iou_threshold.unwrap_or(DEFAULT_IOU_THRESHOLD),
            max_detections: file.max_detections.unwrap_or(DEFAULT_MAX_DETECTIONS),
            class_names,
            costs,
            show_table: file.show_table.unwrap_or(true),
            api,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(model) = std::env::var("ASSESS_MODEL") {
            if !model.trim().is_empty() {
                self.default_model = model.trim().to_string();
            }
        }
        if let Ok(confidence) = std::env::var("ASSESS_CONFIDENCE") {
            self.confidence = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("ASSESS_CONFIDENCE must be a number"))?;
        }
        if let Ok(addr) = std::env::var("ASSESS_API_ADDR") {
            if !addr.trim().is_empty() {
                self.api.addr = addr;
            }
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        validate_confidence(self.confidence)?;
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(anyhow!(
                "iou_threshold must be in (0, 1], got {}",
                self.iou_threshold
            ));
        }
        if self.max_detections == 0 {
            return Err(anyhow!("max_detections must be greater than zero"));
        }
        if self.api.max_upload_bytes == 0 {
            return Err(anyhow!("api.max_upload_bytes must be greater than zero"));
        }
        if !self
            .models
            .iter()
            .any(|model| model.name == self.default_model)
        {
            return Err(anyhow!(
                "default model '{}' is not configured",
                self.default_model
            ));
        }
        for model in &self.models {
            if model.input_size == 0 {
                return Err(anyhow!("model '{}' input_size must be positive", model.name));
            }
        }
        Ok(())
    }
}

/// Check a requested detector confidence threshold.
pub fn validate_confidence(confidence: f32) -> Result<()> {
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&confidence) {
        return Err(anyhow!(
            "confidence threshold must be between {} and {}, got {}",
            MIN_CONFIDENCE,
            MAX_CONFIDENCE,
            confidence
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<AssessConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_demo_models() -> Result<()> {
        let cfg = AssessConfig::from_file(AssessConfigFile::default())?;
        cfg.validate()?;
        assert_eq!(cfg.default_model, "best");
        assert_eq!(cfg.models.len(), 3);
        assert_eq!(cfg.models[2].path, PathBuf::from("models/best_git.onnx"));
        assert_eq!(cfg.confidence, 0.25);
        assert_eq!(cfg.class_names.len(), 7);
        assert_eq!(cfg.class_names[3], "Dent");
        assert_eq!(cfg.costs, CostTable::default());
        assert!(cfg.show_table);
        assert_eq!(cfg.api.addr, "127.0.0.1:8899");
        Ok(())
    }

    #[test]
    fn confidence_range_is_inclusive() {
        assert!(validate_confidence(0.05).is_ok());
        assert!(validate_confidence(0.9).is_ok());
        assert!(validate_confidence(0.04).is_err());
        assert!(validate_confidence(0.95).is_err());
        assert!(validate_confidence(f32::NAN).is_err());
    }

    #[test]
    fn unknown_default_model_is_rejected() -> Result<()> {
        let mut cfg = AssessConfig::from_file(AssessConfigFile::default())?;
        cfg.default_model = "yolo".to_string();
        assert!(cfg.validate().is_err());
        Ok(())
    }

    #[test]
    fn negative_costs_fail_to_load() {
        let file = AssessConfigFile {
            costs: Some(BTreeMap::from([("Dent".to_string(), -5.0)])),
            ..AssessConfigFile::default()
        };
        assert!(AssessConfig::from_file(file).is_err());
    }
}
