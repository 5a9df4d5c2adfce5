use anyhow::{Context, Result};
use std::path::Path;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::photo::Photo;

/// Backend that replays detections recorded from an earlier model run.
///
/// The file is a JSON array of detections. Boxes outside the photo are
/// clamped to its bounds.
pub struct ReplayBackend {
    detections: Vec<Detection>,
}

impl ReplayBackend {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detections from {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid detections file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let detections: Vec<Detection> = serde_json::from_str(raw)?;
        log::info!("replay backend loaded {} detections", detections.len());
        Ok(Self { detections })
    }
}

impl DetectorBackend for ReplayBackend {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn detect(&mut self, photo: &Photo, confidence_threshold: f32) -> Result<Vec<Detection>> {
        Ok(self
            .detections
            .iter()
            .filter(|detection| detection.meets_threshold(confidence_threshold))
            .map(|detection| Detection {
                bbox: detection.bbox.clamp_to(photo.width(), photo.height()),
                ..detection.clone()
            })
            .collect())
    }
}
