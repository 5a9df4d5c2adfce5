use anyhow::Result;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::photo::Photo;

/// Stub backend for testing. Returns a fixed detection list for every photo.
#[derive(Default)]
pub struct StubBackend {
    detections: Vec<Detection>,
    calls: usize,
}

impl StubBackend {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self {
            detections,
            calls: 0,
        }
    }

    /// Number of `detect` calls served so far.
    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, _photo: &Photo, confidence_threshold: f32) -> Result<Vec<Detection>> {
        self.calls += 1;
        Ok(self
            .detections
            .iter()
            .filter(|detection| detection.meets_threshold(confidence_threshold))
            .cloned()
            .collect())
    }
}
