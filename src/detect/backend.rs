use anyhow::Result;

use crate::detect::result::Detection;
use crate::photo::Photo;

/// Detector backend trait.
///
/// Backends receive a normalized RGB photo and the confidence threshold chosen
/// for the request. They must return every detection at or above the
/// threshold, or an error; partial results are not allowed.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a photo.
    fn detect(&mut self, photo: &Photo, confidence_threshold: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
