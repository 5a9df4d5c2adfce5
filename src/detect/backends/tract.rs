#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{class_label, BoundingBox, Detection};
use crate::photo::Photo;

/// Letterbox padding value used by YOLO exports.
const PAD_VALUE: u8 = 114;

/// Decoding parameters for a YOLO-style detection head.
#[derive(Clone, Debug)]
pub struct YoloSettings {
    /// Square model input edge in pixels.
    pub input_size: u32,
    pub iou_threshold: f32,
    pub max_detections: usize,
    /// Class names indexed by class id.
    pub class_names: Vec<String>,
}

/// Tract-based backend for YOLO ONNX exports.
///
/// Expects a single output of shape `[1, 4 + classes, anchors]` (or the
/// transposed `[1, anchors, 4 + classes]`) with center-format boxes in model
/// input pixels followed by per-class scores.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    settings: YoloSettings,
}

/// Scale and offsets mapping the photo into the letterboxed model input.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Letterbox {
    scale: f32,
    pad_x: f32,
    pad_y: f32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: YoloSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let size = settings.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, size, size)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "loaded detector {} (input {}x{}, {} classes)",
            model_path.display(),
            settings.input_size,
            settings.input_size,
            settings.class_names.len()
        );
        Ok(Self { model, settings })
    }

    fn build_input(&self, photo: &Photo) -> Result<(Tensor, Letterbox)> {
        if photo.width() == 0 || photo.height() == 0 {
            return Err(anyhow!("photo has no pixels"));
        }
        let size = self.settings.input_size;
        let letterbox = Letterbox::fit(photo.width(), photo.height(), size);
        let scaled_w = ((photo.width() as f32 * letterbox.scale).round() as u32).max(1);
        let scaled_h = ((photo.height() as f32 * letterbox.scale).round() as u32).max(1);
        let resized = imageops::resize(photo.image(), scaled_w, scaled_h, FilterType::Triangle);

        let mut canvas = RgbImage::from_pixel(size, size, Rgb([PAD_VALUE; 3]));
        imageops::replace(
            &mut canvas,
            &resized,
            letterbox.pad_x as i64,
            letterbox.pad_y as i64,
        );

        let size = size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            canvas.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
        });
        Ok((input.into_tensor(), letterbox))
    }
}

/// Turn one YOLO output tensor into detections on the photo.
///
/// Accepts `[1, 4 + classes, anchors]` and the transposed
/// `[1, anchors, 4 + classes]`; each anchor keeps its best-scoring class.
fn decode_output(
    view: tract_ndarray::ArrayViewD<'_, f32>,
    letterbox: Letterbox,
    photo_size: (u32, u32),
    confidence_threshold: f32,
    settings: &YoloSettings,
) -> Result<Vec<Detection>> {
    let shape = view.shape().to_vec();
    if shape.len() != 3 || shape[0] != 1 {
        return Err(anyhow!("unexpected detector output shape {:?}", shape));
    }
    // Channels-first exports have far fewer rows than anchors.
    let transposed = shape[1] > shape[2];
    let (channels, anchors) = if transposed {
        (shape[2], shape[1])
    } else {
        (shape[1], shape[2])
    };
    if channels < 5 {
        return Err(anyhow!("detector output has {} channels", channels));
    }
    let at = |channel: usize, anchor: usize| {
        if transposed {
            view[[0, anchor, channel]]
        } else {
            view[[0, channel, anchor]]
        }
    };

    let mut candidates = Vec::new();
    for anchor in 0..anchors {
        let (class_id, score) = (4..channels)
            .map(|channel| (channel - 4, at(channel, anchor)))
            .fold((0, f32::NEG_INFINITY), |best, current| {
                if current.1 > best.1 {
                    current
                } else {
                    best
                }
            });
        if !score.is_finite() || score < confidence_threshold {
            continue;
        }
        let (cx, cy, w, h) = (
            at(0, anchor),
            at(1, anchor),
            at(2, anchor),
            at(3, anchor),
        );
        let bbox = letterbox
            .unmap(BoundingBox {
                x1: cx - w / 2.0,
                y1: cy - h / 2.0,
                x2: cx + w / 2.0,
                y2: cy + h / 2.0,
            })
            .clamp_to(photo_size.0, photo_size.1);
        candidates.push((class_id as u32, score, bbox));
    }

    let kept = non_max_suppression(candidates, settings.iou_threshold, settings.max_detections);
    Ok(kept
        .into_iter()
        .map(|(class_id, score, bbox)| Detection {
            class_id,
            class_label: class_label(&settings.class_names, class_id),
            confidence: Some(score),
            bbox,
        })
        .collect())
}

impl Letterbox {
    fn fit(width: u32, height: u32, size: u32) -> Self {
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let pad_x = ((size as f32 - (width as f32 * scale).round()) / 2.0).floor();
        let pad_y = ((size as f32 - (height as f32 * scale).round()) / 2.0).floor();
        Self {
            scale,
            pad_x,
            pad_y,
        }
    }

    /// Map a box from model input coordinates back onto the photo.
    fn unmap(&self, bbox: BoundingBox) -> BoundingBox {
        BoundingBox {
            x1: (bbox.x1 - self.pad_x) / self.scale,
            y1: (bbox.y1 - self.pad_y) / self.scale,
            x2: (bbox.x2 - self.pad_x) / self.scale,
            y2: (bbox.y2 - self.pad_y) / self.scale,
        }
    }
}

/// Greedy per-class NMS, highest score first.
fn non_max_suppression(
    mut candidates: Vec<(u32, f32, BoundingBox)>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<(u32, f32, BoundingBox)> {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut kept: Vec<(u32, f32, BoundingBox)> = Vec::new();
    for candidate in candidates {
        if kept.len() >= max_detections {
            break;
        }
        let suppressed = kept
            .iter()
            .any(|k| k.0 == candidate.0 && k.2.iou(&candidate.2) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, photo: &Photo, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let (input, letterbox) = self.build_input(photo)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        decode_output(
            view,
            letterbox,
            (photo.width(), photo.height()),
            confidence_threshold,
            &self.settings,
        )
    }

    fn warm_up(&mut self) -> Result<()> {
        let photo = Photo::from_rgb(RgbImage::new(
            self.settings.input_size,
            self.settings.input_size,
        ));
        self.detect(&photo, 1.0).map(|_| ())
    }
}
