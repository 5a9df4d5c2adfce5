//! Claim report: what the CLI prints and the API returns.

use image::{Rgb, RgbImage};
use serde::Serialize;
use std::fmt::Write;

use crate::cost::ClaimSummary;
use crate::detect::Detection;
use crate::fraud::FraudFlag;
use crate::photo::Photo;
use crate::pipeline::DetectionRun;

const BOX_COLOR: Rgb<u8> = Rgb([255, 56, 56]);
const BOX_THICKNESS: u32 = 3;

/// One row of the detections table.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionRow {
    pub class_id: u32,
    pub class_name: String,
    /// Rounded to three decimals.
    pub confidence: Option<f32>,
    /// Coordinates rounded to one decimal.
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl From<&Detection> for DetectionRow {
    fn from(detection: &Detection) -> Self {
        Self {
            class_id: detection.class_id,
            class_name: detection.class_label.clone(),
            confidence: detection.confidence.map(|c| round_to(c, 3)),
            x1: round_to(detection.bbox.x1, 1),
            y1: round_to(detection.bbox.y1, 1),
            x2: round_to(detection.bbox.x2, 1),
            y2: round_to(detection.bbox.y2, 1),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ClaimReport {
    pub photo_sha256: String,
    pub photo_width: u32,
    pub photo_height: u32,
    pub model: String,
    pub confidence_threshold: f32,
    pub detections: Vec<DetectionRow>,
    /// One entry per detection.
    pub detected_labels: Vec<String>,
    pub total_cost: f64,
    pub fraud_flags: Vec<String>,
    pub fraud_detected: bool,
}

impl ClaimReport {
    pub fn new(
        photo: &Photo,
        run: DetectionRun,
        summary: ClaimSummary,
        flags: Vec<FraudFlag>,
    ) -> Self {
        Self {
            photo_sha256: photo.sha256_hex(),
            photo_width: photo.width(),
            photo_height: photo.height(),
            model: run.model,
            confidence_threshold: run.confidence,
            detections: run.detections.iter().map(DetectionRow::from).collect(),
            detected_labels: summary.detected_labels,
            total_cost: summary.total_cost,
            fraud_detected: !flags.is_empty(),
            fraud_flags: flags.iter().map(|flag| flag.message().to_string()).collect(),
        }
    }

    /// Plain-text rendering for terminals.
    pub fn render_text(&self, show_table: bool) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Detection Output");
        let _ = writeln!(
            out,
            "  model: {} (confidence >= {:.2})",
            self.model, self.confidence_threshold
        );
        let _ = writeln!(
            out,
            "  photo: {}x{} sha256={}",
            self.photo_width, self.photo_height, self.photo_sha256
        );

        if show_table && !self.detections.is_empty() {
            let _ = writeln!(out);
            let _ = writeln!(out, "Detections");
            let _ = writeln!(
                out,
                "  {:>3}  {:<16} {:>6}  {:>8} {:>8} {:>8} {:>8}",
                "id", "class", "conf", "x1", "y1", "x2", "y2"
            );
            for row in &self.detections {
                let confidence = row
                    .confidence
                    .map(|c| format!("{:.3}", c))
                    .unwrap_or_else(|| "-".to_string());
                let _ = writeln!(
                    out,
                    "  {:>3}  {:<16} {:>6}  {:>8.1} {:>8.1} {:>8.1} {:>8.1}",
                    row.class_id, row.class_name, confidence, row.x1, row.y1, row.x2, row.y2
                );
            }
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Estimated Repair Cost");
        if self.detected_labels.is_empty() {
            let _ = writeln!(out, "  No visible damages detected.");
        } else {
            let _ = writeln!(
                out,
                "  Detected damage parts (counted per detection): {}",
                self.detected_labels.join(", ")
            );
            let _ = writeln!(out, "  Estimated Repair Cost: ${}", self.total_cost);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Fraud Detection");
        if self.fraud_flags.is_empty() {
            let _ = writeln!(out, "  No fraud detected based on current rules.");
        } else {
            for flag in &self.fraud_flags {
                let _ = writeln!(out, "  ! {}", flag);
            }
        }
        out
    }
}

/// Copy of the photo with every detection outlined.
pub fn annotate(photo: &Photo, detections: &[Detection]) -> RgbImage {
    let mut canvas = photo.image().clone();
    let (width, height) = canvas.dimensions();
    if width == 0 || height == 0 {
        return canvas;
    }
    for detection in detections {
        let bbox = detection.bbox.clamp_to(width, height);
        let x1 = (bbox.x1 as u32).min(width - 1);
        let y1 = (bbox.y1 as u32).min(height - 1);
        let x2 = (bbox.x2 as u32).min(width - 1);
        let y2 = (bbox.y2 as u32).min(height - 1);
        for t in 0..BOX_THICKNESS {
            for x in x1..=x2 {
                put(&mut canvas, x, y1.saturating_add(t));
                put(&mut canvas, x, y2.saturating_sub(t));
            }
            for y in y1..=y2 {
                put(&mut canvas, x1.saturating_add(t), y);
                put(&mut canvas, x2.saturating_sub(t), y);
            }
        }
    }
    canvas
}

fn put(canvas: &mut RgbImage, x: u32, y: u32) {
    if x < canvas.width() && y < canvas.height() {
        canvas.put_pixel(x, y, BOX_COLOR);
    }
}

fn round_to(value: f32, decimals: i32) -> f32 {
    let factor = 10f32.powi(decimals);
    (value * factor).round() / factor
}
