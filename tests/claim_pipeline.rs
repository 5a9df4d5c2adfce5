//! End-to-end claim assessment with scripted detectors.

use anyhow::Result;
use image::{DynamicImage, ImageBuffer, ImageFormat, Rgb};
use std::io::Cursor;

use vehicle_claims::detect::{ReplayBackend, StubBackend};
use vehicle_claims::{
    AssessOptions, BackendRegistry, BoundingBox, ClaimPipeline, CostTable, Detection,
};

fn photo_bytes(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let image = ImageBuffer::from_pixel(width, height, Rgb([90u8, 120, 160]));
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(image)
        .write_to(&mut out, format)
        .expect("encode test photo");
    out.into_inner()
}

fn detection(class_id: u32, label: &str, confidence: f32) -> Detection {
    Detection {
        class_id,
        class_label: label.to_string(),
        confidence: Some(confidence),
        bbox: BoundingBox {
            x1: 2.0,
            y1: 2.0,
            x2: 12.0,
            y2: 8.0,
        },
    }
}

fn pipeline_with(models: Vec<(&str, Vec<Detection>)>) -> ClaimPipeline {
    let mut registry = BackendRegistry::new();
    for (name, detections) in models {
        registry.register_as(name, StubBackend::new(detections));
    }
    ClaimPipeline::new(registry, CostTable::default(), 0.25).expect("pipeline")
}

#[test]
fn assesses_png_claim() -> Result<()> {
    let pipeline = pipeline_with(vec![(
        "best",
        vec![
            detection(3, "Dent", 0.91),
            detection(3, "Dent", 0.55),
            detection(4, "Scratch", 0.40),
            detection(4, "Scratch", 0.10),
        ],
    )]);

    let photo = photo_bytes(32, 24, ImageFormat::Png);
    let report = pipeline.assess(&photo, &AssessOptions::default())?;

    assert_eq!(report.model, "best");
    assert_eq!((report.photo_width, report.photo_height), (32, 24));
    assert_eq!(report.photo_sha256.len(), 64);
    assert_eq!(report.detected_labels, vec!["Dent", "Dent", "Scratch"]);
    assert_eq!(report.total_cost, 700.0);
    assert_eq!(report.fraud_flags, vec!["Dent repair cost unusually high."]);
    assert!(report.fraud_detected);
    assert_eq!(report.detections[0].class_id, 3);
    Ok(())
}

#[test]
fn clean_jpeg_claim_has_no_flags() -> Result<()> {
    let pipeline = pipeline_with(vec![("best", vec![detection(4, "Scratch", 0.8)])]);
    let photo = photo_bytes(16, 16, ImageFormat::Jpeg);
    let report = pipeline.assess(&photo, &AssessOptions::default())?;

    assert_eq!(report.total_cost, 100.0);
    assert!(report.fraud_flags.is_empty());
    assert!(!report.fraud_detected);
    assert!(report
        .render_text(true)
        .contains("No fraud detected based on current rules."));
    Ok(())
}

#[test]
fn model_can_be_selected_per_request() -> Result<()> {
    let pipeline = pipeline_with(vec![
        ("best", vec![detection(4, "Scratch", 0.8)]),
        ("best_new", vec![detection(5, "Shattered glass", 0.8)]),
    ]);
    let options = AssessOptions {
        model: Some("best_new".to_string()),
        confidence: None,
    };
    let report = pipeline.assess(&photo_bytes(8, 8, ImageFormat::Png), &options)?;
    assert_eq!(report.model, "best_new");
    assert_eq!(
        report.fraud_flags,
        vec!["shattered glass without dents may be suspicious."]
    );
    Ok(())
}

#[test]
fn no_detections_means_no_cost() -> Result<()> {
    let pipeline = pipeline_with(vec![("best", Vec::new())]);
    let report = pipeline.assess(&photo_bytes(8, 8, ImageFormat::Png), &AssessOptions::default())?;
    assert_eq!(report.total_cost, 0.0);
    assert!(report.detected_labels.is_empty());
    assert!(report.fraud_flags.is_empty());
    assert!(report
        .render_text(true)
        .contains("No visible damages detected."));
    Ok(())
}

#[test]
fn undecodable_upload_is_an_error_not_a_panic() {
    let pipeline = pipeline_with(vec![("best", vec![detection(3, "Dent", 0.9)])]);
    assert!(pipeline
        .assess(b"GIF89a not really", &AssessOptions::default())
        .is_err());
    assert!(pipeline.assess(&[], &AssessOptions::default()).is_err());
}

#[test]
fn unknown_model_is_reported() {
    let pipeline = pipeline_with(vec![("best", Vec::new())]);
    let options = AssessOptions {
        model: Some("best_git".to_string()),
        confidence: None,
    };
    let err = pipeline
        .assess(&photo_bytes(8, 8, ImageFormat::Png), &options)
        .unwrap_err();
    assert!(format!("{:#}", err).contains("best_git"));
}

#[test]
fn replayed_detections_drive_the_report() -> Result<()> {
    let recorded = r#"[
        {"class_id": 0, "class_label": "Broken light", "confidence": 0.7,
         "bbox": {"x1": 0.0, "y1": 0.0, "x2": 4.0, "y2": 4.0}},
        {"class_id": 6, "class_label": "Tire puncture", "confidence": 0.3,
         "bbox": {"x1": 1.0, "y1": 1.0, "x2": 5.0, "y2": 5.0}}
    ]"#;
    let mut registry = BackendRegistry::new();
    registry.register(ReplayBackend::from_json(recorded)?);
    let pipeline = ClaimPipeline::new(registry, CostTable::default(), 0.5)?;

    let report = pipeline.assess(&photo_bytes(8, 8, ImageFormat::Png), &AssessOptions::default())?;
    assert_eq!(report.model, "replay");
    assert_eq!(report.detected_labels, vec!["Broken light"]);
    assert_eq!(report.total_cost, 200.0);
    assert_eq!(
        report.fraud_flags,
        vec!["Broken light repair cost unusually high."]
    );
    Ok(())
}

#[test]
fn injected_cost_table_is_used() -> Result<()> {
    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new(vec![detection(4, "Scratch", 0.9)]));
    let costs = CostTable::from_entries([("Scratch", 2100.0)])?;
    let pipeline = ClaimPipeline::new(registry, costs, 0.25)?;

    let report = pipeline.assess(&photo_bytes(8, 8, ImageFormat::Png), &AssessOptions::default())?;
    assert_eq!(report.total_cost, 2100.0);
    assert_eq!(
        report.fraud_flags,
        vec![
            "overall repair cost unusually high.",
            "Scratch repair cost unusually high.",
            "single scratch with very high cost.",
        ]
    );
    Ok(())
}
