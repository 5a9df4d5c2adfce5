//! Vehicle damage claims
//!
//! Runs a damage detector over a vehicle photo, prices each detected damage
//! region from a fixed repair cost table, and checks the claim against a fixed
//! set of fraud rules.
//!
//! # Module Structure
//!
//! - `photo`: upload decoding (JPEG/PNG, EXIF orientation, RGB)
//! - `detect`: detector backends and the model registry
//! - `cost`: repair cost table and claim totals
//! - `fraud`: the fraud rule table
//! - `pipeline`: one claim end to end
//! - `report`, `ui`, `api`: presentation (text, CLI progress, HTTP)
//!
//! The cost estimator and rule evaluator are pure functions over their
//! inputs and safe to call from any thread.

pub mod api;
pub mod config;
pub mod cost;
pub mod detect;
pub mod fraud;
pub mod photo;
pub mod pipeline;
pub mod report;
pub mod ui;

pub use config::AssessConfig;
pub use cost::{estimate, ClaimSummary, CostTable};
pub use detect::{BackendRegistry, BoundingBox, Detection, DetectorBackend};
pub use fraud::{evaluate, FraudFlag, RuleSet};
pub use photo::{decode_photo, Photo};
pub use pipeline::{AssessOptions, ClaimPipeline};
pub use report::ClaimReport;
