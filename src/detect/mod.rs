mod backend;
mod backends;
mod registry;
mod result;

pub use backend::DetectorBackend;
#[cfg(feature = "backend-tract")]
pub use backends::{TractBackend, YoloSettings};
pub use backends::{ReplayBackend, StubBackend};
pub use registry::BackendRegistry;
pub use result::{class_label, BoundingBox, Detection};
