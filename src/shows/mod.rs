pub mod model;
pub mod registry;

pub use model::{NewShow, Platform, Show};
pub use registry::{ShowRegistry, StageCounts};
