pub mod controller;
pub mod stage;

pub use controller::PipelineController;
pub use stage::{PipelineEvent, Stage};
