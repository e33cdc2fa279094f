pub mod engine;
pub mod model;
pub mod store;

pub use engine::{RenderContext, RECOGNIZED_TOKENS, recognized_tokens_in, render};
pub use model::{EmailTemplate, NewTemplate};
pub use store::TemplateStore;
