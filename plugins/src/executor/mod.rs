pub mod renderers;
pub mod strategies;

pub use renderers::{JsonlRendererPlugin, ProgressRendererPlugin, TextRendererPlugin};
pub use strategies::{AdaptiveConcurrencyPlugin, FixedConcurrencyPlugin};
