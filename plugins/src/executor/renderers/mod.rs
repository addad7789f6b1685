mod jsonl;
mod progress;
mod text;

pub use jsonl::JsonlRendererPlugin;
pub use progress::ProgressRendererPlugin;
pub use text::TextRendererPlugin;
