pub mod agents;
pub mod embedder;
pub mod executor;
pub mod factory;

pub use agents::{EchoAgent, ScriptedAgent, ScriptedReply};
pub use embedder::HashEmbedder;
