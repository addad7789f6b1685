mod echo;
mod scripted;

pub use echo::EchoAgent;
pub use scripted::{ScriptedAgent, ScriptedReply};
