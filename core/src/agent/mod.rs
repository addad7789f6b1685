//! The agent collaborator seam: prompt execution and embeddings.

mod auth;
mod execute;
mod traits;
mod types;

pub use auth::{credential_env_vars, resolve_api_key};
pub use execute::{embed, embed_batch, execute_prompt, execute_task, execute_with_schema};
pub use traits::{Agent, Embedder};
pub use types::{AgentResponse, EmbeddingConfig, Usage};
