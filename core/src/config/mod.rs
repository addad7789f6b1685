//! TOML configuration with environment overrides.

mod load;
mod types;

pub use load::{apply_env_overrides, from_toml_str, get_promptloom_data_dir, load_default, load_from_path};
pub use types::{AppConfig, ConcurrencyConfig, ExecutorConfig, LoggingConfig, OutputConfig};
