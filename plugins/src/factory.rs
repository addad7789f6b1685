use std::sync::Arc;

use anyhow::Result;

use promptloom_core::config::{AppConfig, ConcurrencyConfig, OutputConfig};
use promptloom_core::workflow::{ConcurrencyStrategy, EventRenderer, WorkflowExecutor};

use crate::executor::{
    AdaptiveConcurrencyPlugin, FixedConcurrencyPlugin, JsonlRendererPlugin, ProgressRendererPlugin,
    TextRendererPlugin,
};

pub fn build_renderer(cfg: &OutputConfig) -> Result<Option<Arc<dyn EventRenderer>>> {
    // Progress bars would interleave with JSONL lines, so they only replace text output.
    if cfg.progress_bar && cfg.format == "text" {
        return Ok(Some(Arc::new(ProgressRendererPlugin::new())));
    }

    match cfg.format.as_str() {
        "text" => Ok(Some(Arc::new(TextRendererPlugin::new(cfg.ascii_only)))),
        "jsonl" => Ok(Some(Arc::new(JsonlRendererPlugin::new(false)))),
        "none" => Ok(None),
        other => Err(anyhow::anyhow!("unknown output format: {other}")),
    }
}

pub fn build_concurrency_strategy(
    cfg: &ConcurrencyConfig,
    max_parallel: Option<usize>,
) -> Result<Arc<dyn ConcurrencyStrategy>> {
    match cfg.strategy.as_str() {
        "fixed" => Ok(Arc::new(FixedConcurrencyPlugin::new(
            max_parallel.unwrap_or(cfg.base_concurrency),
        ))),
        "adaptive" => Ok(Arc::new(AdaptiveConcurrencyPlugin::new(cfg.clone()))),
        other => Err(anyhow::anyhow!("unknown concurrency strategy: {other}")),
    }
}

/// Executor wired with the configured renderer and concurrency strategy.
pub fn build_executor(cfg: &AppConfig) -> Result<WorkflowExecutor> {
    let executor_cfg = &cfg.executor;
    let mut builder = WorkflowExecutor::from_config(executor_cfg)
        .concurrency_strategy(build_concurrency_strategy(
            &executor_cfg.concurrency,
            executor_cfg.max_parallel,
        )?)
        .sanitization(cfg.sanitization.clone());

    if let Some(renderer) = build_renderer(&executor_cfg.output)? {
        builder = builder.renderer(renderer);
    }

    Ok(builder.build())
}
