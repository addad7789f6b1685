use promptloom_core::config::ConcurrencyConfig;
use promptloom_core::workflow::{ConcurrencyContext, ConcurrencyStrategy};

/// Sizes the pool from the work available at run start, within configured bounds.
pub struct AdaptiveConcurrencyPlugin {
    config: ConcurrencyConfig,
}

pub struct FixedConcurrencyPlugin {
    fixed: usize,
}

impl AdaptiveConcurrencyPlugin {
    pub fn new(config: ConcurrencyConfig) -> Self {
        Self { config }
    }
}

impl FixedConcurrencyPlugin {
    pub fn new(fixed: usize) -> Self {
        Self { fixed }
    }
}

impl ConcurrencyStrategy for AdaptiveConcurrencyPlugin {
    fn name(&self) -> &str {
        "adaptive"
    }

    fn calculate_concurrency(&self, context: &ConcurrencyContext) -> usize {
        let min = self.config.min_concurrency.max(1);
        let max = self.config.max_concurrency.max(min);

        // Agent calls are network-bound, so allow two in flight per CPU.
        let ceiling = context
            .available_cpus
            .max(1)
            .saturating_mul(2)
            .min(context.base_concurrency.max(1).saturating_mul(2));
        let desired = context.ready_tasks.max(context.base_concurrency).min(ceiling);

        desired.clamp(min, max)
    }
}

impl ConcurrencyStrategy for FixedConcurrencyPlugin {
    fn name(&self) -> &str {
        "fixed"
    }

    fn calculate_concurrency(&self, _context: &ConcurrencyContext) -> usize {
        self.fixed.max(1)
    }
}
