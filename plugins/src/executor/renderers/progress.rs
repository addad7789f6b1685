use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use promptloom_core::workflow::{EventRenderer, RenderEvent, TaskStatus};

/// Progress bars for an interactive terminal: one overall bar plus a spinner per running task.
pub struct ProgressRendererPlugin {
    state: Mutex<ProgressState>,
    hidden: bool,
}

struct ProgressState {
    multi: MultiProgress,
    overall: ProgressBar,
    task_bars: HashMap<String, ProgressBar>,
}

impl ProgressState {
    fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            overall: ProgressBar::hidden(),
            task_bars: HashMap::new(),
        }
    }
}

impl ProgressRendererPlugin {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ProgressState::new()),
            hidden: false,
        }
    }

    /// Tracks progress without drawing anything.
    pub fn hidden() -> Self {
        Self {
            state: Mutex::new(ProgressState::new()),
            hidden: true,
        }
    }

    fn new_bar(&self, state: &ProgressState, len: u64) -> ProgressBar {
        if self.hidden {
            return ProgressBar::hidden();
        }
        let bar = state.multi.add(ProgressBar::new(len));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} tasks ({percent}%) {msg}")
        {
            bar.set_style(style.progress_chars("█▓▒░  "));
        }
        bar
    }

    fn new_spinner(&self, state: &ProgressState) -> ProgressBar {
        if self.hidden {
            return ProgressBar::hidden();
        }
        let bar = state.multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::default_spinner().template("  {spinner:.green} {msg}") {
            bar.set_style(style.tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]));
        }
        bar.enable_steady_tick(Duration::from_millis(100));
        bar
    }

    /// Tasks finished so far in the current run.
    pub fn position(&self) -> u64 {
        self.state
            .lock()
            .map(|state| state.overall.position())
            .unwrap_or(0)
    }
}

impl Default for ProgressRendererPlugin {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRenderer for ProgressRendererPlugin {
    fn name(&self) -> &str {
        "progress-renderer"
    }

    fn render(&self, event: &RenderEvent) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };

        match event {
            RenderEvent::RunStart {
                workflow,
                total_tasks,
                ..
            } => {
                let overall = self.new_bar(&state, *total_tasks as u64);
                overall.set_message(format!("{workflow}: starting..."));
                state.overall = overall;
            }
            RenderEvent::Plan { stages, .. } => {
                state
                    .overall
                    .set_message(format!("{} stage(s) planned", stages.len()));
            }
            RenderEvent::TaskStart { task_id, .. } => {
                let bar = self.new_spinner(&state);
                bar.set_message(format!("⏳ {task_id}"));
                state.task_bars.insert(task_id.clone(), bar);
            }
            RenderEvent::TaskEnd {
                task_id,
                status,
                duration_ms,
                ..
            } => {
                let icon = if *status == TaskStatus::Completed {
                    "✅"
                } else {
                    "❌"
                };
                if let Some(bar) = state.task_bars.remove(task_id) {
                    bar.finish_with_message(format!("{icon} {task_id} ({duration_ms}ms)"));
                }
                state.overall.inc(1);
            }
            RenderEvent::RunEnd { summary, .. } => {
                let msg = if summary.cancelled {
                    "⏹ Run cancelled"
                } else if summary.failed == 0 && summary.pending == 0 {
                    "✅ All tasks completed"
                } else {
                    "❌ Execution failed"
                };
                state.overall.finish_with_message(msg.to_string());
            }
        }
    }
}

impl Drop for ProgressRendererPlugin {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            for (_, bar) in state.task_bars.drain() {
                bar.finish_and_clear();
            }
        }
    }
}
