use promptloom_core::workflow::{EventRenderer, RenderEvent, TaskStatus};

pub struct TextRendererPlugin {
    ascii_only: bool,
}

impl TextRendererPlugin {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn format_event(&self, event: &RenderEvent) -> String {
        match event {
            RenderEvent::RunStart {
                run_id,
                workflow,
                total_tasks,
            } => format!(
                "RUN START {} (workflow {}, tasks: {})",
                run_id, workflow, total_tasks
            ),
            RenderEvent::Plan { run_id, stages } => {
                let mut out = format!("PLAN {}:", run_id);
                for (idx, stage) in stages.iter().enumerate() {
                    out.push_str(&format!("\n  stage {}: {}", idx, stage.join(", ")));
                }
                out
            }
            RenderEvent::TaskStart {
                run_id,
                task_id,
                agent_id,
            } => format!("TASK START {} (task {}, agent {})", run_id, task_id, agent_id),
            RenderEvent::TaskEnd {
                run_id,
                task_id,
                status,
                duration_ms,
                error,
            } => {
                let label = match (status, self.ascii_only) {
                    (TaskStatus::Completed, true) => "OK",
                    (TaskStatus::Completed, false) => "SUCCESS",
                    (_, true) => "FAIL",
                    (_, false) => "FAILED",
                };
                let mut line = format!(
                    "TASK END {} (task {}, status {}, duration {}ms)",
                    run_id, task_id, label, duration_ms
                );
                if let Some(err) = error {
                    line.push_str(&format!(": {}", err));
                }
                line
            }
            RenderEvent::RunEnd { run_id, summary } => {
                let mut line = format!(
                    "RUN END {} (completed {}, failed {}, pending {}, duration {}ms)",
                    run_id, summary.completed, summary.failed, summary.pending, summary.duration_ms
                );
                if summary.cancelled {
                    line.push_str(" [cancelled]");
                }
                line
            }
        }
    }
}

impl EventRenderer for TextRendererPlugin {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn render(&self, event: &RenderEvent) {
        println!("{}", self.format_event(event));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use promptloom_core::workflow::RunSummary;

    #[test]
    fn test_text_renderer_task_end() {
        let renderer = TextRendererPlugin::new(true);
        let event = RenderEvent::TaskEnd {
            run_id: "run".to_string(),
            task_id: "task".to_string(),
            status: TaskStatus::Failed,
            duration_ms: 5,
            error: Some("schema mismatch".to_string()),
        };

        let line = renderer.format_event(&event);
        assert!(line.contains("TASK END"));
        assert!(line.contains("status FAIL"));
        assert!(line.ends_with(": schema mismatch"));
    }

    #[test]
    fn test_text_renderer_plan_lists_stages() {
        let renderer = TextRendererPlugin::new(false);
        let event = RenderEvent::Plan {
            run_id: "run".to_string(),
            stages: vec![
                vec!["a".to_string(), "b".to_string()],
                vec!["c".to_string()],
            ],
        };

        let out = renderer.format_event(&event);
        assert!(out.contains("stage 0: a, b"));
        assert!(out.contains("stage 1: c"));
    }

    #[test]
    fn test_text_renderer_marks_cancelled_runs() {
        let renderer = TextRendererPlugin::new(false);
        let event = RenderEvent::RunEnd {
            run_id: "run".to_string(),
            summary: RunSummary {
                total: 2,
                completed: 1,
                pending: 1,
                cancelled: true,
                ..RunSummary::default()
            },
        };

        assert!(renderer.format_event(&event).ends_with("[cancelled]"));
    }
}
