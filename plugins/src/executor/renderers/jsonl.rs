use chrono::Local;
use promptloom_core::workflow::{EventRenderer, RenderEvent};
use serde_json::{json, Value};

pub struct JsonlRendererPlugin {
    pretty_print: bool,
}

impl JsonlRendererPlugin {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, event: &RenderEvent) -> Value {
        let ts = Local::now().to_rfc3339();
        match event {
            RenderEvent::RunStart {
                run_id,
                workflow,
                total_tasks,
            } => json!({
                "v": 1,
                "event_type": "run.start",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "workflow": workflow,
                    "total_tasks": total_tasks,
                }
            }),
            RenderEvent::Plan { run_id, stages } => {
                let total_tasks: usize = stages.iter().map(|s| s.len()).sum();
                json!({
                    "v": 1,
                    "event_type": "executor.plan",
                    "ts": ts,
                    "run_id": run_id,
                    "metadata": {
                        "stages": stages,
                        "total_tasks": total_tasks,
                    }
                })
            }
            RenderEvent::TaskStart {
                run_id,
                task_id,
                agent_id,
            } => json!({
                "v": 1,
                "event_type": "task.start",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "metadata": {
                    "agent_id": agent_id,
                }
            }),
            RenderEvent::TaskEnd {
                run_id,
                task_id,
                status,
                duration_ms,
                error,
            } => json!({
                "v": 1,
                "event_type": "task.end",
                "ts": ts,
                "run_id": run_id,
                "task_id": task_id,
                "status": status.as_str(),
                "metadata": {
                    "duration_ms": duration_ms,
                    "error": error,
                }
            }),
            RenderEvent::RunEnd { run_id, summary } => json!({
                "v": 1,
                "event_type": "run.end",
                "ts": ts,
                "run_id": run_id,
                "metadata": {
                    "total_tasks": summary.total,
                    "completed": summary.completed,
                    "failed": summary.failed,
                    "pending": summary.pending,
                    "cancelled": summary.cancelled,
                    "duration_ms": summary.duration_ms,
                }
            }),
        }
    }
}

impl EventRenderer for JsonlRendererPlugin {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn render(&self, event: &RenderEvent) {
        let value = self.event_to_json(event);
        if self.pretty_print {
            println!("{}", serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".into()));
        } else {
            println!("{}", serde_json::to_string(&value).unwrap_or_else(|_| "{}".into()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use promptloom_core::workflow::{RunSummary, TaskStatus};

    #[test]
    fn test_jsonl_renderer_event_type() {
        let renderer = JsonlRendererPlugin::new(false);
        let event = RenderEvent::RunStart {
            run_id: "run".to_string(),
            workflow: "wf".to_string(),
            total_tasks: 2,
        };

        let value = renderer.event_to_json(&event);
        assert_eq!(value["v"], 1);
        assert_eq!(value["event_type"], "run.start");
        assert_eq!(value["metadata"]["workflow"], "wf");
    }

    #[test]
    fn test_jsonl_renderer_task_end() {
        let renderer = JsonlRendererPlugin::new(false);
        let event = RenderEvent::TaskEnd {
            run_id: "run".to_string(),
            task_id: "task".to_string(),
            status: TaskStatus::Failed,
            duration_ms: 12,
            error: Some("missing authentication".to_string()),
        };

        let value = renderer.event_to_json(&event);
        assert_eq!(value["event_type"], "task.end");
        assert_eq!(value["status"], "failed");
        assert_eq!(value["metadata"]["error"], "missing authentication");
    }

    #[test]
    fn test_jsonl_renderer_run_end() {
        let renderer = JsonlRendererPlugin::new(false);
        let event = RenderEvent::RunEnd {
            run_id: "run".to_string(),
            summary: RunSummary {
                total: 3,
                completed: 2,
                failed: 1,
                ..RunSummary::default()
            },
        };

        let value = renderer.event_to_json(&event);
        assert_eq!(value["metadata"]["total_tasks"], 3);
        assert_eq!(value["metadata"]["cancelled"], false);
    }
}
