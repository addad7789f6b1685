//! Task DAG and the dependency-aware scheduler.
//!
//! ```text
//! Workflow::add_tasks()
//!   ↓
//! TaskGraph::from_tasks() + validate()  → duplicate ids, dangling deps, cycles
//!   ↓
//! WorkflowExecutor::run()
//!   ↓
//! scheduler::drive()                    → ready tasks → bind deps → Agent → validate
//!   ↓
//! WorkflowResult { tasks, events, result }
//! ```

mod document;
mod engine;
mod events;
mod graph;
mod result;
mod scheduler;
mod task;
mod traits;
mod workflow;

pub use document::{AgentRef, RunSnapshot, WorkflowDocument};
pub use engine::{WorkflowExecutor, WorkflowExecutorBuilder};
pub use events::TaskEvent;
pub use graph::TaskGraph;
pub use result::{TaskOutcome, WorkflowResult};
pub use task::{Task, TaskResult, TaskStatus};
pub use traits::{ConcurrencyContext, ConcurrencyStrategy, EventRenderer, RenderEvent, RunSummary};
pub use workflow::Workflow;
