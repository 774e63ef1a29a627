//! Forwarding of stored Task commands to an external runner.

use serde_json::Value;

use crate::graph::node::Node;
use crate::graph::store::GraphStore;

/// Receiver for task command records. Commands are opaque JSON; the sink decides what they mean.
pub trait CommandSink {
    /// Deliver one command. Returns `false` when the sink rejected it.
    fn send_command(&mut self, cmd: &Value) -> bool;
}

impl<F> CommandSink for F
where
    F: FnMut(&Value) -> bool,
{
    fn send_command(&mut self, cmd: &Value) -> bool {
        self(cmd)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
/// Tally of one [`forward_tasks`] run.
pub struct TaskRunReport {
    /// Tasks whose commands were forwarded.
    pub tasks_run: usize,
    /// Commands the sink accepted.
    pub commands_sent: usize,
    /// Commands the sink rejected.
    pub commands_rejected: usize,
    /// Task roots that were missing or not Task nodes.
    pub skipped: usize,
}

/// Walk `roots.tasks` in order and pass every command to `sink`.
pub fn forward_tasks(store: &GraphStore, sink: &mut dyn CommandSink) -> TaskRunReport {
    let mut report = TaskRunReport::default();
    for id in &store.roots().tasks {
        let Some(Node::Task(task)) = store.get_node(id) else {
            tracing::warn!(task = %id, "task root is missing or not a Task; skipping");
            report.skipped += 1;
            continue;
        };
        report.tasks_run += 1;
        for cmd in &task.commands {
            if sink.send_command(cmd) {
                report.commands_sent += 1;
            } else {
                report.commands_rejected += 1;
            }
        }
        tracing::debug!(task = %id, name = %task.name, commands = task.commands.len(), "forwarded task");
    }
    report
}

#[cfg(test)]
#[path = "../../tests/unit/collab/tasks.rs"]
mod tests;
