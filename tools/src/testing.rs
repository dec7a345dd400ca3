//! Scripted executor and context helpers for unit tests

use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use crate::command::{Command, CommandHandle};
use crate::executor::{CommandExecutor, ExecError};
use crate::latch::CountdownLatch;
use crate::tool::ToolContext;

type Responder = Box<dyn Fn(&Command) -> Result<CommandHandle, ExecError> + Send + Sync>;

/// Answers every command through a closure and records what it was asked
pub(crate) struct FakeExecutor {
    respond: Responder,
    calls: Mutex<Vec<Command>>,
}

impl FakeExecutor {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&Command) -> Result<CommandHandle, ExecError> + Send + Sync + 'static,
    {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn calls(&self) -> Vec<Command> {
        self.calls.lock().unwrap().clone()
    }
}

impl CommandExecutor for FakeExecutor {
    fn execute(&self, command: &Command) -> Result<CommandHandle, ExecError> {
        self.calls.lock().unwrap().push(command.clone());
        (self.respond)(command)
    }

    fn host(&self) -> &str {
        "sut-01"
    }
}

/// Tool context writing into a fresh temp dir, with a latch of `count`
pub(crate) fn context(
    exec: Arc<FakeExecutor>,
    count: usize,
) -> (ToolContext, Arc<CountdownLatch>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let latch = Arc::new(CountdownLatch::new(count));
    let ctx = ToolContext {
        tool: "profiler".into(),
        args: Vec::new(),
        path: Default::default(),
        out_dir: dir.path().join("out"),
        host: "sut-01".into(),
        master_host: "master".into(),
        executor: exec,
        latch: latch.clone(),
    };
    (ctx, latch, dir)
}
